//! # skiff-pack
//!
//! The package model of the skiff bundler: roles and environments,
//! emitted resources, package descriptors and loading, release manifests,
//! ignore lists, and the filesystem helpers the bundler builds on.
//!
//! A skiff application is bundled from packages. Each package contributes
//! source files per role (`use` or `test`) and environment (`client` or
//! `server`), declares the packages it uses and the symbols it exports,
//! and may register extension handlers that turn source files into
//! emitted resources. The unnamed package is the application itself.
//!
//! This crate is pure model and loading; the pipeline that turns loaded
//! packages into a runnable bundle lives in `skiff-bundler`.

pub mod error;
pub mod fsutil;
pub mod ignore;
pub mod loader;
pub mod package;
pub mod release;
pub mod resource;
pub mod role;

pub use error::{Error, Result};
pub use ignore::{IgnorePattern, IgnorePatterns};
pub use loader::{PackageLoader, StaticLoader, Warehouse, DESCRIPTOR_FILE};
pub use package::{
    CssHandler, DataSource, EmitOptions, EmitSink, HandlerInput, JsHandler, Package,
    PackageBuilder, PackageId, SourceHandler,
};
pub use release::{Release, ReleaseManifest};
pub use resource::{Resource, ResourceKind};
pub use role::{Env, PerEnv, PerRole, Role};
