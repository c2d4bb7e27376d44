//! # skiff-bundler
//!
//! Compiles a skiff application directory into a self-contained,
//! runnable bundle: a server program, client assets, a pre-rendered HTML
//! shell, and machine-readable manifests.
//!
//! ## Pipeline
//!
//! ```text
//! resolve ─ order ─ compile ─ link ─ aggregate ─ [minify] ─ write
//! ```
//!
//! - **resolve**: transitive closure of packages per role and
//!   environment, producing one bundling record per (package, role).
//! - **order**: topological sort over the `uses` edges, minus edges each
//!   package marks unordered; cycles abort the bundle.
//! - **compile**: every source file runs through its extension handler,
//!   or becomes a static resource.
//! - **link**: per record and environment, JavaScript resources are
//!   handed to the transport-code linker together with the symbols
//!   importable from upstream packages.
//! - **aggregate**: per-record resources merge into bundle-wide file
//!   tables and ordered load lists.
//! - **minify**: client JS and CSS collapse into one content-addressed
//!   file each.
//! - **write**: the tree is assembled in a `.build.<name>` area and
//!   swapped into place.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::path::Path;
//! use skiff_bundler::{bundle, BundleOptions};
//! use skiff_pack::{ReleaseManifest, Warehouse};
//!
//! let app_dir = Path::new("my-app");
//! let loader = Warehouse::new(app_dir, None, ReleaseManifest::default());
//! let errors = bundle(app_dir, Path::new("my-app/build"), &loader, &BundleOptions::default());
//! assert!(errors.is_empty(), "{}", errors.join("\n"));
//! ```

mod aggregate;
mod bundle;
mod compile;
mod error;
mod fingerprint;
mod html;
mod link;
mod manifest;
mod minify;
mod order;
mod pbr;
mod resolve;
mod write;

#[cfg(feature = "logging")]
pub mod logging;

#[cfg(test)]
mod tests;

pub use bundle::{bundle, BundleOptions};
pub use error::{BundleError, Result};
pub use fingerprint::{cache_bust_url, sha1_hex};
pub use link::{
    ExportsRegistry, LinkInput, LinkOutput, LinkRequest, LinkedFile, Linker, ModuleLinker,
    IMPORT_STUB_SERVE_PATH,
};
pub use manifest::{AppJson, DependenciesJson, ManifestEntry, ManifestKind, ManifestWhere};
pub use minify::{CssMinifier, JsMinifier, LightningCssMinifier, StripJsMinifier};
pub use write::{NodeModulesMode, Platform};
