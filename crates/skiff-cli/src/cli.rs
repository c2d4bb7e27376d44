//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "skiff", version, about = "The skiff application bundler")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log filter: a level (error, warn, info, debug) or a tracing
    /// directive like "skiff_bundler=debug"
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Bundle an application directory into a runnable tree
    Bundle(BundleArgs),
}

#[derive(Debug, Args)]
pub struct BundleArgs {
    /// The application directory
    pub app_dir: PathBuf,

    /// Where the bundle is written; relative paths resolve against the
    /// application directory
    #[arg(short, long, default_value = ".skiff/build")]
    pub output: PathBuf,

    /// Release to build against, or "none" for a local-only build
    #[arg(long, default_value = "none")]
    pub release: String,

    /// Release manifest pinning warehouse package versions
    #[arg(long)]
    pub release_manifest: Option<PathBuf>,

    /// Warehouse directory holding released package versions
    #[arg(long)]
    pub warehouse: Option<PathBuf>,

    /// How native modules reach the bundle: skip, copy, symlink
    #[arg(long = "node-modules", default_value = "skip")]
    pub node_modules: String,

    /// Also bundle these packages' tests
    #[arg(long = "test-package", value_name = "NAME")]
    pub test_packages: Vec<String>,

    /// Skip minification; client assets are served under cache-bust URLs
    #[arg(long)]
    pub no_minify: bool,

    /// Server runtime directory copied into the bundle
    #[arg(long)]
    pub runtime: Option<PathBuf>,

    /// Prebuilt native module root for copy/symlink modes
    #[arg(long)]
    pub native_modules_dir: Option<PathBuf>,

    /// Bundle version marker copied to server/.bundle_version.txt
    #[arg(long)]
    pub version_marker: Option<PathBuf>,
}
