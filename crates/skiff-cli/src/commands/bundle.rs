use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use console::style;
use tracing::warn;

use skiff_bundler::{bundle, BundleOptions, NodeModulesMode, Platform};
use skiff_pack::{Release, ReleaseManifest, Warehouse};

use crate::cli::BundleArgs;

pub struct BundleCommand {
    args: BundleArgs,
}

impl From<BundleArgs> for BundleCommand {
    fn from(args: BundleArgs) -> Self {
        Self { args }
    }
}

impl BundleCommand {
    pub fn run(self) -> Result<()> {
        let app_dir = self.args.app_dir.clone();
        if !app_dir.is_dir() {
            bail!("'{}' is not a directory", app_dir.display());
        }
        let output: PathBuf = if self.args.output.is_absolute() {
            self.args.output.clone()
        } else {
            app_dir.join(&self.args.output)
        };

        let release = Release::parse(&self.args.release);
        let release_manifest = match (&release, &self.args.release_manifest) {
            (_, Some(path)) => ReleaseManifest::load(path)
                .with_context(|| format!("failed to load release manifest '{}'", path.display()))?,
            (Release::Named(name), None) => {
                warn!(release = name.as_str(), "release given without a manifest; warehouse packages will not resolve");
                ReleaseManifest::default()
            }
            (Release::None, None) => ReleaseManifest::default(),
        };

        let mut options = BundleOptions::default();
        options.release = release;
        options.node_modules_mode =
            NodeModulesMode::parse(&self.args.node_modules).map_err(anyhow::Error::msg)?;
        options.test_packages = self.args.test_packages.clone();
        options.minify = !self.args.no_minify;
        options.platform = Platform {
            runtime_dir: self.args.runtime.clone(),
            native_modules_dir: self.args.native_modules_dir.clone(),
            version_marker: self.args.version_marker.clone(),
        };

        let loader = Warehouse::new(&app_dir, self.args.warehouse.clone(), release_manifest);
        let errors = bundle(&app_dir, &output, &loader, &options);

        if errors.is_empty() {
            println!(
                "{} Bundle complete → {}",
                style("✔").green().bold(),
                style(output.display()).bold()
            );
            Ok(())
        } else {
            for error in &errors {
                eprintln!("{} {error}", style("✘").red().bold());
            }
            bail!("bundling failed with {} error(s)", errors.len())
        }
    }
}
