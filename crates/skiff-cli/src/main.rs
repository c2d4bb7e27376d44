//! The `skiff` binary.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Command};
use commands::BundleCommand;

fn main() -> Result<()> {
    let cli = Cli::parse();
    skiff_bundler::logging::validate_directive(&cli.log_level).map_err(anyhow::Error::msg)?;
    skiff_bundler::logging::init_logging(&cli.log_level);

    match cli.command {
        Command::Bundle(args) => BundleCommand::from(args).run(),
    }
}
