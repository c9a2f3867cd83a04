//! Command implementations

mod check;
mod config;
mod copy;
mod dump;
mod info;

use crate::cli::{Cli, Commands};
use crate::config_loader::load_config;
use crate::output::OutputWriter;
use anyhow::{bail, Context, Result};
use geoshp_core::config::StoreOptions;
use geoshp_store::{ShapefileDataStore, ShpFileType};
use std::path::Path;

/// Execute a CLI command
pub fn execute(cli: Cli) -> Result<()> {
    let output = OutputWriter::new(cli.json);
    let layered = load_config(&cli)?;
    let options = || layered.store_options().context("Invalid configuration");

    match cli.command {
        Commands::Info(args) => info::execute(args, options()?, &output),
        Commands::Dump(args) => dump::execute(args, options()?, &output),
        Commands::Check(args) => check::execute(args, options()?, &output),
        Commands::Copy(args) => copy::execute(args, options()?, &output),
        Commands::Config => config::execute(&layered, &output),
    }
}

/// Open an existing shapefile set
fn open_existing(path: &Path, options: StoreOptions) -> Result<ShapefileDataStore> {
    let store = ShapefileDataStore::open(path, options)
        .with_context(|| format!("Invalid shapefile path {}", path.display()))?;
    if !store.files().exists(ShpFileType::Shp) {
        bail!("No shapefile found at {}", path.display());
    }
    Ok(store)
}
