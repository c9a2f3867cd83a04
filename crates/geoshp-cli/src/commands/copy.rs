//! Copy command implementation

use crate::cli::CopyArgs;
use crate::output::OutputWriter;
use crate::output_types::CopyOutput;
use anyhow::{bail, Context, Result};
use geoshp_core::config::StoreOptions;
use geoshp_store::{ShpFileType, ShpFiles};

pub fn execute(args: CopyArgs, options: StoreOptions, output: &OutputWriter) -> Result<()> {
    let source = super::open_existing(&args.source, options)?;

    let target = ShpFiles::from_path(&args.target)
        .with_context(|| format!("Invalid target path {}", args.target.display()))?;
    if target.exists(ShpFileType::Shp) {
        if !args.force {
            bail!(
                "{} already exists (use --force to overwrite)",
                target.path(ShpFileType::Shp).display()
            );
        }
        output.warning(format!("Overwriting {}", target.path(ShpFileType::Shp).display()));
    }

    let copy = source
        .copy_to(target.path(ShpFileType::Shp))
        .with_context(|| format!("Failed to copy {}", source.type_name()))?;
    let record_count = copy.count().context("Failed to count copied records")?;

    let source_path = source.files().path(ShpFileType::Shp).display().to_string();
    let target_path = copy.files().path(ShpFileType::Shp).display().to_string();

    if output.is_json() {
        output.result(CopyOutput { source: source_path, target: target_path, record_count })?;
    } else {
        output.success(format!("Copied {} records from {} to {}", record_count, source_path, target_path));
    }

    Ok(())
}
