//! Check command implementation

use crate::cli::CheckArgs;
use crate::output::OutputWriter;
use crate::output_types::CheckOutput;
use anyhow::{bail, Context, Result};
use geoshp_core::config::StoreOptions;

pub fn execute(args: CheckArgs, options: StoreOptions, output: &OutputWriter) -> Result<()> {
    let store = super::open_existing(&args.path, options)?;
    let report = store.check_consistency().context("Failed to scan shapefile set")?;
    let consistent = report.is_consistent();
    let problem_count = report.problems.len();

    if output.is_json() {
        output.result(CheckOutput {
            consistent,
            shape_records: report.shape_records,
            index_entries: report.index_entries,
            dbf_rows: report.rows,
            problems: report.problems,
        })?;
    } else {
        output.section(format!("Consistency of {}", store.type_name()));
        output.kv("Shape records", report.shape_records);
        output.kv(
            "Index entries",
            report.index_entries.map(|n| n.to_string()).unwrap_or_else(|| "no .shx".to_string()),
        );
        output.kv("DBF rows", report.rows.map(|n| n.to_string()).unwrap_or_else(|| "no .dbf".to_string()));
        for problem in &report.problems {
            output.error(problem);
        }
        if consistent {
            output.success("Shapefile set is consistent");
        }
    }

    if !consistent {
        bail!("{} problem(s) found in {}", problem_count, store.type_name());
    }
    Ok(())
}
