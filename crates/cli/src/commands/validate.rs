use std::path::Path;
use std::process;

use tagsync_analyze::{render_report, validate, AnalyzeConfig};

use crate::input::{load_mapping, load_snapshot, print_json};
use crate::OutputFormat;

/// Exits 1 when the report is not successful.
pub(crate) fn cmd_validate(
    source_path: &Path,
    target_path: &Path,
    mapping_path: &Path,
    config: &AnalyzeConfig,
    output: OutputFormat,
    quiet: bool,
) {
    let source = load_snapshot(source_path, output, quiet);
    let target = load_snapshot(target_path, output, quiet);
    let mapping = load_mapping(mapping_path, output, quiet);

    let report = validate(&source, &target, &mapping, config);

    if !quiet {
        match output {
            OutputFormat::Json => print_json(&report),
            OutputFormat::Text => print!("{}", render_report(&report)),
        }
    }

    if !report.success {
        process::exit(1);
    }
}
