use std::path::Path;
use std::process;

use tagsync_analyze::{pre_validate, AnalyzeConfig};

use crate::input::{load_snapshot, print_json};
use crate::OutputFormat;

pub(crate) fn cmd_prevalidate(
    candidates_path: &Path,
    existing_path: &Path,
    config: &AnalyzeConfig,
    output: OutputFormat,
    quiet: bool,
) {
    let candidates = load_snapshot(candidates_path, output, quiet);
    let existing = load_snapshot(existing_path, output, quiet);
    let result = pre_validate(&candidates, &existing, config);

    if !quiet {
        match output {
            OutputFormat::Json => print_json(&result),
            OutputFormat::Text => {
                if result.is_clear() {
                    println!("clear: {} candidate(s), no conflicts", candidates.len());
                }
                if !result.conflicts.is_empty() {
                    println!("Name conflicts:");
                    for c in &result.conflicts {
                        println!(
                            "  - {} '{}' already exists as {}",
                            c.candidate, c.name, c.existing
                        );
                    }
                }
                if !result.unresolved.is_empty() {
                    println!("Unresolved references:");
                    for u in &result.unresolved {
                        println!(
                            "  - {} '{}' -> {{{{{}}}}} at {}",
                            u.entity, u.entity_name, u.reference, u.location
                        );
                    }
                }
            }
        }
    }

    if !result.is_clear() {
        process::exit(1);
    }
}
