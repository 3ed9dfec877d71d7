use std::path::Path;
use std::process;

use tagsync_analyze::{check_integrity, AnalyzeConfig};

use crate::input::{load_snapshot, print_json};
use crate::OutputFormat;

pub(crate) fn cmd_integrity(
    snapshot_path: &Path,
    config: &AnalyzeConfig,
    output: OutputFormat,
    quiet: bool,
) {
    let snapshot = load_snapshot(snapshot_path, output, quiet);
    let issues = check_integrity(&snapshot, config);

    if !quiet {
        match output {
            OutputFormat::Json => print_json(&serde_json::json!({
                "valid": issues.is_empty(),
                "issues": issues,
            })),
            OutputFormat::Text => {
                if issues.is_empty() {
                    println!("all references resolve ({} entities)", snapshot.len());
                } else {
                    println!("{} broken reference(s):", issues.len());
                    for issue in &issues {
                        println!(
                            "  - [{}] {} '{}' -> {} at {}",
                            issue.kind.as_str(),
                            issue.entity,
                            issue.entity_name,
                            issue.reference,
                            issue.location
                        );
                    }
                }
            }
        }
    }

    if !issues.is_empty() {
        process::exit(1);
    }
}
