use std::path::Path;
use std::process;

use tagsync_analyze::{AnalyzeConfig, ReferenceMatcher};

use crate::input::{load_snapshot, print_json};
use crate::{report_error, OutputFormat, SimilarityArgs};

pub(crate) fn cmd_similar(
    snapshot_path: &Path,
    tag_id: &str,
    args: &SimilarityArgs,
    config: &AnalyzeConfig,
    output: OutputFormat,
    quiet: bool,
) {
    let matcher = ReferenceMatcher::with_snapshot(load_snapshot(snapshot_path, output, quiet));
    let reference = matcher
        .snapshot()
        .ok()
        .and_then(|s| s.tags.iter().find(|t| t.id == tag_id));
    let Some(reference) = reference else {
        report_error(&format!("tag '{}' not found", tag_id), output, quiet);
        process::exit(1);
    };
    let options = super::similarity_options(args, config);

    // Borrowed from the matcher's snapshot, so the tag is not its own match.
    let results = match matcher.find_similar_tags(reference, &options) {
        Ok(r) => r,
        Err(e) => {
            report_error(&format!("similarity error: {}", e), output, quiet);
            process::exit(1);
        }
    };

    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => print_json(&results),
        OutputFormat::Text => {
            println!("Tags similar to '{}' ({}):", reference.name, reference.tag_type);
            if results.is_empty() {
                println!("  (none at or above {:.2})", options.threshold);
            }
            for r in &results {
                println!("  {:.3}  {} '{}' ({})", r.score, r.key, r.name, r.entity_type);
            }
        }
    }
}
