use std::path::Path;
use std::process;

use tagsync_analyze::{AnalyzeConfig, ReferenceMatcher, SearchOptions};
use tagsync_interchange::EntityKind;

use crate::input::{load_snapshot, print_json};
use crate::{report_error, OutputFormat};

/// Search flags as given on the command line.
pub(crate) struct SearchArgs {
    pub kinds: Vec<EntityKind>,
    pub entity_type: Option<String>,
    pub threshold: Option<f64>,
    pub top_k: Option<usize>,
}

pub(crate) fn cmd_search(
    snapshot_path: &Path,
    query: &str,
    args: SearchArgs,
    config: &AnalyzeConfig,
    output: OutputFormat,
    quiet: bool,
) {
    let snapshot = load_snapshot(snapshot_path, output, quiet);
    let matcher = ReferenceMatcher::with_snapshot(snapshot);

    let options = SearchOptions {
        kinds: (!args.kinds.is_empty()).then_some(args.kinds),
        entity_type: args.entity_type,
        threshold: args.threshold.unwrap_or(config.matching.search_threshold),
        top_k: args.top_k.unwrap_or(config.matching.top_k),
    };

    let results = match matcher.search_by_name(query, &options) {
        Ok(r) => r,
        Err(e) => {
            report_error(&format!("search error: {}", e), output, quiet);
            process::exit(1);
        }
    };

    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => print_json(&results),
        OutputFormat::Text => {
            if results.is_empty() {
                println!("no matches for '{}'", query);
                return;
            }
            for r in &results {
                println!(
                    "{:>6.1}  {:<16} {} ({})",
                    r.score,
                    r.key.to_string(),
                    r.name,
                    r.entity_type
                );
            }
        }
    }
}
