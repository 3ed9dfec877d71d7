use std::path::Path;
use std::process;

use tagsync_analyze::{group_similar_tags, AnalyzeConfig, SnapshotIndex};
use tagsync_interchange::EntityKey;

use crate::input::{load_snapshot, print_json};
use crate::{report_error, OutputFormat, SimilarityArgs};

pub(crate) fn cmd_group(
    snapshot_path: &Path,
    args: &SimilarityArgs,
    config: &AnalyzeConfig,
    output: OutputFormat,
    quiet: bool,
) {
    let snapshot = load_snapshot(snapshot_path, output, quiet);
    let options = super::similarity_options(args, config);

    let groups = match group_similar_tags(&snapshot.tags, options.threshold, &options) {
        Ok(g) => g,
        Err(e) => {
            report_error(&format!("similarity error: {}", e), output, quiet);
            process::exit(1);
        }
    };

    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => print_json(&groups),
        OutputFormat::Text => {
            let index = SnapshotIndex::new(&snapshot);
            let name_of = |key: &EntityKey| {
                index
                    .get(key)
                    .map(|e| e.name().to_string())
                    .unwrap_or_default()
            };
            let duplicates = groups.iter().filter(|g| g.members.len() > 1).count();
            println!(
                "{} tags in {} groups ({} with near-duplicates)",
                snapshot.tags.len(),
                groups.len(),
                duplicates
            );
            for group in groups.iter().filter(|g| g.members.len() > 1) {
                println!();
                println!("{} '{}':", group.seed, name_of(&group.seed));
                for member in group.members.iter().skip(1) {
                    println!("  ~ {} '{}'", member, name_of(member));
                }
            }
        }
    }
}
