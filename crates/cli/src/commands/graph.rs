use std::path::Path;

use tagsync_analyze::{dependency_graph, AnalyzeConfig};
use tagsync_interchange::EntityKey;

use crate::input::{load_snapshot, print_json};
use crate::OutputFormat;

pub(crate) fn cmd_graph(
    snapshot_path: &Path,
    roots: &[EntityKey],
    config: &AnalyzeConfig,
    output: OutputFormat,
    quiet: bool,
) {
    let snapshot = load_snapshot(snapshot_path, output, quiet);
    let graph = dependency_graph(&snapshot, roots, &config.graph);

    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => print_json(&graph),
        OutputFormat::Text => {
            println!("Dependency Graph");
            println!("================");
            if let Some(name) = &graph.root_name {
                println!("Root: {}", name);
            }
            println!("{} entities", graph.len());
            println!();

            println!("Creation order:");
            for (i, key) in graph.creation_order.iter().enumerate() {
                let Some(node) = graph.node(key) else {
                    continue;
                };
                let hub = if node.is_hub { " [hub]" } else { "" };
                println!(
                    "  {:>3}. {} '{}' ({}){}",
                    i + 1,
                    key,
                    node.name,
                    node.entity_type,
                    hub
                );
                for edge in &node.edges {
                    println!(
                        "         -> {} '{}' [{}] at {}",
                        edge.target,
                        edge.target_name,
                        edge.kind.as_str(),
                        edge.location
                    );
                }
            }

            if !graph.warnings.is_empty() {
                println!();
                println!("Warnings:");
                for w in &graph.warnings {
                    println!("  - {}", w.message);
                }
            }
        }
    }
}
