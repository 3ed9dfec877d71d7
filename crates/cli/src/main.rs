mod commands;
mod input;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tagsync_analyze::AnalyzeConfig;
use tagsync_interchange::{EntityKey, EntityKind};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Tag-manager replication toolkit.
#[derive(Parser)]
#[command(
    name = "tagsync",
    version,
    about = "Tag-manager replication toolkit: dependency graphs, matching and validation"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the dependency graph of one or more root entities
    Graph {
        /// Path to the workspace export JSON
        snapshot: PathBuf,
        /// Root entity as kind:id (e.g. tag:12); repeatable
        #[arg(long = "root", required = true, value_parser = parse_entity_key)]
        roots: Vec<EntityKey>,
    },

    /// Search entities by name
    Search {
        /// Path to the workspace export JSON
        snapshot: PathBuf,
        /// Name or fragment to look for
        query: String,
        /// Restrict to an entity kind; repeatable
        #[arg(long = "kind", value_parser = parse_entity_kind)]
        kinds: Vec<EntityKind>,
        /// Restrict to one type discriminator (e.g. html, gaawe)
        #[arg(long = "type")]
        entity_type: Option<String>,
        /// Keep results scoring above this
        #[arg(long)]
        threshold: Option<f64>,
        /// Maximum number of results
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Find tags similar to a given tag
    Similar {
        /// Path to the workspace export JSON
        snapshot: PathBuf,
        /// Id of the reference tag
        #[arg(long)]
        tag: String,
        #[command(flatten)]
        similarity: SimilarityArgs,
    },

    /// Group near-duplicate tags
    Group {
        /// Path to the workspace export JSON
        snapshot: PathBuf,
        #[command(flatten)]
        similarity: SimilarityArgs,
    },

    /// Validate a replicated target against its source
    Validate {
        /// Path to the source workspace export JSON
        source: PathBuf,
        /// Path to the target workspace export JSON
        target: PathBuf,
        /// Path to the id mapping JSON
        #[arg(long)]
        mapping: PathBuf,
    },

    /// Check that every reference in a workspace resolves
    Integrity {
        /// Path to the workspace export JSON
        snapshot: PathBuf,
    },

    /// Check candidate entities against a target before creating them
    Prevalidate {
        /// Path to the export holding the entities to create
        candidates: PathBuf,
        /// Path to the current target workspace export JSON
        existing: PathBuf,
    },
}

/// Options shared by the similarity subcommands.
#[derive(clap::Args)]
pub(crate) struct SimilarityArgs {
    /// Minimum similarity (0.0 to 1.0)
    #[arg(long)]
    pub threshold: Option<f64>,
    /// Ignore the type discriminator
    #[arg(long)]
    pub no_type: bool,
    /// Ignore names
    #[arg(long)]
    pub no_name: bool,
    /// Ignore parameter keys
    #[arg(long)]
    pub no_parameters: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.quiet);
    let config = load_config(cli.config.as_deref(), cli.output, cli.quiet);

    match cli.command {
        Commands::Graph { snapshot, roots } => {
            commands::graph::cmd_graph(&snapshot, &roots, &config, cli.output, cli.quiet);
        }
        Commands::Search {
            snapshot,
            query,
            kinds,
            entity_type,
            threshold,
            top_k,
        } => {
            commands::search::cmd_search(
                &snapshot,
                &query,
                commands::search::SearchArgs {
                    kinds,
                    entity_type,
                    threshold,
                    top_k,
                },
                &config,
                cli.output,
                cli.quiet,
            );
        }
        Commands::Similar {
            snapshot,
            tag,
            similarity,
        } => {
            commands::similar::cmd_similar(
                &snapshot,
                &tag,
                &similarity,
                &config,
                cli.output,
                cli.quiet,
            );
        }
        Commands::Group {
            snapshot,
            similarity,
        } => {
            commands::group::cmd_group(&snapshot, &similarity, &config, cli.output, cli.quiet);
        }
        Commands::Validate {
            source,
            target,
            mapping,
        } => {
            commands::validate::cmd_validate(
                &source,
                &target,
                &mapping,
                &config,
                cli.output,
                cli.quiet,
            );
        }
        Commands::Integrity { snapshot } => {
            commands::integrity::cmd_integrity(&snapshot, &config, cli.output, cli.quiet);
        }
        Commands::Prevalidate {
            candidates,
            existing,
        } => {
            commands::prevalidate::cmd_prevalidate(
                &candidates,
                &existing,
                &config,
                cli.output,
                cli.quiet,
            );
        }
    }
}

/// Log to stderr. `RUST_LOG` overrides the default level.
fn init_tracing(quiet: bool) {
    let default = if quiet { "error" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&Path>, output: OutputFormat, quiet: bool) -> AnalyzeConfig {
    let Some(path) = path else {
        return AnalyzeConfig::default();
    };
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("error reading config '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    let config: AnalyzeConfig = match toml::from_str(&text) {
        Ok(c) => c,
        Err(e) => {
            let msg = format!("error parsing config '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    if let Err(e) = config.check() {
        let msg = format!("invalid config '{}': {}", path.display(), e);
        report_error(&msg, output, quiet);
        process::exit(1);
    }
    config
}

fn parse_entity_kind(s: &str) -> Result<EntityKind, String> {
    EntityKind::parse(s)
        .ok_or_else(|| format!("unknown entity kind '{}' (tag, trigger, variable, template)", s))
}

fn parse_entity_key(s: &str) -> Result<EntityKey, String> {
    let (kind, id) = s
        .split_once(':')
        .ok_or_else(|| format!("expected kind:id, got '{}'", s))?;
    if id.is_empty() {
        return Err(format!("missing id in '{}'", s));
    }
    Ok(EntityKey::new(parse_entity_kind(kind)?, id))
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_key_argument() {
        assert_eq!(parse_entity_key("tag:12"), Ok(EntityKey::tag("12")));
        assert_eq!(parse_entity_key("Variables:7"), Ok(EntityKey::variable("7")));
        assert!(parse_entity_key("12").is_err());
        assert!(parse_entity_key("tag:").is_err());
        assert!(parse_entity_key("folder:1").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
