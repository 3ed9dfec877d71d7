//! tagsync analyzer: dependency graphs, reference matching and
//! validation over workspace snapshots.
//!
//! Everything here is synchronous and pure over in-memory snapshots.
//! Each concern is a separate module producing serializable result
//! structs; [`dependency_graph`] and [`validate`] are the usual entry
//! points.

pub mod config;
pub mod extract;
pub mod graph;
pub mod index;
pub mod integrity;
pub mod mapping;
pub mod matcher;
pub mod prevalidate;
pub mod refs;
pub mod report;
pub mod validate;

pub use config::{AnalyzeConfig, ConfigError, GraphConfig, IntegrityConfig, MatchDefaults};
pub use extract::{extract_dependencies, DependencyEdge, DependencyKind, ExtractError};
pub use graph::{build_graph, DependencyGraph, DependencyNode, GraphWarning, GraphWarningKind};
pub use index::SnapshotIndex;
pub use integrity::{check_integrity, BrokenReference, IssueKind};
pub use mapping::{IdMapping, MappedEntity, MappingEntry};
pub use matcher::{
    group_similar, group_similar_tags, similarity, string_similarity, tokenize, MatchError,
    ReferenceMatcher, SearchOptions, SearchResult, SimilarityGroup, SimilarityOptions,
    SimilarityResult,
};
pub use prevalidate::{pre_validate, NameConflict, PreValidation, UnresolvedDependency};
pub use report::{
    render_report, EntityCounts, MissingEntity, ValidationReport, ValidationSummary,
};
pub use validate::{validate, validate_at};

use tagsync_interchange::{EntityKey, Snapshot};

/// Build the dependency graph of `roots` within `snapshot`.
///
/// Indexes the snapshot and runs [`build_graph`]. Callers building many
/// graphs over one snapshot should keep a [`SnapshotIndex`] and call
/// [`build_graph`] directly.
pub fn dependency_graph(
    snapshot: &Snapshot,
    roots: &[EntityKey],
    config: &GraphConfig,
) -> DependencyGraph {
    let index = SnapshotIndex::new(snapshot);
    build_graph(roots, &index, config)
}
