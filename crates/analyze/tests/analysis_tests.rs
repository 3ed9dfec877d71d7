//! Integration tests for graph building, matching and validation.
//!
//! These tests load workspace exports from `fixtures/`, run the
//! analyzer end to end, and check the results against known
//! expectations.

use proptest::prelude::*;
use std::path::{Path, PathBuf};
use tagsync_analyze::{
    build_graph, dependency_graph, group_similar_tags, render_report, string_similarity,
    tokenize, validate, validate_at, AnalyzeConfig, DependencyKind, GraphConfig, IdMapping,
    IssueKind, ReferenceMatcher, SimilarityGroup, SimilarityOptions, SnapshotIndex,
};
use tagsync_interchange::{EntityKey, Parameter, Snapshot, Tag, Variable};
use time::macros::datetime;

/// Locate the workspace root.
fn workspace_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .to_path_buf()
}

fn read_fixture(name: &str) -> serde_json::Value {
    let path = workspace_root().join("fixtures").join(name);
    let text = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("cannot read {}: {}", path.display(), e));
    serde_json::from_str(&text).unwrap_or_else(|e| panic!("invalid JSON in {}: {}", name, e))
}

fn load_snapshot(name: &str) -> Snapshot {
    tagsync_interchange::from_workspace_json(&read_fixture(name))
        .unwrap_or_else(|e| panic!("cannot load snapshot {}: {}", name, e))
}

fn load_mapping(name: &str) -> IdMapping {
    serde_json::from_value(read_fixture(name)).expect("mapping")
}

fn keys(order: &[EntityKey]) -> Vec<String> {
    order.iter().map(|k| k.to_string()).collect()
}

// ──────────────────────────────────────────────
// Dependency graph
// ──────────────────────────────────────────────

#[test]
fn round_trip_source_creation_order() {
    let source = load_snapshot("source.json");
    let graph = dependency_graph(&source, &[EntityKey::tag("1")], &GraphConfig::default());

    assert_eq!(graph.root_name.as_deref(), Some("T1"));
    assert_eq!(
        keys(&graph.creation_order),
        vec!["variable:20", "trigger:10", "tag:1"]
    );
    assert!(graph.warnings.is_empty());

    let tag = graph.node(&EntityKey::tag("1")).unwrap();
    let kinds: Vec<DependencyKind> = tag.edges.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![DependencyKind::InlineScript, DependencyKind::FiringTrigger]
    );
}

#[test]
fn ga4_event_tag_pulls_in_config_tag() {
    let snapshot = load_snapshot("ga4_container.json");
    let graph = dependency_graph(&snapshot, &[EntityKey::tag("2")], &GraphConfig::default());

    assert_eq!(
        keys(&graph.creation_order),
        vec!["variable:30", "trigger:20", "tag:1", "tag:2"]
    );
    let config_edge = graph
        .node(&EntityKey::tag("2"))
        .unwrap()
        .edges
        .iter()
        .find(|e| e.kind == DependencyKind::ConfigTag)
        .expect("config tag edge");
    assert_eq!(config_edge.target, EntityKey::tag("1"));
    assert_eq!(config_edge.note.as_deref(), Some("measurementId = G-ABC123"));
}

#[test]
fn hub_variable_is_included_but_not_expanded() {
    let snapshot = load_snapshot("ga4_container.json");
    let graph = dependency_graph(&snapshot, &[EntityKey::tag("4")], &GraphConfig::default());

    assert!(graph.contains(&EntityKey::variable("31")));
    assert!(!graph.contains(&EntityKey::variable("32")));
    let hubs: Vec<String> = graph.hub_nodes().map(|n| n.key.to_string()).collect();
    assert_eq!(hubs, vec!["variable:31"]);
}

#[test]
fn several_roots_share_one_graph() {
    let snapshot = load_snapshot("ga4_container.json");
    let index = SnapshotIndex::new(&snapshot);
    let graph = build_graph(
        &[EntityKey::tag("2"), EntityKey::tag("3")],
        &index,
        &GraphConfig::default(),
    );

    // the config tag is shared and appears once
    let config_tags = graph
        .creation_order
        .iter()
        .filter(|k| **k == EntityKey::tag("1"))
        .count();
    assert_eq!(config_tags, 1);
    assert_eq!(graph.len(), graph.creation_order.len());
    let config_at = graph.creation_index(&EntityKey::tag("1")).unwrap();
    assert!(config_at < graph.creation_index(&EntityKey::tag("2")).unwrap());
    assert!(config_at < graph.creation_index(&EntityKey::tag("3")).unwrap());
}

// ──────────────────────────────────────────────
// Validation
// ──────────────────────────────────────────────

#[test]
fn fully_mapped_copy_succeeds() {
    let report = validate_at(
        &load_snapshot("source.json"),
        &load_snapshot("target.json"),
        &load_mapping("mapping.json"),
        &AnalyzeConfig::default(),
        datetime!(2024-05-01 12:00 UTC),
    );

    assert!(report.success);
    assert!(report.missing.is_empty());
    assert!(report.broken_references.is_empty());
    assert!(report.warnings.is_empty());
    assert_eq!(report.summary.mapped, 3);
    assert_eq!(report.summary.expected, report.summary.actual);
    assert!(render_report(&report).contains("Result:    PASSED"));
}

#[test]
fn unmapped_and_uncreated_variable_is_a_broken_reference() {
    let report = validate_at(
        &load_snapshot("source.json"),
        &load_snapshot("target_without_v1.json"),
        &load_mapping("mapping_without_v1.json"),
        &AnalyzeConfig::default(),
        datetime!(2024-05-01 12:00 UTC),
    );

    // only mapped ids are checked for presence
    assert!(report.missing.is_empty());
    assert_eq!(report.broken_references.len(), 1);
    let broken = &report.broken_references[0];
    assert_eq!(broken.kind, IssueKind::MissingVariable);
    assert_eq!(broken.entity, EntityKey::tag("101"));
    assert_eq!(broken.reference, "V1");
    assert!(!report.success);
    assert_eq!(
        report.warnings,
        vec!["1 source variables never mapped: V1 (20)".to_string()]
    );
}

#[test]
fn exact_copy_validates_against_itself() {
    let snapshot = load_snapshot("ga4_container.json");
    let mut mapping = IdMapping::new();
    for entity in snapshot.entities() {
        mapping.insert(entity.key(), entity.id(), entity.name());
    }
    let report = validate(&snapshot, &snapshot, &mapping, &AnalyzeConfig::default());
    assert!(report.success, "{}", render_report(&report));
}

#[test]
fn validation_is_repeatable() {
    let source = load_snapshot("source.json");
    let target = load_snapshot("target_without_v1.json");
    let mapping = load_mapping("mapping.json");
    let config = AnalyzeConfig::default();

    let mut first = validate(&source, &target, &mapping, &config);
    let second = validate(&source, &target, &mapping, &config);
    first.timestamp = second.timestamp.clone();
    assert_eq!(first, second);

    let at = datetime!(2024-05-01 12:00 UTC);
    let a = validate_at(&source, &target, &mapping, &config, at);
    let b = validate_at(&source, &target, &mapping, &config, at);
    assert_eq!(render_report(&a), render_report(&b));
}

// ──────────────────────────────────────────────
// Matching
// ──────────────────────────────────────────────

#[test]
fn similar_purchase_tags_score_exactly() {
    let matcher = ReferenceMatcher::with_snapshot(load_snapshot("ga4_container.json"));
    let reference = &matcher.snapshot().unwrap().tags[1];

    let results = matcher
        .find_similar_tags(reference, &SimilarityOptions::default())
        .unwrap();

    // "Purchase - GA4" vs "Purchase Event - GA4":
    // type 40 + name 2/3 * 30 + parameter keys 3/3 * 30 = 90 / 100
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].key, EntityKey::tag("3"));
    assert!((results[0].score - 0.9).abs() < 1e-9);
}

fn tag_with_keys(id: &str, name: &str, keys: &[&str]) -> Tag {
    Tag {
        id: id.into(),
        name: name.into(),
        tag_type: "gaawe".into(),
        parameters: keys.iter().map(|k| Parameter::scalar(*k, "x")).collect(),
        ..Default::default()
    }
}

#[test]
fn partial_parameter_overlap_scores_exactly() {
    let reference = tag_with_keys("1", "Purchase - GA4", &["eventName", "measurementId"]);
    let candidate = tag_with_keys(
        "2",
        "Purchase Event - GA4",
        &["eventName", "measurementId", "eventParameters"],
    );
    let matcher = ReferenceMatcher::with_snapshot(Snapshot {
        tags: vec![candidate],
        ..Default::default()
    });

    let results = matcher
        .find_similar_tags(&reference, &SimilarityOptions::default())
        .unwrap();
    // 40 + 2/3 * 30 + 2/3 * 30 = 80 / 100
    assert_eq!(results.len(), 1);
    assert!((results[0].score - 0.8).abs() < 1e-9);
}

#[test]
fn source_tag_finds_its_copy_under_the_same_id_in_target() {
    let source = load_snapshot("source.json");
    let mut target = load_snapshot("target.json");
    // The copy kept its source id.
    target.tags[0].id = source.tags[0].id.clone();
    let matcher = ReferenceMatcher::with_snapshot(target);

    let results = matcher
        .find_similar_tags(&source.tags[0], &SimilarityOptions::default())
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].key, EntityKey::tag("1"));
    assert_eq!(results[0].score, 1.0);
}

#[test]
fn grouping_does_not_chain_through_middle_tag() {
    let tags = vec![
        tag_with_keys("a", "aa bb cc dd", &[]),
        tag_with_keys("b", "aa bb cc dd ee ff", &[]),
        tag_with_keys("c", "cc dd ee ff", &[]),
    ];
    // sim(a,b) = sim(b,c) = 0.6, sim(a,c) = 0.5
    let groups = group_similar_tags(&tags, 0.55, &SimilarityOptions::default()).unwrap();
    assert_eq!(
        groups,
        vec![
            SimilarityGroup {
                seed: EntityKey::tag("a"),
                members: vec![EntityKey::tag("a"), EntityKey::tag("b")],
            },
            SimilarityGroup {
                seed: EntityKey::tag("c"),
                members: vec![EntityKey::tag("c")],
            },
        ]
    );
}

// ──────────────────────────────────────────────
// Properties
// ──────────────────────────────────────────────

/// A chain of variables where each may reference any earlier one.
fn acyclic_snapshot(refs: &[Vec<usize>]) -> Snapshot {
    let variables = refs
        .iter()
        .enumerate()
        .map(|(i, targets)| {
            let body: String = targets
                .iter()
                .filter(|&&t| t < i)
                .map(|t| format!("{{{{v{}}}}} ", t))
                .collect();
            Variable {
                id: i.to_string(),
                name: format!("v{}", i),
                variable_type: "jsm".into(),
                parameters: vec![Parameter::scalar("javascript", body)],
                notes: None,
            }
        })
        .collect();
    Snapshot {
        variables,
        ..Default::default()
    }
}

proptest! {
    #[test]
    fn tokenize_is_idempotent(text in "[a-zA-Z0-9 ._-]{0,40}") {
        let tokens = tokenize(&text);
        prop_assert_eq!(tokenize(&tokens.join(" ")), tokens);
    }

    #[test]
    fn tokenize_preserves_order(words in proptest::collection::vec("[a-z]{2,6}", 0..8)) {
        prop_assert_eq!(tokenize(&words.join("_")), words);
    }

    #[test]
    fn string_similarity_is_symmetric(a in "[a-z -]{0,24}", b in "[a-z -]{0,24}") {
        prop_assert_eq!(string_similarity(&a, &b), string_similarity(&b, &a));
    }

    #[test]
    fn name_is_fully_similar_to_itself(a in "[a-z]{2,8}( [a-z]{2,8}){0,3}") {
        prop_assert_eq!(string_similarity(&a, &a), 1.0);
    }

    #[test]
    fn acyclic_graphs_sort_topologically(
        refs in proptest::collection::vec(proptest::collection::vec(0usize..12, 0..4), 1..12)
    ) {
        let snapshot = acyclic_snapshot(&refs);
        let roots: Vec<EntityKey> = snapshot
            .variables
            .iter()
            .map(|v| EntityKey::variable(&v.id))
            .collect();
        let graph = dependency_graph(&snapshot, &roots, &GraphConfig::default());

        prop_assert!(graph.warnings.is_empty());
        prop_assert_eq!(graph.creation_order.len(), snapshot.variables.len());
        for node in &graph.nodes {
            let owner = graph.creation_index(&node.key).unwrap();
            for edge in &node.edges {
                prop_assert!(graph.creation_index(&edge.target).unwrap() < owner);
            }
        }
    }
}
