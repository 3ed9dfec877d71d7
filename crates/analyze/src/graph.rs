//! Dependency graph construction and creation ordering.
//!
//! Starting from a set of root entities, a breadth-first traversal
//! extracts each entity's edges and pulls its dependencies into the
//! graph. Hub entities (shared configuration such as analytics settings
//! variables) are included but not expanded. The creation order is a
//! stable topological sort: dependencies first, ties broken by discovery
//! order, cycles broken at the earliest-discovered node on the cycle.

use crate::config::GraphConfig;
use crate::extract::{self, DependencyEdge};
use crate::index::SnapshotIndex;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, VecDeque};
use tagsync_interchange::{EntityKey, EntityRef};
use tracing::{debug, warn};

/// One entity in the graph with its outgoing edges.
#[derive(Debug, Clone, Serialize)]
pub struct DependencyNode {
    pub key: EntityKey,
    pub name: String,
    pub entity_type: String,
    pub is_hub: bool,
    pub is_root: bool,
    pub edges: Vec<DependencyEdge>,
    /// Set when extraction failed; the node is then an edge-less leaf.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction_error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GraphWarningKind {
    CycleBroken,
    ExtractionFailed,
    RootNotFound,
}

/// A recoverable problem found while building the graph.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GraphWarning {
    pub kind: GraphWarningKind,
    pub entity: EntityKey,
    pub message: String,
}

/// The dependency closure of a set of roots.
#[derive(Debug, Clone, Serialize)]
pub struct DependencyGraph {
    pub root_id: Option<EntityKey>,
    pub root_name: Option<String>,
    /// Nodes in discovery (breadth-first) order.
    pub nodes: Vec<DependencyNode>,
    /// Keys in an order safe to create one after another.
    pub creation_order: Vec<EntityKey>,
    pub warnings: Vec<GraphWarning>,
    #[serde(skip)]
    positions: HashMap<EntityKey, usize>,
}

impl DependencyGraph {
    fn empty() -> Self {
        DependencyGraph {
            root_id: None,
            root_name: None,
            nodes: Vec::new(),
            creation_order: Vec::new(),
            warnings: Vec::new(),
            positions: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.positions.contains_key(key)
    }

    pub fn node(&self, key: &EntityKey) -> Option<&DependencyNode> {
        self.positions.get(key).map(|&i| &self.nodes[i])
    }

    /// Distinct in-graph dependencies of `key`, in edge order.
    pub fn dependencies_of(&self, key: &EntityKey) -> Vec<&EntityKey> {
        let Some(node) = self.node(key) else {
            return Vec::new();
        };
        let mut seen = BTreeSet::new();
        node.edges
            .iter()
            .map(|e| &e.target)
            .filter(|t| *t != key && self.contains(t) && seen.insert(*t))
            .collect()
    }

    /// Nodes with an edge into `key`, in discovery order.
    pub fn dependents_of(&self, key: &EntityKey) -> Vec<&EntityKey> {
        self.nodes
            .iter()
            .filter(|n| n.key != *key && n.edges.iter().any(|e| e.target == *key))
            .map(|n| &n.key)
            .collect()
    }

    pub fn hub_nodes(&self) -> impl Iterator<Item = &DependencyNode> {
        self.nodes.iter().filter(|n| n.is_hub)
    }

    /// Position of `key` in the creation order.
    pub fn creation_index(&self, key: &EntityKey) -> Option<usize> {
        self.creation_order.iter().position(|k| k == key)
    }

    fn insert(&mut self, entity: EntityRef<'_>, is_root: bool, config: &GraphConfig) -> bool {
        let key = entity.key();
        if self.positions.contains_key(&key) {
            return false;
        }
        self.positions.insert(key.clone(), self.nodes.len());
        self.nodes.push(DependencyNode {
            key,
            name: entity.name().to_string(),
            entity_type: entity.entity_type().to_string(),
            is_hub: config.is_hub_type(entity.entity_type()),
            is_root,
            edges: Vec::new(),
            extraction_error: None,
        });
        true
    }
}

/// Build the dependency graph of `roots` over the indexed universe.
///
/// Never fails: unknown roots, malformed entities and cycles become
/// warnings on the returned graph.
pub fn build_graph(
    roots: &[EntityKey],
    index: &SnapshotIndex<'_>,
    config: &GraphConfig,
) -> DependencyGraph {
    let mut graph = DependencyGraph::empty();
    let mut queue: VecDeque<usize> = VecDeque::new();

    for root in roots {
        match index.get(root) {
            Some(entity) => {
                if graph.root_id.is_none() {
                    graph.root_id = Some(root.clone());
                    graph.root_name = Some(entity.name().to_string());
                }
                if graph.insert(entity, true, config) {
                    queue.push_back(graph.nodes.len() - 1);
                }
            }
            None => {
                warn!(root = %root, "root entity not found in snapshot");
                graph.warnings.push(GraphWarning {
                    kind: GraphWarningKind::RootNotFound,
                    entity: root.clone(),
                    message: format!("root {} not found in snapshot", root),
                });
            }
        }
    }

    while let Some(pos) = queue.pop_front() {
        let key = graph.nodes[pos].key.clone();
        let Some(entity) = index.get(&key) else {
            continue;
        };
        let expand = graph.nodes[pos].is_root || !graph.nodes[pos].is_hub;

        match extract::extract_dependencies(entity, index, config) {
            Ok(edges) => {
                debug!(entity = %key, edges = edges.len(), expand, "extracted dependencies");
                if expand {
                    for edge in &edges {
                        if let Some(target) = index.get(&edge.target) {
                            if graph.insert(target, false, config) {
                                queue.push_back(graph.nodes.len() - 1);
                            }
                        }
                    }
                }
                graph.nodes[pos].edges = edges;
            }
            Err(err) => {
                warn!(entity = %key, error = %err, "dependency extraction failed; keeping entity as a leaf");
                graph.nodes[pos].extraction_error = Some(err.to_string());
                graph.warnings.push(GraphWarning {
                    kind: GraphWarningKind::ExtractionFailed,
                    entity: key,
                    message: err.to_string(),
                });
            }
        }
    }

    let (order, cycle_warnings) = creation_order(&graph);
    graph.creation_order = order;
    graph.warnings.extend(cycle_warnings);
    graph
}

/// Stable topological sort over the discovered nodes.
///
/// Edges point from dependent to dependency; a node is emitted once all
/// of its in-graph dependencies have been. Among ready nodes the one
/// discovered first goes first. When no node is ready, the earliest
/// discovered node lying on a cycle is emitted anyway and a warning is
/// recorded.
fn creation_order(graph: &DependencyGraph) -> (Vec<EntityKey>, Vec<GraphWarning>) {
    let n = graph.nodes.len();
    let mut deps: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];

    for (i, node) in graph.nodes.iter().enumerate() {
        for edge in &node.edges {
            if let Some(&j) = graph.positions.get(&edge.target) {
                if j != i && deps[i].insert(j) {
                    dependents[j].push(i);
                }
            }
        }
    }

    let mut pending: Vec<usize> = deps.iter().map(BTreeSet::len).collect();
    let mut ready: BTreeSet<usize> = (0..n).filter(|&i| pending[i] == 0).collect();
    let mut emitted = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let mut warnings = Vec::new();

    while order.len() < n {
        let next = match ready.pop_first() {
            Some(i) => i,
            None => {
                let i = cycle_breaker(&deps, &emitted);
                let waiting: Vec<String> = deps[i]
                    .iter()
                    .filter(|&&d| !emitted[d])
                    .map(|&d| graph.nodes[d].key.to_string())
                    .collect();
                let node = &graph.nodes[i];
                warn!(
                    entity = %node.key,
                    waiting = ?waiting,
                    "dependency cycle; creating entity before its dependencies"
                );
                warnings.push(GraphWarning {
                    kind: GraphWarningKind::CycleBroken,
                    entity: node.key.clone(),
                    message: format!(
                        "dependency cycle: {} '{}' is created before {}",
                        node.key,
                        node.name,
                        waiting.join(", ")
                    ),
                });
                i
            }
        };

        emitted[next] = true;
        order.push(graph.nodes[next].key.clone());
        for &d in &dependents[next] {
            if emitted[d] {
                continue;
            }
            pending[d] -= 1;
            if pending[d] == 0 {
                ready.insert(d);
            }
        }
    }

    (order, warnings)
}

/// The earliest-discovered pending node that can reach itself through
/// pending dependencies.
fn cycle_breaker(deps: &[BTreeSet<usize>], emitted: &[bool]) -> usize {
    let pending: Vec<usize> = (0..deps.len()).filter(|&i| !emitted[i]).collect();
    pending
        .iter()
        .copied()
        .find(|&start| on_cycle(start, deps, emitted))
        .or_else(|| pending.first().copied())
        .unwrap_or(0)
}

fn on_cycle(start: usize, deps: &[BTreeSet<usize>], emitted: &[bool]) -> bool {
    let mut visited = vec![false; deps.len()];
    let mut stack: Vec<usize> = deps[start].iter().copied().filter(|&d| !emitted[d]).collect();
    while let Some(node) = stack.pop() {
        if node == start {
            return true;
        }
        if visited[node] {
            continue;
        }
        visited[node] = true;
        stack.extend(deps[node].iter().copied().filter(|&d| !emitted[d]));
    }
    false
}
