//! Generic dependency graph shared by the content and quest miners.
//!
//! Both miners describe their entities through [`GraphEntity`]: an identity
//! key, an owning mod, a kind and a list of outgoing links. The engine turns
//! any such entity set into nodes and edges, finds cycles with an
//! explicit-stack depth-first search and flags duplicate-ownership and
//! missing-reference conflicts.

use crate::models::{ModId, Severity};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    References,
    DependsOn,
    ConflictsWith,
    Requires,
    Enables,
}

impl EdgeType {
    /// Conflict edges mark a relationship, not a direction of dependency
    pub fn is_dependency(&self) -> bool {
        !matches!(self, EdgeType::ConflictsWith)
    }
}

/// Outgoing link declared by an entity
#[derive(Debug, Clone, PartialEq)]
pub struct Link<K> {
    pub target: K,
    pub edge_type: EdgeType,
    pub weight: f64,
}

impl<K> Link<K> {
    pub fn new(target: K, edge_type: EdgeType, weight: f64) -> Self {
        Self {
            target,
            edge_type,
            weight,
        }
    }
}

/// Anything the graph engine can place as a node
pub trait GraphEntity {
    type Key: Clone + Eq + Hash + Debug;

    fn key(&self) -> &Self::Key;
    fn owner(&self) -> &str;
    fn kind(&self) -> &str;
    fn links(&self) -> Vec<Link<Self::Key>>;
    /// Human-readable rendering of a key for descriptions
    fn label(key: &Self::Key) -> String;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode<K> {
    pub id: K,
    pub owner: ModId,
    pub kind: String,
    pub link_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge<K> {
    pub source: K,
    pub target: K,
    pub edge_type: EdgeType,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphCycle<K> {
    /// Closed walk: each node links to the next and the last links back to the first
    pub nodes: Vec<K>,
    pub description: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyGraph<K> {
    pub nodes: Vec<GraphNode<K>>,
    pub edges: Vec<GraphEdge<K>>,
    pub cycles: Vec<GraphCycle<K>>,
    pub isolated_nodes: Vec<K>,
}

impl<K> Default for DependencyGraph<K> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            cycles: Vec::new(),
            isolated_nodes: Vec::new(),
        }
    }
}

impl<K: Eq> DependencyGraph<K> {
    pub fn has_edge(&self, source: &K, target: &K) -> bool {
        self.edges
            .iter()
            .any(|edge| &edge.source == source && &edge.target == target)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphConflictType {
    Duplicate,
    MissingReference,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphConflict<K> {
    pub conflict_type: GraphConflictType,
    pub severity: Severity,
    pub key: K,
    pub mods: Vec<ModId>,
    pub description: String,
    pub resolution: String,
}

/// Edge weight used when a conflict is drawn into a graph
pub fn severity_weight(severity: Severity) -> f64 {
    match severity {
        Severity::Critical | Severity::High => 1.0,
        Severity::Medium => 0.7,
        Severity::Low => 0.4,
    }
}

/// Stateless graph builder
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyGraphEngine;

impl DependencyGraphEngine {
    pub fn build_graph<E: GraphEntity>(&self, entities: &[E]) -> DependencyGraph<E::Key> {
        self.build_graph_with(entities, Vec::new())
    }

    /// Build a graph with extra edges (usually conflict edges) appended after the entity links
    pub fn build_graph_with<E: GraphEntity>(
        &self,
        entities: &[E],
        extra_edges: Vec<GraphEdge<E::Key>>,
    ) -> DependencyGraph<E::Key> {
        let mut nodes = Vec::with_capacity(entities.len());
        let mut edges = Vec::new();

        for entity in entities {
            let links = entity.links();
            nodes.push(GraphNode {
                id: entity.key().clone(),
                owner: entity.owner().to_string(),
                kind: entity.kind().to_string(),
                link_count: links.len(),
            });
            edges.extend(links.into_iter().map(|link| GraphEdge {
                source: entity.key().clone(),
                target: link.target,
                edge_type: link.edge_type,
                weight: link.weight,
            }));
        }
        edges.extend(extra_edges);

        let cycles = detect_cycles(&edges)
            .into_iter()
            .map(|cycle| GraphCycle {
                description: format!(
                    "Dependency cycle detected: {}",
                    cycle.iter().map(E::label).collect::<Vec<_>>().join(" -> ")
                ),
                severity: Severity::High,
                nodes: cycle,
            })
            .collect::<Vec<_>>();

        let connected: HashSet<&E::Key> = edges
            .iter()
            .flat_map(|edge| [&edge.source, &edge.target])
            .collect();
        let isolated_nodes = nodes
            .iter()
            .filter(|node| !connected.contains(&node.id))
            .map(|node| node.id.clone())
            .collect();

        if !cycles.is_empty() {
            tracing::warn!(cycles = cycles.len(), "Dependency cycles found");
        }
        tracing::debug!(
            nodes = nodes.len(),
            edges = edges.len(),
            "Dependency graph built"
        );

        DependencyGraph {
            nodes,
            edges,
            cycles,
            isolated_nodes,
        }
    }

    /// Duplicate ownership and dangling links
    pub fn find_conflicts<E: GraphEntity>(&self, entities: &[E]) -> Vec<GraphConflict<E::Key>> {
        let mut conflicts = Vec::new();

        let mut owners: IndexMap<&E::Key, IndexSet<&str>> = IndexMap::new();
        for entity in entities {
            owners.entry(entity.key()).or_default().insert(entity.owner());
        }

        for (key, mods) in &owners {
            if mods.len() > 1 {
                let mods: Vec<ModId> = mods.iter().map(|m| m.to_string()).collect();
                conflicts.push(GraphConflict {
                    conflict_type: GraphConflictType::Duplicate,
                    severity: Severity::High,
                    key: (*key).clone(),
                    description: format!(
                        "{} is defined in multiple mods: {}",
                        E::label(key),
                        mods.join(", ")
                    ),
                    resolution: "One mod should override the other or use a patch".to_string(),
                    mods,
                });
            }
        }

        for entity in entities {
            for link in entity.links() {
                if !link.edge_type.is_dependency() || owners.contains_key(&link.target) {
                    continue;
                }
                conflicts.push(GraphConflict {
                    conflict_type: GraphConflictType::MissingReference,
                    severity: Severity::Medium,
                    description: format!(
                        "{} referenced by {} in {} does not exist",
                        E::label(&link.target),
                        E::label(entity.key()),
                        entity.owner()
                    ),
                    resolution: "Ensure the referenced mod is installed or create a patch"
                        .to_string(),
                    key: link.target,
                    mods: vec![entity.owner().to_string()],
                });
            }
        }

        conflicts
    }
}

/// Every cycle closed by a back edge, as the node path from the back edge's target
///
/// Conflict edges are ignored. Search roots are edge sources in edge order,
/// so the result is deterministic for a given edge list. Uses an explicit
/// frame stack, so depth is bounded by heap rather than the call stack.
pub fn detect_cycles<K>(edges: &[GraphEdge<K>]) -> Vec<Vec<K>>
where
    K: Clone + Eq + Hash,
{
    let mut adjacency: IndexMap<&K, IndexSet<&K>> = IndexMap::new();
    for edge in edges.iter().filter(|e| e.edge_type.is_dependency()) {
        adjacency.entry(&edge.source).or_default().insert(&edge.target);
    }

    let mut cycles = Vec::new();
    let mut visited: HashSet<&K> = HashSet::new();
    // Position of each node currently on the DFS path
    let mut on_path: HashMap<&K, usize> = HashMap::new();
    // (node, index of the next neighbour to explore)
    let mut frames: Vec<(&K, usize)> = Vec::new();

    let roots: Vec<&K> = adjacency.keys().copied().collect();
    for root in roots {
        if !visited.insert(root) {
            continue;
        }
        on_path.insert(root, 0);
        frames.push((root, 0));

        while let Some(frame) = frames.last_mut() {
            let next = adjacency
                .get(frame.0)
                .and_then(|targets| targets.get_index(frame.1))
                .copied();
            frame.1 += 1;

            match next {
                Some(target) => {
                    if let Some(&start) = on_path.get(target) {
                        let cycle = frames[start..].iter().map(|(node, _)| (*node).clone());
                        cycles.push(cycle.collect());
                    } else if visited.insert(target) {
                        on_path.insert(target, frames.len());
                        frames.push((target, 0));
                    }
                }
                None => {
                    if let Some((done, _)) = frames.pop() {
                        on_path.remove(done);
                    }
                }
            }
        }
    }

    cycles
}
