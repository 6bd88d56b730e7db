//! Quest dependency mining.
//!
//! Quests are graph entities keyed by form id. A required prerequisite is a
//! `requires` edge, an optional one an `enables` edge, both pointing from
//! the dependent quest to its prerequisite. On top of the shared graph
//! checks the miner flags quests edited by several plugins, rewards handed
//! out by more than one objective and prerequisite cycles, and lists
//! completion paths.

use crate::engines::graph::{
    self, DependencyGraph, DependencyGraphEngine, EdgeType, GraphConflict, GraphConflictType,
    GraphEdge, GraphEntity, Link,
};
use crate::models::{
    EspFile, EspRecord, FormId, ModId, QuestObjective, QuestPrerequisite, Severity, format_form_id,
};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

const REQUIRED_WEIGHT: f64 = 1.0;
const OPTIONAL_WEIGHT: f64 = 0.5;

const MAX_COMPLETION_PATHS: usize = 10;
const MINUTES_PER_OBJECTIVE: u32 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestEntity {
    pub form_id: FormId,
    pub name: String,
    pub owner: ModId,
    pub objectives: Vec<QuestObjective>,
    pub prerequisites: Vec<QuestPrerequisite>,
}

impl GraphEntity for QuestEntity {
    type Key = FormId;

    fn key(&self) -> &FormId {
        &self.form_id
    }

    fn owner(&self) -> &str {
        &self.owner
    }

    fn kind(&self) -> &str {
        "QUST"
    }

    fn links(&self) -> Vec<Link<FormId>> {
        self.prerequisites
            .iter()
            .map(|prerequisite| {
                if prerequisite.required {
                    Link::new(prerequisite.quest_id, EdgeType::Requires, REQUIRED_WEIGHT)
                } else {
                    Link::new(prerequisite.quest_id, EdgeType::Enables, OPTIONAL_WEIGHT)
                }
            })
            .collect()
    }

    fn label(key: &FormId) -> String {
        format!("Quest {}", format_form_id(*key))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestConflictType {
    /// Same quest edited by several plugins
    Objective,
    Reward,
    /// Prerequisite cycle that blocks completion
    Completion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestConflict {
    pub conflict_type: QuestConflictType,
    pub severity: Severity,
    pub quests: Vec<FormId>,
    pub description: String,
    pub resolution: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestCycle {
    pub quests: Vec<FormId>,
    pub description: String,
    /// At least one optional link in the cycle can be dropped
    pub breakable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestDifficulty {
    Easy,
    Medium,
    Hard,
}

impl QuestDifficulty {
    pub fn for_objectives(total: usize) -> Self {
        if total > 20 {
            QuestDifficulty::Hard
        } else if total > 10 {
            QuestDifficulty::Medium
        } else {
            QuestDifficulty::Easy
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionPath {
    /// Root quest first, then the quests that require it, depth first
    pub quests: Vec<FormId>,
    pub total_objectives: usize,
    pub estimated_minutes: u32,
    pub difficulty: QuestDifficulty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestAnalysis {
    pub graph: DependencyGraph<FormId>,
    pub conflicts: Vec<QuestConflict>,
    /// Duplicate form ids and prerequisites pointing at unknown quests
    pub structural_conflicts: Vec<GraphConflict<FormId>>,
    pub cycles: Vec<QuestCycle>,
    pub completion_paths: Vec<CompletionPath>,
    pub skipped_records: usize,
}

impl Default for QuestAnalysis {
    fn default() -> Self {
        Self {
            graph: DependencyGraph::default(),
            conflicts: Vec::new(),
            structural_conflicts: Vec::new(),
            cycles: Vec::new(),
            completion_paths: Vec::new(),
            skipped_records: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QuestDependencyMiner {
    graph: DependencyGraphEngine,
}

impl QuestDependencyMiner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn analyze(&self, plugins: &[EspFile]) -> QuestAnalysis {
        let (quests, skipped_records) = entities(plugins);

        let structural_conflicts = self.graph.find_conflicts(&quests);
        let duplicates: IndexSet<FormId> = structural_conflicts
            .iter()
            .filter(|c| c.conflict_type == GraphConflictType::Duplicate)
            .map(|c| c.key)
            .collect();

        // A quest redefined under one form id is already a duplicate
        let mut conflicts: Vec<QuestConflict> = objective_conflicts(&quests)
            .into_iter()
            .filter(|c| !c.quests.iter().all(|id| duplicates.contains(id)))
            .collect();
        conflicts.extend(reward_conflicts(&quests));

        let conflict_edges = conflict_edges(&conflicts);
        let graph = self.graph.build_graph_with(&quests, conflict_edges);

        let cycles: Vec<QuestCycle> = graph
            .cycles
            .iter()
            .map(|cycle| QuestCycle {
                quests: cycle.nodes.clone(),
                description: format!(
                    "Quest dependency cycle: {}",
                    cycle
                        .nodes
                        .iter()
                        .map(|id| format_form_id(*id))
                        .collect::<Vec<_>>()
                        .join(" -> ")
                ),
                breakable: is_breakable(&cycle.nodes, &graph.edges),
            })
            .collect();

        conflicts.extend(cycles.iter().map(|cycle| QuestConflict {
            conflict_type: QuestConflictType::Completion,
            severity: Severity::High,
            quests: cycle.quests.clone(),
            description: format!("Circular dependency detected: {}", cycle.description),
            resolution: "Break the circular dependency or use patches".to_string(),
        }));

        let completion_paths = completion_paths(&quests, &graph.edges);

        tracing::info!(
            quests = quests.len(),
            conflicts = conflicts.len(),
            cycles = cycles.len(),
            paths = completion_paths.len(),
            "Quest dependencies mined"
        );

        QuestAnalysis {
            graph,
            conflicts,
            structural_conflicts,
            cycles,
            completion_paths,
            skipped_records,
        }
    }
}

/// Quest entities from every plugin, plus the count of quests without a form id
pub fn entities(plugins: &[EspFile]) -> (Vec<QuestEntity>, usize) {
    let mut quests = Vec::new();
    let mut skipped = 0;

    for plugin in plugins {
        for record in &plugin.records {
            let EspRecord::Quest(quest) = record else {
                continue;
            };
            let Some(form_id) = quest.form_id else {
                tracing::warn!(
                    plugin = %plugin.file_name,
                    quest = %quest.name,
                    "Skipping quest without a form id"
                );
                skipped += 1;
                continue;
            };
            quests.push(QuestEntity {
                form_id,
                name: quest.name.clone(),
                owner: plugin.file_name.clone(),
                objectives: quest.objectives.clone(),
                prerequisites: quest.prerequisites.clone(),
            });
        }
    }

    (quests, skipped)
}

/// Quests sharing a name across more than one plugin
fn objective_conflicts(quests: &[QuestEntity]) -> Vec<QuestConflict> {
    let mut by_name: IndexMap<String, Vec<&QuestEntity>> = IndexMap::new();
    for quest in quests {
        by_name.entry(quest.name.to_lowercase()).or_default().push(quest);
    }

    by_name
        .into_iter()
        .filter_map(|(name, group)| {
            let owners: IndexSet<&str> = group.iter().map(|q| q.owner.as_str()).collect();
            if owners.len() < 2 {
                return None;
            }
            let ids: IndexSet<FormId> = group.iter().map(|q| q.form_id).collect();
            Some(QuestConflict {
                conflict_type: QuestConflictType::Objective,
                severity: Severity::Medium,
                quests: ids.into_iter().collect(),
                description: format!(
                    "Quest \"{}\" is modified by multiple mods: {}",
                    name,
                    owners.iter().copied().collect::<Vec<_>>().join(", ")
                ),
                resolution: "Use a compatibility patch or choose one mod version".to_string(),
            })
        })
        .collect()
}

/// The same reward handed out by more than one objective
fn reward_conflicts(quests: &[QuestEntity]) -> Vec<QuestConflict> {
    let mut by_reward: IndexMap<&str, Vec<(FormId, &str)>> = IndexMap::new();
    for quest in quests {
        for objective in &quest.objectives {
            for reward in &objective.rewards {
                by_reward
                    .entry(reward.as_str())
                    .or_default()
                    .push((quest.form_id, objective.id.as_str()));
            }
        }
    }

    by_reward
        .into_iter()
        .filter(|(_, objectives)| objectives.len() > 1)
        .map(|(reward, objectives)| {
            let ids: IndexSet<FormId> = objectives.iter().map(|(id, _)| *id).collect();
            QuestConflict {
                conflict_type: QuestConflictType::Reward,
                severity: Severity::Low,
                quests: ids.into_iter().collect(),
                description: format!("Multiple quests offer similar reward: {}", reward),
                resolution: "Consider adjusting reward values to avoid overlap".to_string(),
            }
        })
        .collect()
}

/// One conflict edge per pair of distinct quests in each conflict
fn conflict_edges(conflicts: &[QuestConflict]) -> Vec<GraphEdge<FormId>> {
    let mut edges = Vec::new();
    for conflict in conflicts {
        let weight = graph::severity_weight(conflict.severity);
        for (i, source) in conflict.quests.iter().enumerate() {
            for target in &conflict.quests[i + 1..] {
                edges.push(GraphEdge {
                    source: *source,
                    target: *target,
                    edge_type: EdgeType::ConflictsWith,
                    weight,
                });
            }
        }
    }
    edges
}

/// Any optional link along the closed walk, closing edge included
fn is_breakable(cycle: &[FormId], edges: &[GraphEdge<FormId>]) -> bool {
    (0..cycle.len()).any(|i| {
        let source = cycle[i];
        let target = cycle[(i + 1) % cycle.len()];
        edges.iter().any(|edge| {
            edge.source == source && edge.target == target && edge.edge_type == EdgeType::Enables
        })
    })
}

/// Chains starting at quests without prerequisites, following required dependents
pub fn completion_paths(
    quests: &[QuestEntity],
    edges: &[GraphEdge<FormId>],
) -> Vec<CompletionPath> {
    let mut objective_counts: IndexMap<FormId, usize> = IndexMap::new();
    for quest in quests {
        objective_counts
            .entry(quest.form_id)
            .or_insert(quest.objectives.len());
    }

    let has_prerequisite: IndexSet<FormId> = edges
        .iter()
        .filter(|edge| matches!(edge.edge_type, EdgeType::Requires | EdgeType::Enables))
        .map(|edge| edge.source)
        .collect();

    let mut dependents: IndexMap<FormId, Vec<FormId>> = IndexMap::new();
    for edge in edges.iter().filter(|e| e.edge_type == EdgeType::Requires) {
        dependents.entry(edge.target).or_default().push(edge.source);
    }

    let mut paths = Vec::new();
    for root in objective_counts.keys().filter(|id| !has_prerequisite.contains(*id)) {
        let mut visited: IndexSet<FormId> = IndexSet::new();
        let mut stack = vec![*root];
        while let Some(quest) = stack.pop() {
            if !visited.insert(quest) {
                continue;
            }
            if let Some(next) = dependents.get(&quest) {
                // Reverse so the first dependent is explored first
                stack.extend(next.iter().rev().filter(|id| !visited.contains(*id)));
            }
        }

        if visited.len() > 1 {
            let total_objectives: usize = visited
                .iter()
                .map(|id| objective_counts.get(id).copied().unwrap_or(0))
                .sum();
            paths.push(CompletionPath {
                quests: visited.into_iter().collect(),
                total_objectives,
                estimated_minutes: total_objectives as u32 * MINUTES_PER_OBJECTIVE,
                difficulty: QuestDifficulty::for_objectives(total_objectives),
            });
        }
        if paths.len() == MAX_COMPLETION_PATHS {
            break;
        }
    }

    paths
}
