//! Form-id relationship mining over parsed plugins.
//!
//! Every record with a form id becomes a graph entity owned by its plugin.
//! References become `references` edges, declared dependencies and the
//! parent cell of placed references become `depends_on` edges.

use crate::engines::graph::{
    DependencyGraph, DependencyGraphEngine, EdgeType, GraphConflict, GraphEntity, Link,
};
use crate::models::{EspFile, EspRecord, FormId, ModId, format_form_id};
use serde::{Deserialize, Serialize};

const REFERENCE_WEIGHT: f64 = 0.9;
const DEPENDENCY_WEIGHT: f64 = 1.0;

/// One record as a graph entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentEntity {
    pub form_id: FormId,
    pub owner: ModId,
    pub signature: String,
    pub references: Vec<FormId>,
    pub dependencies: Vec<FormId>,
    pub parent_cell: Option<FormId>,
}

impl ContentEntity {
    fn from_record(record: &EspRecord, owner: &str) -> Option<Self> {
        Some(Self {
            form_id: record.form_id()?,
            owner: owner.to_string(),
            signature: record.signature().to_string(),
            references: record.references().to_vec(),
            dependencies: record.dependencies().to_vec(),
            parent_cell: record.parent_cell(),
        })
    }
}

impl GraphEntity for ContentEntity {
    type Key = FormId;

    fn key(&self) -> &FormId {
        &self.form_id
    }

    fn owner(&self) -> &str {
        &self.owner
    }

    fn kind(&self) -> &str {
        &self.signature
    }

    fn links(&self) -> Vec<Link<FormId>> {
        let references = self
            .references
            .iter()
            .map(|target| Link::new(*target, EdgeType::References, REFERENCE_WEIGHT));
        let dependencies = self
            .dependencies
            .iter()
            .chain(self.parent_cell.iter())
            .map(|target| Link::new(*target, EdgeType::DependsOn, DEPENDENCY_WEIGHT));
        references.chain(dependencies).collect()
    }

    fn label(key: &FormId) -> String {
        format!("FormID {}", format_form_id(*key))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentAnalysis {
    pub graph: DependencyGraph<FormId>,
    pub conflicts: Vec<GraphConflict<FormId>>,
    /// Records dropped for lacking a form id
    pub skipped_records: usize,
}

impl Default for ContentAnalysis {
    fn default() -> Self {
        Self {
            graph: DependencyGraph::default(),
            conflicts: Vec::new(),
            skipped_records: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ContentRelationshipMiner {
    graph: DependencyGraphEngine,
}

impl ContentRelationshipMiner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn analyze(&self, plugins: &[EspFile]) -> ContentAnalysis {
        let (entities, skipped_records) = entities(plugins);
        let graph = self.graph.build_graph(&entities);
        let conflicts = self.graph.find_conflicts(&entities);

        tracing::info!(
            plugins = plugins.len(),
            records = entities.len(),
            skipped = skipped_records,
            conflicts = conflicts.len(),
            cycles = graph.cycles.len(),
            "Content relationships mined"
        );

        ContentAnalysis {
            graph,
            conflicts,
            skipped_records,
        }
    }
}

/// Graph entities for every record with a form id, plus the count of records skipped
pub fn entities(plugins: &[EspFile]) -> (Vec<ContentEntity>, usize) {
    let mut entities = Vec::new();
    let mut skipped = 0;

    for plugin in plugins {
        for record in &plugin.records {
            match ContentEntity::from_record(record, &plugin.file_name) {
                Some(entity) => entities.push(entity),
                None => {
                    tracing::warn!(
                        plugin = %plugin.file_name,
                        signature = record.signature(),
                        "Skipping record without a form id"
                    );
                    skipped += 1;
                }
            }
        }
    }

    (entities, skipped)
}
