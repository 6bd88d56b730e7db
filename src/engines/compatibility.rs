//! Compatibility matrix mining.
//!
//! The matrix is derived from an append-only log of [`CompatibilityData`]
//! evidence records. A full [`build`](CompatibilityMiningEngine::build)
//! scores every unordered pair once and mirrors it, so `score(a, b)` and
//! `score(b, a)` are the same value. Pairs without evidence fall back to
//! category heuristics read off the mod names.
//!
//! Nothing in a build depends on the wall clock: `last_updated` is the
//! newest evidence timestamp, so rebuilding from the same log yields an
//! identical matrix.

use crate::engines::keywords::{self, ModCategory};
use crate::error::Result;
use crate::models::{CompatibilityData, ModId};
use crate::state::{SharedState, StateChange};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Records needed for full confidence in a pair score
const FULL_CONFIDENCE_RECORDS: f64 = 5.0;

const CLUSTER_MIN_SCORE: f64 = 0.7;
const CLUSTER_MIN_CONFIDENCE: f64 = 0.5;
const CLUSTER_RECOMMENDED: f64 = 0.8;

/// Category pairs whose compatible share is below this get a warn rule
const LOW_CATEGORY_COMPATIBILITY: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompatibilityEvidenceKind {
    UserReport,
    PatternAnalysis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityEvidence {
    pub kind: CompatibilityEvidenceKind,
    pub source: String,
    pub description: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityScore {
    /// -1 (incompatible) to 1 (compatible)
    pub score: f64,
    pub confidence: f64,
    pub evidence: Vec<CompatibilityEvidence>,
    pub tested_versions: Vec<String>,
    /// Newest evidence timestamp, 0 for heuristic scores
    pub last_tested: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityCluster {
    pub id: String,
    pub mods: Vec<ModId>,
    /// Mean pairwise score inside the cluster
    pub compatibility: f64,
    pub description: String,
    pub recommended: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Warn,
    Block,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityRule {
    pub id: String,
    pub condition: String,
    pub action: RuleAction,
    pub description: String,
    pub confidence: f64,
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityMatrix {
    /// Row per mod in first-seen order; the diagonal is absent
    pub matrix: IndexMap<ModId, IndexMap<ModId, CompatibilityScore>>,
    pub clusters: Vec<CompatibilityCluster>,
    pub rules: Vec<CompatibilityRule>,
    pub last_updated: u64,
    pub data_points: usize,
}

impl CompatibilityMatrix {
    pub fn get(&self, mod_a: &str, mod_b: &str) -> Option<&CompatibilityScore> {
        self.matrix.get(mod_a).and_then(|row| row.get(mod_b))
    }

    pub fn mods(&self) -> impl Iterator<Item = &ModId> {
        self.matrix.keys()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    fn set_pair(&mut self, mod_a: &str, mod_b: &str, score: CompatibilityScore) {
        self.matrix
            .entry(mod_a.to_string())
            .or_default()
            .insert(mod_b.to_string(), score.clone());
        self.matrix
            .entry(mod_b.to_string())
            .or_default()
            .insert(mod_a.to_string(), score);
    }
}

#[derive(Debug, Clone, Default)]
struct MiningState {
    log: Vec<CompatibilityData>,
    matrix: CompatibilityMatrix,
}

/// Builds and maintains the compatibility matrix
pub struct CompatibilityMiningEngine {
    state: SharedState<MiningState>,
}

impl CompatibilityMiningEngine {
    pub fn new() -> Self {
        Self {
            state: SharedState::default(),
        }
    }

    /// Report matrix changes on a shared event channel
    pub fn with_events(events: broadcast::Sender<StateChange>) -> Self {
        Self {
            state: SharedState::with_events(MiningState::default(), events),
        }
    }

    /// Rebuild the whole matrix from `log`, replacing any previous log
    pub fn build(&self, log: Vec<CompatibilityData>) -> CompatibilityMatrix {
        let matrix = build_matrix(&log);
        let change = StateChange::MatrixRebuilt {
            mods: matrix.matrix.len(),
            data_points: matrix.data_points,
        };
        tracing::info!(
            mods = matrix.matrix.len(),
            data_points = matrix.data_points,
            clusters = matrix.clusters.len(),
            "Compatibility matrix rebuilt"
        );
        self.state.replace(
            MiningState {
                log,
                matrix: matrix.clone(),
            },
            vec![change],
        );
        matrix
    }

    /// Score for a pair; computed on the fly when the pair is not in the matrix
    pub fn query(&self, mod_a: &str, mod_b: &str) -> CompatibilityScore {
        let state = self.state.snapshot();
        match state.matrix.get(mod_a, mod_b) {
            Some(score) => score.clone(),
            None => score_pair(&state.log, mod_a, mod_b),
        }
    }

    /// Append one record and recompute only the pair it concerns
    ///
    /// A mod seen for the first time gets a full row of heuristic scores
    /// against the existing mods so the matrix stays square and symmetric.
    pub fn update(&self, record: CompatibilityData) {
        let mod_a = record.mod_a.clone();
        let mod_b = record.mod_b.clone();

        self.state.update(|state| {
            state.matrix.last_updated = state.matrix.last_updated.max(record.timestamp);
            state.log.push(record);

            for name in [&mod_a, &mod_b] {
                if !state.matrix.matrix.contains_key(name.as_str()) {
                    let existing: Vec<ModId> = state.matrix.mods().cloned().collect();
                    state.matrix.matrix.insert(name.clone(), IndexMap::new());
                    for other in existing {
                        let score = score_pair(&state.log, name, &other);
                        state.matrix.set_pair(name, &other, score);
                    }
                }
            }
            if mod_a != mod_b {
                let score = score_pair(&state.log, &mod_a, &mod_b);
                state.matrix.set_pair(&mod_a, &mod_b, score);
            }

            state.matrix.data_points = state.log.len();
            state.matrix.clusters = identify_clusters(&state.matrix);
            state.matrix.rules = extract_rules(&state.log);

            vec![StateChange::MatrixUpdated {
                mod_a: mod_a.clone(),
                mod_b: mod_b.clone(),
            }]
        });
        tracing::debug!(%mod_a, %mod_b, "Compatibility pair updated");
    }

    /// Current matrix
    pub fn matrix(&self) -> CompatibilityMatrix {
        self.state.read(|state| state.matrix.clone())
    }

    /// Evidence records the matrix was derived from
    pub fn evidence_log(&self) -> Vec<CompatibilityData> {
        self.state.read(|state| state.log.clone())
    }
}

impl Default for CompatibilityMiningEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn build_matrix(log: &[CompatibilityData]) -> CompatibilityMatrix {
    let mods: IndexSet<&str> = log
        .iter()
        .flat_map(|record| [record.mod_a.as_str(), record.mod_b.as_str()])
        .collect();

    let mut matrix = CompatibilityMatrix {
        matrix: mods
            .iter()
            .map(|name| (name.to_string(), IndexMap::new()))
            .collect(),
        clusters: Vec::new(),
        rules: Vec::new(),
        last_updated: log.iter().map(|record| record.timestamp).max().unwrap_or(0),
        data_points: log.len(),
    };

    let mods: Vec<&str> = mods.into_iter().collect();
    for (i, mod_a) in mods.iter().enumerate() {
        for mod_b in &mods[i + 1..] {
            matrix.set_pair(mod_a, mod_b, score_pair(log, mod_a, mod_b));
        }
    }

    matrix.clusters = identify_clusters(&matrix);
    matrix.rules = extract_rules(log);
    matrix
}

/// Evidence-weighted score for one unordered pair
fn score_pair(log: &[CompatibilityData], mod_a: &str, mod_b: &str) -> CompatibilityScore {
    let relevant: Vec<&CompatibilityData> = log
        .iter()
        .filter(|record| record.concerns(mod_a, mod_b))
        .collect();
    let Some(first) = relevant.first() else {
        return default_score(mod_a, mod_b);
    };

    let mut weighted_score = 0.0;
    let mut total_weight = 0.0;
    for record in &relevant {
        let evidence = evidence_for(record, log);
        let weight = evidence.iter().map(|e| e.weight).sum::<f64>() / evidence.len() as f64;
        let direction = if record.compatible { 1.0 } else { -1.0 };
        weighted_score += direction * weight;
        total_weight += weight;
    }

    let score = if total_weight > 0.0 {
        (weighted_score / total_weight).clamp(-1.0, 1.0)
    } else {
        0.0
    };

    CompatibilityScore {
        score,
        confidence: (relevant.len() as f64 / FULL_CONFIDENCE_RECORDS).min(1.0),
        evidence: evidence_for(first, log),
        tested_versions: relevant
            .iter()
            .map(|record| format!("{}-{}", record.versions.mod_a, record.versions.mod_b))
            .collect(),
        last_tested: relevant.iter().map(|record| record.timestamp).max().unwrap_or(0),
    }
}

/// Heuristic score for a pair nobody has reported on
pub fn default_score(mod_a: &str, mod_b: &str) -> CompatibilityScore {
    let category_a = keywords::categorize(mod_a);
    let category_b = keywords::categorize(mod_b);

    let (score, confidence) = if keywords::is_enb(mod_a) && keywords::is_enb(mod_b) {
        (-0.8, 0.8)
    } else if category_a == ModCategory::Utility || category_b == ModCategory::Utility {
        (0.8, 0.4)
    } else if category_a == category_b && category_a != ModCategory::Other {
        // Same kind of content usually means the same records get edited
        (0.2, 0.3)
    } else {
        (0.5, 0.1)
    };

    CompatibilityScore {
        score,
        confidence,
        evidence: vec![CompatibilityEvidence {
            kind: CompatibilityEvidenceKind::PatternAnalysis,
            source: "default".to_string(),
            description: format!(
                "Default compatibility based on mod categories: {} + {}",
                category_a, category_b
            ),
            weight: confidence,
        }],
        tested_versions: Vec::new(),
        last_tested: 0,
    }
}

fn evidence_for(
    record: &CompatibilityData,
    log: &[CompatibilityData],
) -> Vec<CompatibilityEvidence> {
    let mut evidence = vec![CompatibilityEvidence {
        kind: CompatibilityEvidenceKind::UserReport,
        source: record.tested_by.clone(),
        description: format!(
            "{} and {} reported as {}",
            record.mod_a,
            record.mod_b,
            if record.compatible {
                "compatible"
            } else {
                "incompatible"
            }
        ),
        weight: 0.7,
    }];

    if !record.issues.is_empty() {
        evidence.push(CompatibilityEvidence {
            kind: CompatibilityEvidenceKind::UserReport,
            source: record.tested_by.clone(),
            description: format!("Issues reported: {}", record.issues.join(", ")),
            weight: 0.8,
        });
    }

    let similar = log
        .iter()
        .filter(|other| is_similar_record(other, record))
        .count();
    if similar > 0 {
        evidence.push(CompatibilityEvidence {
            kind: CompatibilityEvidenceKind::PatternAnalysis,
            source: "historical".to_string(),
            description: format!("Found {} similar compatibility patterns", similar),
            weight: (similar as f64 * 0.1).min(0.5),
        });
    }

    evidence
}

fn is_similar_record(candidate: &CompatibilityData, record: &CompatibilityData) -> bool {
    let same_category = |a: &str, b: &str| keywords::categorize(a) == keywords::categorize(b);
    let category_match = same_category(&candidate.mod_a, &record.mod_a)
        && same_category(&candidate.mod_b, &record.mod_b);
    let name_match = keywords::word_similarity(&candidate.mod_a, &record.mod_a) > 0.5
        && keywords::word_similarity(&candidate.mod_b, &record.mod_b) > 0.5;
    category_match || name_match
}

/// Greedy single pass: each unclustered mod pulls in its strong partners
fn identify_clusters(matrix: &CompatibilityMatrix) -> Vec<CompatibilityCluster> {
    let mut clusters = Vec::new();
    let mut processed: IndexSet<&str> = IndexSet::new();

    for (mod_a, row) in &matrix.matrix {
        if !processed.insert(mod_a.as_str()) {
            continue;
        }
        let mut members = vec![mod_a.clone()];
        for (mod_b, score) in row {
            if !processed.contains(mod_b.as_str())
                && score.score > CLUSTER_MIN_SCORE
                && score.confidence > CLUSTER_MIN_CONFIDENCE
            {
                processed.insert(mod_b.as_str());
                members.push(mod_b.clone());
            }
        }

        if members.len() > 1 {
            let compatibility = cluster_compatibility(matrix, &members);
            clusters.push(CompatibilityCluster {
                id: format!("cluster-{}", clusters.len() + 1),
                description: format!("Compatible mod cluster with {} mods", members.len()),
                mods: members,
                compatibility,
                recommended: compatibility > CLUSTER_RECOMMENDED,
            });
        }
    }

    clusters
}

fn cluster_compatibility(matrix: &CompatibilityMatrix, members: &[ModId]) -> f64 {
    let mut total = 0.0;
    let mut pairs = 0;
    for (i, mod_a) in members.iter().enumerate() {
        for mod_b in &members[i + 1..] {
            if let Some(score) = matrix.get(mod_a, mod_b) {
                total += score.score;
                pairs += 1;
            }
        }
    }
    if pairs == 0 { 0.0 } else { total / pairs as f64 }
}

fn category_pair(record: &CompatibilityData) -> (ModCategory, ModCategory) {
    let a = keywords::categorize(&record.mod_a);
    let b = keywords::categorize(&record.mod_b);
    if a <= b { (a, b) } else { (b, a) }
}

fn extract_rules(log: &[CompatibilityData]) -> Vec<CompatibilityRule> {
    let mut tallies: IndexMap<(ModCategory, ModCategory), (usize, usize)> = IndexMap::new();
    for record in log {
        let (compatible, total) = tallies.entry(category_pair(record)).or_default();
        *total += 1;
        if record.compatible {
            *compatible += 1;
        }
    }

    let mut rules = Vec::new();
    for ((category_a, category_b), (compatible, total)) in tallies {
        let share = compatible as f64 / total as f64;
        if share >= LOW_CATEGORY_COMPATIBILITY {
            continue;
        }
        let examples = log
            .iter()
            .filter(|record| category_pair(record) == (category_a, category_b))
            .take(3)
            .map(|record| format!("{} + {}", record.mod_a, record.mod_b))
            .collect();
        rules.push(CompatibilityRule {
            id: format!("rule-{}-{}", category_a, category_b),
            condition: format!(
                "mod.category == \"{}\" && other.category == \"{}\"",
                category_a, category_b
            ),
            action: RuleAction::Warn,
            description: format!(
                "{} and {} mods have low compatibility ({:.0}%)",
                category_a,
                category_b,
                share * 100.0
            ),
            confidence: 0.7,
            examples,
        });
    }

    rules.extend(known_rules());
    rules
}

fn known_rules() -> Vec<CompatibilityRule> {
    let examples =
        |items: &[&str]| -> Vec<String> { items.iter().map(|s| s.to_string()).collect() };
    vec![
        CompatibilityRule {
            id: "enb-conflict".to_string(),
            condition: "mod.name.contains(\"ENB\") && other.name.contains(\"ENB\")".to_string(),
            action: RuleAction::Block,
            description: "Multiple ENB presets cannot be used together".to_string(),
            confidence: 1.0,
            examples: examples(&["ENB Series + Natural Lighting", "ENB Series + Rudy ENB"]),
        },
        CompatibilityRule {
            id: "skse-requirement".to_string(),
            condition: "mod.requires(\"SKSE\") && !other.provides(\"SKSE\")".to_string(),
            action: RuleAction::Warn,
            description: "SKSE plugins require SKSE to be installed".to_string(),
            confidence: 0.9,
            examples: examples(&["SSE Engine Fixes + SKSE", "SkyUI + SKSE"]),
        },
        CompatibilityRule {
            id: "texture-compatibility".to_string(),
            condition: "mod.category == \"texture\" && other.category == \"texture\"".to_string(),
            action: RuleAction::Warn,
            description: "Multiple texture mods may cause conflicts or performance issues"
                .to_string(),
            confidence: 0.6,
            examples: examples(&[
                "4K Textures + HD Textures",
                "Realistic Lighting + Enhanced Lighting",
            ]),
        },
    ]
}
