//! Recurring-pattern and anomaly detection over session telemetry.
//!
//! # Detectors
//!
//! Four independent detectors promote an observation to a pattern once it has
//! been seen more than [`PATTERN_THRESHOLD`] times:
//!
//! - **conflict**: the same mod reported conflicting in the same record type
//! - **performance**: a mod whose sessions are consistently below 30 fps
//! - **compatibility**: a mod combination that repeatedly ran well (or badly)
//! - **resource**: a mod repeatedly present in sessions above 8 GB of memory
//!
//! Anomalies are z-score outliers (> 2 standard deviations) over the fps and
//! memory series, plus mods that conflict with more than 30% of the load
//! order. Series shorter than three samples are skipped.
//!
//! Confidences in this module are percentages (0-100).

use crate::engines::stats;
use crate::models::{
    AnalysisData, HistoricalData, ModId, PerformanceMetric, SessionOutcome, Severity,
};
use crate::state::{SharedState, StateChange};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio::sync::broadcast;

/// Occurrences required before an observation becomes a pattern
pub const PATTERN_THRESHOLD: usize = 2;

/// |z| above which a sample is anomalous
const ANOMALY_Z: f64 = 2.0;
/// |z| above which an anomaly is high severity
const SEVERE_Z: f64 = 3.0;

const HIGH_MEMORY_MB: f64 = 8000.0;

/// Share of the load order a mod must conflict with to be anomalous
const CONFLICT_RATIO: f64 = 0.3;
const SEVERE_CONFLICT_RATIO: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternType {
    Conflict,
    Performance,
    Compatibility,
    Resource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExampleOutcome {
    Success,
    Failure,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternExample {
    pub mod_combination: Vec<ModId>,
    pub outcome: ExampleOutcome,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<PerformanceMetric>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedPattern {
    pub id: String,
    pub pattern_type: PatternType,
    pub description: String,
    pub affected_mods: Vec<ModId>,
    pub severity: Severity,
    pub frequency: usize,
    pub examples: Vec<PatternExample>,
}

impl DetectedPattern {
    /// True if the pattern mentions either mod
    pub fn involves(&self, mod_a: &str, mod_b: &str) -> bool {
        self.affected_mods
            .iter()
            .any(|name| name == mod_a || name == mod_b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyType {
    Performance,
    Memory,
    Compatibility,
}

impl AnomalyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyType::Performance => "performance",
            AnomalyType::Memory => "memory",
            AnomalyType::Compatibility => "compatibility",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub id: String,
    pub anomaly_type: AnomalyType,
    pub description: String,
    pub affected_mods: Vec<ModId>,
    /// z-score, or the conflict ratio for ratio-threshold anomalies
    pub deviation: f64,
    pub severity: Severity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationAction {
    Avoid,
    Prefer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRecommendation {
    pub action: RecommendationAction,
    pub target_pattern: String,
    pub description: String,
    pub confidence_pct: f64,
    pub alternatives: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternAnalysis {
    pub patterns: Vec<DetectedPattern>,
    pub anomalies: Vec<Anomaly>,
    pub recommendations: Vec<PatternRecommendation>,
    pub confidence_pct: f64,
}

type PatternTable = IndexMap<String, DetectedPattern>;

/// Pattern and anomaly detector with a trainable table of historical patterns
pub struct PatternRecognitionEngine {
    table: SharedState<PatternTable>,
}

impl PatternRecognitionEngine {
    pub fn new() -> Self {
        Self {
            table: SharedState::default(),
        }
    }

    /// Report table changes on a shared event channel
    pub fn with_events(events: broadcast::Sender<StateChange>) -> Self {
        Self {
            table: SharedState::with_events(PatternTable::new(), events),
        }
    }

    pub fn analyze(&self, data: &AnalysisData) -> PatternAnalysis {
        let mut patterns = Vec::new();
        patterns.extend(detect_conflict_patterns(data));
        patterns.extend(detect_performance_patterns(&data.performance_metrics));
        patterns.extend(detect_compatibility_patterns(&data.performance_metrics));
        patterns.extend(detect_resource_patterns(&data.performance_metrics));

        let mut anomalies = Vec::new();
        anomalies.extend(detect_series_anomalies(
            &data.performance_metrics,
            AnomalyType::Performance,
        ));
        anomalies.extend(detect_series_anomalies(
            &data.performance_metrics,
            AnomalyType::Memory,
        ));
        anomalies.extend(detect_conflict_ratio_anomalies(data));

        let recommendations = generate_recommendations(&patterns, &anomalies);
        let confidence_pct = overall_confidence(&patterns, &anomalies);

        tracing::debug!(
            patterns = patterns.len(),
            anomalies = anomalies.len(),
            "Pattern analysis complete"
        );

        PatternAnalysis {
            patterns,
            anomalies,
            recommendations,
            confidence_pct,
        }
    }

    /// Rebuild the pattern table from session history
    ///
    /// Every (outcome, mod set) seen more than [`PATTERN_THRESHOLD`] times
    /// becomes an entry. The previous table is replaced as a whole.
    pub fn train(&self, history: &[HistoricalData]) -> usize {
        let mut frequency: IndexMap<(SessionOutcome, Vec<ModId>), usize> = IndexMap::new();
        for session in history {
            let mut mods = session.mods.clone();
            mods.sort();
            mods.dedup();
            *frequency.entry((session.outcome, mods)).or_default() += 1;
        }

        let table: PatternTable = frequency
            .into_iter()
            .filter(|(_, count)| *count > PATTERN_THRESHOLD)
            .map(|((outcome, mods), count)| {
                let id = format!("{}-{}", outcome.as_str(), mods.join(","));
                let pattern = DetectedPattern {
                    id: id.clone(),
                    pattern_type: PatternType::Compatibility,
                    description: format!("Pattern: {} - {}", mods.join(", "), outcome.as_str()),
                    affected_mods: mods,
                    severity: match outcome {
                        SessionOutcome::Failure => Severity::High,
                        SessionOutcome::Success => Severity::Low,
                    },
                    frequency: count,
                    examples: Vec::new(),
                };
                (id, pattern)
            })
            .collect();

        let patterns = table.len();
        tracing::info!(
            sessions = history.len(),
            patterns,
            "Pattern table trained"
        );
        self.table
            .replace(table, vec![StateChange::PatternsTrained { patterns }]);
        patterns
    }

    /// Current learned patterns, in table order
    pub fn patterns(&self) -> Vec<DetectedPattern> {
        self.table.read(|table| table.values().cloned().collect())
    }

    /// Learned patterns that mention either mod
    pub fn matching_patterns(&self, mod_a: &str, mod_b: &str) -> Vec<DetectedPattern> {
        self.table.read(|table| {
            table
                .values()
                .filter(|pattern| pattern.involves(mod_a, mod_b))
                .cloned()
                .collect()
        })
    }
}

impl Default for PatternRecognitionEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn detect_conflict_patterns(data: &AnalysisData) -> Vec<DetectedPattern> {
    let mut grouped: IndexMap<(&str, &str), Vec<PatternExample>> = IndexMap::new();
    for conflict in &data.conflicts {
        grouped
            .entry((
                conflict.conflicting_mod.as_str(),
                conflict.record_type.as_str(),
            ))
            .or_default()
            .push(PatternExample {
                mod_combination: vec![conflict.conflicting_mod.clone()],
                outcome: ExampleOutcome::Failure,
                description: format!("Conflict in {} records", conflict.record_type),
                metric: None,
            });
    }

    grouped
        .into_iter()
        .filter(|(_, examples)| examples.len() > PATTERN_THRESHOLD)
        .map(|((name, record_type), examples)| {
            let frequency = examples.len();
            DetectedPattern {
                id: format!("conflict-{}-{}", name, record_type),
                pattern_type: PatternType::Conflict,
                description: format!("{} frequently conflicts in {} records", name, record_type),
                affected_mods: vec![name.to_string()],
                severity: if frequency > 5 {
                    Severity::High
                } else {
                    Severity::Medium
                },
                frequency,
                examples,
            }
        })
        .collect()
}

fn detect_performance_patterns(metrics: &[PerformanceMetric]) -> Vec<DetectedPattern> {
    let mut per_mod: IndexMap<&str, Vec<f64>> = IndexMap::new();
    for metric in metrics {
        for name in &metric.mod_combination {
            per_mod.entry(name.as_str()).or_default().push(metric.fps);
        }
    }

    let mut patterns = Vec::new();
    for (name, fps_values) in per_mod {
        if fps_values.len() <= PATTERN_THRESHOLD {
            continue;
        }
        let avg_fps = stats::mean(&fps_values);
        // Low and steady: the mod itself is the cost, not a one-off stutter
        if avg_fps < 30.0 && stats::variance(&fps_values) < 10.0 {
            let sample = metrics
                .iter()
                .find(|metric| metric.mod_combination.contains(name))
                .cloned();
            patterns.push(DetectedPattern {
                id: format!("performance-{}", name),
                pattern_type: PatternType::Performance,
                description: format!(
                    "{} consistently causes low FPS ({:.1} avg)",
                    name, avg_fps
                ),
                affected_mods: vec![name.to_string()],
                severity: if avg_fps < 20.0 {
                    Severity::Critical
                } else {
                    Severity::High
                },
                frequency: fps_values.len(),
                examples: vec![PatternExample {
                    mod_combination: vec![name.to_string()],
                    outcome: ExampleOutcome::Failure,
                    description: format!("Average FPS: {:.1}", avg_fps),
                    metric: sample,
                }],
            });
        }
    }
    patterns
}

fn is_successful(metric: &PerformanceMetric) -> bool {
    metric.fps > 50.0 && metric.stability_score.is_none_or(|stability| stability > 80.0)
}

fn detect_compatibility_patterns(metrics: &[PerformanceMetric]) -> Vec<DetectedPattern> {
    let mut combos: IndexMap<(Vec<ModId>, bool), usize> = IndexMap::new();
    for metric in metrics {
        if metric.mod_combination.is_empty() {
            continue;
        }
        let mods: Vec<ModId> = metric.mod_combination.iter().cloned().collect();
        *combos.entry((mods, is_successful(metric))).or_default() += 1;
    }

    combos
        .into_iter()
        .filter(|(_, count)| *count > PATTERN_THRESHOLD)
        .map(|((mods, success), count)| {
            let key = mods.join(",");
            let (id, description, severity, outcome) = if success {
                (
                    format!("compatibility-{}", key),
                    format!(
                        "Mods {} work well together ({} successful tests)",
                        mods.join(", "),
                        count
                    ),
                    Severity::Low,
                    ExampleOutcome::Success,
                )
            } else {
                (
                    format!("incompatibility-{}", key),
                    format!(
                        "Mods {} repeatedly perform poorly together ({} sessions)",
                        mods.join(", "),
                        count
                    ),
                    Severity::Medium,
                    ExampleOutcome::Failure,
                )
            };
            DetectedPattern {
                id,
                pattern_type: PatternType::Compatibility,
                description,
                examples: vec![PatternExample {
                    mod_combination: mods.clone(),
                    outcome,
                    description: if success {
                        "Successful combination with high performance".to_string()
                    } else {
                        "Combination below 50 FPS or unstable".to_string()
                    },
                    metric: None,
                }],
                affected_mods: mods,
                severity,
                frequency: count,
            }
        })
        .collect()
}

fn detect_resource_patterns(metrics: &[PerformanceMetric]) -> Vec<DetectedPattern> {
    let mut frequency: IndexMap<&str, usize> = IndexMap::new();
    for metric in metrics
        .iter()
        .filter(|metric| metric.memory_usage_mb > HIGH_MEMORY_MB)
    {
        for name in &metric.mod_combination {
            *frequency.entry(name.as_str()).or_default() += 1;
        }
    }

    frequency
        .into_iter()
        .filter(|(_, count)| *count > PATTERN_THRESHOLD)
        .map(|(name, count)| DetectedPattern {
            id: format!("resource-memory-{}", name),
            pattern_type: PatternType::Resource,
            description: format!("{} frequently causes high memory usage", name),
            affected_mods: vec![name.to_string()],
            severity: Severity::Medium,
            frequency: count,
            examples: vec![PatternExample {
                mod_combination: vec![name.to_string()],
                outcome: ExampleOutcome::Warning,
                description: "High memory usage detected".to_string(),
                metric: None,
            }],
        })
        .collect()
}

fn detect_series_anomalies(metrics: &[PerformanceMetric], kind: AnomalyType) -> Vec<Anomaly> {
    if metrics.len() < 3 {
        return Vec::new();
    }
    let values: Vec<f64> = metrics
        .iter()
        .map(|metric| match kind {
            AnomalyType::Memory => metric.memory_usage_mb,
            _ => metric.fps,
        })
        .collect();
    let Some(z_scores) = stats::abs_z_scores(&values) else {
        return Vec::new();
    };

    metrics
        .iter()
        .zip(values.iter().zip(z_scores))
        .filter(|(_, (_, z))| *z > ANOMALY_Z)
        .map(|(metric, (value, z))| {
            let mods: Vec<ModId> = metric.mod_combination.iter().cloned().collect();
            let (prefix, description) = match kind {
                AnomalyType::Memory => (
                    "memory-anomaly",
                    format!("Unusual memory usage ({}MB) for mod combination", value),
                ),
                _ => (
                    "performance-anomaly",
                    format!("Unusual FPS performance ({}) for mod combination", value),
                ),
            };
            Anomaly {
                id: format!("{}-{}-{}", prefix, mods.join("-"), metric.timestamp),
                anomaly_type: kind,
                description,
                affected_mods: mods,
                deviation: z,
                severity: if z > SEVERE_Z {
                    Severity::High
                } else {
                    Severity::Medium
                },
            }
        })
        .collect()
}

fn detect_conflict_ratio_anomalies(data: &AnalysisData) -> Vec<Anomaly> {
    let total_mods = data.mods.iter().collect::<HashSet<_>>().len();
    if total_mods == 0 || data.conflicts.is_empty() {
        return Vec::new();
    }

    let mut counts: IndexMap<&str, usize> = IndexMap::new();
    for conflict in &data.conflicts {
        *counts.entry(conflict.conflicting_mod.as_str()).or_default() += 1;
    }

    // Flags depend only on each mod's own count
    counts
        .into_iter()
        .filter_map(|(name, count)| {
            let ratio = count as f64 / total_mods as f64;
            (ratio > CONFLICT_RATIO).then(|| Anomaly {
                id: format!("compatibility-anomaly-{}", name),
                anomaly_type: AnomalyType::Compatibility,
                description: format!(
                    "{} conflicts with {} other mods ({:.1}%)",
                    name,
                    count,
                    ratio * 100.0
                ),
                affected_mods: vec![name.to_string()],
                deviation: ratio,
                severity: if ratio > SEVERE_CONFLICT_RATIO {
                    Severity::Critical
                } else {
                    Severity::High
                },
            })
        })
        .collect()
}

fn conflict_alternatives(name: &str) -> Vec<String> {
    let alternatives: &[&str] = match name {
        "SKSE" => &["SSE Engine Fixes"],
        "SkyUI" => &["SSE Engine Fixes", "Unofficial Skyrim Special Edition Patch"],
        "Frostfall" => &["Campfire", "Frostfall - Hypothermia Camping Survival"],
        _ => &[],
    };
    alternatives.iter().map(|s| s.to_string()).collect()
}

fn performance_alternatives(name: &str) -> Vec<String> {
    let alternatives: &[&str] = match name {
        "ENB Series" => &["SSE Engine Fixes", "SSE Engine Fixes - ini"],
        "Complex Particle Systems" => &["Particle Patch for ENB"],
        "High Quality Textures" => &["Optimized Vanilla Textures", "Compressed Textures"],
        _ => &[],
    };
    alternatives.iter().map(|s| s.to_string()).collect()
}

fn generate_recommendations(
    patterns: &[DetectedPattern],
    anomalies: &[Anomaly],
) -> Vec<PatternRecommendation> {
    let mut recommendations = Vec::new();
    let first_mod = |pattern: &DetectedPattern| {
        pattern
            .affected_mods
            .first()
            .map(String::as_str)
            .unwrap_or_default()
            .to_string()
    };

    for pattern in patterns {
        let mods = pattern.affected_mods.join(", ");
        let recommendation = match pattern.pattern_type {
            PatternType::Conflict => PatternRecommendation {
                action: RecommendationAction::Avoid,
                target_pattern: pattern.id.clone(),
                description: format!(
                    "Avoid using {} together due to frequent conflicts",
                    mods
                ),
                confidence_pct: (pattern.frequency as f64 * 20.0).min(100.0),
                alternatives: conflict_alternatives(&first_mod(pattern)),
            },
            PatternType::Performance => PatternRecommendation {
                action: RecommendationAction::Avoid,
                target_pattern: pattern.id.clone(),
                description: format!("Consider disabling {} to improve performance", mods),
                confidence_pct: 85.0,
                alternatives: performance_alternatives(&first_mod(pattern)),
            },
            PatternType::Compatibility if pattern.severity == Severity::Low => {
                PatternRecommendation {
                    action: RecommendationAction::Prefer,
                    target_pattern: pattern.id.clone(),
                    description: format!("Recommended combination: {}", mods),
                    confidence_pct: (pattern.frequency as f64 * 15.0).min(100.0),
                    alternatives: Vec::new(),
                }
            }
            PatternType::Compatibility => PatternRecommendation {
                action: RecommendationAction::Avoid,
                target_pattern: pattern.id.clone(),
                description: format!("Avoid running {} together", mods),
                confidence_pct: (pattern.frequency as f64 * 15.0).min(100.0),
                alternatives: Vec::new(),
            },
            PatternType::Resource => continue,
        };
        recommendations.push(recommendation);
    }

    for anomaly in anomalies
        .iter()
        .filter(|anomaly| anomaly.severity >= Severity::High)
    {
        recommendations.push(PatternRecommendation {
            action: RecommendationAction::Avoid,
            target_pattern: anomaly.id.clone(),
            description: format!(
                "Address {} anomaly: {}",
                anomaly.anomaly_type.as_str(),
                anomaly.description
            ),
            confidence_pct: (anomaly.deviation * 25.0).min(100.0),
            alternatives: Vec::new(),
        });
    }

    recommendations
}

fn overall_confidence(patterns: &[DetectedPattern], anomalies: &[Anomaly]) -> f64 {
    if patterns.is_empty() && anomalies.is_empty() {
        return 0.0;
    }
    let pattern_confidence = if patterns.is_empty() {
        0.0
    } else {
        patterns.iter().map(|p| p.frequency as f64).sum::<f64>() / patterns.len() as f64
    };
    let anomaly_confidence = if anomalies.is_empty() {
        0.0
    } else {
        anomalies.iter().map(|a| a.deviation).sum::<f64>() / anomalies.len() as f64 * 25.0
    };
    ((pattern_confidence + anomaly_confidence) / 2.0).min(100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConflictSeverity, ReportedConflict};

    fn metric(mods: &[&str], fps: f64, memory: f64) -> PerformanceMetric {
        PerformanceMetric::new(mods.iter().copied(), fps, memory, 5.0, 0)
    }

    #[test]
    fn test_empty_data_has_zero_confidence() {
        let engine = PatternRecognitionEngine::new();
        let result = engine.analyze(&AnalysisData::default());
        assert!(result.patterns.is_empty());
        assert!(result.anomalies.is_empty());
        assert_eq!(result.confidence_pct, 0.0);
    }

    #[test]
    fn test_conflict_pattern_threshold() {
        let engine = PatternRecognitionEngine::new();
        let conflict = ReportedConflict::new("X.esp", "NPC_", ConflictSeverity::Minor);
        let mut data = AnalysisData {
            mods: vec!["X.esp".to_string()],
            conflicts: vec![conflict.clone(), conflict.clone()],
            ..Default::default()
        };
        let found = |result: &PatternAnalysis| {
            result
                .patterns
                .iter()
                .any(|p| p.pattern_type == PatternType::Conflict)
        };

        assert!(!found(&engine.analyze(&data)));

        data.conflicts.push(conflict);
        let result = engine.analyze(&data);
        assert!(found(&result));
        let recommendation = &result.recommendations[0];
        assert_eq!(recommendation.action, RecommendationAction::Avoid);
        assert_eq!(recommendation.confidence_pct, 60.0);
    }

    #[test]
    fn test_consistently_slow_mod() {
        let engine = PatternRecognitionEngine::new();
        let data = AnalysisData {
            performance_metrics: vec![
                metric(&["Heavy"], 18.0, 1000.0),
                metric(&["Heavy"], 19.0, 1000.0),
                metric(&["Heavy"], 18.5, 1000.0),
            ],
            ..Default::default()
        };

        let result = engine.analyze(&data);
        let pattern = result
            .patterns
            .iter()
            .find(|p| p.pattern_type == PatternType::Performance)
            .unwrap();
        assert_eq!(pattern.severity, Severity::Critical);
        assert!(pattern.examples[0].metric.is_some());
    }

    #[test]
    fn test_successful_combination_is_preferred() {
        let engine = PatternRecognitionEngine::new();
        let good = metric(&["A", "B"], 60.0, 2000.0).with_stability(95.0);
        let data = AnalysisData {
            performance_metrics: vec![good.clone(), good.clone(), good],
            ..Default::default()
        };

        let result = engine.analyze(&data);
        assert!(
            result
                .recommendations
                .iter()
                .any(|r| r.action == RecommendationAction::Prefer && r.confidence_pct == 45.0)
        );
    }

    #[test]
    fn test_fps_outlier_is_anomalous() {
        let engine = PatternRecognitionEngine::new();
        let mut metrics: Vec<_> = (0..10).map(|_| metric(&["A"], 60.0, 2000.0)).collect();
        metrics.push(metric(&["A", "Broken"], 5.0, 2000.0));
        let data = AnalysisData {
            performance_metrics: metrics,
            ..Default::default()
        };

        let result = engine.analyze(&data);
        let anomaly = result
            .anomalies
            .iter()
            .find(|a| a.anomaly_type == AnomalyType::Performance)
            .unwrap();
        assert!(anomaly.affected_mods.contains(&"Broken".to_string()));
        assert!(anomaly.deviation > 3.0);
        assert_eq!(anomaly.severity, Severity::High);
    }

    #[test]
    fn test_short_series_is_skipped() {
        let engine = PatternRecognitionEngine::new();
        let data = AnalysisData {
            performance_metrics: vec![metric(&["A"], 60.0, 100.0), metric(&["B"], 5.0, 9000.0)],
            ..Default::default()
        };
        assert!(engine.analyze(&data).anomalies.is_empty());
    }

    #[test]
    fn test_conflict_ratio_anomaly() {
        let engine = PatternRecognitionEngine::new();
        let data = AnalysisData {
            mods: vec!["A".into(), "B".into(), "C".into()],
            conflicts: vec![
                ReportedConflict::new("A", "WEAP", ConflictSeverity::Major),
                ReportedConflict::new("A", "ARMO", ConflictSeverity::Major),
            ],
            ..Default::default()
        };

        let result = engine.analyze(&data);
        let anomaly = &result.anomalies[0];
        assert_eq!(anomaly.anomaly_type, AnomalyType::Compatibility);
        assert_eq!(anomaly.severity, Severity::Critical);
    }

    #[test]
    fn test_conflict_flags_survive_more_conflicts() {
        let engine = PatternRecognitionEngine::new();
        let mods: Vec<String> = (0..20).map(|i| format!("Mod {}", i)).collect();
        let mut conflicts: Vec<ReportedConflict> = (0..10)
            .map(|i| ReportedConflict::new(format!("Mod {}", i), "NPC_", ConflictSeverity::Minor))
            .collect();
        conflicts.extend(
            (0..7).map(|_| ReportedConflict::new("Mod 19", "NPC_", ConflictSeverity::Minor)),
        );
        let mut data = AnalysisData {
            mods,
            conflicts,
            ..Default::default()
        };

        let before = engine.analyze(&data).anomalies;
        assert_eq!(before.len(), 1);
        assert_eq!(before[0].affected_mods, vec!["Mod 19".to_string()]);
        assert_eq!(before[0].severity, Severity::High);

        data.conflicts.push(ReportedConflict::new(
            "Mod 3",
            "WEAP",
            ConflictSeverity::Critical,
        ));
        let after = engine.analyze(&data).anomalies;
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].affected_mods, vec!["Mod 19".to_string()]);
    }

    #[test]
    fn test_train_replaces_table() {
        let engine = PatternRecognitionEngine::new();
        let mut rx = engine.table.subscribe();
        let failing = HistoricalData {
            mods: vec!["B".into(), "A".into()],
            outcome: SessionOutcome::Failure,
        };
        let history = vec![failing.clone(), failing.clone(), failing];

        assert_eq!(engine.train(&history), 1);
        let patterns = engine.patterns();
        assert_eq!(patterns[0].id, "failure-A,B");
        assert_eq!(patterns[0].severity, Severity::High);
        assert_eq!(engine.matching_patterns("A", "Z").len(), 1);
        assert!(engine.matching_patterns("Y", "Z").is_empty());
        assert_eq!(
            rx.try_recv().unwrap(),
            StateChange::PatternsTrained { patterns: 1 }
        );

        engine.train(&[]);
        assert!(engine.patterns().is_empty());
    }
}
