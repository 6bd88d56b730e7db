//! Composition root for the analysis engines.
//!
//! The orchestrator owns one instance of every engine and a shared
//! [`StateChange`] channel. A comprehensive analysis prepares one input view
//! per engine from the same [`AnalysisData`], runs every engine on the
//! blocking pool concurrently and joins them before the report is scored.
//! No engine sees another engine's output.

use crate::engines::bottleneck::{
    BottleneckAnalysis, BottleneckMiningEngine, Difficulty, OpportunityType,
};
use crate::engines::cancel::CancelSignal;
use crate::engines::compatibility::{CompatibilityMatrix, CompatibilityMiningEngine};
use crate::engines::conflict::{ConflictModel, ConflictPrediction, ConflictPredictionEngine};
use crate::engines::content::{ContentAnalysis, ContentRelationshipMiner};
use crate::engines::graph::GraphNode;
use crate::engines::memory::{MemoryAnalysis, MemoryAnalysisEngine, MemoryRecommendationType};
use crate::engines::pattern::{PatternAnalysis, PatternRecognitionEngine, RecommendationAction};
use crate::engines::quest::{QuestAnalysis, QuestDependencyMiner};
use crate::engines::stats;
use crate::error::{AnalysisError, Result};
use crate::metrics::AnalysisMetrics;
use crate::models::{
    AnalysisConfig, AnalysisData, CompatibilityData, ConflictSeverity, MemoryData, MemorySnapshot,
    ModId, PerformanceData, PerformanceMetric, ReportedConflict, Severity, TrainingBundle,
};
use crate::state::{self, StateChange};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;
use tokio::task;
use tracing::Instrument;

/// Predicted conflicts below this probability are left out of load-order scans
const LOAD_ORDER_CONFLICT_PROBABILITY: f64 = 0.3;

const TARGET_FPS: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: u32) -> Self {
        if score > 100 {
            RiskLevel::Critical
        } else if score > 50 {
            RiskLevel::High
        } else if score > 20 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

fn or_empty_bottlenecks(result: Result<BottleneckAnalysis>) -> BottleneckAnalysis {
    result.unwrap_or_else(|e| {
        tracing::warn!("Bottleneck scan skipped: {}", e);
        BottleneckAnalysis::default()
    })
}

/// Weighted risk points over the engine results and the reported conflicts
pub fn risk_score(
    patterns: &PatternAnalysis,
    bottlenecks: &BottleneckAnalysis,
    memory: &MemoryAnalysis,
    reported: &[ReportedConflict],
) -> u32 {
    let anomalies = patterns.anomalies.len() * 10;
    let critical_patterns = patterns
        .patterns
        .iter()
        .filter(|p| p.severity == Severity::Critical)
        .count()
        * 20;
    let confident_bottlenecks = bottlenecks
        .bottlenecks
        .iter()
        .filter(|b| b.confidence > 0.8)
        .count()
        * 15;
    let leaks = memory.leak_detection.len() * 25;
    let reduce = memory
        .recommendations
        .iter()
        .filter(|r| r.recommendation_type == MemoryRecommendationType::Reduce)
        .count()
        * 10;
    let critical_conflicts = reported
        .iter()
        .filter(|c| c.severity == ConflictSeverity::Critical)
        .count()
        * 30;

    let total =
        anomalies + critical_patterns + confident_bottlenecks + leaks + reduce + critical_conflicts;
    u32::try_from(total).unwrap_or(u32::MAX)
}

/// Mean pairwise compatibility mapped from [-1, 1] to [0, 100]; 100 with fewer than two mods
pub fn compatibility_score<F>(mods: &[ModId], score: F) -> f64
where
    F: Fn(&str, &str) -> f64,
{
    let mut total = 0.0;
    let mut pairs = 0usize;
    for (i, a) in mods.iter().enumerate() {
        for b in &mods[i + 1..] {
            total += (score(a, b) + 1.0) * 50.0;
            pairs += 1;
        }
    }
    if pairs == 0 { 100.0 } else { total / pairs as f64 }
}

/// 60% fps against a 60 fps target, 40% stability
///
/// Samples without a stability score are judged on fps alone; an empty
/// session scores 100.
pub fn performance_score(metrics: &[PerformanceMetric]) -> f64 {
    if metrics.is_empty() {
        return 100.0;
    }
    let fps: Vec<f64> = metrics.iter().map(|m| m.fps).collect();
    let fps_score = (stats::mean(&fps) / TARGET_FPS).min(1.0) * 100.0;

    let stability: Vec<f64> = metrics.iter().filter_map(|m| m.stability_score).collect();
    if stability.is_empty() {
        fps_score
    } else {
        fps_score * 0.6 + stats::mean(&stability) * 0.4
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_mods: usize,
    pub compatibility_score: f64,
    pub performance_score: f64,
    pub risk_score: u32,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueType {
    Pattern,
    Performance,
    Memory,
    Conflict,
    Dependency,
    Quest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportIssue {
    pub issue_type: IssueType,
    pub severity: Severity,
    pub description: String,
    pub affected_mods: Vec<ModId>,
    pub recommendation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationCategory {
    Performance,
    Memory,
    Compatibility,
    Optimization,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecommendation {
    pub priority: Priority,
    pub category: RecommendationCategory,
    pub description: String,
    pub expected_benefit: String,
}

/// Everything one comprehensive analysis produced
///
/// Every section is always present; a section with no findings is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub summary: ReportSummary,
    pub patterns: PatternAnalysis,
    pub bottlenecks: BottleneckAnalysis,
    pub memory: MemoryAnalysis,
    pub compatibility: CompatibilityMatrix,
    pub content: ContentAnalysis,
    pub quests: QuestAnalysis,
    /// Most severe first
    pub issues: Vec<ReportIssue>,
    /// Highest priority first
    pub recommendations: Vec<ReportRecommendation>,
    /// Milliseconds since the Unix epoch
    pub generated_at: u64,
}

impl AnalysisReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickConflictCheck {
    pub prediction: ConflictPrediction,
    /// Descriptions of learned patterns mentioning either mod
    pub patterns: Vec<String>,
    /// Compatibility score in [-1, 1]
    pub compatibility: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImprovementKind {
    LoadOrder,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedImprovement {
    pub kind: ImprovementKind,
    pub description: String,
    pub gain: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadOrderAnalysis {
    /// The input order, unchanged
    pub recommended_order: Vec<ModId>,
    /// False until a reordering algorithm exists
    pub order_optimized: bool,
    pub expected_improvements: Vec<ExpectedImprovement>,
    pub conflicts: Vec<ConflictPrediction>,
}

/// What a [`train_all_models`](AnalysisOrchestrator::train_all_models) call did
///
/// `None` means the bundle had no data for that engine and it was left untouched.
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub patterns_learned: Option<usize>,
    pub conflict_model: Option<Arc<ConflictModel>>,
    pub matrix: Option<CompatibilityMatrix>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub pattern_engine: bool,
    pub patterns_learned: usize,
    pub conflict_prediction: bool,
    pub bottleneck_mining: bool,
    pub memory_analysis: bool,
    pub compatibility_matrix: bool,
    pub matrix_mods: usize,
}

/// Owns every engine and runs them as one analysis pass
pub struct AnalysisOrchestrator {
    config: AnalysisConfig,
    patterns: Arc<PatternRecognitionEngine>,
    conflicts: Arc<ConflictPredictionEngine>,
    compatibility: Arc<CompatibilityMiningEngine>,
    bottlenecks: Arc<BottleneckMiningEngine>,
    memory: Arc<MemoryAnalysisEngine>,
    content: ContentRelationshipMiner,
    quests: QuestDependencyMiner,
    metrics: Arc<AnalysisMetrics>,
    events: broadcast::Sender<StateChange>,
}

impl AnalysisOrchestrator {
    pub fn new(config: AnalysisConfig) -> Self {
        let events = state::channel();
        Self {
            patterns: Arc::new(PatternRecognitionEngine::with_events(events.clone())),
            conflicts: Arc::new(ConflictPredictionEngine::with_events(
                &config.training,
                events.clone(),
            )),
            compatibility: Arc::new(CompatibilityMiningEngine::with_events(events.clone())),
            bottlenecks: Arc::new(BottleneckMiningEngine::new(&config.hardware)),
            memory: Arc::new(MemoryAnalysisEngine::new(&config.hardware)),
            content: ContentRelationshipMiner::new(),
            quests: QuestDependencyMiner::new(),
            metrics: Arc::new(AnalysisMetrics::new()),
            events,
            config,
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn metrics(&self) -> &AnalysisMetrics {
        &self.metrics
    }

    pub fn pattern_engine(&self) -> &PatternRecognitionEngine {
        &self.patterns
    }

    pub fn conflict_engine(&self) -> &ConflictPredictionEngine {
        &self.conflicts
    }

    pub fn compatibility_engine(&self) -> &CompatibilityMiningEngine {
        &self.compatibility
    }

    /// Subscribe to model, pattern table and matrix changes of every engine
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.events.subscribe()
    }

    /// Deadline signal for training runs, from `limits.training_timeout_secs`
    pub fn training_signal(&self) -> CancelSignal {
        CancelSignal::with_timeout(Duration::from_secs(self.config.limits.training_timeout_secs))
    }

    fn scan_signal(&self) -> CancelSignal {
        CancelSignal::with_timeout(Duration::from_secs(
            self.config.limits.bottleneck_scan_timeout_secs,
        ))
    }

    /// Run every engine over `data` and assemble the scored report
    ///
    /// Fails with [`AnalysisError::EmptyInput`] when the bundle names no mods,
    /// metrics, load order or plugins at all. A bottleneck scan that overruns
    /// its deadline leaves the bottleneck section empty.
    pub async fn run_comprehensive_analysis(&self, data: AnalysisData) -> Result<AnalysisReport> {
        let span = tracing::info_span!(
            "comprehensive_analysis",
            mods = data.mods.len(),
            samples = data.performance_metrics.len(),
            plugins = data.plugins.len()
        );
        let started = Instant::now();
        let result = self.comprehensive(data).instrument(span).await;

        match &result {
            Ok(report) => {
                self.metrics.record_analysis(started.elapsed());
                tracing::info!(
                    risk = ?report.summary.risk_level,
                    issues = report.issues.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Comprehensive analysis complete"
                );
            }
            Err(e) => {
                self.metrics.record_analysis_failed();
                tracing::warn!("Comprehensive analysis failed: {}", e);
            }
        }
        result
    }

    async fn comprehensive(&self, data: AnalysisData) -> Result<AnalysisReport> {
        if data.is_empty() {
            return Err(AnalysisError::EmptyInput);
        }
        let mods = data.all_mods();
        let data = Arc::new(data);

        let pattern_task = {
            let engine = Arc::clone(&self.patterns);
            let data = Arc::clone(&data);
            task::spawn_blocking(move || engine.analyze(&data))
        };
        let bottleneck_task = {
            let engine = Arc::clone(&self.bottlenecks);
            let input = performance_view(&data);
            let cancel = self.scan_signal();
            task::spawn_blocking(move || engine.analyze(&input, &cancel))
        };
        let memory_task = {
            let engine = Arc::clone(&self.memory);
            let input = memory_view(&data);
            task::spawn_blocking(move || engine.analyze(&input))
        };
        let compatibility_task = {
            let engine = Arc::clone(&self.compatibility);
            let mods = mods.clone();
            task::spawn_blocking(move || {
                let score = compatibility_score(&mods, |a, b| engine.query(a, b).score);
                (engine.matrix(), score)
            })
        };
        let content_task = {
            let miner = self.content;
            let data = Arc::clone(&data);
            task::spawn_blocking(move || miner.analyze(&data.plugins))
        };
        let quest_task = {
            let miner = self.quests;
            let data = Arc::clone(&data);
            task::spawn_blocking(move || miner.analyze(&data.plugins))
        };

        let (patterns, bottlenecks, memory, (compatibility, compatibility_score), content, quests) =
            tokio::try_join!(
                pattern_task,
                bottleneck_task,
                memory_task,
                compatibility_task,
                content_task,
                quest_task
            )?;
        let bottlenecks = or_empty_bottlenecks(bottlenecks);

        self.metrics.record_skipped_records(content.skipped_records);

        let risk_score = risk_score(&patterns, &bottlenecks, &memory, &data.conflicts);
        let summary = ReportSummary {
            total_mods: mods.len(),
            compatibility_score,
            performance_score: performance_score(&data.performance_metrics),
            risk_score,
            risk_level: RiskLevel::from_score(risk_score),
        };

        let mut report = AnalysisReport {
            summary,
            patterns,
            bottlenecks,
            memory,
            compatibility,
            content,
            quests,
            issues: Vec::new(),
            recommendations: Vec::new(),
            generated_at: now_ms(),
        };
        report.issues = extract_issues(&report, &data.conflicts);
        report.recommendations = prioritise_recommendations(&report);
        Ok(report)
    }

    /// Single-pair prediction with the compatibility score and matching learned patterns
    pub fn quick_conflict_check(&self, mod_a: &str, mod_b: &str) -> QuickConflictCheck {
        self.metrics.record_predictions(1);
        QuickConflictCheck {
            prediction: self.conflicts.predict(mod_a, mod_b),
            patterns: self
                .patterns
                .matching_patterns(mod_a, mod_b)
                .into_iter()
                .map(|pattern| pattern.description)
                .collect(),
            compatibility: self.compatibility.query(mod_a, mod_b).score,
        }
    }

    /// Bottlenecks, pairwise conflicts and memory advice for a proposed load order
    ///
    /// The returned order is the input order: no reordering algorithm is
    /// defined yet, and `order_optimized` stays false until one is.
    pub async fn analyze_load_order(
        &self,
        mods: Vec<ModId>,
        performance: PerformanceData,
    ) -> Result<LoadOrderAnalysis> {
        let bottleneck_task = {
            let engine = Arc::clone(&self.bottlenecks);
            let cancel = self.scan_signal();
            let performance = performance.clone();
            task::spawn_blocking(move || engine.analyze(&performance, &cancel))
        };
        let conflict_task = {
            let engine = Arc::clone(&self.conflicts);
            let mods = mods.clone();
            task::spawn_blocking(move || {
                let mut predictions = Vec::new();
                let mut checked = 0u64;
                for (i, a) in mods.iter().enumerate() {
                    for b in &mods[i + 1..] {
                        checked += 1;
                        let prediction = engine.predict(a, b);
                        if prediction.probability > LOAD_ORDER_CONFLICT_PROBABILITY {
                            predictions.push(prediction);
                        }
                    }
                }
                (predictions, checked)
            })
        };
        let memory_task = {
            let engine = Arc::clone(&self.memory);
            let input = MemoryData {
                mod_load_order: mods.clone(),
                system_info: Some(performance.system_info.clone()),
                ..Default::default()
            };
            task::spawn_blocking(move || engine.analyze(&input))
        };

        let (bottlenecks, (conflicts, checked), memory) =
            tokio::try_join!(bottleneck_task, conflict_task, memory_task)?;
        let bottlenecks = or_empty_bottlenecks(bottlenecks);
        self.metrics.record_predictions(checked);

        let mut expected_improvements: Vec<ExpectedImprovement> = bottlenecks
            .optimization_opportunities
            .iter()
            .filter(|opportunity| opportunity.opportunity_type == OpportunityType::LoadOrder)
            .take(1)
            .map(|opportunity| ExpectedImprovement {
                kind: ImprovementKind::LoadOrder,
                description: opportunity.description.clone(),
                gain: opportunity.potential_gain,
            })
            .collect();
        expected_improvements.extend(memory.recommendations.iter().map(|recommendation| {
            ExpectedImprovement {
                kind: ImprovementKind::Memory,
                description: recommendation.description.clone(),
                gain: recommendation.potential_savings_mb,
            }
        }));

        tracing::debug!(
            mods = mods.len(),
            conflicts = conflicts.len(),
            "Load order analysed; order left unchanged"
        );

        Ok(LoadOrderAnalysis {
            recommended_order: mods,
            order_optimized: false,
            expected_improvements,
            conflicts,
        })
    }

    /// Train the pattern table, the conflict classifier and the compatibility
    /// matrix concurrently
    ///
    /// Engines whose part of the bundle is empty keep their current state.
    /// `cancel` only reaches the classifier, the other two are linear.
    pub async fn train_all_models(
        &self,
        bundle: TrainingBundle,
        cancel: CancelSignal,
    ) -> Result<TrainingSummary> {
        let TrainingBundle {
            history,
            conflicts,
            compatibility,
        } = bundle;

        let pattern_task = {
            let engine = Arc::clone(&self.patterns);
            task::spawn_blocking(move || (!history.is_empty()).then(|| engine.train(&history)))
        };
        let conflict_task = {
            let engine = Arc::clone(&self.conflicts);
            task::spawn_blocking(move || {
                if conflicts.is_empty() {
                    Ok(None)
                } else {
                    engine.train(&conflicts, &cancel).map(Some)
                }
            })
        };
        let matrix_task = {
            let engine = Arc::clone(&self.compatibility);
            task::spawn_blocking(move || {
                (!compatibility.is_empty()).then(|| engine.build(compatibility))
            })
        };

        let (patterns_learned, conflict_model, matrix) =
            tokio::try_join!(pattern_task, conflict_task, matrix_task)?;
        let conflict_model = conflict_model?;

        if patterns_learned.is_some() {
            self.metrics.record_training_run();
        }
        if conflict_model.is_some() {
            self.metrics.record_training_run();
        }
        if matrix.is_some() {
            self.metrics.record_matrix_update();
        }

        Ok(TrainingSummary {
            patterns_learned,
            conflict_model,
            matrix,
        })
    }

    /// Feed one compatibility record into the matrix
    pub fn update_compatibility(&self, record: CompatibilityData) {
        self.compatibility.update(record);
        self.metrics.record_matrix_update();
    }

    pub fn engine_status(&self) -> EngineStatus {
        let matrix = self.compatibility.matrix();
        EngineStatus {
            pattern_engine: true,
            patterns_learned: self.patterns.patterns().len(),
            conflict_prediction: self.conflicts.model_status().trained,
            bottleneck_mining: true,
            memory_analysis: true,
            compatibility_matrix: true,
            matrix_mods: matrix.matrix.len(),
        }
    }
}

impl Default for AnalysisOrchestrator {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}

/// Bottleneck input: metrics, hardware and load order, with the session length
/// taken from the sample timestamps
fn performance_view(data: &AnalysisData) -> PerformanceData {
    let timestamps = data.performance_metrics.iter().map(|m| m.timestamp);
    let session_duration_sec = match (timestamps.clone().min(), timestamps.max()) {
        (Some(first), Some(last)) => (last - first) as f64 / 1000.0,
        _ => 0.0,
    };
    PerformanceData {
        metrics: data.performance_metrics.clone(),
        system_info: data.system_info.clone(),
        load_order: data.load_order.clone(),
        session_duration_sec,
    }
}

/// Memory input: VRAM samples as supplied, RAM samples from the metric rows in time order
/// RAM samples of the most recently observed mod combination
///
/// Samples from different combinations are different sessions and never
/// share a growth regression.
fn memory_view(data: &AnalysisData) -> MemoryData {
    let active = data
        .performance_metrics
        .iter()
        .max_by_key(|m| m.timestamp)
        .map(|m| &m.mod_combination);
    let mut ram_snapshots: Vec<MemorySnapshot> = data
        .performance_metrics
        .iter()
        .filter(|m| Some(&m.mod_combination) == active)
        .map(|m| MemorySnapshot::new(m.timestamp, m.memory_usage_mb))
        .collect();
    ram_snapshots.sort_by_key(|s| s.timestamp);

    MemoryData {
        vram_snapshots: data.vram_snapshots.clone(),
        ram_snapshots,
        mod_load_order: if data.load_order.is_empty() {
            data.all_mods()
        } else {
            data.load_order.clone()
        },
        system_info: Some(data.system_info.clone()),
    }
}

fn reported_severity(severity: ConflictSeverity) -> Severity {
    match severity {
        ConflictSeverity::Minor => Severity::Low,
        ConflictSeverity::Major => Severity::High,
        ConflictSeverity::Critical => Severity::Critical,
    }
}

fn extract_issues(report: &AnalysisReport, reported: &[ReportedConflict]) -> Vec<ReportIssue> {
    let mut issues = Vec::new();

    for anomaly in &report.patterns.anomalies {
        issues.push(ReportIssue {
            issue_type: IssueType::Pattern,
            severity: anomaly.severity,
            description: anomaly.description.clone(),
            affected_mods: anomaly.affected_mods.clone(),
            recommendation: "Review mod combinations and consider alternatives".to_string(),
        });
    }

    for bottleneck in &report.bottlenecks.bottlenecks {
        issues.push(ReportIssue {
            issue_type: IssueType::Performance,
            severity: if bottleneck.confidence > 0.8 {
                Severity::High
            } else {
                Severity::Medium
            },
            description: format!(
                "{} causing {:?} bottleneck",
                bottleneck.mod_name, bottleneck.bottleneck_type
            )
            .to_lowercase(),
            affected_mods: vec![bottleneck.mod_name.clone()],
            recommendation: bottleneck
                .mitigation_strategies
                .first()
                .cloned()
                .unwrap_or_else(|| "Optimize or replace mod".to_string()),
        });
    }

    for leak in &report.memory.leak_detection {
        issues.push(ReportIssue {
            issue_type: IssueType::Memory,
            severity: if leak.confidence > 0.8 {
                Severity::Critical
            } else {
                Severity::High
            },
            description: format!("Memory leak detected in {}", leak.mod_name),
            affected_mods: vec![leak.mod_name.clone()],
            recommendation: "Update mod or find alternative".to_string(),
        });
    }

    for conflict in reported {
        issues.push(ReportIssue {
            issue_type: IssueType::Conflict,
            severity: reported_severity(conflict.severity),
            description: format!("{} conflicts with other mods", conflict.conflicting_mod),
            affected_mods: vec![conflict.conflicting_mod.clone()],
            recommendation: "Check load order or use patches".to_string(),
        });
    }

    for conflict in &report.content.conflicts {
        issues.push(ReportIssue {
            issue_type: IssueType::Dependency,
            severity: conflict.severity,
            description: conflict.description.clone(),
            affected_mods: conflict.mods.clone(),
            recommendation: conflict.resolution.clone(),
        });
    }
    for cycle in &report.content.graph.cycles {
        issues.push(ReportIssue {
            issue_type: IssueType::Dependency,
            severity: cycle.severity,
            description: cycle.description.clone(),
            affected_mods: owners_of(&report.content.graph.nodes, &cycle.nodes),
            recommendation: "Break the cycle with a patch or remove one of the records".to_string(),
        });
    }

    for conflict in &report.quests.conflicts {
        issues.push(ReportIssue {
            issue_type: IssueType::Quest,
            severity: conflict.severity,
            description: conflict.description.clone(),
            affected_mods: owners_of(&report.quests.graph.nodes, &conflict.quests),
            recommendation: conflict.resolution.clone(),
        });
    }
    for conflict in &report.quests.structural_conflicts {
        issues.push(ReportIssue {
            issue_type: IssueType::Quest,
            severity: conflict.severity,
            description: conflict.description.clone(),
            affected_mods: conflict.mods.clone(),
            recommendation: conflict.resolution.clone(),
        });
    }

    // Stable sort keeps engine order within a severity
    issues.sort_by(|a, b| b.severity.cmp(&a.severity));
    issues
}

/// Distinct owning mods of the given graph keys
fn owners_of<K: PartialEq>(
    nodes: &[GraphNode<K>],
    keys: &[K],
) -> Vec<ModId> {
    let owners: IndexSet<&ModId> = nodes
        .iter()
        .filter(|node| keys.contains(&node.id))
        .map(|node| &node.owner)
        .collect();
    owners.into_iter().cloned().collect()
}

fn prioritise_recommendations(report: &AnalysisReport) -> Vec<ReportRecommendation> {
    let mut recommendations = Vec::new();

    for bottleneck in report
        .bottlenecks
        .bottlenecks
        .iter()
        .filter(|b| b.confidence > 0.8)
    {
        recommendations.push(ReportRecommendation {
            priority: Priority::High,
            category: RecommendationCategory::Performance,
            description: format!(
                "Address {:?} bottleneck in {}",
                bottleneck.bottleneck_type, bottleneck.mod_name
            ),
            expected_benefit: format!("{:.1} FPS improvement", bottleneck.impact.abs()),
        });
    }

    for recommendation in report
        .memory
        .recommendations
        .iter()
        .filter(|r| r.recommendation_type == MemoryRecommendationType::Reduce)
    {
        recommendations.push(ReportRecommendation {
            priority: Priority::High,
            category: RecommendationCategory::Memory,
            description: recommendation.description.clone(),
            expected_benefit: format!(
                "{:.0}MB memory savings",
                recommendation.potential_savings_mb
            ),
        });
    }

    for recommendation in report
        .patterns
        .recommendations
        .iter()
        .filter(|r| r.confidence_pct > 80.0)
    {
        recommendations.push(ReportRecommendation {
            priority: match recommendation.action {
                RecommendationAction::Avoid => Priority::High,
                RecommendationAction::Prefer => Priority::Medium,
            },
            category: RecommendationCategory::Compatibility,
            description: recommendation.description.clone(),
            expected_benefit: "Reduced conflicts and crashes".to_string(),
        });
    }

    for opportunity in &report.bottlenecks.optimization_opportunities {
        recommendations.push(ReportRecommendation {
            priority: if opportunity.difficulty == Difficulty::Easy {
                Priority::Medium
            } else {
                Priority::Low
            },
            category: RecommendationCategory::Optimization,
            description: opportunity.description.clone(),
            expected_benefit: format!("{:.1} FPS improvement", opportunity.potential_gain),
        });
    }

    recommendations.sort_by(|a, b| b.priority.cmp(&a.priority));
    recommendations
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
