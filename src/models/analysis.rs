use super::evidence::{CompatibilityData, ConflictTrainingData, HistoricalData, ReportedConflict};
use super::plugin::EspFile;
use super::telemetry::{HardwareProfile, MemorySnapshot, ModId, PerformanceMetric};
use serde::{Deserialize, Serialize};

/// One input bundle for a comprehensive analysis pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisData {
    pub mods: Vec<ModId>,
    pub performance_metrics: Vec<PerformanceMetric>,
    pub system_info: HardwareProfile,
    pub load_order: Vec<ModId>,
    pub conflicts: Vec<ReportedConflict>,
    /// Parsed plugins for the dependency miners
    pub plugins: Vec<EspFile>,
    /// GPU memory samples; RAM samples come from the metrics of the latest mod combination
    pub vram_snapshots: Vec<MemorySnapshot>,
}

impl AnalysisData {
    /// True when there is nothing at all to analyze
    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
            && self.performance_metrics.is_empty()
            && self.load_order.is_empty()
            && self.plugins.is_empty()
    }

    /// Distinct mods named anywhere in the bundle, in first-seen order
    pub fn all_mods(&self) -> Vec<ModId> {
        let mut seen = indexmap::IndexSet::new();
        for name in self.mods.iter().chain(self.load_order.iter()) {
            seen.insert(name.clone());
        }
        for metric in &self.performance_metrics {
            for name in &metric.mod_combination {
                seen.insert(name.clone());
            }
        }
        seen.into_iter().collect()
    }
}

/// Labelled history for every trainable engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingBundle {
    pub history: Vec<HistoricalData>,
    pub conflicts: Vec<ConflictTrainingData>,
    pub compatibility: Vec<CompatibilityData>,
}
