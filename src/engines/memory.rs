//! VRAM and system RAM analysis over session snapshots.
//!
//! Totals, peaks and trends come straight from the snapshots. Per-mod
//! attribution has no telemetry behind it yet, so it goes through a
//! [`UsageEstimator`]; the default [`KeywordEstimator`] reads sizes off
//! mod-name keywords and can be replaced once real per-mod numbers exist.

use crate::engines::keywords::has_any;
use crate::engines::stats;
use crate::models::{HardwareDefaults, MemoryData, MemorySnapshot, ModId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

const VRAM_WARNING_UTILIZATION: f64 = 0.85;
const RAM_WARNING_UTILIZATION: f64 = 0.90;
/// Per-mod VRAM above this earns its own recommendation
const MOD_VRAM_CAP_MB: f64 = 1536.0;

/// Memory growth above this rate is treated as a leak
pub const LEAK_THRESHOLD_MB_PER_HOUR: f64 = 50.0;

const ALLOCATION_SPIKE_MB: f64 = 100.0;
const DEALLOCATION_DROP_MB: f64 = 50.0;
const FRAGMENTATION_CV: f64 = 0.2;

/// Per-mod memory attribution
#[cfg_attr(test, mockall::automock)]
pub trait UsageEstimator: Send + Sync {
    fn vram_mb(&self, mod_name: &str) -> f64;
    fn ram_mb(&self, mod_name: &str) -> f64;
}

/// Fixed sizes by name keyword
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordEstimator;

impl UsageEstimator for KeywordEstimator {
    fn vram_mb(&self, mod_name: &str) -> f64 {
        if has_any(mod_name, &["4k", "8k"]) {
            3584.0
        } else if has_any(mod_name, &["2k", "hd"]) {
            2048.0
        } else if has_any(mod_name, &["texture"]) {
            1024.0
        } else if has_any(mod_name, &["mesh", "model"]) {
            256.0
        } else {
            128.0
        }
    }

    fn ram_mb(&self, mod_name: &str) -> f64 {
        if has_any(mod_name, &["script", "quest"]) {
            512.0
        } else if has_any(mod_name, &["npc", "creature"]) {
            256.0
        } else if has_any(mod_name, &["ui", "interface"]) {
            128.0
        } else {
            64.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryTrend {
    pub timestamp: u64,
    pub usage_mb: f64,
    pub context: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VramUsage {
    /// Latest snapshot
    pub total_mb: f64,
    pub by_mod: IndexMap<ModId, f64>,
    /// textures, meshes, animations, other
    pub by_asset_type: IndexMap<String, f64>,
    pub peak_mb: f64,
    pub average_mb: f64,
    pub trends: Vec<MemoryTrend>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RamUsage {
    /// Latest snapshot
    pub total_mb: f64,
    pub by_mod: IndexMap<ModId, f64>,
    /// scripts, assets, ui, other
    pub by_component: IndexMap<String, f64>,
    pub peak_mb: f64,
    pub average_mb: f64,
    pub trends: Vec<MemoryTrend>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryPool {
    Vram,
    Ram,
}

impl MemoryPool {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryPool::Vram => "VRAM",
            MemoryPool::Ram => "RAM",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryPatternType {
    Allocation,
    Deallocation,
    Fragmentation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryPattern {
    pub pattern_type: MemoryPatternType,
    pub pool: MemoryPool,
    pub description: String,
    /// Share of snapshots showing the pattern
    pub frequency: f64,
    /// MB; negative when memory was freed
    pub impact: f64,
    pub affected_mods: Vec<ModId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryRecommendationType {
    Reduce,
    Optimize,
    Replace,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecommendation {
    pub recommendation_type: MemoryRecommendationType,
    pub description: String,
    pub potential_savings_mb: f64,
    pub affected_mods: Vec<ModId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeakType {
    Asset,
    Script,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryLeak {
    /// Last mod in the load order, or "Unknown"
    pub mod_name: ModId,
    pub leak_type: LeakType,
    pub growth_mb_per_hour: f64,
    pub estimated_size_mb: f64,
    pub evidence: Vec<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryAnalysis {
    pub vram_usage: VramUsage,
    pub system_ram_usage: RamUsage,
    pub memory_patterns: Vec<MemoryPattern>,
    pub recommendations: Vec<MemoryRecommendation>,
    pub leak_detection: Vec<MemoryLeak>,
}

pub struct MemoryAnalysisEngine<E = KeywordEstimator> {
    estimator: E,
    vram_capacity_mb: f64,
    system_ram_gb: f64,
}

impl MemoryAnalysisEngine {
    pub fn new(hardware: &HardwareDefaults) -> Self {
        Self::with_estimator(KeywordEstimator, hardware)
    }
}

impl Default for MemoryAnalysisEngine {
    fn default() -> Self {
        Self::new(&HardwareDefaults::default())
    }
}

impl<E: UsageEstimator> MemoryAnalysisEngine<E> {
    pub fn with_estimator(estimator: E, hardware: &HardwareDefaults) -> Self {
        Self {
            estimator,
            vram_capacity_mb: hardware.vram_capacity_mb,
            system_ram_gb: hardware.system_ram_gb,
        }
    }

    pub fn analyze(&self, data: &MemoryData) -> MemoryAnalysis {
        let vram_usage = self.vram_usage(data);
        let system_ram_usage = self.ram_usage(data);

        let mut memory_patterns = detect_patterns(
            MemoryPool::Vram,
            &data.vram_snapshots,
            &data.mod_load_order,
        );
        memory_patterns.extend(detect_patterns(
            MemoryPool::Ram,
            &data.ram_snapshots,
            &data.mod_load_order,
        ));

        let recommendations = self.recommendations(data, &vram_usage, &system_ram_usage);

        let suspect = data.mod_load_order.last().map(String::as_str);
        let leak_detection: Vec<MemoryLeak> = [
            detect_leak(MemoryPool::Vram, &data.vram_snapshots, suspect),
            detect_leak(MemoryPool::Ram, &data.ram_snapshots, suspect),
        ]
        .into_iter()
        .flatten()
        .collect();

        if !leak_detection.is_empty() {
            tracing::warn!(leaks = leak_detection.len(), "Memory growth above leak threshold");
        }
        tracing::debug!(
            mods = data.mod_load_order.len(),
            patterns = memory_patterns.len(),
            recommendations = recommendations.len(),
            "Memory analysis complete"
        );

        MemoryAnalysis {
            vram_usage,
            system_ram_usage,
            memory_patterns,
            recommendations,
            leak_detection,
        }
    }

    /// VRAM capacity from the session's hardware profile, else the configured default
    fn vram_capacity(&self, data: &MemoryData) -> f64 {
        data.system_info
            .as_ref()
            .and_then(|profile| profile.vram_mb)
            .filter(|mb| *mb > 0.0)
            .unwrap_or(self.vram_capacity_mb)
    }

    fn ram_capacity(&self, data: &MemoryData) -> f64 {
        let gb = data
            .system_info
            .as_ref()
            .map(|profile| profile.ram_gb)
            .filter(|gb| *gb > 0.0)
            .unwrap_or(self.system_ram_gb);
        gb * 1024.0
    }

    fn vram_usage(&self, data: &MemoryData) -> VramUsage {
        let by_mod: IndexMap<ModId, f64> = data
            .mod_load_order
            .iter()
            .map(|name| (name.clone(), self.estimator.vram_mb(name)))
            .collect();

        let mut by_asset_type: IndexMap<String, f64> = ["textures", "meshes", "animations", "other"]
            .iter()
            .map(|kind| (kind.to_string(), 0.0))
            .collect();
        for (name, vram) in &by_mod {
            let (kind, share) = if has_any(name, &["texture"]) {
                ("textures", 0.8)
            } else if has_any(name, &["mesh", "model"]) {
                ("meshes", 0.6)
            } else if has_any(name, &["animation", "anim"]) {
                ("animations", 0.4)
            } else {
                ("other", 0.2)
            };
            if let Some(total) = by_asset_type.get_mut(kind) {
                *total += (vram * share).round();
            }
        }

        let summary = SnapshotSummary::of(&data.vram_snapshots);
        VramUsage {
            total_mb: summary.latest,
            by_mod,
            by_asset_type,
            peak_mb: summary.peak,
            average_mb: summary.average,
            trends: trends(MemoryPool::Vram, &data.vram_snapshots),
        }
    }

    fn ram_usage(&self, data: &MemoryData) -> RamUsage {
        let by_mod: IndexMap<ModId, f64> = data
            .mod_load_order
            .iter()
            .map(|name| (name.clone(), self.estimator.ram_mb(name)))
            .collect();

        let mut by_component: IndexMap<String, f64> = ["scripts", "assets", "ui", "other"]
            .iter()
            .map(|kind| (kind.to_string(), 0.0))
            .collect();
        for (name, ram) in &by_mod {
            let (kind, share) = if has_any(name, &["script", "quest"]) {
                ("scripts", 0.7)
            } else if has_any(name, &["ui", "interface"]) {
                ("ui", 0.8)
            } else if has_any(name, &["texture", "mesh"]) {
                ("assets", 0.6)
            } else {
                ("other", 0.3)
            };
            if let Some(total) = by_component.get_mut(kind) {
                *total += (ram * share).round();
            }
        }

        let summary = SnapshotSummary::of(&data.ram_snapshots);
        RamUsage {
            total_mb: summary.latest,
            by_mod,
            by_component,
            peak_mb: summary.peak,
            average_mb: summary.average,
            trends: trends(MemoryPool::Ram, &data.ram_snapshots),
        }
    }

    fn recommendations(
        &self,
        data: &MemoryData,
        vram: &VramUsage,
        ram: &RamUsage,
    ) -> Vec<MemoryRecommendation> {
        let mut recommendations = Vec::new();

        let vram_capacity = self.vram_capacity(data);
        if vram.peak_mb > 0.0 && vram_capacity > 0.0 {
            let utilization = vram.peak_mb / vram_capacity;
            if utilization > VRAM_WARNING_UTILIZATION {
                recommendations.push(MemoryRecommendation {
                    recommendation_type: MemoryRecommendationType::Reduce,
                    description: format!(
                        "VRAM usage is high ({:.1}%). Consider reducing texture resolutions.",
                        utilization * 100.0
                    ),
                    potential_savings_mb: (vram.peak_mb * 0.3).round(),
                    affected_mods: mods_above(&vram.by_mod, 512.0),
                });
            }
        }

        let ram_capacity = self.ram_capacity(data);
        if ram.peak_mb > 0.0 && ram_capacity > 0.0 {
            let utilization = ram.peak_mb / ram_capacity;
            if utilization > RAM_WARNING_UTILIZATION {
                recommendations.push(MemoryRecommendation {
                    recommendation_type: MemoryRecommendationType::Optimize,
                    description: format!(
                        "System RAM usage is critical ({:.1}%). Consider script optimization.",
                        utilization * 100.0
                    ),
                    potential_savings_mb: (ram.peak_mb * 0.2).round(),
                    affected_mods: mods_above(&ram.by_mod, 128.0),
                });
            }
        }

        for (name, mb) in &vram.by_mod {
            if *mb > MOD_VRAM_CAP_MB {
                recommendations.push(MemoryRecommendation {
                    recommendation_type: MemoryRecommendationType::Replace,
                    description: format!(
                        "{} uses {:.0}MB VRAM. Consider using lighter alternatives.",
                        name, mb
                    ),
                    potential_savings_mb: (mb * 0.5).round(),
                    affected_mods: vec![name.clone()],
                });
            }
        }

        recommendations
    }
}

struct SnapshotSummary {
    latest: f64,
    peak: f64,
    average: f64,
}

impl SnapshotSummary {
    fn of(snapshots: &[MemorySnapshot]) -> Self {
        let usages: Vec<f64> = snapshots.iter().map(|s| s.usage_mb).collect();
        Self {
            latest: usages.last().copied().unwrap_or(0.0),
            peak: usages.iter().copied().reduce(f64::max).unwrap_or(0.0),
            average: stats::mean(&usages).round(),
        }
    }
}

fn trends(pool: MemoryPool, snapshots: &[MemorySnapshot]) -> Vec<MemoryTrend> {
    snapshots
        .iter()
        .map(|snapshot| MemoryTrend {
            timestamp: snapshot.timestamp,
            usage_mb: snapshot.usage_mb,
            context: format!("{} usage during session", pool.as_str()),
        })
        .collect()
}

fn mods_above(by_mod: &IndexMap<ModId, f64>, limit: f64) -> Vec<ModId> {
    by_mod
        .iter()
        .filter(|(_, mb)| **mb > limit)
        .map(|(name, _)| name.clone())
        .collect()
}

/// Allocation spikes, deallocation events and fragmentation in one pool
pub fn detect_patterns(
    pool: MemoryPool,
    snapshots: &[MemorySnapshot],
    load_order: &[ModId],
) -> Vec<MemoryPattern> {
    let mut patterns = Vec::new();
    if snapshots.len() < 3 {
        return patterns;
    }
    let count = snapshots.len() as f64;
    let deltas: Vec<f64> = snapshots
        .windows(2)
        .map(|pair| pair[1].usage_mb - pair[0].usage_mb)
        .collect();

    let spikes: Vec<f64> = deltas.iter().copied().filter(|d| *d > ALLOCATION_SPIKE_MB).collect();
    if !spikes.is_empty() {
        let average = stats::mean(&spikes);
        patterns.push(MemoryPattern {
            pattern_type: MemoryPatternType::Allocation,
            pool,
            description: format!(
                "Sudden {} allocations detected (avg: {:.0}MB)",
                pool.as_str(),
                average
            ),
            frequency: spikes.len() as f64 / count,
            impact: average,
            affected_mods: load_order.to_vec(),
        });
    }

    let drops: Vec<f64> = deltas
        .iter()
        .filter(|d| **d < -DEALLOCATION_DROP_MB)
        .map(|d| d.abs())
        .collect();
    if !drops.is_empty() {
        let average = stats::mean(&drops);
        patterns.push(MemoryPattern {
            pattern_type: MemoryPatternType::Deallocation,
            pool,
            description: format!(
                "{} deallocations detected (avg: {:.0}MB)",
                pool.as_str(),
                average
            ),
            frequency: drops.len() as f64 / count,
            impact: -average,
            affected_mods: load_order.to_vec(),
        });
    }

    if snapshots.len() >= 5 {
        let usages: Vec<f64> = snapshots.iter().map(|s| s.usage_mb).collect();
        let cv = stats::coefficient_of_variation(&usages);
        if cv > FRAGMENTATION_CV {
            patterns.push(MemoryPattern {
                pattern_type: MemoryPatternType::Fragmentation,
                pool,
                description: format!(
                    "High {} usage variation detected ({:.1}% CV)",
                    pool.as_str(),
                    cv * 100.0
                ),
                frequency: 1.0,
                impact: stats::std_dev(&usages),
                affected_mods: load_order.to_vec(),
            });
        }
    }

    patterns
}

/// Growth rate in MB/hour from a least-squares fit over the snapshots
pub fn growth_rate(snapshots: &[MemorySnapshot]) -> Option<f64> {
    let start = snapshots.iter().map(|s| s.timestamp).min()?;
    let points: Vec<(f64, f64)> = snapshots
        .iter()
        .map(|s| (stats::ms_to_hours(s.timestamp - start), s.usage_mb))
        .collect();
    stats::ols_slope(&points)
}

fn detect_leak(
    pool: MemoryPool,
    snapshots: &[MemorySnapshot],
    suspect: Option<&str>,
) -> Option<MemoryLeak> {
    let rate = growth_rate(snapshots).filter(|rate| *rate > LEAK_THRESHOLD_MB_PER_HOUR)?;

    Some(MemoryLeak {
        mod_name: suspect.unwrap_or("Unknown").to_string(),
        leak_type: match pool {
            MemoryPool::Vram => LeakType::Asset,
            MemoryPool::Ram => LeakType::Script,
        },
        growth_mb_per_hour: rate,
        estimated_size_mb: (rate * 0.1).round(),
        evidence: vec![
            format!("{} growing at {:.1}MB/hour", pool.as_str(), rate),
            format!("Pattern detected over {} measurements", snapshots.len()),
        ],
        confidence: (rate / (LEAK_THRESHOLD_MB_PER_HOUR * 2.0)).min(1.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HardwareProfile;

    const HOUR: u64 = 3_600_000;

    fn series(points: &[(u64, f64)]) -> Vec<MemorySnapshot> {
        points.iter().map(|(t, mb)| MemorySnapshot::new(*t, *mb)).collect()
    }

    #[test]
    fn test_two_snapshot_leak() {
        let engine = MemoryAnalysisEngine::new(&HardwareDefaults::default());
        let data = MemoryData {
            vram_snapshots: series(&[(0, 1000.0), (HOUR, 1100.0)]),
            mod_load_order: vec!["Base".to_string(), "Latest".to_string()],
            ..Default::default()
        };

        let analysis = engine.analyze(&data);
        assert_eq!(analysis.leak_detection.len(), 1);
        let leak = &analysis.leak_detection[0];
        assert!((leak.growth_mb_per_hour - 100.0).abs() < 1e-9);
        assert_eq!(leak.confidence, 1.0);
        assert_eq!(leak.mod_name, "Latest");
        assert_eq!(leak.leak_type, LeakType::Asset);
    }

    #[test]
    fn test_leak_threshold() {
        let slow = series(&[(0, 1000.0), (HOUR, 1040.0), (2 * HOUR, 1080.0)]);
        let fast = series(&[(0, 1000.0), (HOUR, 1060.0), (2 * HOUR, 1120.0)]);

        assert!(detect_leak(MemoryPool::Ram, &slow, None).is_none());
        let leak = detect_leak(MemoryPool::Ram, &fast, None).unwrap();
        assert_eq!(leak.mod_name, "Unknown");
        assert!((leak.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_single_snapshot_has_no_rate() {
        assert!(growth_rate(&series(&[(0, 1000.0)])).is_none());
        assert!(growth_rate(&[]).is_none());
    }

    #[test]
    fn test_patterns() {
        let snapshots = series(&[
            (0, 1000.0),
            (1, 1500.0),
            (2, 900.0),
            (3, 2000.0),
            (4, 1000.0),
        ]);
        let patterns = detect_patterns(MemoryPool::Vram, &snapshots, &[]);
        let kinds: Vec<MemoryPatternType> = patterns.iter().map(|p| p.pattern_type).collect();
        assert_eq!(
            kinds,
            vec![
                MemoryPatternType::Allocation,
                MemoryPatternType::Deallocation,
                MemoryPatternType::Fragmentation
            ]
        );
        assert!(patterns[1].impact < 0.0);
    }

    #[test]
    fn test_flat_series_has_no_patterns() {
        let snapshots = series(&[(0, 1000.0), (1, 1010.0), (2, 1000.0), (3, 1005.0), (4, 1000.0)]);
        assert!(detect_patterns(MemoryPool::Ram, &snapshots, &[]).is_empty());
    }

    #[test]
    fn test_keyword_estimates() {
        let estimator = KeywordEstimator;
        assert_eq!(estimator.vram_mb("Skyrim 4K Textures"), 3584.0);
        assert_eq!(estimator.vram_mb("HD Landscapes"), 2048.0);
        assert_eq!(estimator.vram_mb("Better Meshes"), 256.0);
        assert_eq!(estimator.vram_mb("Unofficial Patch"), 128.0);
        assert_eq!(estimator.ram_mb("Quest Expansion"), 512.0);
        assert_eq!(estimator.ram_mb("SkyUI"), 64.0);
        assert_eq!(estimator.ram_mb("Immersive Creatures"), 256.0);
    }

    #[test]
    fn test_recommendations_use_profile_capacity() {
        let engine = MemoryAnalysisEngine::new(&HardwareDefaults::default());
        let data = MemoryData {
            vram_snapshots: series(&[(0, 3500.0)]),
            ram_snapshots: series(&[(0, 7600.0)]),
            mod_load_order: vec!["Skyrim 4K Textures".to_string()],
            system_info: Some(HardwareProfile {
                vram_mb: Some(4096.0),
                ram_gb: 8.0,
                ..Default::default()
            }),
        };

        let kinds: Vec<MemoryRecommendationType> = engine
            .analyze(&data)
            .recommendations
            .iter()
            .map(|r| r.recommendation_type)
            .collect();
        assert_eq!(
            kinds,
            vec![
                MemoryRecommendationType::Reduce,
                MemoryRecommendationType::Optimize,
                MemoryRecommendationType::Replace
            ]
        );
    }

    #[test]
    fn test_mocked_estimator_drives_breakdown() {
        let mut estimator = MockUsageEstimator::new();
        estimator.expect_vram_mb().returning(|_| 1000.0);
        estimator.expect_ram_mb().returning(|_| 100.0);

        let engine = MemoryAnalysisEngine::with_estimator(estimator, &HardwareDefaults::default());
        let data = MemoryData {
            mod_load_order: vec!["Better Textures".to_string(), "Quest Mod".to_string()],
            ..Default::default()
        };
        let analysis = engine.analyze(&data);

        assert_eq!(analysis.vram_usage.by_mod["Better Textures"], 1000.0);
        assert_eq!(analysis.vram_usage.by_asset_type["textures"], 800.0);
        assert_eq!(analysis.vram_usage.by_asset_type["other"], 200.0);
        assert_eq!(analysis.system_ram_usage.by_component["scripts"], 70.0);
        assert!(analysis.recommendations.is_empty());
        assert!(analysis.leak_detection.is_empty());
    }
}
