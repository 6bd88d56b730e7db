//! Per-mod performance impact from paired session samples.
//!
//! For every sample and every mod in it, the miner looks for a sample whose
//! combination is exactly the same minus that mod. The fps, memory and
//! load-time differences of each such pair are averaged per mod and
//! classified into a bottleneck type. Mods never observed both with and
//! without a partner sample produce no bottleneck.

use crate::engines::cancel::CancelSignal;
use crate::engines::stats;
use crate::error::Result;
use crate::models::{HardwareDefaults, HardwareProfile, ModId, PerformanceData, PerformanceMetric};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Bottlenecks below this confidence are dropped
const MIN_CONFIDENCE: f64 = 0.3;
/// Bottlenecks above this confidence form the critical path
const CRITICAL_CONFIDENCE: f64 = 0.5;

const FPS_FULL_CONFIDENCE: f64 = 30.0;
const MEMORY_FULL_CONFIDENCE_MB: f64 = 4096.0;
const LOAD_FULL_CONFIDENCE_SEC: f64 = 20.0;

/// Memory growth above this rate is treated as a leak
pub const LEAK_THRESHOLD_MB_PER_HOUR: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BottleneckType {
    Cpu,
    Gpu,
    Memory,
    Io,
    Script,
}

impl BottleneckType {
    /// Fixed mitigation advice per bottleneck type
    pub fn mitigation_strategies(&self) -> Vec<String> {
        let strategies: &[&str] = match self {
            BottleneckType::Cpu => &[
                "Consider using a lighter version or alternative of this mod",
                "Check for script optimizations or patches",
                "Monitor CPU usage during gameplay",
                "Consider upgrading CPU or using fewer concurrent mods",
            ],
            BottleneckType::Gpu => &[
                "Reduce texture resolution or disable high-res textures",
                "Use performance-oriented graphics settings",
                "Consider upgrading GPU or using integrated graphics alternatives",
                "Disable VRAM-intensive features",
            ],
            BottleneckType::Memory => &[
                "Reduce texture sizes or use compressed textures",
                "Disable memory-intensive features",
                "Increase system RAM or use memory optimization mods",
                "Use texture streaming or memory management mods",
            ],
            BottleneckType::Io => &[
                "Use SSD storage for game files",
                "Preload assets or use faster storage solutions",
                "Reduce mod file sizes through optimization",
                "Use mods with better loading performance",
            ],
            BottleneckType::Script => &[
                "Check for script conflicts or inefficiencies",
                "Use script optimization patches",
                "Monitor Papyrus logs for script errors",
                "Consider alternative mods with better script performance",
            ],
        };
        strategies.iter().map(|s| s.to_string()).collect()
    }
}

/// Averaged deltas attributed to one mod
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModImpact {
    pub fps_delta: f64,
    pub memory_delta_mb: f64,
    pub load_time_delta_sec: f64,
    /// Paired comparisons behind the averages
    pub pairs: usize,
}

impl ModImpact {
    /// Max of the three normalised deltas, each clamped to [0, 1]
    pub fn confidence(&self) -> f64 {
        let ratio = |value: f64, full: f64| (value / full).clamp(0.0, 1.0);
        ratio(self.fps_delta.abs(), FPS_FULL_CONFIDENCE)
            .max(ratio(self.memory_delta_mb, MEMORY_FULL_CONFIDENCE_MB))
            .max(ratio(self.load_time_delta_sec, LOAD_FULL_CONFIDENCE_SEC))
    }

    /// Threshold cascade, first match wins
    pub fn classify(&self, system: &HardwareProfile) -> BottleneckType {
        if self.memory_delta_mb > 2048.0 {
            BottleneckType::Memory
        } else if self.fps_delta < -20.0 && self.memory_delta_mb < 1024.0 {
            // Big fps drop without the memory to explain it
            if system.has_integrated_gpu() {
                BottleneckType::Gpu
            } else {
                BottleneckType::Script
            }
        } else if self.load_time_delta_sec > 10.0 {
            BottleneckType::Io
        } else {
            BottleneckType::Cpu
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BottleneckEvidence {
    pub metric: String,
    pub value: f64,
    pub threshold: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceBottleneck {
    pub mod_name: ModId,
    pub bottleneck_type: BottleneckType,
    /// Signed fps delta attributed to the mod
    pub impact: f64,
    pub confidence: f64,
    pub evidence: Vec<BottleneckEvidence>,
    pub mitigation_strategies: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityType {
    Texture,
    Script,
    LoadOrder,
    MemoryLeak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationOpportunity {
    pub opportunity_type: OpportunityType,
    pub description: String,
    pub potential_gain: f64,
    pub difficulty: Difficulty,
    pub affected_mods: Vec<ModId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemComponent {
    Cpu,
    Gpu,
    Ram,
    Storage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemLimitation {
    pub component: SystemComponent,
    /// Percent of capacity
    pub current_usage: f64,
    pub capacity: f64,
    pub bottleneck: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BottleneckAnalysis {
    pub bottlenecks: Vec<PerformanceBottleneck>,
    pub critical_path: Vec<ModId>,
    pub optimization_opportunities: Vec<OptimizationOpportunity>,
    pub system_limitations: Vec<SystemLimitation>,
}

/// Stateless bottleneck miner
#[derive(Debug, Clone)]
pub struct BottleneckMiningEngine {
    /// RAM assumed when the hardware profile does not report any
    default_ram_gb: f64,
}

impl BottleneckMiningEngine {
    pub fn new(hardware: &HardwareDefaults) -> Self {
        Self {
            default_ram_gb: hardware.system_ram_gb,
        }
    }

    pub fn analyze(
        &self,
        data: &PerformanceData,
        cancel: &CancelSignal,
    ) -> Result<BottleneckAnalysis> {
        let impacts = mod_impacts(&data.metrics, cancel)?;
        let bottlenecks = self.bottlenecks(&impacts, data);
        let critical_path = critical_path(&bottlenecks, &data.load_order);
        let optimization_opportunities = optimization_opportunities(&data.metrics);
        let system_limitations = self.system_limitations(&data.system_info, &data.metrics);

        tracing::debug!(
            samples = data.metrics.len(),
            bottlenecks = bottlenecks.len(),
            opportunities = optimization_opportunities.len(),
            "Bottleneck analysis complete"
        );

        Ok(BottleneckAnalysis {
            bottlenecks,
            critical_path,
            optimization_opportunities,
            system_limitations,
        })
    }

    /// Bottlenecks only, for callers without a load order or hardware profile
    pub fn identify(
        &self,
        metrics: &[PerformanceMetric],
        cancel: &CancelSignal,
    ) -> Result<Vec<PerformanceBottleneck>> {
        let data = PerformanceData {
            metrics: metrics.to_vec(),
            ..Default::default()
        };
        Ok(self.analyze(&data, cancel)?.bottlenecks)
    }

    fn bottlenecks(
        &self,
        impacts: &IndexMap<ModId, ModImpact>,
        data: &PerformanceData,
    ) -> Vec<PerformanceBottleneck> {
        let mut bottlenecks: Vec<PerformanceBottleneck> = impacts
            .iter()
            .filter_map(|(name, impact)| {
                let confidence = impact.confidence();
                if confidence <= MIN_CONFIDENCE {
                    return None;
                }
                let bottleneck_type = impact.classify(&data.system_info);
                Some(PerformanceBottleneck {
                    mod_name: name.clone(),
                    bottleneck_type,
                    impact: impact.fps_delta,
                    confidence,
                    evidence: evidence(name, impact, &data.metrics),
                    mitigation_strategies: bottleneck_type.mitigation_strategies(),
                })
            })
            .collect();

        bottlenecks.sort_by(|a, b| b.impact.abs().total_cmp(&a.impact.abs()));
        bottlenecks
    }

    fn system_limitations(
        &self,
        system: &HardwareProfile,
        metrics: &[PerformanceMetric],
    ) -> Vec<SystemLimitation> {
        if metrics.is_empty() {
            return Vec::new();
        }
        let mut limitations = Vec::new();
        let limitation = |component, current_usage| SystemLimitation {
            component,
            current_usage,
            capacity: 100.0,
            bottleneck: true,
        };

        let cpu: Vec<f64> = metrics.iter().filter_map(|m| m.cpu_usage).collect();
        if !cpu.is_empty() && stats::mean(&cpu) > 80.0 {
            limitations.push(limitation(SystemComponent::Cpu, stats::mean(&cpu)));
        }

        let gpu: Vec<f64> = metrics.iter().filter_map(|m| m.gpu_usage).collect();
        if !gpu.is_empty() && stats::mean(&gpu) > 90.0 {
            limitations.push(limitation(SystemComponent::Gpu, stats::mean(&gpu)));
        }

        let ram_gb = if system.ram_gb > 0.0 {
            system.ram_gb
        } else {
            self.default_ram_gb
        };
        let peak_memory = metrics
            .iter()
            .map(|m| m.memory_usage_mb)
            .fold(f64::MIN, f64::max);
        if ram_gb > 0.0 {
            let ram_percent = peak_memory / (ram_gb * 1024.0) * 100.0;
            if ram_percent > 85.0 {
                limitations.push(limitation(SystemComponent::Ram, ram_percent));
            }
        }

        let load_times: Vec<f64> = metrics.iter().map(|m| m.load_time_sec).collect();
        if stats::mean(&load_times) > 60.0 {
            // Load times are the only storage signal available; usage is an estimate
            limitations.push(limitation(SystemComponent::Storage, 90.0));
        }

        limitations
    }
}

impl Default for BottleneckMiningEngine {
    fn default() -> Self {
        Self::new(&HardwareDefaults::default())
    }
}

/// Average paired deltas per mod
///
/// Checks `cancel` once per sample; the pairing is quadratic in the number
/// of distinct combinations in the worst case.
pub fn mod_impacts(
    metrics: &[PerformanceMetric],
    cancel: &CancelSignal,
) -> Result<IndexMap<ModId, ModImpact>> {
    // First sample seen for each exact combination
    let mut by_combination: IndexMap<&BTreeSet<ModId>, &PerformanceMetric> = IndexMap::new();
    for metric in metrics {
        by_combination.entry(&metric.mod_combination).or_insert(metric);
    }

    let mut totals: IndexMap<ModId, ModImpact> = IndexMap::new();
    for metric in metrics {
        cancel.check("bottleneck pairwise scan")?;

        for name in &metric.mod_combination {
            let mut without = metric.mod_combination.clone();
            without.remove(name);
            let Some(baseline) = by_combination.get(&without) else {
                continue;
            };

            let total = totals.entry(name.clone()).or_default();
            total.fps_delta += metric.fps - baseline.fps;
            total.memory_delta_mb += metric.memory_usage_mb - baseline.memory_usage_mb;
            total.load_time_delta_sec += metric.load_time_sec - baseline.load_time_sec;
            total.pairs += 1;
        }
    }

    for impact in totals.values_mut() {
        let pairs = impact.pairs as f64;
        impact.fps_delta /= pairs;
        impact.memory_delta_mb /= pairs;
        impact.load_time_delta_sec /= pairs;
    }
    Ok(totals)
}

fn evidence(
    name: &str,
    impact: &ModImpact,
    metrics: &[PerformanceMetric],
) -> Vec<BottleneckEvidence> {
    let mut evidence = Vec::new();

    if impact.fps_delta.abs() > 5.0 {
        evidence.push(BottleneckEvidence {
            metric: "fps".to_string(),
            value: impact.fps_delta,
            threshold: -10.0,
            description: format!(
                "FPS {} by {:.1}",
                if impact.fps_delta > 0.0 {
                    "increased"
                } else {
                    "decreased"
                },
                impact.fps_delta.abs()
            ),
        });
    }

    if impact.memory_delta_mb > 512.0 {
        evidence.push(BottleneckEvidence {
            metric: "memory_mb".to_string(),
            value: impact.memory_delta_mb,
            threshold: 1024.0,
            description: format!("Memory usage increased by {:.0}MB", impact.memory_delta_mb),
        });
    }

    if impact.load_time_delta_sec > 2.0 {
        evidence.push(BottleneckEvidence {
            metric: "load_time_seconds".to_string(),
            value: impact.load_time_delta_sec,
            threshold: 5.0,
            description: format!(
                "Load time increased by {:.1} seconds",
                impact.load_time_delta_sec
            ),
        });
    }

    let fps_with_mod: Vec<f64> = metrics
        .iter()
        .filter(|m| m.mod_combination.contains(name))
        .map(|m| m.fps)
        .collect();
    if !fps_with_mod.is_empty() {
        let avg_fps = stats::mean(&fps_with_mod);
        evidence.push(BottleneckEvidence {
            metric: "avg_fps_with_mod".to_string(),
            value: avg_fps,
            threshold: 30.0,
            description: format!("Average FPS with {}: {:.1}", name, avg_fps),
        });
    }

    evidence
}

fn critical_path(bottlenecks: &[PerformanceBottleneck], load_order: &[ModId]) -> Vec<ModId> {
    load_order
        .iter()
        .filter(|name| {
            bottlenecks
                .iter()
                .any(|b| &b.mod_name == *name && b.confidence > CRITICAL_CONFIDENCE)
        })
        .cloned()
        .collect()
}

fn optimization_opportunities(metrics: &[PerformanceMetric]) -> Vec<OptimizationOpportunity> {
    let mut opportunities = Vec::new();
    let mods_of = |metric: &PerformanceMetric| -> Vec<ModId> {
        metric.mod_combination.iter().cloned().collect()
    };

    for metric in metrics {
        // Lots of memory for very few frames points at oversized textures
        if metric.memory_usage_mb > 6144.0
            && metric.fps < 40.0
            && metric.fps > 0.0
            && metric.memory_usage_mb / metric.fps > 200.0
        {
            opportunities.push(OptimizationOpportunity {
                opportunity_type: OpportunityType::Texture,
                description: format!(
                    "High VRAM usage ({}MB) with low FPS ({}). Consider texture optimization.",
                    metric.memory_usage_mb, metric.fps
                ),
                potential_gain: (metric.memory_usage_mb * 0.3).min(20.0),
                difficulty: Difficulty::Medium,
                affected_mods: mods_of(metric),
            });
        }

        if metric.load_time_sec > 30.0 && metric.memory_usage_mb < 4096.0 {
            opportunities.push(OptimizationOpportunity {
                opportunity_type: OpportunityType::Script,
                description: format!(
                    "Long load time ({}s) suggests script optimization opportunities.",
                    metric.load_time_sec
                ),
                potential_gain: (metric.load_time_sec * 0.4).min(15.0),
                difficulty: Difficulty::Hard,
                affected_mods: mods_of(metric),
            });
        }
    }

    let multi_mod: Vec<&PerformanceMetric> = metrics
        .iter()
        .filter(|m| m.mod_combination.len() > 1)
        .collect();
    let best = multi_mod.iter().max_by(|a, b| a.fps.total_cmp(&b.fps));
    let worst = multi_mod.iter().min_by(|a, b| a.fps.total_cmp(&b.fps));
    if let (Some(best), Some(worst)) = (best, worst) {
        let spread = best.fps - worst.fps;
        if multi_mod.len() > 1 && spread > 10.0 {
            opportunities.push(OptimizationOpportunity {
                opportunity_type: OpportunityType::LoadOrder,
                description: format!(
                    "Load order optimization could improve FPS by up to {:.1}",
                    spread
                ),
                potential_gain: spread,
                difficulty: Difficulty::Easy,
                affected_mods: mods_of(*best),
            });
        }
    }

    let mut by_time: Vec<&PerformanceMetric> = metrics.iter().filter(|m| m.timestamp > 0).collect();
    by_time.sort_by_key(|m| m.timestamp);
    if by_time.len() > 3 {
        let start = by_time[0].timestamp;
        let points: Vec<(f64, f64)> = by_time
            .iter()
            .map(|m| (stats::ms_to_hours(m.timestamp - start), m.memory_usage_mb))
            .collect();
        if let Some(trend) = stats::ols_slope(&points).filter(|t| *t > LEAK_THRESHOLD_MB_PER_HOUR) {
            let latest = by_time[by_time.len() - 1];
            opportunities.push(OptimizationOpportunity {
                opportunity_type: OpportunityType::MemoryLeak,
                description: format!(
                    "Memory leak detected ({:.0}MB/hour). Memory optimization needed.",
                    trend
                ),
                potential_gain: (trend * 0.5).min(10.0),
                difficulty: Difficulty::Hard,
                affected_mods: mods_of(latest),
            });
        }
    }

    opportunities.sort_by(|a, b| b.potential_gain.total_cmp(&a.potential_gain));
    opportunities
}
