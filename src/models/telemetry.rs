//! Session telemetry as delivered by the external collectors.
//!
//! All types here are immutable value objects; the engines only read them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Opaque mod key used for every cross-engine join
pub type ModId = String;

/// One sampled frame of a play session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetric {
    /// Mods active while the sample was taken; sorted so combinations compare exactly
    pub mod_combination: BTreeSet<ModId>,
    pub fps: f64,
    pub memory_usage_mb: f64,
    pub load_time_sec: f64,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    /// 0-100, absent when the collector could not judge stability
    #[serde(default)]
    pub stability_score: Option<f64>,
    #[serde(default)]
    pub cpu_usage: Option<f64>,
    #[serde(default)]
    pub gpu_usage: Option<f64>,
}

impl PerformanceMetric {
    /// Convenience constructor for the fields every collector provides
    pub fn new<I, S>(
        mods: I,
        fps: f64,
        memory_usage_mb: f64,
        load_time_sec: f64,
        timestamp: u64,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ModId>,
    {
        Self {
            mod_combination: mods.into_iter().map(Into::into).collect(),
            fps,
            memory_usage_mb,
            load_time_sec,
            timestamp,
            stability_score: None,
            cpu_usage: None,
            gpu_usage: None,
        }
    }

    pub fn with_stability(mut self, stability: f64) -> Self {
        self.stability_score = Some(stability);
        self
    }

    pub fn with_usage(mut self, cpu: f64, gpu: f64) -> Self {
        self.cpu_usage = Some(cpu);
        self.gpu_usage = Some(gpu);
        self
    }
}

/// Static hardware descriptor; only consulted for classification thresholds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareProfile {
    pub cpu: String,
    pub gpu: String,
    pub vram_mb: Option<f64>,
    pub ram_gb: f64,
    pub storage: String,
    pub os: String,
}

impl HardwareProfile {
    /// Integrated GPUs shift fps drops from script to gpu bottlenecks
    pub fn has_integrated_gpu(&self) -> bool {
        let gpu = self.gpu.to_lowercase();
        gpu.contains("integrated") || gpu.contains("intel")
    }
}

/// Input for the bottleneck miner
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceData {
    pub metrics: Vec<PerformanceMetric>,
    pub system_info: HardwareProfile,
    pub load_order: Vec<ModId>,
    pub session_duration_sec: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    pub usage_mb: f64,
}

impl MemorySnapshot {
    pub fn new(timestamp: u64, usage_mb: f64) -> Self {
        Self {
            timestamp,
            usage_mb,
        }
    }
}

/// Input for the memory analyzer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryData {
    pub vram_snapshots: Vec<MemorySnapshot>,
    pub ram_snapshots: Vec<MemorySnapshot>,
    pub mod_load_order: Vec<ModId>,
    pub system_info: Option<HardwareProfile>,
}
