//! Data models consumed and produced by the mining engines.
//!
//! - [`analysis`]: the input bundles handed to the orchestrator
//! - [`telemetry`]: sampled performance and memory data from a play session
//! - [`plugin`]: typed plugin records handed over by the external parser
//! - [`evidence`]: compatibility evidence, classifier labels, reported conflicts
//! - [`config`]: [`AnalysisConfig`] loaded by [`ConfigManager`](crate::config::ConfigManager)
//!
//! Everything here is a serializable value object. Engines never mutate
//! their inputs; the only engine-owned mutable state lives behind
//! [`SharedState`](crate::state::SharedState).

pub mod analysis;
pub mod config;
pub mod evidence;
pub mod plugin;
pub mod telemetry;

pub use analysis::{AnalysisData, TrainingBundle};
pub use config::{AnalysisConfig, HardwareDefaults, LimitsConfig, LoggingConfig, TrainingConfig};
pub use evidence::{
    CompatibilityData, ConflictSeverity, ConflictTrainingData, HistoricalData, ReportedConflict,
    SessionOutcome, Severity, TestedVersions,
};
pub use plugin::{
    EspFile, EspRecord, FormId, LinkedRecord, QuestObjective, QuestPrerequisite, QuestRecord,
    format_form_id,
};
pub use telemetry::{
    HardwareProfile, MemoryData, MemorySnapshot, ModId, PerformanceData, PerformanceMetric,
};
