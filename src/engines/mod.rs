//! Leaf analysis engines.
//!
//! Each engine is a plain synchronous struct. The stateful ones (pattern
//! table, conflict model, compatibility matrix) keep that state in a
//! [`SharedState`](crate::state::SharedState); the rest are pure functions
//! of their input. Concurrency lives in the
//! [`AnalysisOrchestrator`](crate::orchestrator::AnalysisOrchestrator).

pub mod bottleneck;
pub mod cancel;
pub mod compatibility;
pub mod conflict;
pub mod content;
pub mod graph;
pub mod keywords;
pub mod memory;
pub mod pattern;
pub mod quest;
pub mod stats;

pub use bottleneck::{
    BottleneckAnalysis, BottleneckMiningEngine, BottleneckType, PerformanceBottleneck,
};
pub use cancel::CancelSignal;
pub use compatibility::{CompatibilityMatrix, CompatibilityMiningEngine, CompatibilityScore};
pub use conflict::{ConflictModel, ConflictPrediction, ConflictPredictionEngine};
pub use content::{ContentAnalysis, ContentRelationshipMiner};
pub use graph::{DependencyGraph, DependencyGraphEngine, EdgeType, GraphEntity};
pub use memory::{KeywordEstimator, MemoryAnalysis, MemoryAnalysisEngine, UsageEstimator};
pub use pattern::{PatternAnalysis, PatternRecognitionEngine};
pub use quest::{QuestAnalysis, QuestDependencyMiner};
