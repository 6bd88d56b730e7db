// modmine - Mining and analysis engines for Bethesda mod load orders
//
// Library crate only. Telemetry collection, plugin parsing and any
// presentation layer live with the callers; this crate turns their data
// into analysis reports.

pub mod config;
pub mod engines;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod state;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use engines::CancelSignal;
pub use error::{AnalysisError, Result};
pub use models::{AnalysisConfig, AnalysisData, ModId, TrainingBundle};
pub use orchestrator::{AnalysisOrchestrator, AnalysisReport, RiskLevel};
pub use state::{SharedState, StateChange};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
