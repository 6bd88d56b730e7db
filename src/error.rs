//! Error types surfaced across the analysis boundary.
//!
//! Data-quality problems (short series, malformed records, missing evidence)
//! never end up here: engines degrade to neutral results instead. Only
//! conditions the caller has to react to are modelled as errors.

use thiserror::Error;

/// Errors returned by the analysis engines and the orchestrator
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("No input supplied: mods, metrics, load order and plugins are all empty")]
    EmptyInput,

    #[error("Required data set is empty: {what}")]
    EmptyDataset { what: &'static str },

    #[error("{operation} cancelled")]
    Cancelled { operation: &'static str },

    #[error("Analysis task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
