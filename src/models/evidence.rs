//! Evidence records and externally reported conflicts.

use super::telemetry::ModId;
use serde::{Deserialize, Serialize};

/// Versions of both mods at the time a compatibility test ran
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestedVersions {
    pub mod_a: String,
    pub mod_b: String,
}

/// A single compatibility observation for a mod pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityData {
    pub mod_a: ModId,
    pub mod_b: ModId,
    pub compatible: bool,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub tested_by: String,
    #[serde(default)]
    pub versions: TestedVersions,
    /// Milliseconds since the Unix epoch
    #[serde(default)]
    pub timestamp: u64,
}

impl CompatibilityData {
    pub fn new(mod_a: impl Into<ModId>, mod_b: impl Into<ModId>, compatible: bool) -> Self {
        Self {
            mod_a: mod_a.into(),
            mod_b: mod_b.into(),
            compatible,
            issues: Vec::new(),
            tested_by: String::new(),
            versions: TestedVersions::default(),
            timestamp: 0,
        }
    }

    pub fn with_issues<I, S>(mut self, issues: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.issues = issues.into_iter().map(Into::into).collect();
        self
    }

    pub fn tested_by(mut self, tester: impl Into<String>, timestamp: u64) -> Self {
        self.tested_by = tester.into();
        self.timestamp = timestamp;
        self
    }

    /// True when this record is about the unordered pair {a, b}
    pub fn concerns(&self, a: &str, b: &str) -> bool {
        (self.mod_a == a && self.mod_b == b) || (self.mod_a == b && self.mod_b == a)
    }
}

/// Labelled example for the conflict classifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictTrainingData {
    pub mod_a: ModId,
    pub mod_b: ModId,
    pub conflict: bool,
}

impl ConflictTrainingData {
    pub fn new(mod_a: impl Into<ModId>, mod_b: impl Into<ModId>, conflict: bool) -> Self {
        Self {
            mod_a: mod_a.into(),
            mod_b: mod_b.into(),
            conflict,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictSeverity {
    Minor,
    Major,
    Critical,
}

/// Four-level severity shared by patterns, anomalies and graph conflicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Conflict reported by an external tool (xEdit, a mod manager, a user)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportedConflict {
    pub conflict_type: String,
    pub conflicting_mod: ModId,
    #[serde(default)]
    pub record_type: String,
    #[serde(default)]
    pub form_ids: Vec<String>,
    pub severity: ConflictSeverity,
}

impl ReportedConflict {
    pub fn new(
        conflicting_mod: impl Into<ModId>,
        record_type: impl Into<String>,
        severity: ConflictSeverity,
    ) -> Self {
        Self {
            conflict_type: "override".to_string(),
            conflicting_mod: conflicting_mod.into(),
            record_type: record_type.into(),
            form_ids: Vec::new(),
            severity,
        }
    }
}

/// Outcome of a past session, used to train the pattern table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalData {
    pub mods: Vec<ModId>,
    pub outcome: SessionOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionOutcome {
    Success,
    Failure,
}

impl SessionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionOutcome::Success => "success",
            SessionOutcome::Failure => "failure",
        }
    }
}
