//! Pairwise conflict prediction.
//!
//! An untrained engine answers from a name-similarity heuristic capped at
//! 0.5. Once trained, it scores a fixed feature vector with a seeded
//! logistic model ([`LinearModel`]) and derives conflict types and severity
//! from the individual features.
//!
//! The [`ConflictModel`] lives in a [`SharedState`]: `predict` works on one
//! snapshot for its whole duration, `train` publishes a complete replacement.

use crate::engines::cancel::CancelSignal;
use crate::engines::keywords::{self, ModCategory};
use crate::error::{AnalysisError, Result};
use crate::models::{ConflictSeverity, ConflictTrainingData, ModId, TrainingConfig};
use crate::state::{SharedState, StateChange};
use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;

pub const FEATURE_COUNT: usize = 8;

/// Feature names, in vector order
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "name_similarity",
    "name_overlap",
    "historical_conflict_rate",
    "same_category",
    "mod_a_complexity",
    "mod_b_complexity",
    "script_conflict_potential",
    "asset_conflict_potential",
];

/// Historical rate used for pairs with no labelled history
const NEUTRAL_HISTORICAL_RATE: f64 = 0.5;

/// Minimum labelled samples before a hold-out evaluation is meaningful
const MIN_EVALUATION_SAMPLES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector(pub [f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn name_similarity(&self) -> f64 {
        self.0[0]
    }
    pub fn historical_conflict_rate(&self) -> f64 {
        self.0[2]
    }
    pub fn max_complexity(&self) -> f64 {
        self.0[4].max(self.0[5])
    }
    pub fn script_conflict_potential(&self) -> f64 {
        self.0[6]
    }
    pub fn asset_conflict_potential(&self) -> f64 {
        self.0[7]
    }
}

/// Gradient-descent hyperparameters for [`LinearModel::train`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingParams {
    pub learning_rate: f64,
    pub max_epochs: usize,
    pub early_stop_mse: f64,
    pub seed: u64,
}

impl From<&TrainingConfig> for TrainingParams {
    fn from(config: &TrainingConfig) -> Self {
        Self {
            learning_rate: config.learning_rate,
            max_epochs: config.max_epochs,
            early_stop_mse: config.early_stop_mse,
            seed: config.seed,
        }
    }
}

/// Logistic regression over [`FeatureVector`]s
#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel {
    pub weights: [f64; FEATURE_COUNT],
    pub bias: f64,
}

impl LinearModel {
    /// Fit with full-batch gradient descent
    ///
    /// Weights start uniformly in [-0.5, 0.5) from `params.seed`, so the same
    /// samples and params always produce the same model. Stops at
    /// `max_epochs` or once the epoch MSE drops below `early_stop_mse`.
    pub fn train(
        samples: &[(FeatureVector, bool)],
        params: &TrainingParams,
        cancel: &CancelSignal,
    ) -> Result<Self> {
        if samples.is_empty() {
            return Err(AnalysisError::EmptyDataset {
                what: "conflict training samples",
            });
        }

        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut model = LinearModel {
            weights: std::array::from_fn(|_| rng.gen_range(-0.5..0.5)),
            bias: rng.gen_range(-0.5..0.5),
        };

        let n = samples.len() as f64;
        for epoch in 0..params.max_epochs {
            cancel.check("conflict model training")?;

            let mut weight_gradient = [0.0; FEATURE_COUNT];
            let mut bias_gradient = 0.0;
            let mut squared_error = 0.0;
            for (features, label) in samples {
                let target = if *label { 1.0 } else { 0.0 };
                let error = model.predict(features) - target;
                for (gradient, value) in weight_gradient.iter_mut().zip(features.0) {
                    *gradient += error * value;
                }
                bias_gradient += error;
                squared_error += error * error;
            }

            for (weight, gradient) in model.weights.iter_mut().zip(weight_gradient) {
                *weight -= params.learning_rate * gradient / n;
            }
            model.bias -= params.learning_rate * bias_gradient / n;

            if squared_error / n < params.early_stop_mse {
                tracing::debug!(epoch, "Conflict model converged early");
                break;
            }
        }

        Ok(model)
    }

    /// Conflict probability in [0, 1]
    pub fn predict(&self, features: &FeatureVector) -> f64 {
        let logit = self
            .weights
            .iter()
            .zip(features.0)
            .map(|(weight, value)| weight * value)
            .sum::<f64>()
            + self.bias;
        1.0 / (1.0 + (-logit).exp())
    }
}

/// Labelled outcomes for one unordered mod pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairHistory {
    pub mod_a: ModId,
    pub mod_b: ModId,
    pub conflicts: usize,
    pub total: usize,
}

impl PairHistory {
    pub fn conflict_rate(&self) -> f64 {
        if self.total == 0 {
            return NEUTRAL_HISTORICAL_RATE;
        }
        self.conflicts as f64 / self.total as f64
    }
}

fn pair_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{}|{}", a, b)
    } else {
        format!("{}|{}", b, a)
    }
}

/// Persistent state of the classifier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConflictModel {
    pub trained: bool,
    pub feature_weights: IndexMap<String, f64>,
    pub bias: f64,
    /// Hold-out accuracy; 0 when trained on fewer than ten samples
    pub accuracy: f64,
    pub training_size: usize,
    /// Milliseconds since the Unix epoch
    pub last_trained: u64,
    /// Keyed by `"a|b"` with the names sorted
    pub pair_history: IndexMap<String, PairHistory>,
}

impl ConflictModel {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    fn linear(&self) -> LinearModel {
        LinearModel {
            weights: std::array::from_fn(|i| {
                self.feature_weights
                    .get(FEATURE_NAMES[i])
                    .copied()
                    .unwrap_or_default()
            }),
            bias: self.bias,
        }
    }

    fn history_rate(&self, a: &str, b: &str) -> Option<f64> {
        self.pair_history
            .get(&pair_key(a, b))
            .map(PairHistory::conflict_rate)
    }

    fn features(&self, a: &str, b: &str) -> FeatureVector {
        FeatureVector([
            keywords::name_similarity(a, b),
            keywords::name_overlap(a, b),
            self.history_rate(a, b).unwrap_or(NEUTRAL_HISTORICAL_RATE),
            if keywords::same_category(a, b) { 1.0 } else { 0.0 },
            keywords::complexity(a),
            keywords::complexity(b),
            keywords::script_conflict_potential(a, b),
            keywords::asset_conflict_potential(a, b),
        ])
    }
}

fn build_history(dataset: &[ConflictTrainingData]) -> IndexMap<String, PairHistory> {
    let mut history: IndexMap<String, PairHistory> = IndexMap::new();
    for sample in dataset {
        let entry = history
            .entry(pair_key(&sample.mod_a, &sample.mod_b))
            .or_insert_with(|| PairHistory {
                mod_a: sample.mod_a.clone(),
                mod_b: sample.mod_b.clone(),
                conflicts: 0,
                total: 0,
            });
        entry.total += 1;
        if sample.conflict {
            entry.conflicts += 1;
        }
    }
    history
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    Override,
    Script,
    LoadOrder,
    Resource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedConflictType {
    pub conflict_type: ConflictType,
    pub description: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    Historical,
    Similarity,
    Pattern,
    RuleBased,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictEvidence {
    pub kind: EvidenceKind,
    pub description: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictPrediction {
    pub mod_a: ModId,
    pub mod_b: ModId,
    pub probability: f64,
    pub conflict_types: Vec<PredictedConflictType>,
    pub severity: ConflictSeverity,
    pub evidence: Vec<ConflictEvidence>,
    pub recommendations: Vec<String>,
}

/// Severity from the mean confidence of the predicted conflict types
pub fn severity_for(conflict_types: &[PredictedConflictType]) -> ConflictSeverity {
    if conflict_types.is_empty() {
        return ConflictSeverity::Minor;
    }
    let mean = conflict_types.iter().map(|t| t.confidence).sum::<f64>()
        / conflict_types.len() as f64;
    if mean > 0.8 {
        ConflictSeverity::Critical
    } else if mean > 0.6 {
        ConflictSeverity::Major
    } else {
        ConflictSeverity::Minor
    }
}

/// Trainable pairwise conflict classifier
pub struct ConflictPredictionEngine {
    model: SharedState<ConflictModel>,
    params: TrainingParams,
}

impl ConflictPredictionEngine {
    pub fn new(training: &TrainingConfig) -> Self {
        Self {
            model: SharedState::default(),
            params: training.into(),
        }
    }

    /// Report training runs on a shared event channel
    pub fn with_events(training: &TrainingConfig, events: broadcast::Sender<StateChange>) -> Self {
        Self {
            model: SharedState::with_events(ConflictModel::default(), events),
            params: training.into(),
        }
    }

    pub fn predict(&self, mod_a: &str, mod_b: &str) -> ConflictPrediction {
        let model = self.model.snapshot();
        if !model.trained {
            return fallback_prediction(mod_a, mod_b);
        }

        let features = model.features(mod_a, mod_b);
        let probability = model.linear().predict(&features);
        let conflict_types = predict_conflict_types(&features);
        let severity = severity_for(&conflict_types);
        let evidence = gather_evidence(&model, mod_a, mod_b, &features);
        let recommendations = recommendations(mod_a, mod_b, probability, &conflict_types);

        ConflictPrediction {
            mod_a: mod_a.to_string(),
            mod_b: mod_b.to_string(),
            probability,
            conflict_types,
            severity,
            evidence,
            recommendations,
        }
    }

    /// Train a new model and publish it atomically
    ///
    /// With at least ten samples the last 20% are held out for accuracy;
    /// otherwise everything is used for training and accuracy is 0. Readers
    /// keep seeing the previous model until this returns.
    pub fn train(
        &self,
        dataset: &[ConflictTrainingData],
        cancel: &CancelSignal,
    ) -> Result<Arc<ConflictModel>> {
        if dataset.is_empty() {
            return Err(AnalysisError::EmptyDataset {
                what: "conflict training data",
            });
        }

        let (train_split, test_split) = if dataset.len() >= MIN_EVALUATION_SAMPLES {
            let test_size = dataset.len() / 5;
            dataset.split_at(dataset.len() - test_size)
        } else {
            (dataset, &dataset[dataset.len()..])
        };

        // Features see only the history of the split they were trained on
        let mut next = ConflictModel {
            pair_history: build_history(train_split),
            ..Default::default()
        };
        let samples: Vec<(FeatureVector, bool)> = train_split
            .iter()
            .map(|s| (next.features(&s.mod_a, &s.mod_b), s.conflict))
            .collect();

        let linear = LinearModel::train(&samples, &self.params, cancel)?;

        next.trained = true;
        next.feature_weights = FEATURE_NAMES
            .iter()
            .zip(linear.weights)
            .map(|(name, weight)| (name.to_string(), weight))
            .collect();
        next.bias = linear.bias;
        next.training_size = dataset.len();
        next.last_trained = now_ms();
        next.accuracy = evaluate(&next, &linear, test_split);

        tracing::info!(
            training_size = next.training_size,
            accuracy = next.accuracy,
            "Conflict model trained"
        );

        let change = StateChange::ModelTrained {
            training_size: next.training_size,
            accuracy: next.accuracy,
        };
        Ok(self.model.replace(next, vec![change]))
    }

    /// Current model, trained or not
    pub fn model_status(&self) -> Arc<ConflictModel> {
        self.model.snapshot()
    }

    /// Install a previously persisted model
    pub fn load_model(&self, model: ConflictModel) {
        let change = StateChange::ModelTrained {
            training_size: model.training_size,
            accuracy: model.accuracy,
        };
        self.model.replace(model, vec![change]);
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

fn evaluate(model: &ConflictModel, linear: &LinearModel, test: &[ConflictTrainingData]) -> f64 {
    if test.is_empty() {
        return 0.0;
    }
    let correct = test
        .iter()
        .filter(|sample| {
            let features = model.features(&sample.mod_a, &sample.mod_b);
            (linear.predict(&features) > 0.5) == sample.conflict
        })
        .count();
    correct as f64 / test.len() as f64
}

fn fallback_prediction(mod_a: &str, mod_b: &str) -> ConflictPrediction {
    let similarity = keywords::name_similarity(mod_a, mod_b);
    let probability = (similarity * 0.8).min(0.5);

    let conflict_types = if probability > 0.3 {
        vec![PredictedConflictType {
            conflict_type: ConflictType::Override,
            description: "Potential conflicts based on mod name similarity".to_string(),
            confidence: probability,
        }]
    } else {
        Vec::new()
    };
    let recommendations = if probability > 0.3 {
        vec![
            "Test thoroughly before using together".to_string(),
            "Monitor for override conflicts".to_string(),
        ]
    } else {
        vec!["Should be safe to use together".to_string()]
    };

    ConflictPrediction {
        mod_a: mod_a.to_string(),
        mod_b: mod_b.to_string(),
        probability,
        conflict_types,
        severity: if probability > 0.4 {
            ConflictSeverity::Major
        } else {
            ConflictSeverity::Minor
        },
        evidence: vec![ConflictEvidence {
            kind: EvidenceKind::RuleBased,
            description: format!("Name similarity: {:.1}%", similarity * 100.0),
            weight: similarity,
        }],
        recommendations,
    }
}

fn predict_conflict_types(features: &FeatureVector) -> Vec<PredictedConflictType> {
    let mut types = Vec::new();

    let override_confidence = features.asset_conflict_potential();
    if override_confidence > 0.3 {
        types.push(PredictedConflictType {
            conflict_type: ConflictType::Override,
            description: "Potential mesh/texture override conflicts".to_string(),
            confidence: override_confidence,
        });
    }

    let script_confidence = features.script_conflict_potential();
    if script_confidence > 0.4 {
        types.push(PredictedConflictType {
            conflict_type: ConflictType::Script,
            description: "Potential Papyrus script conflicts".to_string(),
            confidence: script_confidence,
        });
    }

    let load_order_confidence = features.historical_conflict_rate();
    if load_order_confidence > 0.5 {
        types.push(PredictedConflictType {
            conflict_type: ConflictType::LoadOrder,
            description: "Load order dependency conflicts".to_string(),
            confidence: load_order_confidence,
        });
    }

    let resource_confidence = features.max_complexity();
    if resource_confidence > 0.7 {
        types.push(PredictedConflictType {
            conflict_type: ConflictType::Resource,
            description: "High resource usage may cause performance conflicts".to_string(),
            confidence: resource_confidence * 0.8,
        });
    }

    types
}

fn gather_evidence(
    model: &ConflictModel,
    mod_a: &str,
    mod_b: &str,
    features: &FeatureVector,
) -> Vec<ConflictEvidence> {
    let mut evidence = Vec::new();

    if let Some(rate) = model.history_rate(mod_a, mod_b).filter(|rate| *rate > 0.0) {
        evidence.push(ConflictEvidence {
            kind: EvidenceKind::Historical,
            description: format!(
                "{:.1}% of recorded sessions with this pair had conflicts",
                rate * 100.0
            ),
            weight: rate,
        });
    }

    let similarity = features.name_similarity();
    if similarity > 0.5 {
        evidence.push(ConflictEvidence {
            kind: EvidenceKind::Similarity,
            description: format!(
                "High name similarity ({:.1}%) suggests potential conflicts",
                similarity * 100.0
            ),
            weight: similarity * 0.8,
        });
    }

    let similar = |known: &str, name: &str| keywords::name_similarity(known, name) > 0.3;
    let similar_pairs = model
        .pair_history
        .values()
        .filter(|pair| pair.conflicts > 0)
        .filter(|pair| {
            (similar(&pair.mod_a, mod_a) || similar(&pair.mod_b, mod_a))
                && (similar(&pair.mod_a, mod_b) || similar(&pair.mod_b, mod_b))
        })
        .count();
    if similar_pairs > 0 {
        evidence.push(ConflictEvidence {
            kind: EvidenceKind::Pattern,
            description: format!(
                "Found {} similar conflict patterns in historical data",
                similar_pairs
            ),
            weight: (similar_pairs as f64 * 0.1).min(0.5),
        });
    }

    evidence.extend(conflict_rules(mod_a, mod_b));
    evidence
}

fn conflict_rules(mod_a: &str, mod_b: &str) -> Vec<ConflictEvidence> {
    let mut rules = Vec::new();
    let rule = |description: &str, weight: f64| ConflictEvidence {
        kind: EvidenceKind::RuleBased,
        description: description.to_string(),
        weight,
    };

    if keywords::is_skse(mod_a) && keywords::is_skse(mod_b) {
        rules.push(rule(
            "Both mods are SKSE plugins - potential compatibility issues",
            0.6,
        ));
    }
    if keywords::is_enb(mod_a) && keywords::is_enb(mod_b) {
        rules.push(rule(
            "Multiple ENB presets should not be used together",
            0.9,
        ));
    }
    if keywords::categorize(mod_a) == ModCategory::Environment
        && keywords::categorize(mod_b) == ModCategory::Environment
    {
        rules.push(rule(
            "Multiple weather/environment mods may conflict",
            0.4,
        ));
    }

    rules
}

fn recommendations(
    mod_a: &str,
    mod_b: &str,
    probability: f64,
    conflict_types: &[PredictedConflictType],
) -> Vec<String> {
    let mut recommendations = Vec::new();

    if probability > 0.8 {
        recommendations.push(format!(
            "High conflict risk detected. Consider using only one of: {} or {}",
            mod_a, mod_b
        ));
    } else if probability > 0.6 {
        recommendations
            .push("Moderate conflict risk. Test thoroughly and monitor for issues".to_string());
    }

    for conflict_type in conflict_types {
        let advice = match conflict_type.conflict_type {
            ConflictType::Override => {
                "Check for mesh/texture overrides and use texture merge patches if needed"
            }
            ConflictType::Script => "Monitor Papyrus logs for script conflicts during gameplay",
            ConflictType::LoadOrder => "Ensure proper load order using LOOT or manual ordering",
            ConflictType::Resource => {
                "Monitor system resources and consider disabling one mod \
                 if performance issues occur"
            }
        };
        recommendations.push(advice.to_string());
    }

    recommendations
}
