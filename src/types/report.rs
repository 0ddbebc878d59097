//! Classification report data structures

use crate::models::inference::Prediction;
use crate::models::registry::ClassRegistry;
use crate::models::scoring::ranked;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Confidence classification of the winning score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    /// Determine confidence level from score and thresholds. NaN is `Low`.
    pub fn from_score(score: f32, thresholds: &ConfidenceThresholds) -> Self {
        if score >= thresholds.high {
            ConfidenceLevel::High
        } else if score >= thresholds.medium {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

/// Configurable confidence level thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceThresholds {
    pub medium: f32,
    pub high: f32,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            medium: 0.5,
            high: 0.8,
        }
    }
}

/// A labelled score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassScore {
    pub label: String,
    #[serde(deserialize_with = "score_or_nan")]
    pub score: f32,
}

/// Report emitted for every classified sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationReport {
    /// Unique report identifier
    pub report_id: String,

    /// Sample the report belongs to
    pub sample_id: String,

    /// Winning class index
    pub class_index: usize,

    /// Winning class label
    pub label: String,

    /// Score of the winning class
    #[serde(deserialize_with = "score_or_nan")]
    pub confidence: f32,

    pub confidence_level: ConfidenceLevel,

    /// Every class score, in class-index order
    pub scores: Vec<ClassScore>,

    /// Highest-ranked classes, best first
    pub top: Vec<ClassScore>,

    /// No rule fired; all classes tie
    pub degenerate: bool,

    /// Scores are NaN and the label must not be trusted
    pub nan_poisoned: bool,

    /// Report generation timestamp
    pub timestamp: DateTime<Utc>,
}

impl ClassificationReport {
    /// Create a report from a prediction
    pub fn new(
        sample_id: String,
        prediction: &Prediction,
        classes: &ClassRegistry,
        thresholds: &ConfidenceThresholds,
    ) -> Self {
        let confidence = prediction.confidence();
        let scores = prediction
            .scores
            .iter()
            .enumerate()
            .map(|(idx, &score)| ClassScore {
                label: classes.class_name(idx).to_string(),
                score,
            })
            .collect();

        Self {
            report_id: uuid::Uuid::new_v4().to_string(),
            sample_id,
            class_index: prediction.class_index,
            label: classes.class_name(prediction.class_index).to_string(),
            confidence,
            confidence_level: ConfidenceLevel::from_score(confidence, thresholds),
            scores,
            top: Vec::new(),
            degenerate: prediction.degenerate,
            nan_poisoned: prediction.is_nan_poisoned(),
            timestamp: Utc::now(),
        }
    }

    /// Fill `top` with the `k` best classes
    pub fn with_top_k(mut self, k: usize) -> Self {
        let values: Vec<f32> = self.scores.iter().map(|s| s.score).collect();
        self.top = ranked(&values, k)
            .into_iter()
            .map(|idx| self.scores[idx].clone())
            .collect();
        self
    }
}

/// NaN scores are written as `null`; read them back as NaN
fn score_or_nan<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f32>::deserialize(deserializer)?.unwrap_or(f32::NAN))
}
