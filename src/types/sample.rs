//! Feature samples submitted for classification

use crate::models::params::FEATURE_COUNT;
use serde::{Deserialize, Deserializer, Serialize};

/// One feature vector to classify.
///
/// Features are the six curvature angles in model order
/// (`ccx, tcx, tcz, lcx, lcz, scx`). A `null` entry marks a missing
/// reading and is carried as NaN, which the classifier reports as an
/// all-NaN score vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSample {
    /// Caller-supplied identifier, echoed in the report
    #[serde(alias = "id")]
    pub sample_id: String,

    #[serde(deserialize_with = "features_with_gaps")]
    pub features: [f32; FEATURE_COUNT],
}

impl FeatureSample {
    pub fn new(sample_id: impl Into<String>, features: [f32; FEATURE_COUNT]) -> Self {
        Self {
            sample_id: sample_id.into(),
            features,
        }
    }

    /// Any feature missing (NaN)
    pub fn has_missing(&self) -> bool {
        self.features.iter().any(|f| f.is_nan())
    }
}

fn features_with_gaps<'de, D>(deserializer: D) -> Result<[f32; FEATURE_COUNT], D::Error>
where
    D: Deserializer<'de>,
{
    let raw = <[Option<f32>; FEATURE_COUNT]>::deserialize(deserializer)?;
    Ok(raw.map(|v| v.unwrap_or(f32::NAN)))
}
