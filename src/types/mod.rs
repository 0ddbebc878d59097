//! Type definitions for the classification pipeline

pub mod report;
pub mod sample;

pub use report::{ClassScore, ClassificationReport, ConfidenceLevel, ConfidenceThresholds};
pub use sample::FeatureSample;
