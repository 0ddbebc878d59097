//! Spinal Posture Classifier Library
//!
//! Evaluates a pretrained Takagi–Sugeno–Kang ANFIS model against six
//! spinal curvature features and reports a class with per-class scores.

pub mod config;
pub mod consumer;
pub mod metrics;
pub mod models;
pub mod producer;
pub mod types;

pub use config::AppConfig;
pub use consumer::SampleReader;
pub use models::{
    ClassRegistry, InferenceEngine, LoadError, ModelHandle, ModelLoader, ModelParameters,
    Prediction, PredictionError,
};
pub use producer::ReportWriter;
pub use types::{report::ClassificationReport, sample::FeatureSample};
