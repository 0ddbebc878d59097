//! ANFIS model components

pub mod handle;
pub mod inference;
pub mod loader;
pub mod params;
pub mod registry;
pub mod scoring;

pub use handle::ModelHandle;
pub use inference::{predict, InferenceEngine, Prediction, PredictionError};
pub use loader::{LoadError, ModelLoader};
pub use params::{ModelParameters, FEATURE_COUNT, MF_COUNT};
pub use registry::{ClassRegistry, UNKNOWN_CLASS};
