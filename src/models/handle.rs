//! Swappable handle to the active model

use crate::models::loader::{LoadError, ModelLoader};
use crate::models::params::ModelParameters;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{error, info};

/// Holds the active [`ModelParameters`].
///
/// Readers take an `Arc` snapshot and evaluate against it without holding
/// the lock, so a reload never mixes parameters from two models. Reloads
/// parse first and swap only on success.
pub struct ModelHandle {
    current: RwLock<Option<Arc<ModelParameters>>>,
    /// Bumped on every successful swap
    generation: AtomicU64,
}

impl ModelHandle {
    /// Handle with no model loaded
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Handle with an initial model
    pub fn with_model(params: ModelParameters) -> Self {
        let handle = Self::new();
        handle.replace(params);
        handle
    }

    /// Current model, if any
    pub fn snapshot(&self) -> Option<Arc<ModelParameters>> {
        // The guarded value is a single Arc; a poisoned lock still holds a whole one.
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Number of successful swaps so far
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Install a new model, returning the previous one
    pub fn replace(&self, params: ModelParameters) -> Option<Arc<ModelParameters>> {
        self.swap(Arc::new(params)).0
    }

    /// Swap `next` in, returning the previous model and the generation `next` received.
    /// The counter moves under the write guard so generations follow swap order.
    fn swap(&self, next: Arc<ModelParameters>) -> (Option<Arc<ModelParameters>>, u64) {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let previous = current.replace(next);
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        (previous, generation)
    }

    /// Parse `bytes` and swap the result in. On failure the active model is kept.
    pub fn reload_from_bytes(
        &self,
        loader: &ModelLoader,
        bytes: &[u8],
    ) -> Result<Arc<ModelParameters>, LoadError> {
        let params = loader.parse(bytes).map_err(|e| {
            error!(error = %e, "Model reload failed, keeping active model");
            e
        })?;
        Ok(self.install(params))
    }

    /// Load a model file and swap it in. On failure the active model is kept.
    pub fn reload_from_path<P: AsRef<Path>>(
        &self,
        loader: &ModelLoader,
        path: P,
    ) -> Result<Arc<ModelParameters>, LoadError> {
        let params = loader.load_from_path(path.as_ref()).map_err(|e| {
            error!(path = %path.as_ref().display(), error = %e, "Model reload failed, keeping active model");
            e
        })?;
        Ok(self.install(params))
    }

    fn install(&self, params: ModelParameters) -> Arc<ModelParameters> {
        let active = Arc::new(params);
        let (_, generation) = self.swap(Arc::clone(&active));
        info!(
            generation = generation,
            classes = active.num_classes(),
            rules = active.num_rules(),
            "Active model replaced"
        );
        active
    }
}

impl Default for ModelHandle {
    fn default() -> Self {
        Self::new()
    }
}
