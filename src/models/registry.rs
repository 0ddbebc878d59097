//! Class label registry

use crate::models::loader::LoadError;
use std::collections::HashSet;

/// Label returned for indices outside the registry
pub const UNKNOWN_CLASS: &str = "Unknown";

/// Ordered, unique class labels. The position of a label is its class index.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassRegistry {
    labels: Vec<String>,
}

impl ClassRegistry {
    /// Build a registry, rejecting empty, blank or duplicate labels
    pub fn new(labels: Vec<String>) -> Result<Self, LoadError> {
        if labels.is_empty() {
            return Err(LoadError::EmptyModel("no classes"));
        }

        let mut seen = HashSet::with_capacity(labels.len());
        for label in &labels {
            if label.trim().is_empty() {
                return Err(LoadError::InvalidParameter {
                    field: "classes".to_string(),
                    reason: "empty class label".to_string(),
                });
            }
            if !seen.insert(label.as_str()) {
                return Err(LoadError::InvalidParameter {
                    field: "classes".to_string(),
                    reason: format!("duplicate class label '{}'", label),
                });
            }
        }

        Ok(Self { labels })
    }

    /// Label for a class index, or [`UNKNOWN_CLASS`] when out of range
    pub fn class_name(&self, idx: usize) -> &str {
        self.labels
            .get(idx)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_CLASS)
    }

    /// Number of classes (C)
    pub fn num_classes(&self) -> usize {
        self.labels.len()
    }

    /// Reverse lookup of a label
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// Labels in class-index order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}
