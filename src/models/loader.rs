//! ANFIS model loader
//!
//! Parses the JSON export of a trained model into [`ModelParameters`]:
//!
//! ```json
//! {
//!   "features": ["ccx", "tcx", "tcz", "lcx", "lcz", "scx"],
//!   "classes": ["Normal", "Kyphosis", ...],
//!   "scaler_mean": [6], "scaler_scale": [6],
//!   "premise": { "center": [6][2], "sigma": [6][2] },
//!   "rules": { "index": [R][6] },
//!   "consequents": [C][R][7]
//! }
//! ```
//!
//! `features` is optional. A class whose consequent row count differs from
//! R is rejected; rows are never padded or truncated.

use crate::models::params::{
    Consequent, ModelParameters, Premise, RuleIndex, Scaler, FEATURE_COUNT, MF_COUNT,
};
use crate::models::registry::ClassRegistry;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Default upper bound on a serialized model
pub const DEFAULT_MAX_MODEL_BYTES: usize = 4 * 1024 * 1024;

/// Errors raised while loading a model. None of them leave partial state behind.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Malformed model input: {0}")]
    MalformedInput(String),
    #[error("Missing field: {0}")]
    MissingField(String),
    #[error("Dimension mismatch in {field}: expected {expected}, found {found}")]
    DimensionMismatch {
        field: String,
        expected: usize,
        found: usize,
    },
    #[error("Empty model: {0}")]
    EmptyModel(&'static str),
    #[error("Invalid parameter {field}: {reason}")]
    InvalidParameter { field: String, reason: String },
    #[error("Failed to read model file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Loader for serialized ANFIS models
pub struct ModelLoader {
    /// Inputs larger than this are rejected before parsing
    max_bytes: usize,
}

impl ModelLoader {
    /// Create a loader with the default size limit
    pub fn new() -> Self {
        Self::with_max_bytes(DEFAULT_MAX_MODEL_BYTES)
    }

    /// Create a loader with a custom size limit
    pub fn with_max_bytes(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    /// Load a model from a JSON file
    pub fn load_from_path<P: AsRef<Path>>(&self, path: P) -> Result<ModelParameters, LoadError> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading ANFIS model");

        let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        self.parse(&bytes)
    }

    /// Parse and validate a serialized model
    pub fn parse(&self, bytes: &[u8]) -> Result<ModelParameters, LoadError> {
        if bytes.len() > self.max_bytes {
            return Err(LoadError::MalformedInput(format!(
                "model is {} bytes, limit is {}",
                bytes.len(),
                self.max_bytes
            )));
        }

        let doc: Value = serde_json::from_slice(bytes)
            .map_err(|e| LoadError::MalformedInput(format!("invalid JSON: {}", e)))?;
        let root = as_object(&doc, "<root>")?;

        let classes = parse_classes(root)?;

        let scaler = Scaler {
            mean: fixed_f32::<FEATURE_COUNT>(field(root, "scaler_mean")?, "scaler_mean")?,
            scale: fixed_f32::<FEATURE_COUNT>(field(root, "scaler_scale")?, "scaler_scale")?,
        };

        let premise_obj = as_object(field(root, "premise")?, "premise")?;
        let premise = Premise {
            center: matrix_f32(nested(premise_obj, "premise", "center")?, "premise.center")?,
            sigma: matrix_f32(nested(premise_obj, "premise", "sigma")?, "premise.sigma")?,
        };

        let rules_obj = as_object(field(root, "rules")?, "rules")?;
        let rules = parse_rules(nested(rules_obj, "rules", "index")?)?;

        let consequents = parse_consequents(field(root, "consequents")?)?;

        let feature_names = match root.get("features") {
            Some(v) => Some(parse_feature_names(v)?),
            None => None,
        };

        let mut params = ModelParameters::new(classes, scaler, premise, rules, consequents)?;
        if let Some(names) = feature_names {
            params = params.with_feature_names(names);
        }

        info!(
            classes = params.num_classes(),
            rules = params.num_rules(),
            "Model loaded: {} classes, {} rules",
            params.num_classes(),
            params.num_rules()
        );
        debug!(labels = ?params.classes().iter().collect::<Vec<_>>(), "Model classes");

        Ok(params)
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn field<'a>(obj: &'a Map<String, Value>, name: &str) -> Result<&'a Value, LoadError> {
    obj.get(name)
        .ok_or_else(|| LoadError::MissingField(name.to_string()))
}

fn nested<'a>(obj: &'a Map<String, Value>, parent: &str, name: &str) -> Result<&'a Value, LoadError> {
    obj.get(name)
        .ok_or_else(|| LoadError::MissingField(format!("{}.{}", parent, name)))
}

fn as_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, LoadError> {
    value
        .as_object()
        .ok_or_else(|| LoadError::MalformedInput(format!("{} must be an object", path)))
}

fn as_array<'a>(value: &'a Value, path: &str) -> Result<&'a [Value], LoadError> {
    value
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| LoadError::MalformedInput(format!("{} must be an array", path)))
}

fn as_f32(value: &Value, path: &str) -> Result<f32, LoadError> {
    value
        .as_f64()
        .map(|v| v as f32)
        .ok_or_else(|| LoadError::MalformedInput(format!("{} must be a number", path)))
}

fn fixed_array<'a, const N: usize>(value: &'a Value, path: &str) -> Result<&'a [Value], LoadError> {
    let items = as_array(value, path)?;
    if items.len() != N {
        return Err(LoadError::DimensionMismatch {
            field: path.to_string(),
            expected: N,
            found: items.len(),
        });
    }
    Ok(items)
}

fn fixed_f32<const N: usize>(value: &Value, path: &str) -> Result<[f32; N], LoadError> {
    let items = fixed_array::<N>(value, path)?;
    let mut out = [0.0f32; N];
    for (i, item) in items.iter().enumerate() {
        out[i] = as_f32(item, &format!("{}[{}]", path, i))?;
    }
    Ok(out)
}

fn matrix_f32(value: &Value, path: &str) -> Result<[[f32; MF_COUNT]; FEATURE_COUNT], LoadError> {
    let rows = fixed_array::<FEATURE_COUNT>(value, path)?;
    let mut out = [[0.0f32; MF_COUNT]; FEATURE_COUNT];
    for (i, row) in rows.iter().enumerate() {
        out[i] = fixed_f32::<MF_COUNT>(row, &format!("{}[{}]", path, i))?;
    }
    Ok(out)
}

fn parse_classes(root: &Map<String, Value>) -> Result<ClassRegistry, LoadError> {
    let labels = as_array(field(root, "classes")?, "classes")?
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| LoadError::MalformedInput(format!("classes[{}] must be a string", i)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    ClassRegistry::new(labels)
}

fn parse_rules(value: &Value) -> Result<Vec<RuleIndex>, LoadError> {
    let rows = as_array(value, "rules.index")?;
    let mut rules = Vec::with_capacity(rows.len());

    for (r, row) in rows.iter().enumerate() {
        let path = format!("rules.index[{}]", r);
        let items = fixed_array::<FEATURE_COUNT>(row, &path)?;
        let mut rule: RuleIndex = [0; FEATURE_COUNT];
        for (i, item) in items.iter().enumerate() {
            let idx = item.as_u64().ok_or_else(|| {
                LoadError::MalformedInput(format!("{}[{}] must be a non-negative integer", path, i))
            })?;
            rule[i] = u8::try_from(idx).map_err(|_| LoadError::InvalidParameter {
                field: format!("{}[{}]", path, i),
                reason: format!("membership index {} is not 0 or 1", idx),
            })?;
        }
        rules.push(rule);
    }

    Ok(rules)
}

fn parse_consequents(value: &Value) -> Result<Vec<Vec<Consequent>>, LoadError> {
    as_array(value, "consequents")?
        .iter()
        .enumerate()
        .map(|(c, class_rows)| -> Result<Vec<Consequent>, LoadError> {
            let path = format!("consequents[{}]", c);
            as_array(class_rows, &path)?
                .iter()
                .enumerate()
                .map(|(r, row)| {
                    fixed_f32::<{ FEATURE_COUNT + 1 }>(row, &format!("{}[{}]", path, r))
                        .map(Consequent::from_row)
                })
                .collect()
        })
        .collect()
}

fn parse_feature_names(value: &Value) -> Result<[String; FEATURE_COUNT], LoadError> {
    let items = fixed_array::<FEATURE_COUNT>(value, "features")?;
    let mut names: [String; FEATURE_COUNT] = Default::default();
    for (i, item) in items.iter().enumerate() {
        names[i] = item
            .as_str()
            .ok_or_else(|| LoadError::MalformedInput(format!("features[{}] must be a string", i)))?
            .to_string();
    }
    Ok(names)
}
