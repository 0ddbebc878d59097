//! Immutable ANFIS model parameters

use crate::models::loader::LoadError;
use crate::models::registry::ClassRegistry;

/// Number of input features
pub const FEATURE_COUNT: usize = 6;

/// Gaussian membership functions per feature
pub const MF_COUNT: usize = 2;

/// Feature names used when the model file does not carry its own
pub const DEFAULT_FEATURE_NAMES: [&str; FEATURE_COUNT] = ["ccx", "tcx", "tcz", "lcx", "lcz", "scx"];

/// Membership function slot selected per feature by one rule
pub type RuleIndex = [u8; FEATURE_COUNT];

/// Standard-scaler parameters applied to raw features
#[derive(Debug, Clone, PartialEq)]
pub struct Scaler {
    pub mean: [f32; FEATURE_COUNT],
    pub scale: [f32; FEATURE_COUNT],
}

impl Scaler {
    /// `(raw - mean) / scale`, per feature
    #[inline]
    pub fn normalize(&self, raw: &[f32; FEATURE_COUNT]) -> [f32; FEATURE_COUNT] {
        let mut x = [0.0f32; FEATURE_COUNT];
        for i in 0..FEATURE_COUNT {
            x[i] = (raw[i] - self.mean[i]) / self.scale[i];
        }
        x
    }
}

/// Gaussian membership parameters, indexed `[feature][mf]`
#[derive(Debug, Clone, PartialEq)]
pub struct Premise {
    pub center: [[f32; MF_COUNT]; FEATURE_COUNT],
    pub sigma: [[f32; MF_COUNT]; FEATURE_COUNT],
}

/// Affine TSK output of one rule for one class
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Consequent {
    pub bias: f32,
    pub weights: [f32; FEATURE_COUNT],
}

impl Consequent {
    /// Build from a `[bias, w1..w6]` row
    pub fn from_row(row: [f32; FEATURE_COUNT + 1]) -> Self {
        let mut weights = [0.0f32; FEATURE_COUNT];
        weights.copy_from_slice(&row[1..]);
        Self {
            bias: row[0],
            weights,
        }
    }

    /// `bias + Σ w[i] * x[i]`, accumulated in feature order
    #[inline]
    pub fn evaluate(&self, x: &[f32; FEATURE_COUNT]) -> f32 {
        let mut out = self.bias;
        for i in 0..FEATURE_COUNT {
            out += self.weights[i] * x[i];
        }
        out
    }
}

/// A validated, read-only ANFIS model.
///
/// Only constructed through [`ModelParameters::new`] (or the loader, which
/// calls it), so every instance satisfies:
/// - at least one class and one rule
/// - non-zero scale and strictly positive sigma everywhere
/// - rule indices in `0..MF_COUNT`
/// - exactly R consequents for every class
#[derive(Debug, Clone, PartialEq)]
pub struct ModelParameters {
    feature_names: [String; FEATURE_COUNT],
    scaler: Scaler,
    premise: Premise,
    rules: Vec<RuleIndex>,
    /// Class-major `[C][R]`, flattened
    consequents: Vec<Consequent>,
    classes: ClassRegistry,
}

impl ModelParameters {
    pub fn new(
        classes: ClassRegistry,
        scaler: Scaler,
        premise: Premise,
        rules: Vec<RuleIndex>,
        consequents: Vec<Vec<Consequent>>,
    ) -> Result<Self, LoadError> {
        if rules.is_empty() {
            return Err(LoadError::EmptyModel("no rules"));
        }

        validate_scaler(&scaler)?;
        validate_premise(&premise)?;

        for (r, rule) in rules.iter().enumerate() {
            for (i, &mf) in rule.iter().enumerate() {
                if mf as usize >= MF_COUNT {
                    return Err(LoadError::InvalidParameter {
                        field: format!("rules.index[{}][{}]", r, i),
                        reason: format!("membership index {} is not 0 or 1", mf),
                    });
                }
            }
        }

        let num_classes = classes.num_classes();
        let num_rules = rules.len();

        if consequents.len() != num_classes {
            return Err(LoadError::DimensionMismatch {
                field: "consequents".to_string(),
                expected: num_classes,
                found: consequents.len(),
            });
        }

        let mut flat = Vec::with_capacity(num_classes * num_rules);
        for (c, rows) in consequents.into_iter().enumerate() {
            if rows.len() != num_rules {
                return Err(LoadError::DimensionMismatch {
                    field: format!("consequents[{}]", c),
                    expected: num_rules,
                    found: rows.len(),
                });
            }
            for (r, row) in rows.iter().enumerate() {
                if !row.bias.is_finite() || row.weights.iter().any(|w| !w.is_finite()) {
                    return Err(LoadError::InvalidParameter {
                        field: format!("consequents[{}][{}]", c, r),
                        reason: "non-finite coefficient".to_string(),
                    });
                }
            }
            flat.extend(rows);
        }

        Ok(Self {
            feature_names: DEFAULT_FEATURE_NAMES.map(str::to_string),
            scaler,
            premise,
            rules,
            consequents: flat,
            classes,
        })
    }

    /// Replace the default feature names
    pub fn with_feature_names(mut self, names: [String; FEATURE_COUNT]) -> Self {
        self.feature_names = names;
        self
    }

    pub fn feature_names(&self) -> &[String; FEATURE_COUNT] {
        &self.feature_names
    }

    pub fn scaler(&self) -> &Scaler {
        &self.scaler
    }

    pub fn premise(&self) -> &Premise {
        &self.premise
    }

    pub fn rules(&self) -> &[RuleIndex] {
        &self.rules
    }

    /// Number of rules (R)
    pub fn num_rules(&self) -> usize {
        self.rules.len()
    }

    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    /// Number of classes (C)
    pub fn num_classes(&self) -> usize {
        self.classes.num_classes()
    }

    /// Label for a class index, `"Unknown"` when out of range
    pub fn class_name(&self, idx: usize) -> &str {
        self.classes.class_name(idx)
    }

    /// The R consequents of one class, in rule order
    pub fn class_consequents(&self, class: usize) -> &[Consequent] {
        let r = self.rules.len();
        &self.consequents[class * r..(class + 1) * r]
    }
}

fn validate_scaler(scaler: &Scaler) -> Result<(), LoadError> {
    for i in 0..FEATURE_COUNT {
        if !scaler.mean[i].is_finite() {
            return Err(LoadError::InvalidParameter {
                field: format!("scaler_mean[{}]", i),
                reason: "non-finite value".to_string(),
            });
        }
        let s = scaler.scale[i];
        if !s.is_finite() || s == 0.0 {
            return Err(LoadError::InvalidParameter {
                field: format!("scaler_scale[{}]", i),
                reason: format!("scale must be finite and non-zero, got {}", s),
            });
        }
    }
    Ok(())
}

fn validate_premise(premise: &Premise) -> Result<(), LoadError> {
    for i in 0..FEATURE_COUNT {
        for m in 0..MF_COUNT {
            if !premise.center[i][m].is_finite() {
                return Err(LoadError::InvalidParameter {
                    field: format!("premise.center[{}][{}]", i, m),
                    reason: "non-finite value".to_string(),
                });
            }
            let s = premise.sigma[i][m];
            if !s.is_finite() || s <= 0.0 {
                return Err(LoadError::InvalidParameter {
                    field: format!("premise.sigma[{}][{}]", i, m),
                    reason: format!("sigma must be finite and positive, got {}", s),
                });
            }
        }
    }
    Ok(())
}
