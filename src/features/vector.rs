//! Ordered, named feature vector — the contract between feature assembly and
//! the prediction service.
//!
//! Insertion order is preserved so the positional fallback in the prediction
//! service is deterministic. Values are plain f64, so the "no nulls" rule is
//! enforced by construction; `sanitize` additionally clamps non-finite values
//! left over from bad upstream data.

use std::collections::HashMap;

/// Bumped whenever the feature layout changes incompatibly. Carried on every
/// vector so artifacts can start refusing mismatched inputs once they record
/// the version they were trained against; current artifacts do not yet.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Default)]
pub struct FeatureVector {
    names: Vec<String>,
    values: Vec<f64>,
    index: HashMap<String, usize>,
    pub schema_version: u32,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self {
            names: Vec::new(),
            values: Vec::new(),
            index: HashMap::new(),
            schema_version: SCHEMA_VERSION,
        }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            names: Vec::with_capacity(cap),
            values: Vec::with_capacity(cap),
            index: HashMap::with_capacity(cap),
            schema_version: SCHEMA_VERSION,
        }
    }

    /// Insert a feature, overwriting in place if the name already exists.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        match self.index.get(&name) {
            Some(&i) => self.values[i] = value,
            None => {
                self.index.insert(name.clone(), self.values.len());
                self.names.push(name);
                self.values.push(value);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.index.get(name).map(|&i| self.values[i])
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Replace NaN/inf values with 0.0. Returns how many were clamped.
    pub fn sanitize(&mut self) -> usize {
        let mut clamped = 0;
        for v in &mut self.values {
            if !v.is_finite() {
                *v = 0.0;
                clamped += 1;
            }
        }
        clamped
    }
}
