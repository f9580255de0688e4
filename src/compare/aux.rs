//! Auxiliary key/value information (phone, birth year, parcel id, ...).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Comparable, CompareContext};
use crate::error::CompareError;
use crate::similarity::normalize;

/// Free-form key/value facts compared key by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuxBundle {
    /// Values by key.
    pub values: BTreeMap<String, String>,
}

impl AuxBundle {
    /// An empty bundle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy with `key` set to `value`.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

impl Comparable for AuxBundle {
    /// Mean similarity over keys carrying a value on both sides.
    fn compare(&self, other: &Self, ctx: &CompareContext<'_>) -> Result<Option<f64>, CompareError> {
        let scores: Vec<f64> = self
            .values
            .iter()
            .filter_map(|(key, a)| {
                let b = other.values.get(key)?;
                let (a, b) = (normalize(a), normalize(b));
                if a.is_empty() || b.is_empty() {
                    return None;
                }
                Some(ctx.similarity().similarity_normalized(&a, &b))
            })
            .collect();
        if scores.is_empty() {
            return Ok(None);
        }
        #[allow(clippy::cast_precision_loss)]
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        Ok(Some(mean))
    }
}
