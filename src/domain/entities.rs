//! Fetched leaderboard rows.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One player, score or beatmap row: numeric metrics plus textual attributes.
///
/// Records are read-only once fetched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub metrics: BTreeMap<String, Option<f64>>,
}

impl EntityRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: impl Into<Option<f64>>) -> Self {
        self.metrics.insert(name.into(), value.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Metric value; `None` when absent, null or not finite.
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics
            .get(name)
            .copied()
            .flatten()
            .filter(|value| value.is_finite())
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// A field rendered as text, for joining records on shared identifiers.
    ///
    /// Attributes win over metrics; integral metrics render without a fraction.
    pub fn field_text(&self, name: &str) -> Option<String> {
        if let Some(text) = self.attribute(name) {
            return Some(text.to_string());
        }
        self.metric(name).map(|value| {
            if value.fract() == 0.0 && value.abs() < 1e15 {
                format!("{}", value as i64)
            } else {
                value.to_string()
            }
        })
    }
}
