// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Metric identifiers, values and errors.

pub mod registry;

use serde::Serialize;
use std::fmt::{self, Display};

/// A structured metric identifier: namespace, name and sorted labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MetricId {
    /// Broad category, e.g. `"resources"`.
    pub namespace: String,
    /// Specific name, e.g. `"loads_submitted"`.
    pub name: String,
    /// Key-value labels, kept sorted by key.
    pub labels: Vec<(String, String)>,
}

impl MetricId {
    /// Creates an id without labels.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            labels: Vec::new(),
        }
    }

    /// Adds a label, keeping labels sorted for stable hashing and display.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((key.into(), value.into()));
        self.labels.sort_by(|a, b| a.0.cmp(&b.0));
        self
    }

    /// Returns the label value for `key`, if present.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)?;
        if !self.labels.is_empty() {
            let labels: Vec<String> = self.labels.iter().map(|(k, v)| format!("{k}={v}")).collect();
            write!(f, "[{}]", labels.join(","))?;
        }
        Ok(())
    }
}

/// The kind of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MetricType {
    /// Monotonically increasing count.
    Counter,
    /// Value that goes up and down.
    Gauge,
    /// Distribution of samples over fixed buckets.
    Histogram,
}

/// The current value of a metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MetricValue {
    /// Counter value.
    Counter(u64),
    /// Gauge value.
    Gauge(f64),
    /// Histogram state.
    Histogram {
        /// Number of recorded samples.
        count: u64,
        /// Sum of all recorded samples.
        sum: f64,
        /// Upper bounds of the buckets.
        bucket_bounds: Vec<f64>,
        /// Samples falling at or below each bound (cumulative).
        bucket_counts: Vec<u64>,
    },
}

impl MetricValue {
    /// The [`MetricType`] of this value.
    pub fn metric_type(&self) -> MetricType {
        match self {
            MetricValue::Counter(_) => MetricType::Counter,
            MetricValue::Gauge(_) => MetricType::Gauge,
            MetricValue::Histogram { .. } => MetricType::Histogram,
        }
    }

    /// The counter value, if this is a counter.
    pub fn as_counter(&self) -> Option<u64> {
        match self {
            MetricValue::Counter(v) => Some(*v),
            _ => None,
        }
    }

    /// The gauge value, if this is a gauge.
    pub fn as_gauge(&self) -> Option<f64> {
        match self {
            MetricValue::Gauge(v) => Some(*v),
            _ => None,
        }
    }
}

/// A metric with its description.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    /// Identifier.
    pub id: MetricId,
    /// Human readable description.
    pub description: String,
    /// Unit of measurement (`"count"`, `"ms"`, ...).
    pub unit: String,
    /// Current value.
    pub value: MetricValue,
}

impl Metric {
    /// A counter starting at zero.
    pub fn counter(id: MetricId, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            unit: "count".to_string(),
            value: MetricValue::Counter(0),
        }
    }

    /// A gauge starting at zero.
    pub fn gauge(id: MetricId, description: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            unit: unit.into(),
            value: MetricValue::Gauge(0.0),
        }
    }

    /// An empty histogram with the given bucket bounds.
    pub fn histogram(
        id: MetricId,
        description: impl Into<String>,
        unit: impl Into<String>,
        bucket_bounds: Vec<f64>,
    ) -> Self {
        let bucket_counts = vec![0; bucket_bounds.len()];
        Self {
            id,
            description: description.into(),
            unit: unit.into(),
            value: MetricValue::Histogram {
                count: 0,
                sum: 0.0,
                bucket_bounds,
                bucket_counts,
            },
        }
    }
}

/// A specialized `Result` type for metric operations.
pub type MetricsResult<T> = Result<T, MetricsError>;

/// An error raised by the metrics system.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricsError {
    /// No metric with this id is registered.
    MetricNotFound(MetricId),
    /// The operation does not fit the metric's type.
    TypeMismatch {
        /// Type the operation needs.
        expected: MetricType,
        /// Type of the stored metric.
        found: MetricType,
    },
    /// The storage backend failed.
    StorageError(String),
}

impl Display for MetricsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricsError::MetricNotFound(id) => write!(f, "Metric not found: {id}"),
            MetricsError::TypeMismatch { expected, found } => {
                write!(f, "Type mismatch: expected {expected:?}, found {found:?}")
            }
            MetricsError::StorageError(msg) => write!(f, "Storage error: {msg}"),
        }
    }
}

impl std::error::Error for MetricsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_sorted_and_displayed() {
        let id = MetricId::new("resources", "loads_submitted")
            .with_label("tag", "mesh")
            .with_label("backend", "pool");

        assert_eq!(id.labels[0].0, "backend");
        assert_eq!(id.label("tag"), Some("mesh"));
        assert_eq!(
            id.to_string(),
            "resources:loads_submitted[backend=pool,tag=mesh]"
        );
    }

    #[test]
    fn value_accessors() {
        assert_eq!(MetricValue::Counter(3).as_counter(), Some(3));
        assert_eq!(MetricValue::Counter(3).as_gauge(), None);
        assert_eq!(MetricValue::Gauge(1.5).metric_type(), MetricType::Gauge);
    }
}
