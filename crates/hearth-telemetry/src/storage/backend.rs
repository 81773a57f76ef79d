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

use crate::metrics::{Metric, MetricId, MetricType, MetricValue, MetricsError, MetricsResult};
use std::fmt::Debug;

/// Interface for metric storage backends.
///
/// Updates go through [`update`](MetricsBackend::update), which applies a
/// mutation atomically with respect to other updates of the same backend.
pub trait MetricsBackend: Send + Sync + Debug + 'static {
    /// Stores a metric, replacing any metric with the same id.
    fn put_metric(&self, metric: Metric) -> MetricsResult<()>;

    /// Returns a copy of the metric.
    fn get_metric(&self, id: &MetricId) -> MetricsResult<Metric>;

    /// Applies `mutate` to the stored metric.
    fn update(&self, id: &MetricId, mutate: &mut dyn FnMut(&mut Metric)) -> MetricsResult<()>;

    /// Returns copies of every stored metric.
    fn list_all_metrics(&self) -> Vec<Metric>;

    /// Number of stored metrics.
    fn metric_count(&self) -> usize;

    /// Adds `delta` to a counter and returns the new value.
    fn increment_counter(&self, id: &MetricId, delta: u64) -> MetricsResult<u64> {
        let mut outcome = Err(MetricsError::MetricNotFound(id.clone()));
        self.update(id, &mut |metric| {
            outcome = match metric.value {
                MetricValue::Counter(ref mut value) => {
                    *value = value.saturating_add(delta);
                    Ok(*value)
                }
                ref other => Err(MetricsError::TypeMismatch {
                    expected: MetricType::Counter,
                    found: other.metric_type(),
                }),
            };
        })?;
        outcome
    }

    /// Sets a gauge.
    fn set_gauge(&self, id: &MetricId, value: f64) -> MetricsResult<()> {
        let mut outcome = Err(MetricsError::MetricNotFound(id.clone()));
        self.update(id, &mut |metric| {
            outcome = match metric.value {
                MetricValue::Gauge(ref mut gauge) => {
                    *gauge = value;
                    Ok(())
                }
                ref other => Err(MetricsError::TypeMismatch {
                    expected: MetricType::Gauge,
                    found: other.metric_type(),
                }),
            };
        })?;
        outcome
    }

    /// Adds `delta` to a gauge and returns the new value.
    fn add_to_gauge(&self, id: &MetricId, delta: f64) -> MetricsResult<f64> {
        let mut outcome = Err(MetricsError::MetricNotFound(id.clone()));
        self.update(id, &mut |metric| {
            outcome = match metric.value {
                MetricValue::Gauge(ref mut gauge) => {
                    *gauge += delta;
                    Ok(*gauge)
                }
                ref other => Err(MetricsError::TypeMismatch {
                    expected: MetricType::Gauge,
                    found: other.metric_type(),
                }),
            };
        })?;
        outcome
    }

    /// Records one histogram sample.
    fn record_histogram_sample(&self, id: &MetricId, sample: f64) -> MetricsResult<()> {
        let mut outcome = Err(MetricsError::MetricNotFound(id.clone()));
        self.update(id, &mut |metric| {
            outcome = match metric.value {
                MetricValue::Histogram {
                    ref mut count,
                    ref mut sum,
                    ref bucket_bounds,
                    ref mut bucket_counts,
                } => {
                    *count += 1;
                    *sum += sample;
                    for (bound, bucket) in bucket_bounds.iter().zip(bucket_counts.iter_mut()) {
                        if sample <= *bound {
                            *bucket += 1;
                        }
                    }
                    Ok(())
                }
                ref other => Err(MetricsError::TypeMismatch {
                    expected: MetricType::Histogram,
                    found: other.metric_type(),
                }),
            };
        })?;
        outcome
    }
}
