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

use hearth_telemetry::{
    CounterHandle, GaugeHandle, HistogramHandle, MetricId, MetricsRegistry, MetricsResult,
};

/// Namespace of every metric a cache reports.
pub const METRICS_NAMESPACE: &str = "resources";

/// Metric handles of one cache, labelled with its tag.
#[derive(Debug, Clone)]
pub(crate) struct CacheMetrics {
    pub(crate) loads_submitted: CounterHandle,
    pub(crate) loads_failed: CounterHandle,
    pub(crate) materializations: CounterHandle,
    pub(crate) dematerializations: CounterHandle,
    pub(crate) evictions: CounterHandle,
    pub(crate) resident: GaugeHandle,
    pub(crate) load_time: HistogramHandle,
}

impl CacheMetrics {
    pub(crate) fn new(registry: &MetricsRegistry, tag: &str) -> MetricsResult<Self> {
        let id = |name: &str| MetricId::new(METRICS_NAMESPACE, name).with_label("cache", tag);

        Ok(Self {
            loads_submitted: registry
                .register_counter(id("loads_submitted"), "Loads handed to the scheduler")?,
            loads_failed: registry.register_counter(id("loads_failed"), "Loads that failed")?,
            materializations: registry.register_counter(
                id("materializations"),
                "Cached to active conversions",
            )?,
            dematerializations: registry.register_counter(
                id("dematerializations"),
                "Active to cached demotions",
            )?,
            evictions: registry
                .register_counter(id("evictions"), "Low-significance resources dropped")?,
            resident: registry.register_gauge(
                id("resident"),
                "Resources holding an active representation",
                "count",
            )?,
            load_time: registry.register_histogram(
                id("load_time"),
                "Time spent in load_from_path",
                "ms",
                vec![1.0, 5.0, 16.0, 33.0, 100.0, 500.0],
            )?,
        })
    }
}

/// Bumps a counter, logging instead of failing the cache operation.
pub(crate) fn bump(counter: Option<&CounterHandle>) {
    if let Some(counter) = counter {
        if let Err(e) = counter.increment() {
            log::warn!("Failed to record cache metric {}: {e}", counter.id());
        }
    }
}

/// Moves a gauge by `delta`, logging instead of failing the cache operation.
pub(crate) fn adjust(gauge: Option<&GaugeHandle>, delta: f64) {
    if let Some(gauge) = gauge {
        if let Err(e) = gauge.add(delta) {
            log::warn!("Failed to record cache metric {}: {e}", gauge.id());
        }
    }
}
