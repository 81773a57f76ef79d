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

#![allow(dead_code)]

use anyhow::Result;
use hearth_core::{CacheConfig, LoadError, ResourceLoader, TaskScheduler};
use hearth_data::ResourceCache;
use hearth_infra::{WorkerPool, WorkerPoolConfig};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use tempfile::TempDir;

/// Every test registers in the global registry, so tags must not collide.
pub fn unique_tag(prefix: &str) -> String {
    static NEXT: AtomicUsize = AtomicUsize::new(0);
    format!("{prefix}-{}", NEXT.fetch_add(1, Ordering::Relaxed))
}

/// A latch loads can be held at.
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    opened: Condvar,
}

impl Gate {
    pub fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.opened.notify_all();
    }

    fn wait(&self) {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.opened.wait(open).unwrap();
        }
    }
}

#[derive(Default)]
pub struct LoadStats {
    pub loads: AtomicUsize,
    pub materializations: AtomicUsize,
    pub dematerializations: AtomicUsize,
}

impl LoadStats {
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn materializations(&self) -> usize {
        self.materializations.load(Ordering::SeqCst)
    }

    pub fn dematerializations(&self) -> usize {
        self.dematerializations.load(Ordering::SeqCst)
    }
}

/// Active form of a text asset: its lines.
#[derive(Debug, PartialEq)]
pub struct Lines(pub Vec<String>);

/// Reads text files and counts what the cache asks of it.
#[derive(Clone, Default)]
pub struct CountingLoader {
    pub stats: Arc<LoadStats>,
    pub gate: Option<Arc<Gate>>,
}

impl ResourceLoader for CountingLoader {
    type Cached = String;
    type Active = Lines;

    fn load_from_path(&self, path: &Path) -> Result<String, LoadError> {
        self.stats.loads.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.wait();
        }
        fs::read_to_string(path).map_err(|e| LoadError::new(path, e))
    }

    fn materialize(&self, cached: String) -> Lines {
        self.stats.materializations.fetch_add(1, Ordering::SeqCst);
        Lines(cached.lines().map(str::to_owned).collect())
    }

    fn dematerialize(&self, active: &Lines) -> String {
        self.stats.dematerializations.fetch_add(1, Ordering::SeqCst);
        active.0.join("\n")
    }
}

pub fn pool(workers: usize) -> Result<Arc<WorkerPool>> {
    Ok(WorkerPool::new(WorkerPoolConfig {
        worker_count: workers,
        ..WorkerPoolConfig::default()
    })?)
}

/// A cache over a scratch asset directory.
pub struct Fixture {
    pub dir: TempDir,
    pub stats: Arc<LoadStats>,
    pub cache: Arc<ResourceCache<CountingLoader>>,
}

impl Fixture {
    pub fn new(scheduler: Arc<dyn TaskScheduler>) -> Result<Self> {
        Self::with_loader(CountingLoader::default(), scheduler, CacheConfig::default())
    }

    pub fn with_loader(
        loader: CountingLoader,
        scheduler: Arc<dyn TaskScheduler>,
        config: CacheConfig,
    ) -> Result<Self> {
        hearth_telemetry::logging::init_logging("warn");
        let dir = tempfile::tempdir()?;
        let stats = Arc::clone(&loader.stats);
        let cache = ResourceCache::builder(unique_tag("text"), loader, scheduler)
            .config(config.with_base_dir(dir.path()))
            .register()?;
        Ok(Self { dir, stats, cache })
    }

    pub fn write(&self, name: &str, contents: &str) -> Result<()> {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }
}
