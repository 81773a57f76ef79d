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

//! The per-domain resource cache.
//!
//! A [`ResourceCache`] deduplicates resources by canonical path, counts their
//! users and moves each one through its residency states:
//!
//! ```text
//!            load_id                 resolve
//!   (new) ───────────► Loading ─────────────► Cached ◄──┐
//!                         │                     │        │ usage → 0 (Medium)
//!                         │ failure             │ use    │
//!                         ▼                     ▼        │
//!                       Failed               Active ─────┘
//!                                               │
//!                                               │ usage → 0 (Low)
//!                                               ▼
//!                                           Unloaded ──► Loading (next use)
//! ```
//!
//! Policy is applied when the usage count drops to zero: `High` keeps the
//! active representation, `Medium` demotes it to the cached one, `Low` drops
//! the resource. Loads run on the cache's [`TaskScheduler`]; the table lock is
//! never held while waiting on one.

mod metrics;
mod slot;

pub use metrics::METRICS_NAMESPACE;

use self::metrics::{adjust, bump, CacheMetrics};
use self::slot::{Claim, Entry, LoadOutcome, PendingLoad, ResourceSpec, Slot};
use crate::registry::ResourceRegistry;
use ahash::AHashMap;
use hearth_core::{
    submit, CacheConfig, CacheError, CacheResult, LoadError, ResourceId, ResourceLoader,
    ResourcePath, ResourceState, Significance, TaskScheduler,
};
use hearth_telemetry::{MetricsRegistry, ScopedMetricTimer};
use std::fmt;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Longest accepted cache tag, in bytes.
pub const MAX_TAG_LEN: usize = 64;

type CacheEntry<L> = Entry<<L as ResourceLoader>::Cached, <L as ResourceLoader>::Active>;
type Pending<L> = Arc<PendingLoad<<L as ResourceLoader>::Cached>>;

struct CacheTables<L: ResourceLoader> {
    next_id: u64,
    path_index: AHashMap<PathBuf, ResourceId>,
    entries: AHashMap<ResourceId, CacheEntry<L>>,
}

/// Configures and registers a [`ResourceCache`].
///
/// Obtained from [`ResourceCache::builder`].
pub struct CacheBuilder<L: ResourceLoader> {
    tag: String,
    loader: L,
    scheduler: Arc<dyn TaskScheduler>,
    config: CacheConfig,
    metrics: Option<MetricsRegistry>,
    registry: &'static ResourceRegistry,
}

impl<L: ResourceLoader> CacheBuilder<L> {
    /// Sets path resolution and purge behaviour.
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Reports cache counters and load timings to `registry`.
    pub fn metrics(mut self, registry: &MetricsRegistry) -> Self {
        self.metrics = Some(registry.clone());
        self
    }

    /// Publishes the cache in `registry` instead of the global one.
    pub fn registry(mut self, registry: &'static ResourceRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Creates the cache and publishes it under its tag.
    ///
    /// # Errors
    /// [`CacheError::InvalidTag`] for an empty, overlong or non-printable tag,
    /// [`CacheError::AlreadyExists`] if a live cache already owns the tag.
    pub fn register(self) -> CacheResult<Arc<ResourceCache<L>>> {
        validate_tag(&self.tag)?;

        let metrics = match &self.metrics {
            Some(registry) => match CacheMetrics::new(registry, &self.tag) {
                Ok(metrics) => Some(metrics),
                Err(e) => {
                    log::warn!("Cache '{}' runs without metrics: {e}", self.tag);
                    None
                }
            },
            None => None,
        };

        let cache = Arc::new(ResourceCache {
            tag: self.tag,
            loader: Arc::new(self.loader),
            scheduler: self.scheduler,
            config: self.config,
            metrics,
            registry: self.registry,
            tables: Mutex::new(CacheTables {
                next_id: 0,
                path_index: AHashMap::new(),
                entries: AHashMap::new(),
            }),
        });

        self.registry.insert(&cache.tag, &cache)?;
        log::info!("Resource cache '{}' registered.", cache.tag);
        Ok(cache)
    }
}

fn validate_tag(tag: &str) -> CacheResult<()> {
    let valid = !tag.is_empty()
        && tag.len() <= MAX_TAG_LEN
        && tag.bytes().all(|b| b.is_ascii_graphic());
    if valid {
        Ok(())
    } else {
        Err(CacheError::InvalidTag(tag.to_owned()))
    }
}

/// The sole authority over the resources of one tagged domain.
///
/// Always shared as `Arc<ResourceCache<L>>`. All operations take `&self`;
/// the tables sit behind one internal lock.
pub struct ResourceCache<L: ResourceLoader> {
    tag: String,
    loader: Arc<L>,
    scheduler: Arc<dyn TaskScheduler>,
    config: CacheConfig,
    metrics: Option<CacheMetrics>,
    registry: &'static ResourceRegistry,
    tables: Mutex<CacheTables<L>>,
}

impl<L: ResourceLoader> ResourceCache<L> {
    /// Starts configuring a cache for `tag`, published in the global registry.
    pub fn builder(
        tag: impl Into<String>,
        loader: L,
        scheduler: Arc<dyn TaskScheduler>,
    ) -> CacheBuilder<L> {
        CacheBuilder {
            tag: tag.into(),
            loader,
            scheduler,
            config: CacheConfig::default(),
            metrics: None,
            registry: ResourceRegistry::global(),
        }
    }

    /// Creates a cache with default configuration and publishes it globally.
    pub fn register(
        tag: impl Into<String>,
        loader: L,
        scheduler: Arc<dyn TaskScheduler>,
    ) -> CacheResult<Arc<Self>> {
        Self::builder(tag, loader, scheduler).register()
    }

    /// The tag this cache is registered under.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The domain loader.
    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// The scheduler loads run on.
    pub fn scheduler(&self) -> &Arc<dyn TaskScheduler> {
        &self.scheduler
    }

    /// Path resolution and purge configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Withdraws the cache from its registry while keeping it usable.
    ///
    /// Returns `false` if it was not registered (anymore).
    pub fn unregister(&self) -> bool {
        let removed = self.registry.remove(&self.tag, self.address());
        if removed {
            log::info!("Resource cache '{}' unregistered.", self.tag);
        }
        removed
    }

    /// Registers interest in the resource at `path` and returns its id.
    ///
    /// A path seen before (after canonicalization) yields the existing id and
    /// one more usage; `significance` only applies to a first registration.
    /// A new path gets a fresh id, usage 1 and a background load.
    ///
    /// # Errors
    /// [`CacheError::UnknownRoot`] for an unconfigured path prefix,
    /// [`CacheError::BacklogFull`] if the load cannot be queued (no entry is
    /// created then).
    pub fn load_id(
        &self,
        path: impl Into<ResourcePath>,
        significance: Significance,
    ) -> CacheResult<ResourceId> {
        let path = path.into();
        let canonical = path.resolve(&self.config)?;
        let mut tables = self.tables();

        if let Some(&id) = tables.path_index.get(&canonical) {
            let entry = tables
                .entries
                .get_mut(&id)
                .ok_or_else(|| self.not_found(id))?;
            self.acquire(id, entry)?;
            return Ok(id);
        }

        let pending = self.submit_load(&canonical)?;
        let id = ResourceId::from_raw(tables.next_id);
        tables.next_id += 1;

        log::debug!(
            "[{}] Registered {id} for '{path}' ({significance:?}), load submitted.",
            self.tag
        );
        tables.path_index.insert(canonical.clone(), id);
        tables.entries.insert(
            id,
            Entry {
                spec: ResourceSpec {
                    path,
                    canonical,
                    usage_count: 1,
                    significance,
                },
                slot: Slot::Loading(pending),
            },
        );
        Ok(id)
    }

    /// Adds one usage. On the first usage a cached resource is materialized on
    /// the calling thread and an unloaded one is queued for loading again.
    ///
    /// A failed resource stays failed; see [`reload`](Self::reload).
    pub fn increment_usages(&self, id: ResourceId) -> CacheResult<()> {
        let mut tables = self.tables();
        let entry = tables
            .entries
            .get_mut(&id)
            .ok_or_else(|| self.not_found(id))?;
        self.acquire(id, entry)
    }

    /// Removes one usage; a no-op at zero.
    ///
    /// When the count reaches zero the retention policy of the resource's
    /// significance is applied. If the resource is still loading, this blocks
    /// until the load has finished.
    pub fn decrement_usages(&self, id: ResourceId) -> CacheResult<()> {
        let pending = {
            let mut tables = self.tables();
            let entry = tables
                .entries
                .get_mut(&id)
                .ok_or_else(|| self.not_found(id))?;

            if entry.spec.usage_count == 0 {
                log::trace!("[{}] Ignoring release of unused {id}.", self.tag);
                return Ok(());
            }
            entry.spec.usage_count -= 1;
            if entry.spec.usage_count > 0 {
                return Ok(());
            }

            let pending = match &entry.slot {
                Slot::Loading(pending) => Some(Arc::clone(pending)),
                _ => None,
            };
            match pending {
                Some(pending) => pending,
                None => {
                    self.apply_retention(&mut tables, id);
                    return Ok(());
                }
            }
        };

        log::debug!(
            "[{}] {id} released while loading, waiting for the load.",
            self.tag
        );
        self.resolve(id, &pending);

        let mut tables = self.tables();
        let unused = tables
            .entries
            .get(&id)
            .is_some_and(|entry| entry.spec.usage_count == 0);
        if unused {
            self.apply_retention(&mut tables, id);
        }
        Ok(())
    }

    /// Returns the active representation if it can be had without blocking,
    /// or, with `wait`, once the pending load has finished.
    ///
    /// A cached resource that is in use is materialized and kept active.
    /// `Ok(None)` means the resource is still loading (without `wait`), has
    /// been evicted, or is cached with no user.
    ///
    /// # Errors
    /// [`CacheError::LoadFailure`] on every access to a resource whose load
    /// failed.
    pub fn try_access(&self, id: ResourceId, wait: bool) -> CacheResult<Option<Arc<L::Active>>> {
        loop {
            let pending = {
                let mut tables = self.tables();
                let entry = tables
                    .entries
                    .get_mut(&id)
                    .ok_or_else(|| self.not_found(id))?;

                let loading = match &entry.slot {
                    Slot::Loading(pending) => Some((Arc::clone(pending), wait || pending.is_ready())),
                    _ => None,
                };
                match loading {
                    Some((pending, true)) => pending,
                    Some((_, false)) => return Ok(None),
                    None => return self.activate(id, entry),
                }
            };

            self.resolve(id, &pending);
        }
    }

    /// Blocking access to the active representation.
    ///
    /// # Errors
    /// [`CacheError::NotResident`] if nobody uses the resource and it is not
    /// active (evicted, or demoted to its cached copy),
    /// [`CacheError::LoadFailure`] if its load failed.
    pub fn access(&self, id: ResourceId) -> CacheResult<Arc<L::Active>> {
        self.try_access(id, true)?
            .ok_or_else(|| CacheError::NotResident {
                tag: self.tag.clone(),
                id,
            })
    }

    /// Changes the retention tier. Takes effect the next time the usage
    /// count drops to zero.
    pub fn set_significance(&self, id: ResourceId, significance: Significance) -> CacheResult<()> {
        let mut tables = self.tables();
        let entry = tables
            .entries
            .get_mut(&id)
            .ok_or_else(|| self.not_found(id))?;
        entry.spec.significance = significance;
        Ok(())
    }

    /// Queues a fresh load of the resource, also after a failure.
    ///
    /// A no-op while a load is in flight. The cache drops its resident
    /// representation right away; readers keep the `Arc`s they hold.
    pub fn reload(&self, id: ResourceId) -> CacheResult<()> {
        let mut tables = self.tables();
        let entry = tables
            .entries
            .get_mut(&id)
            .ok_or_else(|| self.not_found(id))?;
        if matches!(entry.slot, Slot::Loading(_)) {
            return Ok(());
        }

        let pending = self.submit_load(&entry.spec.canonical)?;
        log::debug!(
            "[{}] Reloading {id} (was {:?}).",
            self.tag,
            entry.slot.state()
        );
        if matches!(entry.slot, Slot::Active(_)) {
            self.deactivated();
        }
        entry.slot = Slot::Loading(pending);
        Ok(())
    }

    /// Forgets every unused resource that is unloaded or failed. Returns how
    /// many entries were removed. Ids are never handed out again.
    pub fn purge_unused(&self) -> usize {
        let mut tables = self.tables();
        let doomed: Vec<(ResourceId, PathBuf)> = tables
            .entries
            .iter()
            .filter(|(_, entry)| {
                entry.spec.usage_count == 0
                    && matches!(entry.slot, Slot::Unloaded | Slot::Failed(_))
            })
            .map(|(id, entry)| (*id, entry.spec.canonical.clone()))
            .collect();

        for (id, canonical) in &doomed {
            tables.entries.remove(id);
            tables.path_index.remove(canonical);
        }
        if !doomed.is_empty() {
            log::debug!("[{}] Purged {} unused entries.", self.tag, doomed.len());
        }
        doomed.len()
    }

    /// Current number of users of the resource.
    pub fn usage_count(&self, id: ResourceId) -> CacheResult<u32> {
        self.inspect(id, |entry| entry.spec.usage_count)
    }

    /// Current retention tier of the resource.
    pub fn significance(&self, id: ResourceId) -> CacheResult<Significance> {
        self.inspect(id, |entry| entry.spec.significance)
    }

    /// Current residency state of the resource.
    pub fn state(&self, id: ResourceId) -> CacheResult<ResourceState> {
        self.inspect(id, |entry| entry.slot.state())
    }

    /// The path the resource was first requested with.
    pub fn path(&self, id: ResourceId) -> CacheResult<ResourcePath> {
        self.inspect(id, |entry| entry.spec.path.clone())
    }

    /// The canonical path the resource is keyed by.
    pub fn canonical_path(&self, id: ResourceId) -> CacheResult<PathBuf> {
        self.inspect(id, |entry| entry.spec.canonical.clone())
    }

    /// Looks up the id of `path` without registering interest in it.
    pub fn id_of(&self, path: impl Into<ResourcePath>) -> CacheResult<Option<ResourceId>> {
        let canonical = path.into().resolve(&self.config)?;
        Ok(self.tables().path_index.get(&canonical).copied())
    }

    /// Number of resources known to the cache.
    pub fn len(&self) -> usize {
        self.tables().entries.len()
    }

    /// Returns `true` if the cache knows no resource.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn tables(&self) -> MutexGuard<'_, CacheTables<L>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn inspect<T>(&self, id: ResourceId, read: impl FnOnce(&CacheEntry<L>) -> T) -> CacheResult<T> {
        self.tables()
            .entries
            .get(&id)
            .map(read)
            .ok_or_else(|| self.not_found(id))
    }

    fn not_found(&self, id: ResourceId) -> CacheError {
        CacheError::ResourceNotFound {
            tag: self.tag.clone(),
            id,
        }
    }

    fn address(&self) -> *const () {
        self as *const Self as *const ()
    }

    /// Adds a usage to `entry` and brings it back into use on 0 → 1.
    fn acquire(&self, id: ResourceId, entry: &mut CacheEntry<L>) -> CacheResult<()> {
        entry.spec.usage_count += 1;
        if entry.spec.usage_count > 1 {
            return Ok(());
        }

        match mem::replace(&mut entry.slot, Slot::Unloaded) {
            Slot::Cached(cached) => {
                log::trace!("[{}] Reactivating {id} from its cached copy.", self.tag);
                entry.slot = Slot::Active(self.materialize(cached));
            }
            Slot::Unloaded => match self.submit_load(&entry.spec.canonical) {
                Ok(pending) => {
                    log::debug!("[{}] {id} is needed again, load submitted.", self.tag);
                    entry.slot = Slot::Loading(pending);
                }
                Err(error) => {
                    entry.spec.usage_count -= 1;
                    return Err(error);
                }
            },
            other => entry.slot = other,
        }
        Ok(())
    }

    /// Hands out the active representation of a settled entry. A cached one
    /// is materialized only while somebody uses it; unused, it stays cached.
    fn activate(
        &self,
        id: ResourceId,
        entry: &mut CacheEntry<L>,
    ) -> CacheResult<Option<Arc<L::Active>>> {
        let in_use = entry.spec.usage_count > 0;
        let (slot, result) = match mem::replace(&mut entry.slot, Slot::Unloaded) {
            Slot::Cached(cached) if in_use => {
                log::trace!("[{}] Materializing {id} on access.", self.tag);
                let active = self.materialize(cached);
                (Slot::Active(Arc::clone(&active)), Ok(Some(active)))
            }
            Slot::Active(active) => (Slot::Active(Arc::clone(&active)), Ok(Some(active))),
            Slot::Failed(error) => (
                Slot::Failed(error.clone()),
                Err(CacheError::LoadFailure(error)),
            ),
            other => (other, Ok(None)),
        };
        entry.slot = slot;
        result
    }

    /// Applies the retention policy to an entry nobody uses anymore.
    fn apply_retention(&self, tables: &mut CacheTables<L>, id: ResourceId) {
        let Some(entry) = tables.entries.get_mut(&id) else {
            return;
        };
        let significance = entry.spec.significance;

        entry.slot = match (significance, mem::replace(&mut entry.slot, Slot::Unloaded)) {
            (Significance::High, Slot::Cached(cached)) => Slot::Active(self.materialize(cached)),
            (Significance::Medium, Slot::Active(active)) => {
                bump(self.metrics.as_ref().map(|m| &m.dematerializations));
                self.deactivated();
                Slot::Cached(self.loader.dematerialize(&active))
            }
            (Significance::Low, slot @ (Slot::Active(_) | Slot::Cached(_))) => {
                bump(self.metrics.as_ref().map(|m| &m.evictions));
                if matches!(slot, Slot::Active(_)) {
                    self.deactivated();
                }
                Slot::Unloaded
            }
            (_, other) => other,
        };
        log::trace!(
            "[{}] {id} is unused and {:?} ({significance:?}).",
            self.tag,
            entry.slot.state()
        );

        if self.config.purge_on_evict
            && significance == Significance::Low
            && matches!(entry.slot, Slot::Unloaded)
        {
            let canonical = entry.spec.canonical.clone();
            tables.entries.remove(&id);
            tables.path_index.remove(&canonical);
            log::debug!("[{}] Purged evicted {id}.", self.tag);
        }
    }

    /// Every caller stores the result as the entry's active slot.
    fn materialize(&self, cached: L::Cached) -> Arc<L::Active> {
        bump(self.metrics.as_ref().map(|m| &m.materializations));
        adjust(self.metrics.as_ref().map(|m| &m.resident), 1.0);
        Arc::new(self.loader.materialize(cached))
    }

    /// Records that an entry gave up its active slot.
    fn deactivated(&self) {
        adjust(self.metrics.as_ref().map(|m| &m.resident), -1.0);
    }

    fn submit_load(&self, canonical: &Path) -> CacheResult<Pending<L>> {
        let loader = Arc::clone(&self.loader);
        let path = canonical.to_path_buf();
        let load_time = self.metrics.as_ref().map(|m| m.load_time.clone());

        let future = submit(&self.scheduler, move || {
            let _timer = load_time.as_ref().map(ScopedMetricTimer::new);
            loader.load_from_path(&path)
        })?;
        bump(self.metrics.as_ref().map(|m| &m.loads_submitted));
        Ok(PendingLoad::new(future))
    }

    /// Waits until the outcome of `pending` is installed, installing it
    /// itself unless another thread does.
    fn resolve(&self, id: ResourceId, pending: &Pending<L>) {
        if let Claim::Resolve(mut future) = pending.claim(self.scheduler.as_ref()) {
            let outcome = future.get();
            self.install(id, pending, outcome);
            pending.finish();
        }
    }

    fn install(&self, id: ResourceId, pending: &Pending<L>, outcome: CacheResult<LoadOutcome<L::Cached>>) {
        let mut tables = self.tables();
        let Some(entry) = tables.entries.get_mut(&id) else {
            return;
        };
        if !matches!(&entry.slot, Slot::Loading(current) if Arc::ptr_eq(current, pending)) {
            return;
        }

        entry.slot = match outcome {
            Ok(Ok(cached)) => {
                log::debug!("[{}] Load of {id} finished.", self.tag);
                Slot::Cached(cached)
            }
            Ok(Err(error)) => {
                log::warn!("[{}] Load of {id} failed: {error}", self.tag);
                bump(self.metrics.as_ref().map(|m| &m.loads_failed));
                Slot::Failed(error)
            }
            Err(error) => {
                log::error!("[{}] Load task of {id} did not complete: {error}", self.tag);
                bump(self.metrics.as_ref().map(|m| &m.loads_failed));
                Slot::Failed(LoadError::new(entry.spec.canonical.clone(), error))
            }
        };

        if entry.spec.usage_count == 0 {
            self.apply_retention(&mut tables, id);
        }
    }
}

impl<L: ResourceLoader> fmt::Debug for ResourceCache<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceCache")
            .field("tag", &self.tag)
            .field("resources", &self.len())
            .finish_non_exhaustive()
    }
}

impl<L: ResourceLoader> Drop for ResourceCache<L> {
    fn drop(&mut self) {
        if let Some(metrics) = &self.metrics {
            if let Err(e) = metrics.resident.set(0.0) {
                log::warn!("Failed to record cache metric {}: {e}", metrics.resident.id());
            }
        }
        if self.registry.remove(&self.tag, self.address()) {
            log::debug!("Resource cache '{}' dropped and unregistered.", self.tag);
        }
    }
}
