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

//! Scoped, counted references to cached resources.

use crate::cache::ResourceCache;
use crate::registry::ResourceRegistry;
use hearth_core::{
    submit, CacheResult, ResourceId, ResourceLoader, ResourcePath, ResourceRef, ResourceState,
    Significance, TaskFuture,
};
use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::process;
use std::sync::Arc;

/// One usage of one resource.
///
/// Cloning adds a usage, dropping removes it. Dropping the last handle of a
/// resource that is still loading blocks until the load has finished; use
/// [`release_async`](ResourceHandle::release_async) where that matters.
///
/// If a usage cannot be added or removed (the cache state is corrupt), the
/// failure is logged and the process aborts: a handle must never leak or
/// double-release a usage.
///
/// On the wire a handle is a [`ResourceRef`]. Deserializing one registers a
/// usage in the cache the reference names, looked up in the global
/// [`ResourceRegistry`].
pub struct ResourceHandle<L: ResourceLoader> {
    cache: Arc<ResourceCache<L>>,
    id: ResourceId,
    live: bool,
}

impl<L: ResourceLoader> ResourceHandle<L> {
    /// Loads (or reuses) the resource at `path` in `cache`.
    pub fn load(
        cache: &Arc<ResourceCache<L>>,
        path: impl Into<ResourcePath>,
        significance: Significance,
    ) -> CacheResult<Self> {
        let id = cache.load_id(path, significance)?;
        Ok(Self::adopt(cache, id))
    }

    /// Takes one more usage of a resource already known to `cache`.
    pub fn from_id(cache: &Arc<ResourceCache<L>>, id: ResourceId) -> CacheResult<Self> {
        cache.increment_usages(id)?;
        Ok(Self::adopt(cache, id))
    }

    /// Resolves `reference` through the global registry.
    ///
    /// # Errors
    /// [`CacheError::CacheNotFound`](hearth_core::CacheError::CacheNotFound)
    /// if no live cache owns the tag,
    /// [`CacheError::TypeMismatch`](hearth_core::CacheError::TypeMismatch) if
    /// it is owned by a cache of another loader type.
    pub fn from_ref(reference: &ResourceRef) -> CacheResult<Self> {
        Self::from_ref_in(ResourceRegistry::global(), reference)
    }

    /// Resolves `reference` through `registry`.
    pub fn from_ref_in(registry: &ResourceRegistry, reference: &ResourceRef) -> CacheResult<Self> {
        let cache = registry.lookup::<L>(&reference.manager_tag)?;
        Self::load(&cache, reference.path.clone(), reference.significance)
    }

    fn adopt(cache: &Arc<ResourceCache<L>>, id: ResourceId) -> Self {
        Self {
            cache: Arc::clone(cache),
            id,
            live: true,
        }
    }

    /// The wire form of this handle.
    pub fn to_ref(&self) -> CacheResult<ResourceRef> {
        Ok(ResourceRef {
            manager_tag: self.cache.tag().to_owned(),
            path: self.cache.path(self.id)?,
            significance: self.cache.significance(self.id)?,
        })
    }

    /// Id of the resource within its cache.
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// The owning cache.
    pub fn cache(&self) -> &Arc<ResourceCache<L>> {
        &self.cache
    }

    /// The path the resource was first requested with.
    pub fn path(&self) -> CacheResult<ResourcePath> {
        self.cache.path(self.id)
    }

    /// Current residency state.
    pub fn state(&self) -> CacheResult<ResourceState> {
        self.cache.state(self.id)
    }

    /// The active representation, waiting for the load if needed.
    pub fn get(&self) -> CacheResult<Arc<L::Active>> {
        self.cache.access(self.id)
    }

    /// The active representation if it is available without blocking.
    pub fn try_get(&self) -> CacheResult<Option<Arc<L::Active>>> {
        self.cache.try_access(self.id, false)
    }

    /// Releases the usage now and reports failures instead of aborting.
    pub fn release(mut self) -> CacheResult<()> {
        self.live = false;
        self.cache.decrement_usages(self.id)
    }

    /// Releases the usage on the cache's scheduler so the caller never blocks.
    ///
    /// If the release cannot be queued the handle is dropped, releasing the
    /// usage on the calling thread, and the scheduling error is returned.
    pub fn release_async(mut self) -> CacheResult<TaskFuture<CacheResult<()>>> {
        let cache = Arc::clone(&self.cache);
        let id = self.id;
        let future = submit(self.cache.scheduler(), move || cache.decrement_usages(id))?;
        self.live = false;
        Ok(future)
    }
}

impl<L: ResourceLoader> Clone for ResourceHandle<L> {
    fn clone(&self) -> Self {
        if let Err(e) = self.cache.increment_usages(self.id) {
            log::error!(
                "Failed to add a usage of {} in cache '{}': {e}",
                self.id,
                self.cache.tag()
            );
            process::abort();
        }
        Self::adopt(&self.cache, self.id)
    }
}

impl<L: ResourceLoader> Drop for ResourceHandle<L> {
    fn drop(&mut self) {
        if !self.live {
            return;
        }
        if let Err(e) = self.cache.decrement_usages(self.id) {
            log::error!(
                "Failed to release {} in cache '{}': {e}",
                self.id,
                self.cache.tag()
            );
            process::abort();
        }
    }
}

impl<L: ResourceLoader> PartialEq for ResourceHandle<L> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cache, &other.cache) && self.id == other.id
    }
}

impl<L: ResourceLoader> Eq for ResourceHandle<L> {}

impl<L: ResourceLoader> Hash for ResourceHandle<L> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.cache.tag().hash(state);
        self.id.hash(state);
    }
}

impl<L: ResourceLoader> fmt::Debug for ResourceHandle<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("cache", &self.cache.tag())
            .field("id", &self.id)
            .finish()
    }
}

impl<L: ResourceLoader> Serialize for ResourceHandle<L> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_ref()
            .map_err(ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de, L: ResourceLoader> Deserialize<'de> for ResourceHandle<L> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let reference = ResourceRef::deserialize(deserializer)?;
        Self::from_ref(&reference).map_err(de::Error::custom)
    }
}
