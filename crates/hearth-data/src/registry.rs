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

//! The process-wide lookup from cache tag to live cache.
//!
//! Resources refer to each other by `(tag, path)`. When such a reference is
//! deserialized, possibly on a worker thread while another thread tears a
//! cache down, the tag is resolved here. Entries are weak: the registry never
//! keeps a cache alive, and a lookup racing with a cache's destruction yields
//! `CacheNotFound` instead of a dangling reference.

use crate::cache::ResourceCache;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use hearth_core::{CacheError, CacheResult, ResourceLoader};
use std::any::{type_name, Any};
use std::sync::{Arc, LazyLock, Weak};

type ErasedCache = dyn Any + Send + Sync;

static GLOBAL: LazyLock<ResourceRegistry> = LazyLock::new(ResourceRegistry::new);

/// A concurrent map from tag to a weak, type-erased cache reference.
#[derive(Default)]
pub struct ResourceRegistry {
    caches: DashMap<String, Weak<ErasedCache>>,
}

impl ResourceRegistry {
    /// Creates an empty registry. Most code uses [`ResourceRegistry::global`].
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by the whole process.
    pub fn global() -> &'static ResourceRegistry {
        &GLOBAL
    }

    /// Publishes `cache` under `tag` unless a live cache already owns it.
    ///
    /// An entry whose cache has already been dropped is replaced.
    pub(crate) fn insert<L: ResourceLoader>(
        &self,
        tag: &str,
        cache: &Arc<ResourceCache<L>>,
    ) -> CacheResult<()> {
        let erased: Arc<ErasedCache> = Arc::clone(cache) as Arc<ErasedCache>;
        let weak = Arc::downgrade(&erased);

        match self.caches.entry(tag.to_owned()) {
            Entry::Occupied(mut entry) => {
                if entry.get().strong_count() > 0 {
                    return Err(CacheError::AlreadyExists(tag.to_owned()));
                }
                log::debug!("Replacing stale registry entry for tag '{tag}'.");
                entry.insert(weak);
            }
            Entry::Vacant(entry) => {
                entry.insert(weak);
            }
        }
        Ok(())
    }

    /// Removes the entry for `tag` if it still refers to the cache at `address`.
    pub(crate) fn remove(&self, tag: &str, address: *const ()) -> bool {
        self.caches
            .remove_if(tag, |_, weak| weak.as_ptr() as *const () == address)
            .is_some()
    }

    /// Resolves `tag` to the live cache managing resources of loader `L`.
    ///
    /// # Errors
    /// [`CacheError::CacheNotFound`] if no live cache owns the tag,
    /// [`CacheError::TypeMismatch`] if it belongs to another loader type.
    pub fn lookup<L: ResourceLoader>(&self, tag: &str) -> CacheResult<Arc<ResourceCache<L>>> {
        let weak = self
            .caches
            .get(tag)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| CacheError::CacheNotFound(tag.to_owned()))?;
        let cache = weak
            .upgrade()
            .ok_or_else(|| CacheError::CacheNotFound(tag.to_owned()))?;

        cache
            .downcast::<ResourceCache<L>>()
            .map_err(|_| CacheError::TypeMismatch {
                tag: tag.to_owned(),
                expected: type_name::<L>(),
            })
    }

    /// Returns `true` if a live cache owns `tag`.
    pub fn contains(&self, tag: &str) -> bool {
        self.caches
            .get(tag)
            .is_some_and(|entry| entry.value().strong_count() > 0)
    }

    /// Tags of all live caches, sorted.
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self
            .caches
            .iter()
            .filter(|entry| entry.value().strong_count() > 0)
            .map(|entry| entry.key().clone())
            .collect();
        tags.sort();
        tags
    }
}
