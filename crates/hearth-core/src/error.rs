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

//! Defines the error taxonomy shared by the cache, the registry and the schedulers.

use crate::resource::ResourceId;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// A specialized `Result` type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// A failure reported by a loader while producing the cached representation
/// of a resource.
///
/// The underlying error is shared, so a single failure can be handed to every
/// caller that later accesses the same resource. Clones compare equal under
/// [`LoadError::same_failure`].
#[derive(Debug, Clone, Error)]
#[error("failed to load '{}': {source}", .path.display())]
pub struct LoadError {
    path: PathBuf,
    #[source]
    source: Arc<dyn Error + Send + Sync>,
}

impl LoadError {
    /// Wraps an arbitrary error raised while loading `path`.
    pub fn new(path: impl Into<PathBuf>, source: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self {
            path: path.into(),
            source: Arc::from(source.into()),
        }
    }

    /// Builds a load error from a plain message.
    pub fn msg(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(path, message.into())
    }

    /// The path the loader was asked for.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The underlying error, for downcasting.
    pub fn reason(&self) -> &(dyn Error + Send + Sync + 'static) {
        &*self.source
    }

    /// Returns `true` if both errors originate from the same loader failure.
    pub fn same_failure(&self, other: &LoadError) -> bool {
        Arc::ptr_eq(&self.source, &other.source)
    }
}

/// An error that can occur while loading, accessing or releasing resources.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The id is not (or no longer) registered in the cache.
    #[error("resource {id} is not registered in cache '{tag}'")]
    ResourceNotFound {
        /// Tag of the cache that was queried.
        tag: String,
        /// The unknown id.
        id: ResourceId,
    },
    /// No live cache is registered under this tag.
    #[error("no cache is registered under tag '{0}'")]
    CacheNotFound(String),
    /// A live cache already owns this tag.
    #[error("a cache is already registered under tag '{0}'")]
    AlreadyExists(String),
    /// The loader failed. The failure is kept and re-surfaced on every access.
    #[error(transparent)]
    LoadFailure(#[from] LoadError),
    /// The scheduler refused new work because its backlog is saturated.
    #[error("task scheduler backlog is full ({capacity} queued tasks)")]
    BacklogFull {
        /// The backlog capacity of the scheduler.
        capacity: usize,
    },
    /// The resource has no user and no active representation (evicted, or
    /// demoted to its cached copy).
    #[error("resource {id} of cache '{tag}' is not resident")]
    NotResident {
        /// Tag of the cache that was queried.
        tag: String,
        /// The queried id.
        id: ResourceId,
    },
    /// The tag belongs to a cache of another loader type.
    #[error("cache '{tag}' does not manage resources loaded by `{expected}`")]
    TypeMismatch {
        /// The tag that was resolved.
        tag: String,
        /// The loader type the caller asked for.
        expected: &'static str,
    },
    /// Tags must be short, non-empty, printable ASCII.
    #[error("invalid cache tag '{0}'")]
    InvalidTag(String),
    /// A rooted path names a directory key the cache was not configured with.
    #[error("unknown path root '@{0}'")]
    UnknownRoot(String),
    /// `TaskFuture::get` was called after the value had already been taken.
    #[error("task result was already consumed")]
    AlreadyConsumed,
    /// The task panicked before producing its value.
    #[error("task panicked before producing a result")]
    TaskPanicked,
    /// The scheduler was shut down.
    #[error("task scheduler is shut down")]
    SchedulerClosed,
    /// A resource reference could not be encoded or decoded.
    #[error("resource reference wire error: {0}")]
    Wire(String),
}

impl CacheError {
    /// Returns `true` for the "unknown id" and "unknown tag" cases.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CacheError::ResourceNotFound { .. } | CacheError::CacheNotFound(_)
        )
    }
}
