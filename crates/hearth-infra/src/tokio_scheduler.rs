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

use hearth_core::{CacheError, CacheResult, Job, TaskScheduler};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;

/// Runs jobs as blocking tasks on a Tokio runtime.
///
/// Loaders perform blocking file I/O, so every job goes through
/// [`Handle::spawn_blocking`]. The number of jobs in flight is bounded by a
/// semaphore; when no permit is left, `spawn` reports `BacklogFull`.
pub struct TokioScheduler {
    handle: Handle,
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl TokioScheduler {
    /// Creates a scheduler on `handle` allowing `capacity` jobs in flight.
    pub fn new(handle: Handle, capacity: usize) -> Arc<Self> {
        let capacity = capacity.max(1);
        Arc::new(Self {
            handle,
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        })
    }

    /// Creates a scheduler on the runtime the caller is running in.
    ///
    /// # Panics
    /// Panics when called outside of a Tokio runtime.
    pub fn current(capacity: usize) -> Arc<Self> {
        Self::new(Handle::current(), capacity)
    }

    /// Number of jobs that can still be accepted.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

impl TaskScheduler for TokioScheduler {
    fn spawn(&self, job: Job) -> CacheResult<()> {
        let permit = Arc::clone(&self.permits)
            .try_acquire_owned()
            .map_err(|_| CacheError::BacklogFull {
                capacity: self.capacity,
            })?;

        self.handle.spawn_blocking(move || {
            let _permit = permit;
            job();
        });
        Ok(())
    }
}
