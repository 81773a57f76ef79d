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

//! The task-scheduling contract the resource cache consumes.
//!
//! The cache never spawns threads itself. It hands loader work to a
//! [`TaskScheduler`] and keeps the returned [`TaskFuture`] until somebody needs
//! the result. Concrete schedulers live in `hearth-infra`.

mod future;

pub use future::TaskFuture;

use crate::error::CacheResult;
use std::sync::Arc;

/// A unit of work handed to a scheduler.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Executes jobs off the caller's critical path.
///
/// Implementations must never run a job on the thread that calls
/// [`spawn`](TaskScheduler::spawn): the cache submits loads while holding its
/// internal lock, and a loader is allowed to call back into the cache.
pub trait TaskScheduler: Send + Sync + 'static {
    /// Queues `job` for execution. Ordering across jobs is unspecified.
    ///
    /// # Errors
    /// [`CacheError::BacklogFull`](crate::CacheError::BacklogFull) when the
    /// backlog is saturated (the call never blocks waiting for room), and
    /// [`CacheError::SchedulerClosed`](crate::CacheError::SchedulerClosed)
    /// after shutdown.
    fn spawn(&self, job: Job) -> CacheResult<()>;

    /// Returns `true` if the calling thread executes jobs for this scheduler.
    ///
    /// A thread for which this holds must keep draining the queue while it
    /// waits on a [`TaskFuture`], see [`help`](TaskScheduler::help).
    fn is_worker(&self) -> bool {
        false
    }

    /// Runs one queued job on the calling thread, if the calling thread is a
    /// worker and a job is available. Returns whether a job was run.
    fn help(&self) -> bool {
        false
    }
}

/// Runs `task` on `scheduler` and returns a future for its result.
///
/// If `task` panics, the future resolves to
/// [`CacheError::TaskPanicked`](crate::CacheError::TaskPanicked).
pub fn submit<T, F>(scheduler: &Arc<dyn TaskScheduler>, task: F) -> CacheResult<TaskFuture<T>>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (sender, receiver) = flume::bounded(1);
    scheduler.spawn(Box::new(move || {
        // The future may have been dropped already; nobody wants the value then.
        let _ = sender.send(task());
    }))?;
    Ok(TaskFuture::new(receiver, Arc::clone(scheduler)))
}
