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

use super::TaskScheduler;
use crate::error::{CacheError, CacheResult};
use flume::{Receiver, RecvTimeoutError, TryRecvError};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// How long a waiting worker sleeps between two attempts to help its scheduler.
const HELP_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// A single-use handle to the result of a submitted task.
///
/// [`is_ready`](TaskFuture::is_ready) never blocks. [`get`](TaskFuture::get)
/// blocks until the value is available and hands it out exactly once; any
/// further call fails with [`CacheError::AlreadyConsumed`].
///
/// When the waiting thread is itself a worker of the scheduler that runs the
/// task, `get` executes other queued jobs while it waits instead of parking
/// the worker, so a pool never deadlocks on work queued behind the waiter.
pub struct TaskFuture<T> {
    receiver: Receiver<T>,
    scheduler: Arc<dyn TaskScheduler>,
    consumed: bool,
}

impl<T> TaskFuture<T> {
    pub(crate) fn new(receiver: Receiver<T>, scheduler: Arc<dyn TaskScheduler>) -> Self {
        Self {
            receiver,
            scheduler,
            consumed: false,
        }
    }

    /// Returns `true` once [`get`](TaskFuture::get) would return without
    /// blocking. Always `false` after the value was consumed.
    pub fn is_ready(&self) -> bool {
        !self.consumed && (!self.receiver.is_empty() || self.receiver.is_disconnected())
    }

    /// Returns `true` if the value has already been taken.
    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    /// Blocks until the task finished and takes its value.
    ///
    /// # Errors
    /// [`CacheError::AlreadyConsumed`] on a second call,
    /// [`CacheError::TaskPanicked`] if the task died without a value.
    pub fn get(&mut self) -> CacheResult<T> {
        if self.consumed {
            return Err(CacheError::AlreadyConsumed);
        }
        self.consumed = true;

        loop {
            match self.receiver.try_recv() {
                Ok(value) => return Ok(value),
                Err(TryRecvError::Disconnected) => return Err(CacheError::TaskPanicked),
                Err(TryRecvError::Empty) => {}
            }

            if !self.scheduler.is_worker() {
                return self.receiver.recv().map_err(|_| CacheError::TaskPanicked);
            }

            if self.scheduler.help() {
                continue;
            }

            match self.receiver.recv_timeout(HELP_POLL_INTERVAL) {
                Ok(value) => return Ok(value),
                Err(RecvTimeoutError::Disconnected) => return Err(CacheError::TaskPanicked),
                Err(RecvTimeoutError::Timeout) => {}
            }
        }
    }

    /// Asynchronous counterpart of [`get`](TaskFuture::get) for callers living
    /// on an async runtime.
    pub async fn get_async(&mut self) -> CacheResult<T> {
        if self.consumed {
            return Err(CacheError::AlreadyConsumed);
        }
        self.consumed = true;
        self.receiver
            .recv_async()
            .await
            .map_err(|_| CacheError::TaskPanicked)
    }
}

impl<T> fmt::Debug for TaskFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFuture")
            .field("ready", &self.is_ready())
            .field("consumed", &self.consumed)
            .finish()
    }
}
