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

//! A fixed-size thread pool fed through a bounded channel.

use crate::run_job;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use hearth_core::{CacheError, CacheResult, Job, TaskScheduler};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};

static NEXT_POOL_ID: AtomicUsize = AtomicUsize::new(1);

thread_local! {
    /// Id of the pool the current thread works for, if any.
    static CURRENT_POOL: Cell<Option<usize>> = const { Cell::new(None) };
}

/// Configuration for a [`WorkerPool`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    /// Number of worker threads.
    pub worker_count: usize,
    /// Maximum number of queued jobs before `spawn` reports `BacklogFull`.
    pub backlog_capacity: usize,
    /// Prefix for worker thread names.
    pub thread_name: String,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            backlog_capacity: 1024,
            thread_name: "hearth-worker".to_string(),
        }
    }
}

impl WorkerPoolConfig {
    /// Parses a configuration written in RON.
    pub fn from_ron_str(text: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(text)
    }
}

/// A fixed set of worker threads pulling jobs from a bounded queue.
///
/// A worker that blocks on a [`TaskFuture`](hearth_core::TaskFuture) keeps
/// executing queued jobs until its value arrives, so even a single-worker pool
/// survives a task that waits on work it submitted itself.
pub struct WorkerPool {
    id: usize,
    capacity: usize,
    sender: RwLock<Option<Sender<Job>>>,
    receiver: Receiver<Job>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Starts a pool with the given configuration.
    ///
    /// # Errors
    /// Fails if the operating system refuses to spawn a worker thread.
    pub fn new(config: WorkerPoolConfig) -> std::io::Result<Arc<Self>> {
        let id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);
        let capacity = config.backlog_capacity.max(1);
        let (sender, receiver) = crossbeam_channel::bounded::<Job>(capacity);

        let mut workers = Vec::with_capacity(config.worker_count.max(1));
        for index in 0..config.worker_count.max(1) {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("{}-{index}", config.thread_name))
                .spawn(move || {
                    CURRENT_POOL.with(|current| current.set(Some(id)));
                    while let Ok(job) = receiver.recv() {
                        run_job(job);
                    }
                    log::trace!("Worker {index} of pool {id} exiting.");
                })?;
            workers.push(handle);
        }

        log::info!(
            "WorkerPool {id} started with {} workers (backlog {capacity}).",
            workers.len()
        );

        Ok(Arc::new(Self {
            id,
            capacity,
            sender: RwLock::new(Some(sender)),
            receiver,
            workers: Mutex::new(workers),
        }))
    }

    /// Number of jobs waiting in the queue.
    pub fn queued(&self) -> usize {
        self.receiver.len()
    }

    /// Stops accepting jobs, lets the workers drain the queue and joins them.
    ///
    /// Calling this from one of the pool's own workers only closes the queue.
    pub fn shutdown(&self) {
        if let Ok(mut sender) = self.sender.write() {
            sender.take();
        }

        if self.is_worker() {
            return;
        }

        let workers = match self.workers.lock() {
            Ok(mut workers) => std::mem::take(&mut *workers),
            Err(_) => return,
        };
        for worker in workers {
            if worker.join().is_err() {
                log::warn!("A worker of pool {} terminated abnormally.", self.id);
            }
        }
    }
}

impl TaskScheduler for WorkerPool {
    fn spawn(&self, job: Job) -> CacheResult<()> {
        let sender = self.sender.read().map_err(|_| CacheError::SchedulerClosed)?;
        let sender = sender.as_ref().ok_or(CacheError::SchedulerClosed)?;
        sender.try_send(job).map_err(|e| match e {
            TrySendError::Full(_) => CacheError::BacklogFull {
                capacity: self.capacity,
            },
            TrySendError::Disconnected(_) => CacheError::SchedulerClosed,
        })
    }

    fn is_worker(&self) -> bool {
        CURRENT_POOL.with(|current| current.get() == Some(self.id))
    }

    fn help(&self) -> bool {
        if !self.is_worker() {
            return false;
        }
        match self.receiver.try_recv() {
            Ok(job) => {
                run_job(job);
                true
            }
            Err(_) => false,
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
