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

use crate::run_job;
use hearth_core::{CacheError, CacheResult, Job, TaskScheduler};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// A scheduler that runs nothing on its own.
///
/// Jobs stay queued until [`run_pending`](ManualScheduler::run_pending) is
/// called or a thread blocks on one of their futures, in which case the
/// waiting thread executes queued jobs itself. This makes in-flight loads
/// observable and fully deterministic, which is what tests and offline tools
/// want.
#[derive(Default)]
pub struct ManualScheduler {
    queue: Mutex<VecDeque<Job>>,
    capacity: Option<usize>,
}

impl ManualScheduler {
    /// Creates a scheduler with an unbounded backlog.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Creates a scheduler that reports `BacklogFull` beyond `capacity` queued jobs.
    pub fn with_capacity(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(VecDeque::new()),
            capacity: Some(capacity),
        })
    }

    /// Number of queued jobs.
    pub fn pending(&self) -> usize {
        self.queue().len()
    }

    /// Runs queued jobs, including jobs queued while running, until the queue
    /// is empty. Returns the number of jobs run.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while self.help() {
            ran += 1;
        }
        ran
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<Job>> {
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TaskScheduler for ManualScheduler {
    fn spawn(&self, job: Job) -> CacheResult<()> {
        let mut queue = self.queue();
        if let Some(capacity) = self.capacity {
            if queue.len() >= capacity {
                return Err(CacheError::BacklogFull { capacity });
            }
        }
        queue.push_back(job);
        Ok(())
    }

    fn is_worker(&self) -> bool {
        true
    }

    fn help(&self) -> bool {
        // The lock must be released before running: the job may spawn more work.
        let job = self.queue().pop_front();
        match job {
            Some(job) => {
                run_job(job);
                true
            }
            None => false,
        }
    }
}
