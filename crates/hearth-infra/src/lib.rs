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

//! Concrete implementations of the [`TaskScheduler`](hearth_core::TaskScheduler)
//! contract.
//!
//! - [`WorkerPool`]: a fixed set of named threads draining a bounded queue.
//! - [`TokioScheduler`]: loads run as blocking tasks on a Tokio runtime.
//! - [`ManualScheduler`]: jobs only run when somebody waits on them or calls
//!   [`ManualScheduler::run_pending`]; used for deterministic tests and tools.

#![warn(missing_docs)]

mod manual;
mod tokio_scheduler;
mod worker_pool;

pub use manual::ManualScheduler;
pub use tokio_scheduler::TokioScheduler;
pub use worker_pool::{WorkerPool, WorkerPoolConfig};

use hearth_core::Job;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Runs a job, containing any panic so the executing thread survives it.
pub(crate) fn run_job(job: Job) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
        log::error!("Scheduled task panicked: {}", panic_message(payload.as_ref()));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "<non-string panic payload>"
    }
}
