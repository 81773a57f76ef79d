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

//! Per-resource bookkeeping: what was asked for ([`ResourceSpec`]) and what is resident ([`Slot`]).

use hearth_core::{
    LoadError, ResourcePath, ResourceState, Significance, TaskFuture, TaskScheduler,
};
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// How long a waiting worker parks before trying to help its scheduler again.
const HELP_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Outcome of a background load.
pub(crate) type LoadOutcome<C> = Result<C, LoadError>;

/// Static description and usage count of a registered resource.
#[derive(Debug, Clone)]
pub(crate) struct ResourceSpec {
    /// Path as requested, used for the wire form of handles.
    pub(crate) path: ResourcePath,
    /// Canonical path, the deduplication key.
    pub(crate) canonical: PathBuf,
    pub(crate) usage_count: u32,
    pub(crate) significance: Significance,
}

/// Residency state of a resource.
///
/// The enum makes "cached and active at once" unrepresentable: a transition
/// replaces one representation with the other.
pub(crate) enum Slot<C, A> {
    Loading(Arc<PendingLoad<C>>),
    Cached(C),
    Active(Arc<A>),
    Failed(LoadError),
    Unloaded,
}

impl<C, A> Slot<C, A> {
    pub(crate) fn state(&self) -> ResourceState {
        match self {
            Slot::Loading(_) => ResourceState::Loading,
            Slot::Cached(_) => ResourceState::Cached,
            Slot::Active(_) => ResourceState::Active,
            Slot::Failed(_) => ResourceState::Failed,
            Slot::Unloaded => ResourceState::Unloaded,
        }
    }
}

/// One row of the cache tables.
pub(crate) struct Entry<C, A> {
    pub(crate) spec: ResourceSpec,
    pub(crate) slot: Slot<C, A>,
}

/// What a thread that wants the outcome of a pending load has to do.
pub(crate) enum Claim<C> {
    /// The caller owns the future and must resolve it, then call
    /// [`PendingLoad::finish`].
    Resolve(TaskFuture<LoadOutcome<C>>),
    /// Another thread installed the outcome.
    Resolved,
}

struct PendingState<C> {
    future: Option<TaskFuture<LoadOutcome<C>>>,
    done: bool,
}

/// An in-flight load, shared by every thread that may wait on it.
///
/// Exactly one thread claims the future and resolves it; no lock is held
/// while it waits. A worker of the scheduler only claims a future that is
/// already ready and keeps helping its scheduler until then, so a task it
/// runs in the meantime can wait on the same load without re-entering a
/// claimed wait. Other threads wait for [`finish`](PendingLoad::finish).
pub(crate) struct PendingLoad<C> {
    state: Mutex<PendingState<C>>,
    finished: Condvar,
}

impl<C> PendingLoad<C> {
    pub(crate) fn new(future: TaskFuture<LoadOutcome<C>>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PendingState {
                future: Some(future),
                done: false,
            }),
            finished: Condvar::new(),
        })
    }

    /// Non-blocking readiness check. `false` while another thread resolves the load.
    pub(crate) fn is_ready(&self) -> bool {
        match self.state.try_lock() {
            Ok(state) => state.future.as_ref().is_some_and(TaskFuture::is_ready),
            Err(_) => false,
        }
    }

    /// Claims the right to resolve the load, or waits until somebody else did.
    pub(crate) fn claim(&self, scheduler: &dyn TaskScheduler) -> Claim<C> {
        let helps = scheduler.is_worker();
        let mut state = self.lock();

        loop {
            if state.done {
                return Claim::Resolved;
            }
            let claimable = state
                .future
                .as_ref()
                .is_some_and(|future| !helps || future.is_ready());
            if claimable {
                if let Some(future) = state.future.take() {
                    return Claim::Resolve(future);
                }
            }

            if helps {
                drop(state);
                let helped = scheduler.help();
                state = self.lock();
                if !helped && !state.done {
                    state = self
                        .finished
                        .wait_timeout(state, HELP_POLL_INTERVAL)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            } else {
                state = self
                    .finished
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        }
    }

    /// Marks the load as resolved and wakes every waiter.
    pub(crate) fn finish(&self) {
        let mut state = self.lock();
        state.done = true;
        self.finished.notify_all();
    }

    fn lock(&self) -> MutexGuard<'_, PendingState<C>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
