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

//! Waiting from inside a task must never starve the pool the task runs on,
//! even when the pool has a single worker.

mod common;

use anyhow::Result;
use common::{pool, CountingLoader, Fixture};
use hearth_core::{submit, ResourceState, Significance, TaskScheduler};
use hearth_data::ResourceHandle;
use hearth_infra::WorkerPool;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

type TextHandle = ResourceHandle<CountingLoader>;

const WATCHDOG: Duration = Duration::from_secs(10);

/// Runs `job` on `pool` and fails the test if it does not finish in time.
fn on_worker<T, F>(pool: &Arc<WorkerPool>, job: F) -> T
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (sender, receiver) = mpsc::channel();
    pool.spawn(Box::new(move || {
        let _ = sender.send(job());
    }))
    .expect("pool accepts the job");

    match receiver.recv_timeout(WATCHDOG) {
        Ok(value) => value,
        Err(_) => {
            // The stuck worker would hang the pool's shutdown join.
            std::mem::forget(Arc::clone(pool));
            panic!("task did not finish within {WATCHDOG:?}: deadlock");
        }
    }
}

#[test]
fn test_single_worker_waits_on_loads_it_queued_itself() -> Result<()> {
    let pool = pool(1)?;
    let fx = Fixture::new(pool.clone())?;
    for i in 0..8 {
        fx.write(&format!("{i}.txt"), &format!("line {i}"))?;
    }

    let cache = Arc::clone(&fx.cache);
    let lines = on_worker(&pool, move || -> Result<usize> {
        let handles = (0..8)
            .map(|i| TextHandle::load(&cache, format!("{i}.txt"), Significance::Medium))
            .collect::<Result<Vec<_>, _>>()?;
        let mut lines = 0;
        for handle in &handles {
            lines += handle.get()?.0.len();
        }
        Ok(lines)
    })?;

    assert_eq!(lines, 8);
    assert_eq!(fx.stats.loads(), 8);
    Ok(())
}

#[test]
fn test_single_worker_drops_the_last_handle_while_loading() -> Result<()> {
    let pool = pool(1)?;
    let fx = Fixture::new(pool.clone())?;
    fx.write("pending.txt", "soon")?;

    let cache = Arc::clone(&fx.cache);
    let id = on_worker(&pool, move || -> Result<_> {
        let handle = TextHandle::load(&cache, "pending.txt", Significance::Low)?;
        let id = handle.id();
        assert_eq!(cache.state(id)?, ResourceState::Loading);
        // Blocks until the load queued behind this very task has run.
        drop(handle);
        Ok(id)
    })?;

    assert_eq!(fx.cache.usage_count(id)?, 0);
    assert_eq!(fx.cache.state(id)?, ResourceState::Unloaded);
    Ok(())
}

#[test]
fn test_single_worker_waits_on_nested_tasks() -> Result<()> {
    let pool = pool(1)?;
    let scheduler: Arc<dyn TaskScheduler> = pool.clone();

    let sum = on_worker(&pool, move || -> Result<u32> {
        let mut outer = submit(&scheduler, {
            let scheduler = Arc::clone(&scheduler);
            move || -> Result<u32> {
                let mut inner = submit(&scheduler, || 40)?;
                Ok(inner.get()? + 2)
            }
        })?;
        outer.get()?
    })?;

    assert_eq!(sum, 42);
    Ok(())
}

#[test]
fn test_concurrent_waiters_on_a_saturated_pool() -> Result<()> {
    let pool = pool(2)?;
    let fx = Fixture::new(pool.clone())?;
    fx.write("hot.txt", "hot")?;
    let id = fx.cache.load_id("hot.txt", Significance::Medium)?;

    let scheduler: Arc<dyn TaskScheduler> = pool.clone();
    let waiters = (0..16)
        .map(|_| {
            let cache = Arc::clone(&fx.cache);
            submit(&scheduler, move || cache.access(id).map(|lines| lines.0.len()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let counts = on_worker(&pool, move || {
        waiters
            .into_iter()
            .map(|mut waiter| -> Result<usize> { Ok(waiter.get()??) })
            .collect::<Result<Vec<_>>>()
    })?;

    assert_eq!(counts, vec![1; 16]);
    assert_eq!(fx.stats.loads(), 1);
    Ok(())
}
