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

mod common;

use anyhow::Result;
use common::{pool, CountingLoader, Fixture, Gate, Lines};
use hearth_core::{CacheConfig, CacheError, ResourceState, Significance};
use hearth_data::cache::METRICS_NAMESPACE;
use hearth_data::{ResourceCache, ResourceHandle};
use hearth_telemetry::{MetricId, MetricsRegistry};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn lines(items: &[&str]) -> Lines {
    Lines(items.iter().map(|s| s.to_string()).collect())
}

#[test]
fn test_same_path_shares_one_id_and_one_load() -> Result<()> {
    let fx = Fixture::new(pool(2)?)?;
    fx.write("mesh.obj", "v 0 0 0")?;

    let first = fx.cache.load_id("mesh.obj", Significance::Medium)?;
    let second = fx.cache.load_id("./mesh.obj", Significance::Medium)?;
    assert_eq!(first, second);
    assert_eq!(fx.cache.usage_count(first)?, 2);

    assert_eq!(*fx.cache.access(first)?, lines(&["v 0 0 0"]));
    assert_eq!(fx.stats.loads(), 1);
    Ok(())
}

#[test]
fn test_medium_round_trip_keeps_a_cached_copy() -> Result<()> {
    let fx = Fixture::new(pool(2)?)?;
    fx.write("a.txt", "one\ntwo")?;

    let id = fx.cache.load_id("a.txt", Significance::Medium)?;
    let before = fx.cache.access(id)?;
    assert_eq!(*before, lines(&["one", "two"]));

    fx.cache.decrement_usages(id)?;
    assert_eq!(fx.cache.state(id)?, ResourceState::Cached);
    assert_eq!(fx.stats.dematerializations(), 1);

    fx.cache.increment_usages(id)?;
    assert_eq!(fx.cache.state(id)?, ResourceState::Active);

    let after = fx.cache.access(id)?;
    assert_eq!(*after, *before);
    assert_eq!(fx.stats.loads(), 1);
    assert_eq!(fx.stats.materializations(), 2);
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_symlinked_path_keeps_its_id_once_the_file_exists() -> Result<()> {
    let fx = Fixture::new(pool(2)?)?;
    std::fs::create_dir(fx.dir.path().join("real"))?;
    std::os::unix::fs::symlink(fx.dir.path().join("real"), fx.dir.path().join("link"))?;

    let early = fx.cache.load_id("link/map.txt", Significance::Medium)?;
    assert!(fx.cache.access(early).is_err());

    fx.write("real/map.txt", "hills")?;
    let late = fx.cache.load_id("link/map.txt", Significance::Medium)?;
    let direct = fx.cache.load_id("real/map.txt", Significance::Medium)?;
    assert_eq!(early, late);
    assert_eq!(early, direct);
    assert_eq!(fx.cache.len(), 1);

    fx.cache.reload(early)?;
    assert_eq!(*fx.cache.access(early)?, lines(&["hills"]));
    Ok(())
}

#[test]
fn test_last_handle_drop_applies_the_tier_policy() -> Result<()> {
    let fx = Fixture::new(pool(2)?)?;
    fx.write("door.txt", "wood")?;
    fx.write("creak.ogg", "creak")?;

    for (path, significance, at_rest) in [
        ("door.txt", Significance::Medium, ResourceState::Cached),
        ("creak.ogg", Significance::Low, ResourceState::Unloaded),
    ] {
        let first = ResourceHandle::load(&fx.cache, path, significance)?;
        let second = ResourceHandle::load(&fx.cache, path, significance)?;
        assert_eq!(first, second);
        let id = first.id();
        first.get()?;

        drop(first);
        assert_eq!(fx.cache.usage_count(id)?, 1);
        assert_eq!(fx.cache.state(id)?, ResourceState::Active);
        assert!(second.try_get()?.is_some());

        drop(second);
        assert_eq!(fx.cache.usage_count(id)?, 0);
        assert_eq!(fx.cache.state(id)?, at_rest);
    }
    assert_eq!(fx.stats.loads(), 2);
    Ok(())
}

#[test]
fn test_decrement_at_zero_is_a_no_op() -> Result<()> {
    let fx = Fixture::new(pool(1)?)?;
    fx.write("a.txt", "a")?;

    let id = fx.cache.load_id("a.txt", Significance::Medium)?;
    fx.cache.decrement_usages(id)?;
    let state = fx.cache.state(id)?;

    fx.cache.decrement_usages(id)?;
    fx.cache.decrement_usages(id)?;
    assert_eq!(fx.cache.usage_count(id)?, 0);
    assert_eq!(fx.cache.state(id)?, state);
    Ok(())
}

#[test]
fn test_high_significance_stays_active_without_users() -> Result<()> {
    let fx = Fixture::new(pool(2)?)?;
    fx.write("hero.png", "pixels")?;

    let id = fx.cache.load_id("hero.png", Significance::High)?;
    fx.cache.access(id)?;
    fx.cache.decrement_usages(id)?;

    assert_eq!(fx.cache.usage_count(id)?, 0);
    assert_eq!(fx.cache.state(id)?, ResourceState::Active);
    assert_eq!(*fx.cache.access(id)?, lines(&["pixels"]));
    assert_eq!(fx.stats.loads(), 1);
    assert_eq!(fx.stats.dematerializations(), 0);
    Ok(())
}

#[test]
fn test_high_significance_released_while_loading_ends_active() -> Result<()> {
    let fx = Fixture::new(pool(2)?)?;
    fx.write("hero.png", "pixels")?;

    let id = fx.cache.load_id("hero.png", Significance::High)?;
    fx.cache.decrement_usages(id)?;
    assert_eq!(fx.cache.state(id)?, ResourceState::Active);
    Ok(())
}

#[test]
fn test_low_significance_is_dropped_and_reloaded_on_demand() -> Result<()> {
    let fx = Fixture::new(pool(2)?)?;
    fx.write("ambient.ogg", "noise")?;

    let id = fx.cache.load_id("ambient.ogg", Significance::Low)?;
    fx.cache.access(id)?;
    fx.cache.decrement_usages(id)?;

    assert_eq!(fx.cache.state(id)?, ResourceState::Unloaded);
    assert!(fx.cache.try_access(id, false)?.is_none());
    assert!(matches!(
        fx.cache.access(id),
        Err(CacheError::NotResident { .. })
    ));

    fx.cache.increment_usages(id)?;
    assert_eq!(*fx.cache.access(id)?, lines(&["noise"]));
    assert_eq!(fx.stats.loads(), 2);
    Ok(())
}

#[test]
fn test_release_while_loading_waits_for_the_load() -> Result<()> {
    let gate = Arc::new(Gate::default());
    let loader = CountingLoader {
        gate: Some(Arc::clone(&gate)),
        ..CountingLoader::default()
    };
    let fx = Fixture::with_loader(loader, pool(1)?, CacheConfig::default())?;
    fx.write("slow.bin", "late")?;

    let id = fx.cache.load_id("slow.bin", Significance::Medium)?;
    assert!(fx.cache.try_access(id, false)?.is_none());

    let cache = Arc::clone(&fx.cache);
    let releaser = thread::spawn(move || cache.decrement_usages(id));

    thread::sleep(Duration::from_millis(50));
    assert!(!releaser.is_finished());
    assert_eq!(fx.cache.state(id)?, ResourceState::Loading);

    gate.open();
    releaser.join().expect("releaser panicked")?;

    assert_eq!(fx.cache.usage_count(id)?, 0);
    assert_eq!(fx.cache.state(id)?, ResourceState::Cached);
    Ok(())
}

#[test]
fn test_failed_load_is_reported_to_every_accessor() -> Result<()> {
    let fx = Fixture::new(pool(2)?)?;
    let id = fx.cache.load_id("missing.tex", Significance::Medium)?;

    let first = fx.cache.access(id).unwrap_err();
    let second = fx.cache.access(id).unwrap_err();
    match (&first, &second) {
        (CacheError::LoadFailure(a), CacheError::LoadFailure(b)) => {
            assert!(a.same_failure(b));
            assert!(a.path().ends_with("missing.tex"));
        }
        other => panic!("expected load failures, got {other:?}"),
    }
    assert_eq!(fx.cache.state(id)?, ResourceState::Failed);
    assert_eq!(fx.stats.loads(), 1);
    Ok(())
}

#[test]
fn test_reload_retries_a_failed_load() -> Result<()> {
    let fx = Fixture::new(pool(2)?)?;
    let id = fx.cache.load_id("late.txt", Significance::Medium)?;
    assert!(fx.cache.access(id).is_err());

    fx.write("late.txt", "here now")?;
    fx.cache.reload(id)?;
    assert_eq!(*fx.cache.access(id)?, lines(&["here now"]));
    assert_eq!(fx.stats.loads(), 2);
    Ok(())
}

#[test]
fn test_significance_change_applies_at_next_release() -> Result<()> {
    let fx = Fixture::new(pool(2)?)?;
    fx.write("a.txt", "a")?;

    let id = fx.cache.load_id("a.txt", Significance::Medium)?;
    fx.cache.access(id)?;
    fx.cache.set_significance(id, Significance::High)?;
    assert_eq!(fx.cache.state(id)?, ResourceState::Active);

    fx.cache.decrement_usages(id)?;
    assert_eq!(fx.cache.state(id)?, ResourceState::Active);

    fx.cache.set_significance(id, Significance::Low)?;
    fx.cache.increment_usages(id)?;
    fx.cache.decrement_usages(id)?;
    assert_eq!(fx.cache.state(id)?, ResourceState::Unloaded);
    Ok(())
}

#[test]
fn test_purge_forgets_unused_entries_without_reusing_ids() -> Result<()> {
    let fx = Fixture::new(pool(2)?)?;
    fx.write("a.txt", "a")?;
    fx.write("b.txt", "b")?;

    let a = fx.cache.load_id("a.txt", Significance::Low)?;
    let b = fx.cache.load_id("b.txt", Significance::Medium)?;
    fx.cache.decrement_usages(a)?;
    fx.cache.decrement_usages(b)?;

    assert_eq!(fx.cache.purge_unused(), 1);
    assert_eq!(fx.cache.len(), 1);
    assert_eq!(fx.cache.id_of("a.txt")?, None);
    assert!(fx.cache.state(a).unwrap_err().is_not_found());

    let again = fx.cache.load_id("a.txt", Significance::Low)?;
    assert_ne!(again, a);
    assert_ne!(again, b);
    Ok(())
}

#[test]
fn test_purge_on_evict_removes_low_entries_immediately() -> Result<()> {
    let config = CacheConfig::default().with_purge_on_evict(true);
    let fx = Fixture::with_loader(CountingLoader::default(), pool(2)?, config)?;
    fx.write("a.txt", "a")?;

    let id = fx.cache.load_id("a.txt", Significance::Low)?;
    fx.cache.access(id)?;
    fx.cache.decrement_usages(id)?;
    assert!(fx.cache.is_empty());
    assert!(fx.cache.usage_count(id).unwrap_err().is_not_found());
    Ok(())
}

#[test]
fn test_named_roots_resolve_to_the_same_resource() -> Result<()> {
    let fx = Fixture::new(pool(2)?)?;
    fx.write("models/crate.obj", "v 1 1 1")?;

    let cache = ResourceCache::builder(
        common::unique_tag("rooted"),
        CountingLoader::default(),
        pool(1)?,
    )
    .config(CacheConfig::default().with_root("models", fx.dir.path().join("models")))
    .register()?;

    let by_root = cache.load_id("@models/crate.obj", Significance::Medium)?;
    let by_path = cache.load_id(fx.dir.path().join("models/crate.obj").as_path(), Significance::Medium)?;
    assert_eq!(by_root, by_path);
    assert_eq!(*cache.access(by_root)?, lines(&["v 1 1 1"]));

    assert!(matches!(
        cache.load_id("@sounds/x.ogg", Significance::Low),
        Err(CacheError::UnknownRoot(_))
    ));
    Ok(())
}

#[test]
fn test_metrics_follow_the_lifecycle() -> Result<()> {
    let metrics = MetricsRegistry::new();
    let tag = common::unique_tag("metered");
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("a.txt"), "a")?;
    std::fs::write(dir.path().join("b.txt"), "b")?;

    let cache = ResourceCache::builder(tag.as_str(), CountingLoader::default(), pool(2)?)
        .config(CacheConfig::default().with_base_dir(dir.path()))
        .metrics(&metrics)
        .register()?;

    let a = cache.load_id("a.txt", Significance::Medium)?;
    cache.access(a)?;
    cache.decrement_usages(a)?;
    cache.increment_usages(a)?;

    let b = cache.load_id("b.txt", Significance::Low)?;
    cache.access(b)?;
    cache.decrement_usages(b)?;
    let broken = cache.load_id("nope.txt", Significance::Low)?;
    assert!(cache.access(broken).is_err());

    let counter = |name: &str| {
        metrics.counter_value(&MetricId::new(METRICS_NAMESPACE, name).with_label("cache", tag.as_str()))
    };
    assert_eq!(counter("loads_submitted")?, 3);
    assert_eq!(counter("loads_failed")?, 1);
    assert_eq!(counter("materializations")?, 3);
    assert_eq!(counter("dematerializations")?, 1);
    assert_eq!(counter("evictions")?, 1);
    assert_eq!(metrics.namespace_metrics(METRICS_NAMESPACE).len(), 7);

    // Only `a` holds an active representation.
    let resident = MetricId::new(METRICS_NAMESPACE, "resident").with_label("cache", tag.as_str());
    assert_eq!(metrics.get_metric(&resident)?.value.as_gauge(), Some(1.0));

    cache.reload(a)?;
    assert_eq!(metrics.get_metric(&resident)?.value.as_gauge(), Some(0.0));
    cache.access(a)?;
    assert_eq!(metrics.get_metric(&resident)?.value.as_gauge(), Some(1.0));

    drop(cache);
    assert_eq!(metrics.get_metric(&resident)?.value.as_gauge(), Some(0.0));
    Ok(())
}

#[test]
fn test_concurrent_handles_share_one_load() -> Result<()> {
    let fx = Fixture::new(pool(4)?)?;
    fx.write("shared.txt", "shared")?;

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&fx.cache);
            thread::spawn(move || -> Result<()> {
                for _ in 0..25 {
                    let handle = ResourceHandle::load(&cache, "shared.txt", Significance::Medium)?;
                    let copy = handle.clone();
                    assert_eq!(*copy.get()?, lines(&["shared"]));
                    drop(copy);
                    handle.release()?;
                }
                Ok(())
            })
        })
        .collect();

    for worker in workers {
        worker.join().expect("worker panicked")?;
    }

    let id = fx.cache.id_of("shared.txt")?.expect("registered");
    assert_eq!(fx.cache.usage_count(id)?, 0);
    assert_eq!(fx.cache.state(id)?, ResourceState::Cached);
    assert_eq!(fx.stats.loads(), 1);
    Ok(())
}
