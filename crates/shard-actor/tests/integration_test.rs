mod common;

use common::{counter_system, decode_state, message, Counter, SYSTEM};
use serde_json::json;
use shard_actor::{
    cache_key, ActorError, ActorSystem, ActorSystemConfig, EntityRecord, LifecyclePhase, Payload,
    Storage, SystemRegistry, WarmCache,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const ASK: Duration = Duration::from_secs(1);

#[tokio::test]
async fn test_tell_then_ask_observes_the_update() {
    let harness = counter_system(ActorSystemConfig::default());
    let system = &harness.system;

    system.tell(1001, message("ADD", json!(100))).await.unwrap();
    let value = system.ask(1001, message("GET", Payload::Null), ASK).await.unwrap();

    assert_eq!(value, json!(100));
    assert_eq!(system.resident_count(), 1);
    assert_eq!(harness.hooks.activations(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_tells_are_all_applied() {
    let harness = counter_system(ActorSystemConfig::default());

    let mut callers = Vec::new();
    for _ in 0..50 {
        let system = harness.system.clone();
        callers.push(tokio::spawn(async move {
            for _ in 0..10 {
                system.tell(7, message("ADD", json!(1))).await.unwrap();
            }
        }));
    }
    for caller in callers {
        caller.await.unwrap();
    }

    let value = harness
        .system
        .ask(7, message("GET", Payload::Null), ASK)
        .await
        .unwrap();
    assert_eq!(value, json!(500));
    assert_eq!(harness.hooks.activations(), 1, "one actor per entity");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_tells_racing_eviction_reach_a_fresh_incarnation() {
    let config = ActorSystemConfig {
        idle_timeout_minutes: 0,
        ..ActorSystemConfig::default()
    };
    let harness = counter_system(config);
    let done = Arc::new(AtomicBool::new(false));

    let evictor = {
        let system = harness.system.clone();
        let done = done.clone();
        tokio::spawn(async move {
            let mut evicted = 0;
            while !done.load(Ordering::Acquire) {
                evicted += system.evict_idle().await;
                tokio::task::yield_now().await;
            }
            evicted
        })
    };

    let mut callers = Vec::new();
    for _ in 0..8 {
        let system = harness.system.clone();
        callers.push(tokio::spawn(async move {
            let mut accepted = 0i64;
            for _ in 0..250 {
                if system.tell(3, message("ADD", json!(1))).await.is_ok() {
                    accepted += 1;
                }
            }
            accepted
        }));
    }
    let mut accepted = 0;
    for caller in callers {
        accepted += caller.await.unwrap();
    }
    done.store(true, Ordering::Release);
    evictor.await.unwrap();

    // One more passivation guarantees the final read comes from a rehydrated actor.
    harness.system.evict_idle().await;
    let value = harness
        .system
        .ask(3, message("GET", Payload::Null), ASK)
        .await
        .unwrap();

    assert!(accepted > 0);
    assert_eq!(value, json!(accepted), "no accepted tell was lost");
    assert!(harness.hooks.activations() > 1);
}

#[tokio::test]
async fn test_handler_errors_reach_the_asker_and_the_actor_survives() {
    let harness = counter_system(ActorSystemConfig::default());
    let system = &harness.system;

    let result = system.ask(1, message("FAIL", Payload::Null), ASK).await;
    assert!(matches!(result, Err(ActorError::Entity(_))));

    system.tell(1, message("ADD", json!(2))).await.unwrap();
    let value = system.ask(1, message("GET", Payload::Null), ASK).await.unwrap();
    assert_eq!(value, json!(2));

    let stats = system.get_actor_if_present(1).unwrap().stats();
    assert_eq!(stats.processed, 3);
    assert_eq!(stats.phase, LifecyclePhase::Active);
    assert!(stats.dirty);
}

#[tokio::test(start_paused = true)]
async fn test_ask_timeout_releases_only_the_caller() {
    let harness = counter_system(ActorSystemConfig::default());
    let system = &harness.system;

    let result = system.ask(1, message("SLOW", json!(5)), ASK).await;
    assert!(matches!(result, Err(ActorError::AskTimeout(_))));

    // The slow message still completes before the next one is handled.
    let value = system
        .ask(1, message("GET", Payload::Null), Duration::from_secs(10))
        .await
        .unwrap();
    assert_eq!(value, json!(1));
}

#[tokio::test(start_paused = true)]
async fn test_persistence_sweep_writes_cache_and_store() {
    let config = ActorSystemConfig {
        save_interval_seconds: 1,
        ..ActorSystemConfig::default()
    };
    let harness = counter_system(config);
    harness.system.start();

    harness.system.tell(42, message("ADD", json!(5))).await.unwrap();
    harness
        .system
        .ask(42, message("GET", Payload::Null), ASK)
        .await
        .unwrap();
    assert!(harness.store.record(SYSTEM, 42).is_none());

    tokio::time::sleep(Duration::from_millis(1_500)).await;

    let stored = harness.store.record(SYSTEM, 42).expect("flushed to store");
    assert_eq!(decode_state(&stored.state).value, 5);
    assert_eq!(stored.version, 1);

    let cached: EntityRecord =
        serde_json::from_str(&harness.cache.peek(&cache_key(SYSTEM, 42)).unwrap()).unwrap();
    assert_eq!(cached.state, stored.state);
    assert!(!harness.system.get_actor_if_present(42).unwrap().is_dirty());

    // Clean actors are not written again.
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(harness.store.save_count(), 1);
}

#[tokio::test]
async fn test_failed_flush_keeps_actor_dirty_until_backend_recovers() {
    let harness = counter_system(ActorSystemConfig::default());
    let system = &harness.system;
    system.tell(3, message("ADD", json!(9))).await.unwrap();
    system.ask(3, message("GET", Payload::Null), ASK).await.unwrap();

    harness.store.set_fail_writes(true);
    let report = system.flush_all().await;
    assert_eq!((report.attempted, report.written, report.failed), (1, 0, 1));
    assert!(system.get_actor_if_present(3).unwrap().is_dirty());

    harness.store.set_fail_writes(false);
    let report = system.flush_all().await;
    assert_eq!((report.attempted, report.written, report.failed), (1, 1, 0));
    assert!(!system.get_actor_if_present(3).unwrap().is_dirty());
    assert_eq!(decode_state(&harness.store.record(SYSTEM, 3).unwrap().state).value, 9);
}

#[tokio::test(start_paused = true)]
async fn test_idle_actor_is_persisted_then_evicted_then_rehydrated() {
    let config = ActorSystemConfig {
        idle_timeout_minutes: 1,
        ..ActorSystemConfig::default()
    };
    let harness = counter_system(config);
    let system = &harness.system;

    system.tell(1, message("ADD", json!(7))).await.unwrap();
    system.ask(1, message("GET", Payload::Null), ASK).await.unwrap();

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(system.evict_idle().await, 0, "not idle long enough");

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(system.evict_idle().await, 1);

    // By the time eviction reports, the state is durable and the slot is free.
    assert_eq!(system.resident_count(), 0);
    let stored = harness.store.record(SYSTEM, 1).unwrap();
    assert_eq!(decode_state(&stored.state).value, 7);
    assert_eq!(harness.hooks.passivations(), 1);

    // Rehydrated from the warm cache.
    let value = system.ask(1, message("GET", Payload::Null), ASK).await.unwrap();
    assert_eq!(value, json!(7));
    assert_eq!(harness.hooks.activations(), 2);

    // Rehydrated from the store once the cache entry is gone.
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(system.evict_idle().await, 1);
    harness.cache.delete(&cache_key(SYSTEM, 1)).await.unwrap();
    let value = system.ask(1, message("GET", Payload::Null), ASK).await.unwrap();
    assert_eq!(value, json!(7));
}

#[tokio::test(start_paused = true)]
async fn test_eviction_is_postponed_while_flush_fails() {
    let config = ActorSystemConfig {
        idle_timeout_minutes: 1,
        ..ActorSystemConfig::default()
    };
    let harness = counter_system(config);
    let system = &harness.system;
    system.tell(5, message("ADD", json!(1))).await.unwrap();
    system.ask(5, message("GET", Payload::Null), ASK).await.unwrap();

    harness.store.set_fail_writes(true);
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(system.evict_idle().await, 0);
    assert!(system.has_actor(5));

    harness.store.set_fail_writes(false);
    assert_eq!(system.evict_idle().await, 1);
    assert!(harness.store.record(SYSTEM, 5).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_eviction_sweep_runs_in_background() {
    let config = ActorSystemConfig {
        idle_timeout_minutes: 1,
        eviction_check_interval_seconds: 10,
        ..ActorSystemConfig::default()
    };
    let harness = counter_system(config);
    harness.system.start();
    harness.system.tell(8, message("ADD", json!(3))).await.unwrap();
    harness
        .system
        .ask(8, message("GET", Payload::Null), ASK)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(75)).await;

    assert!(!harness.system.has_actor(8));
    assert_eq!(decode_state(&harness.store.record(SYSTEM, 8).unwrap().state).value, 3);
}

#[tokio::test]
async fn test_shutdown_flushes_every_dirty_actor() {
    let harness = counter_system(ActorSystemConfig::default());
    let system = &harness.system;
    for id in 1..=3 {
        system.tell(id, message("ADD", json!(id))).await.unwrap();
    }

    let report = system.shutdown().await;

    assert_eq!(report.stopped, 3);
    assert_eq!(report.flush_failed, 0);
    assert!(!report.timed_out);
    assert_eq!(system.resident_count(), 0);
    for id in 1..=3 {
        let stored = harness.store.record(SYSTEM, id).unwrap();
        assert_eq!(decode_state(&stored.state).value, id as i64);
    }
    assert!(matches!(
        system.tell(4, message("ADD", json!(1))).await,
        Err(ActorError::ShuttingDown(_))
    ));
}

#[tokio::test]
async fn test_cache_failure_on_final_flush_does_not_roll_back_state() {
    let first = counter_system(ActorSystemConfig::default());
    first.system.tell(1, message("ADD", json!(7))).await.unwrap();
    assert_eq!(first.system.flush_all().await.written, 1);
    first.system.tell(1, message("ADD", json!(1))).await.unwrap();

    first.cache.set_fail_writes(true);
    let report = first.system.shutdown().await;
    assert_eq!(report.flush_failed, 1);
    assert_eq!(decode_state(&first.store.record(SYSTEM, 1).unwrap().state).value, 8);
    assert!(first.cache.peek(&cache_key(SYSTEM, 1)).is_none(), "stale shadow invalidated");
    first.cache.set_fail_writes(false);

    let second = ActorSystem::new(
        SYSTEM,
        ActorSystemConfig::default(),
        Storage::new(first.cache.clone(), first.store.clone()),
        first.hooks.clone(),
        |id| Counter {
            id,
            ..Counter::default()
        },
    );
    let value = second.ask(1, message("GET", Payload::Null), ASK).await.unwrap();
    assert_eq!(value, json!(8));
}

#[tokio::test]
async fn test_capacity_limit_rejects_new_actors_only() {
    let config = ActorSystemConfig {
        max_resident_actors: 2,
        ..ActorSystemConfig::default()
    };
    let harness = counter_system(config);
    let system = &harness.system;

    system.tell(1, message("ADD", json!(1))).await.unwrap();
    system.tell(2, message("ADD", json!(1))).await.unwrap();
    assert!(matches!(
        system.tell(3, message("ADD", json!(1))).await,
        Err(ActorError::CapacityExceeded(2))
    ));

    system.tell(1, message("ADD", json!(1))).await.unwrap();
    let value = system.ask(1, message("GET", Payload::Null), ASK).await.unwrap();
    assert_eq!(value, json!(2));
    assert_eq!(system.resident_count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creation_respects_capacity() {
    let config = ActorSystemConfig {
        max_resident_actors: 4,
        ..ActorSystemConfig::default()
    };
    let harness = counter_system(config);

    let mut creators = Vec::new();
    for id in 0..64 {
        let system = harness.system.clone();
        creators.push(tokio::spawn(async move { system.get_actor(id).is_ok() }));
    }
    let mut created = 0;
    for creator in creators {
        if creator.await.unwrap() {
            created += 1;
        }
    }

    assert_eq!(created, 4);
    assert_eq!(harness.system.resident_count(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_actors_created_during_shutdown_are_still_flushed() {
    let harness = counter_system(ActorSystemConfig::default());

    let mut callers = Vec::new();
    for caller in 0..4u64 {
        let system = harness.system.clone();
        callers.push(tokio::spawn(async move {
            let mut accepted = Vec::new();
            for n in 0..100 {
                let id = caller * 1_000 + n;
                if system.tell(id, message("ADD", json!(1))).await.is_ok() {
                    accepted.push(id);
                }
                tokio::task::yield_now().await;
            }
            accepted
        }));
    }
    tokio::task::yield_now().await;
    let report = harness.system.shutdown().await;

    let mut accepted = Vec::new();
    for caller in callers {
        accepted.extend(caller.await.unwrap());
    }
    assert_eq!(report.flush_failed, 0);
    assert!(report.stopped >= accepted.len());
    assert_eq!(harness.system.resident_count(), 0);
    for id in accepted {
        let record = harness.store.record(SYSTEM, id).expect("accepted tell was flushed");
        assert_eq!(decode_state(&record.state).value, 1);
    }
}

#[tokio::test(start_paused = true)]
async fn test_bounded_mailbox_reports_full() {
    let config = ActorSystemConfig {
        mailbox_capacity: Some(1),
        ..ActorSystemConfig::default()
    };
    let harness = counter_system(config);
    let system = &harness.system;

    system.tell(1, message("SLOW", json!(5))).await.unwrap();
    // Let the actor hydrate and start on the slow message.
    tokio::time::sleep(Duration::from_millis(10)).await;

    system.tell(1, message("ADD", json!(1))).await.unwrap();
    assert!(matches!(
        system.tell(1, message("ADD", json!(1))).await,
        Err(ActorError::MailboxFull(1))
    ));
}

#[tokio::test]
async fn test_hydration_prefers_cache_then_store_then_factory() {
    let harness = counter_system(ActorSystemConfig::default());
    let state = |value: i64| {
        serde_json::to_string(&Counter {
            id: 1,
            value,
            last_origin: None,
        })
        .unwrap()
    };

    harness.store.insert(EntityRecord::new(SYSTEM, 1, state(10), 3));
    let cached = EntityRecord::new(SYSTEM, 1, state(20), 4);
    harness
        .cache
        .set(
            &cache_key(SYSTEM, 1),
            serde_json::to_string(&cached).unwrap(),
            Duration::from_secs(60),
        )
        .await
        .unwrap();
    harness.store.insert(EntityRecord::new(SYSTEM, 2, state(10), 3));

    let system = &harness.system;
    assert_eq!(system.ask(1, message("GET", Payload::Null), ASK).await.unwrap(), json!(20));
    assert_eq!(system.ask(2, message("GET", Payload::Null), ASK).await.unwrap(), json!(10));
    assert_eq!(system.ask(3, message("GET", Payload::Null), ASK).await.unwrap(), json!(0));

    // The store hit re-warmed the cache.
    assert!(harness.cache.peek(&cache_key(SYSTEM, 2)).is_some());

    // Versions continue from the hydrated shadow; untouched entities are not written.
    system.tell(1, message("ADD", json!(1))).await.unwrap();
    let report = system.flush_all().await;
    assert_eq!(report.written, 1);
    assert_eq!(harness.store.record(SYSTEM, 1).unwrap().version, 5);
    assert!(harness.store.record(SYSTEM, 3).is_none());
}

#[tokio::test]
async fn test_hydration_failure_aborts_only_that_actor() {
    let harness = counter_system(ActorSystemConfig::default());
    let system = &harness.system;
    system.ask(1, message("ADD", json!(1)), ASK).await.unwrap();

    harness.store.set_fail_reads(true);
    let result = system.ask(2, message("GET", Payload::Null), ASK).await;
    assert!(result.is_err());
    assert!(!system.has_actor(2));

    // Other actors are unaffected and the entity can be retried.
    assert_eq!(system.ask(1, message("GET", Payload::Null), ASK).await.unwrap(), json!(1));
    harness.store.set_fail_reads(false);
    assert_eq!(system.ask(2, message("GET", Payload::Null), ASK).await.unwrap(), json!(0));
}

#[tokio::test]
async fn test_registry_reports_absent_systems() {
    let harness = counter_system(ActorSystemConfig::default());
    let systems = SystemRegistry::new();
    systems.register(harness.system.clone());

    assert_eq!(systems.names(), vec![SYSTEM.to_string()]);
    assert!(systems.tell(SYSTEM, 1, message("ADD", json!(1))).await.is_ok());
    assert!(matches!(
        systems.tell("guild", 1, message("ADD", json!(1))).await,
        Err(ActorError::SystemAbsent(_))
    ));

    let reports = systems.shutdown_all().await;
    assert_eq!(reports[SYSTEM].stopped, 1);
}
