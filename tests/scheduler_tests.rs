//! Scheduler actor behavior: one-shot delivery, cancellation, recurring
//! ticks, and teardown.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use lattice_rt::prelude::*;

async fn wait_until<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

fn collector_behavior(log: Arc<Mutex<Vec<String>>>) -> Behavior {
    Behavior::stateless(move |params| {
        let log = Arc::clone(&log);
        async move {
            log.lock().push(params.message.kind().to_string());
            Ok(HandlerResult::unchanged())
        }
    })
}

async fn running_system() -> ActorSystem {
    let system = ActorSystem::new(SystemConfig::default()).expect("config is valid");
    system.start().await.expect("system starts");
    system
}

#[tokio::test]
async fn cancelled_schedule_never_fires_while_uncancelled_does() {
    let system = running_system().await;
    let log = Arc::new(Mutex::new(Vec::new()));
    let target = system
        .spawn(collector_behavior(Arc::clone(&log)), SpawnOptions::new())
        .await
        .expect("target spawns");

    // Cancel well before the 100ms delay elapses.
    let cancelled_id = system
        .schedule_once(
            Duration::from_millis(100),
            target.clone(),
            Message::of("CANCELLED_TICK"),
        )
        .await
        .expect("schedule succeeds");
    tokio::time::sleep(Duration::from_millis(20)).await;
    system
        .cancel_schedule(cancelled_id)
        .await
        .expect("cancel succeeds");

    // A second schedule runs to completion.
    system
        .schedule_once(
            Duration::from_millis(30),
            target.clone(),
            Message::of("LIVE_TICK"),
        )
        .await
        .expect("schedule succeeds");

    let log_clone = Arc::clone(&log);
    assert!(
        wait_until(
            move || log_clone.lock().contains(&"LIVE_TICK".to_string()),
            Duration::from_secs(2)
        )
        .await,
        "the live schedule should fire"
    );

    // Give the cancelled entry's original deadline time to pass.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(!log.lock().contains(&"CANCELLED_TICK".to_string()));

    system.stop().await.expect("stop succeeds");
}

#[tokio::test]
async fn recurring_schedule_ticks_until_cancelled() {
    let system = running_system().await;
    let log = Arc::new(Mutex::new(Vec::new()));
    let target = system
        .spawn(collector_behavior(Arc::clone(&log)), SpawnOptions::new())
        .await
        .expect("target spawns");

    let id = system
        .schedule_recurring(
            Duration::from_millis(20),
            target.clone(),
            Message::of("TICK"),
        )
        .await
        .expect("schedule succeeds");

    let log_clone = Arc::clone(&log);
    assert!(
        wait_until(move || log_clone.lock().len() >= 3, Duration::from_secs(2)).await,
        "recurring entry should keep firing"
    );

    system.cancel_schedule(id).await.expect("cancel succeeds");
    system.flush().await;
    let count_after_cancel = log.lock().len();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(log.lock().len(), count_after_cancel);

    system.stop().await.expect("stop succeeds");
}

#[tokio::test]
async fn zero_interval_recurring_is_rejected() {
    let system = running_system().await;
    let target = Address::new(LOCAL_NODE, "worker", "w1");

    let err = system
        .schedule_recurring(Duration::ZERO, target, Message::of("TICK"))
        .await
        .expect_err("zero interval is invalid");
    assert!(matches!(err, SystemError::Scheduler { .. }));

    system.stop().await.expect("stop succeeds");
}

#[tokio::test]
async fn cancelling_unknown_schedule_errors() {
    let system = running_system().await;

    let err = system
        .cancel_schedule(ScheduleId::new())
        .await
        .expect_err("unknown id");
    assert!(matches!(err, SystemError::Scheduler { .. }));

    system.stop().await.expect("stop succeeds");
}

#[tokio::test]
async fn pending_schedules_die_with_the_system() {
    let system = running_system().await;
    let log = Arc::new(Mutex::new(Vec::new()));
    let target = system
        .spawn(collector_behavior(Arc::clone(&log)), SpawnOptions::new())
        .await
        .expect("target spawns");

    system
        .schedule_once(
            Duration::from_millis(200),
            target,
            Message::of("LATE_TICK"),
        )
        .await
        .expect("schedule succeeds");

    system.stop().await.expect("stop succeeds");
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(!log.lock().contains(&"LATE_TICK".to_string()));

    // And the scheduler surface is gone with the system.
    let err = system
        .schedule_once(
            Duration::from_millis(10),
            Address::new(LOCAL_NODE, "worker", "w"),
            Message::of("TICK"),
        )
        .await
        .expect_err("stopped system has no scheduler");
    assert!(matches!(err, SystemError::NotRunning));
}
