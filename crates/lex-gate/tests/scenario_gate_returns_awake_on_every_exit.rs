//! The gate is AWAKE before and after every cycle, however the cycle ends.
//!
//! - normal completion
//! - early return with an error
//! - panic inside the cycle task
//! - cancellation while the cycle body is suspended
//! - cancellation while still waiting for readers to drain

use std::sync::Arc;
use std::time::Duration;

use lex_gate::{Availability, AvailabilityGate};

async fn failing_cycle(gate: &AvailabilityGate) -> Result<(), String> {
    let _guard = gate.begin_cycle().await;
    assert_eq!(gate.state(), Availability::Sleeping);
    Err("remote unavailable".to_string())
}

#[tokio::test]
async fn error_path_restores_awake() {
    let gate = AvailabilityGate::new();
    assert!(gate.is_awake());
    assert!(failing_cycle(&gate).await.is_err());
    assert!(gate.is_awake());
}

#[tokio::test]
async fn panic_in_cycle_task_restores_awake() {
    let gate = Arc::new(AvailabilityGate::new());
    let g = Arc::clone(&gate);
    let res = tokio::spawn(async move {
        let _guard = g.begin_cycle().await;
        panic!("boom");
    })
    .await;

    assert!(res.is_err());
    assert!(gate.is_awake());
    assert!(gate.try_enter().is_some());
}

#[tokio::test]
async fn aborted_cycle_restores_awake() {
    let gate = Arc::new(AvailabilityGate::new());
    let g = Arc::clone(&gate);
    let task = tokio::spawn(async move {
        let _guard = g.begin_cycle().await;
        tokio::time::sleep(Duration::from_secs(3600)).await;
    });

    // Let the task reach its sleep.
    for _ in 0..100 {
        if !gate.is_awake() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(gate.state(), Availability::Sleeping);

    task.abort();
    let _ = task.await;
    assert!(gate.is_awake());
}

#[tokio::test]
async fn cancelled_while_waiting_for_readers_restores_awake() {
    let gate = AvailabilityGate::new();
    let permit = gate.try_enter().expect("awake gate hands out permits");

    // The cycle cannot get the write side while the permit is alive.
    let waited = tokio::time::timeout(Duration::from_millis(50), gate.begin_cycle()).await;
    assert!(waited.is_err(), "cycle must wait for in-flight readers");
    assert!(gate.is_awake());

    drop(permit);
    let guard = gate.begin_cycle().await;
    drop(guard);
    assert!(gate.is_awake());
}

#[tokio::test]
async fn cycle_waits_for_in_flight_read_to_finish() {
    let gate = Arc::new(AvailabilityGate::new());
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let reader_gate = Arc::clone(&gate);
    let reader = tokio::spawn(async move {
        reader_gate
            .gated(|| async move {
                let _ = rx.await;
                "read done"
            })
            .await
    });

    // Wait until the reader holds its permit (a writer would then block).
    tokio::time::sleep(Duration::from_millis(20)).await;

    let writer_gate = Arc::clone(&gate);
    let writer = tokio::spawn(async move {
        let _guard = writer_gate.begin_cycle().await;
        "cycle done"
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!writer.is_finished(), "cycle must not start under a live read");
    // New readers are already turned away.
    assert!(gate.try_enter().is_none());

    tx.send(()).unwrap();
    assert_eq!(reader.await.unwrap().into_option(), Some("read done"));
    assert_eq!(writer.await.unwrap(), "cycle done");
    assert!(gate.is_awake());
}
