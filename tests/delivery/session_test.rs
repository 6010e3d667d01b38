//! Session acquisition: lazy connect, single handshake, reuse.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Barrier;

use lowpulse::delivery::{DeliveryError, SessionManager, SessionState, UnconfiguredTransport};

use crate::support::{credentials, manager, RecordingTransport};

#[tokio::test]
async fn no_connect_happens_before_first_use() {
    let transport = Arc::new(RecordingTransport::new());
    let manager = manager(Arc::clone(&transport), None);

    assert_eq!(transport.connects(), 0);
    assert_eq!(manager.state(), SessionState::Uninitialized);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_callers_share_one_connect() {
    const CALLERS: usize = 16;

    let transport =
        Arc::new(RecordingTransport::new().with_connect_delay(Duration::from_millis(50)));
    let manager = Arc::new(manager(Arc::clone(&transport), None));
    let barrier = Arc::new(Barrier::new(CALLERS));

    let mut tasks = Vec::with_capacity(CALLERS);
    for _ in 0..CALLERS {
        let manager = Arc::clone(&manager);
        let barrier = Arc::clone(&barrier);
        tasks.push(tokio::spawn(async move {
            barrier.wait().await;
            manager.acquire_session().await
        }));
    }

    let mut handles = Vec::with_capacity(CALLERS);
    for task in tasks {
        match task.await {
            Ok(Ok(handle)) => handles.push(handle),
            Ok(Err(err)) => panic!("acquire should succeed: {err}"),
            Err(err) => panic!("task should not panic: {err}"),
        }
    }

    assert_eq!(transport.connects(), 1);
    let first = &handles[0];
    assert!(handles.iter().all(|h| Arc::ptr_eq(h, first)));
    assert_eq!(manager.state(), SessionState::Connected);
}

#[tokio::test]
async fn sequential_calls_reuse_the_handle() {
    let transport = Arc::new(RecordingTransport::new());
    let manager = manager(Arc::clone(&transport), None);

    let first = manager.acquire_session().await.expect("first acquire");
    let second = manager.acquire_session().await.expect("second acquire");
    let third = manager.acquire_session().await.expect("third acquire");

    assert_eq!(transport.connects(), 1);
    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&second, &third));
    assert_eq!(first.describe(), "test_session");
}

#[tokio::test(start_paused = true)]
async fn caller_arriving_mid_connect_waits_for_the_same_handle() {
    let transport =
        Arc::new(RecordingTransport::new().with_connect_delay(Duration::from_millis(50)));
    let manager = Arc::new(manager(Arc::clone(&transport), None));

    let early = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.acquire_session().await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(manager.state(), SessionState::Connecting);

    let late = manager.acquire_session().await.expect("late acquire");
    let early = match early.await {
        Ok(Ok(handle)) => handle,
        Ok(Err(err)) => panic!("early acquire should succeed: {err}"),
        Err(err) => panic!("task should not panic: {err}"),
    };

    assert_eq!(transport.connects(), 1);
    assert!(Arc::ptr_eq(&early, &late));
}

#[tokio::test]
async fn unavailable_transport_fails_before_connecting() {
    let transport = Arc::new(RecordingTransport::unavailable());
    let manager = manager(Arc::clone(&transport), None);

    let err = match manager.acquire_session().await {
        Ok(_) => panic!("acquire should fail"),
        Err(err) => err,
    };

    assert!(matches!(err, DeliveryError::TransportUnavailable(_)));
    assert_eq!(transport.connects(), 0);
    assert_eq!(manager.state(), SessionState::Uninitialized);
}

#[tokio::test]
async fn unconfigured_transport_reports_its_reason() {
    let manager = SessionManager::new(
        Arc::new(UnconfiguredTransport::new("set TELEGRAM_BOT_TOKEN")),
        credentials(),
        None,
    );

    match manager.acquire_session().await {
        Err(DeliveryError::TransportUnavailable(reason)) => {
            assert_eq!(reason, "set TELEGRAM_BOT_TOKEN");
        }
        Err(other) => panic!("expected TransportUnavailable, got: {other}"),
        Ok(_) => panic!("acquire should fail"),
    }
}

#[tokio::test]
async fn failed_connect_is_reported_and_next_call_retries() {
    let transport = Arc::new(RecordingTransport::new().failing_connects(1));
    let manager = manager(Arc::clone(&transport), None);

    match manager.acquire_session().await {
        Err(DeliveryError::ConnectionFailed { transport, .. }) => {
            assert_eq!(transport, "recording");
        }
        Err(other) => panic!("expected ConnectionFailed, got: {other}"),
        Ok(_) => panic!("first acquire should fail"),
    }
    assert_eq!(manager.state(), SessionState::Uninitialized);

    let handle = manager.acquire_session().await;
    assert!(handle.is_ok());
    assert_eq!(transport.connects(), 2);
    assert_eq!(manager.state(), SessionState::Connected);
}

#[tokio::test]
async fn state_changes_are_observable() {
    let transport = Arc::new(RecordingTransport::new());
    let manager = manager(Arc::clone(&transport), None);
    let mut states = manager.watch_state();

    manager.acquire_session().await.expect("acquire");

    assert!(states.has_changed().unwrap_or(false));
    assert_eq!(*states.borrow_and_update(), SessionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn abandoned_connect_resets_the_state() {
    let transport =
        Arc::new(RecordingTransport::new().with_connect_delay(Duration::from_millis(50)));
    let manager = manager(Arc::clone(&transport), None);

    let timed_out =
        tokio::time::timeout(Duration::from_millis(10), manager.acquire_session()).await;

    assert!(timed_out.is_err());
    assert_eq!(manager.state(), SessionState::Uninitialized);

    let handle = manager.acquire_session().await;
    assert!(handle.is_ok());
    assert_eq!(transport.connects(), 2);
    assert_eq!(manager.state(), SessionState::Connected);
}
