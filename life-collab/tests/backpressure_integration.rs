//! Overflow and visibility integration tests.
//!
//! Verifies:
//! - A backlog above the threshold forces a resync with a fresh snapshot
//! - A backlog at the threshold is left to drain
//! - Hiding the page releases the connection and showing it reconnects

mod common;

use std::sync::{Arc, Mutex};

use common::{snapshot, wait_for_event, wait_until, ServerEvent, TestServer, GRID};
use life_collab::{ClientConfig, ConnectionState, Phase, Session, SessionEvent, Visibility};
use life_core::{Board, Coord, OverlayCells};
use tokio::time::Duration;

fn diffs(count: u32) -> Vec<String> {
    (0..count)
        .map(|n| format!(r##"{{"{}":{{"0":"#ff0000"}}}}"##, n % GRID.width))
        .collect()
}

/// Slow dequeueing so a backlog stays put, with frequent sweeps.
fn backlog_config(server: &TestServer, balance_ms: u64) -> ClientConfig {
    ClientConfig {
        dequeue_interval: Duration::from_secs(30),
        balance_interval: Duration::from_millis(balance_ms),
        ..server.config()
    }
}

// ─── Overflow ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_overflow_forces_resync() {
    let mut flood = vec![snapshot(&[])];
    flood.extend(diffs(10));
    let fresh = vec![snapshot(&[(0, 0, "#abcdef")])];
    let mut server = TestServer::start(vec![flood, fresh]).await;

    let board = Arc::new(Mutex::new(Board::new(GRID)));
    let (handle, mut events, _task) = Session::spawn(
        backlog_config(&server, 400),
        board.clone(),
        OverlayCells::new(),
    );

    let closed = server
        .wait_for(|e| matches!(e, ServerEvent::Closed { connection: 0, .. }))
        .await;
    assert_eq!(
        closed,
        ServerEvent::Closed {
            connection: 0,
            code: Some(1000),
            reason: Some("buffer overflow".to_string()),
        }
    );
    server.wait_for(|e| *e == ServerEvent::Accepted(1)).await;

    wait_for_event(&mut events, |e| *e == SessionEvent::Resynced).await;
    wait_for_event(&mut events, |e| matches!(e, SessionEvent::SnapshotApplied { .. })).await;
    assert!(board.lock().unwrap().is_filled(Coord::new(0, 0)));

    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.connection_id, Some(2));
    assert_eq!(stats.connection, ConnectionState::Connected);
    assert_eq!(stats.buffered, 0);
    assert!(!stats.overflowing);
    assert_eq!(stats.resyncs, 1);
}

#[tokio::test]
async fn test_backlog_at_threshold_is_kept() {
    let mut script = vec![snapshot(&[])];
    script.extend(diffs(5));
    let mut server = TestServer::start(vec![script]).await;

    let (handle, _events, _task) = Session::spawn(
        backlog_config(&server, 100),
        Board::new(GRID),
        OverlayCells::new(),
    );

    wait_until(|| {
        let handle = handle.clone();
        async move { handle.stats().await.map_or(false, |s| s.buffered == 5) }
    })
    .await;
    wait_until(|| {
        let handle = handle.clone();
        async move { handle.stats().await.map_or(false, |s| s.sweeps >= 3) }
    })
    .await;

    assert!(
        server
            .quiet_for(Duration::from_millis(300), |e| matches!(
                e,
                ServerEvent::Closed { .. }
            ))
            .await
    );
    let stats = handle.stats().await.unwrap();
    assert!(!stats.overflowing);
    assert_eq!(stats.resyncs, 0);
    assert_eq!(stats.phase, Phase::ActiveDraining);
}

// ─── Visibility ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_hide_and_show_cycles_connection() {
    let mut server = TestServer::start(vec![vec![snapshot(&[])]]).await;
    let (handle, mut events, _task) =
        Session::spawn(server.config(), Board::new(GRID), OverlayCells::new());

    wait_for_event(&mut events, |e| matches!(e, SessionEvent::Connected(_))).await;

    handle.set_visibility(Visibility::Hidden).await.unwrap();
    let closed = server
        .wait_for(|e| matches!(e, ServerEvent::Closed { connection: 0, .. }))
        .await;
    assert_eq!(
        closed,
        ServerEvent::Closed {
            connection: 0,
            code: Some(1000),
            reason: Some("page hidden".to_string()),
        }
    );
    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.phase, Phase::Inactive);
    assert_eq!(stats.connection, ConnectionState::Disconnected);
    assert!(stats.hidden);

    handle.set_visibility(Visibility::Visible).await.unwrap();
    server.wait_for(|e| *e == ServerEvent::Accepted(1)).await;
    let connected = wait_for_event(&mut events, |e| matches!(e, SessionEvent::Connected(_))).await;
    assert_eq!(connected, SessionEvent::Connected(2));

    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.phase, Phase::ActiveIdle);
    assert!(!stats.hidden);
}

#[tokio::test]
async fn test_hide_discards_backlog() {
    let mut script = vec![snapshot(&[])];
    script.extend(diffs(3));
    let server = TestServer::start(vec![script]).await;
    let (handle, _events, _task) = Session::spawn(
        backlog_config(&server, 10_000),
        Board::new(GRID),
        OverlayCells::new(),
    );

    wait_until(|| {
        let handle = handle.clone();
        async move { handle.stats().await.map_or(false, |s| s.buffered == 3) }
    })
    .await;

    handle.set_visibility(Visibility::Hidden).await.unwrap();
    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.buffered, 0);
    assert_eq!(stats.phase, Phase::Inactive);
}

#[tokio::test]
async fn test_visible_without_hidden_keeps_connection() {
    let mut server = TestServer::start(vec![vec![snapshot(&[])]]).await;
    let (handle, mut events, _task) =
        Session::spawn(server.config(), Board::new(GRID), OverlayCells::new());

    wait_for_event(&mut events, |e| matches!(e, SessionEvent::Connected(_))).await;
    handle.set_visibility(Visibility::Visible).await.unwrap();

    assert!(
        server
            .quiet_for(Duration::from_millis(300), |e| matches!(
                e,
                ServerEvent::Accepted(1) | ServerEvent::Closed { .. }
            ))
            .await
    );
    assert_eq!(handle.stats().await.unwrap().connection_id, Some(1));
}

#[tokio::test]
async fn test_repeated_hide_is_harmless() {
    let mut server = TestServer::start(vec![vec![snapshot(&[])]]).await;
    let (handle, mut events, _task) =
        Session::spawn(server.config(), Board::new(GRID), OverlayCells::new());

    wait_for_event(&mut events, |e| matches!(e, SessionEvent::Connected(_))).await;
    handle.set_visibility(Visibility::Hidden).await.unwrap();
    handle.set_visibility(Visibility::Hidden).await.unwrap();

    server
        .wait_for(|e| matches!(e, ServerEvent::Closed { connection: 0, .. }))
        .await;
    assert!(
        server
            .quiet_for(Duration::from_millis(300), |e| matches!(
                e,
                ServerEvent::Accepted(1)
            ))
            .await
    );
    assert_eq!(handle.stats().await.unwrap().connection, ConnectionState::Disconnected);
}
