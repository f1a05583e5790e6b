// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use crate::error::HandshakeError;
use crate::maze::Point;
use crate::probe::Delivery;
use crate::test_support::{test_config, test_lobby, test_maze, RecordingNotifier};

use super::{AdmissionKind, Lobby};

fn lobby_with_max_inactive(max_inactive: u32) -> (Arc<Lobby>, Arc<RecordingNotifier>) {
    let mut config = test_config();
    config.max_inactive = max_inactive;
    test_lobby(config)
}

// -- Admission ----------------------------------------------------------------

#[tokio::test]
async fn first_handshake_registers_and_fixes_credential() -> anyhow::Result<()> {
    let (lobby, notifier) = test_lobby(test_config());

    let admission = lobby.admit("a1", "x").await?;
    assert_eq!(admission.kind, AdmissionKind::Registered);
    assert!(admission.probe.verify_password("x"));

    let snap = admission.probe.snapshot().await;
    assert!(snap.connected);
    assert_eq!(snap.inactive_count, 0);
    assert_eq!(snap.position, test_maze().start());
    assert_eq!(notifier.messages(), vec!["New octapod [a1] registered"]);
    Ok(())
}

#[tokio::test]
async fn ids_are_case_normalized() -> anyhow::Result<()> {
    let (lobby, _) = test_lobby(test_config());

    let admission = lobby.admit("Alpha", "x").await?;
    assert_eq!(admission.probe.id, "alpha");
    assert!(lobby.probe("ALPHA").await.is_some());

    let err = lobby.admit("ALPHA", "x").await.err();
    assert_eq!(err, Some(HandshakeError::AlreadyConnected));
    Ok(())
}

#[tokio::test]
async fn empty_id_is_malformed() {
    let (lobby, _) = test_lobby(test_config());
    assert_eq!(lobby.admit("  ", "x").await.err(), Some(HandshakeError::Malformed));
    assert_eq!(lobby.probe_count().await, 0);
}

#[tokio::test]
async fn wrong_password_is_rejected_and_credential_kept() -> anyhow::Result<()> {
    let (lobby, _) = test_lobby(test_config());
    let first = lobby.admit("a1", "x").await?;
    first.probe.detach(first.connection.id).await;

    assert_eq!(lobby.admit("a1", "y").await.err(), Some(HandshakeError::InvalidPassword));
    assert!(!first.probe.snapshot().await.connected, "rejection must not attach");
    assert!(first.probe.verify_password("x"));
    assert!(!first.probe.verify_password("y"));

    let again = lobby.admit("a1", "x").await?;
    assert_eq!(again.kind, AdmissionKind::Reconnected);
    Ok(())
}

#[tokio::test]
async fn wrong_password_checked_before_live_connection() -> anyhow::Result<()> {
    let (lobby, _) = test_lobby(test_config());
    let _first = lobby.admit("a1", "x").await?;
    assert_eq!(lobby.admit("a1", "nope").await.err(), Some(HandshakeError::InvalidPassword));
    Ok(())
}

#[tokio::test]
async fn second_live_connection_is_rejected() -> anyhow::Result<()> {
    let (lobby, _) = test_lobby(test_config());
    let first = lobby.admit("a1", "x").await?;

    assert_eq!(lobby.admit("a1", "x").await.err(), Some(HandshakeError::AlreadyConnected));
    assert!(!first.connection.cancel.is_cancelled(), "existing connection untouched");

    let state = first.probe.lock().await;
    assert_eq!(state.connection.as_ref().map(|c| c.id), Some(first.connection.id));
    Ok(())
}

#[tokio::test]
async fn reconnection_resets_inactivity() -> anyhow::Result<()> {
    let (lobby, notifier) = lobby_with_max_inactive(10);
    let first = lobby.admit("a1", "x").await?;
    {
        let mut rx = first.probe.deliveries(first.connection.id).await;
        lobby.update().await;
        assert!(matches!(rx.recv().await, Some(Delivery::Sensor(_))));
    }
    assert_eq!(first.probe.snapshot().await.inactive_count, 1);

    assert!(first.probe.detach(first.connection.id).await);
    assert!(first.connection.cancel.is_cancelled());

    let again = lobby.admit("a1", "x").await?;
    assert_eq!(again.kind, AdmissionKind::Reconnected);
    assert!(Arc::ptr_eq(&first.probe, &again.probe));
    assert_ne!(first.connection.id, again.connection.id);
    assert_eq!(again.probe.snapshot().await.inactive_count, 0);
    assert_eq!(notifier.messages().last().map(String::as_str), Some("Octapod [a1] reconnected"));
    Ok(())
}

#[tokio::test]
async fn stale_detach_leaves_new_connection_attached() -> anyhow::Result<()> {
    let (lobby, _) = test_lobby(test_config());
    let first = lobby.admit("a1", "x").await?;
    first.probe.detach(first.connection.id).await;
    let again = lobby.admit("a1", "x").await?;

    assert!(!again.probe.detach(first.connection.id).await);
    assert!(again.probe.snapshot().await.connected);
    Ok(())
}

#[tokio::test]
async fn racing_registrations_attach_exactly_once() {
    let (lobby, _) = test_lobby(test_config());

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let lobby = Arc::clone(&lobby);
            tokio::spawn(async move { lobby.admit("a1", "x").await.map(|a| a.connection.id) })
        })
        .collect();

    let mut admitted = 0;
    for handle in handles {
        match handle.await {
            Ok(Ok(_)) => admitted += 1,
            Ok(Err(e)) => assert_eq!(e, HandshakeError::AlreadyConnected),
            Err(e) => panic!("admit task failed: {e}"),
        }
    }
    assert_eq!(admitted, 1);
    assert_eq!(lobby.probe_count().await, 1);
}

#[tokio::test]
async fn racing_reconnections_attach_exactly_once() -> anyhow::Result<()> {
    let (lobby, _) = test_lobby(test_config());
    let first = lobby.admit("a1", "x").await?;
    first.probe.detach(first.connection.id).await;

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let lobby = Arc::clone(&lobby);
            tokio::spawn(async move { lobby.admit("a1", "x").await.map(|a| a.kind) })
        })
        .collect();

    let mut reconnected = 0;
    for handle in handles {
        match handle.await? {
            Ok(kind) => {
                assert_eq!(kind, AdmissionKind::Reconnected);
                reconnected += 1;
            }
            Err(e) => assert_eq!(e, HandshakeError::AlreadyConnected),
        }
    }
    assert_eq!(reconnected, 1);
    Ok(())
}

// -- Update / timeout phases --------------------------------------------------

#[tokio::test]
async fn update_increments_and_delivers_sensor() -> anyhow::Result<()> {
    let (lobby, _) = test_lobby(test_config());
    let a = lobby.admit("a1", "x").await?;
    let mut rx = a.probe.deliveries(a.connection.id).await;

    lobby.update().await;

    let expected = test_maze().sensor(Point::new(0, 0));
    assert_eq!(rx.recv().await, Some(Delivery::Sensor(expected)));
    assert!(expected.north && expected.south && expected.west && !expected.east);
    assert_eq!(a.probe.snapshot().await.inactive_count, 1);
    Ok(())
}

#[tokio::test]
async fn update_reads_sensor_at_current_position() -> anyhow::Result<()> {
    let (lobby, _) = test_lobby(test_config());
    let a = lobby.admit("a1", "x").await?;
    a.probe.lock().await.position = Point::new(2, 1);
    let mut rx = a.probe.deliveries(a.connection.id).await;

    lobby.update().await;

    match rx.recv().await {
        Some(Delivery::Sensor(reading)) => {
            assert_eq!(reading.position, Point::new(2, 1));
            assert!(reading.east && reading.west);
            assert!(!reading.north && !reading.south);
        }
        other => panic!("expected sensor delivery, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn phases_skip_disconnected_probes() -> anyhow::Result<()> {
    let (lobby, _) = test_lobby(test_config());
    let a = lobby.admit("a1", "x").await?;
    a.probe.detach(a.connection.id).await;
    let mut rx = a.probe.deliveries(a.connection.id).await;

    lobby.update().await;
    lobby.timeout_check().await;

    assert!(rx.try_recv().is_none(), "nothing delivered while disconnected");
    assert_eq!(a.probe.snapshot().await.inactive_count, 0);
    assert!(lobby.probe("a1").await.is_some(), "voluntary disconnect keeps registration");
    Ok(())
}

/// Observed contract: a probe that connected a moment ago still gets a
/// timeout marker on the next timeout phase.
#[tokio::test]
async fn fresh_probe_receives_timeout_marker() -> anyhow::Result<()> {
    let (lobby, _) = test_lobby(test_config());
    let a = lobby.admit("a1", "x").await?;
    let mut rx = a.probe.deliveries(a.connection.id).await;

    lobby.timeout_check().await;

    assert_eq!(rx.recv().await, Some(Delivery::TimeoutCheck));
    assert!(a.probe.snapshot().await.connected);
    Ok(())
}

#[tokio::test]
async fn probe_below_threshold_survives_timeout() -> anyhow::Result<()> {
    let (lobby, notifier) = lobby_with_max_inactive(2);
    let a = lobby.admit("a1", "x").await?;
    let mut rx = a.probe.deliveries(a.connection.id).await;

    lobby.update().await;
    rx.recv().await;
    lobby.timeout_check().await;
    assert_eq!(rx.recv().await, Some(Delivery::TimeoutCheck));

    assert!(a.probe.snapshot().await.connected);
    assert!(!a.connection.cancel.is_cancelled());
    assert!(!notifier.messages().iter().any(|m| m.contains("inactivity")));
    Ok(())
}

#[tokio::test]
async fn probe_reaching_max_inactive_is_evicted_next_timeout() -> anyhow::Result<()> {
    let (lobby, notifier) = lobby_with_max_inactive(2);
    let a = lobby.admit("a1", "x").await?;
    let mut rx = a.probe.deliveries(a.connection.id).await;

    for _ in 0..2 {
        lobby.update().await;
        assert!(matches!(rx.recv().await, Some(Delivery::Sensor(_))));
        lobby.timeout_check().await;
        assert_eq!(rx.recv().await, Some(Delivery::TimeoutCheck));
    }

    assert!(a.connection.cancel.is_cancelled(), "transport told to close");
    let state = a.probe.lock().await;
    assert!(state.connection.is_none());
    assert!(state.retired);
    drop(state);
    assert!(lobby.probe("a1").await.is_none());
    assert_eq!(
        notifier.messages().last().map(String::as_str),
        Some("Octapod [a1] disconnected due to inactivity")
    );
    Ok(())
}

#[tokio::test]
async fn activity_between_cycles_prevents_eviction() -> anyhow::Result<()> {
    let (lobby, _) = lobby_with_max_inactive(2);
    let a = lobby.admit("a1", "x").await?;
    let mut rx = a.probe.deliveries(a.connection.id).await;

    for _ in 0..4 {
        lobby.update().await;
        rx.recv().await;
        a.probe.mark_active().await;
        lobby.timeout_check().await;
        rx.recv().await;
    }
    assert!(a.probe.snapshot().await.connected);
    Ok(())
}

#[tokio::test]
async fn reconnection_does_not_see_previous_connection_deliveries() -> anyhow::Result<()> {
    let (lobby, _) = test_lobby(test_config());
    let a = lobby.admit("a1", "x").await?;

    // Fill the slot, then drop the connection before anyone reads it.
    lobby.update().await;
    a.probe.detach(a.connection.id).await;

    let b = lobby.admit("a1", "x").await?;
    assert_eq!(b.kind, AdmissionKind::Reconnected);
    let mut rx = b.probe.deliveries(b.connection.id).await;

    let ((), first) = tokio::join!(lobby.update(), rx.recv());
    assert!(matches!(first, Some(Delivery::Sensor(_))));
    let ((), second) = tokio::join!(lobby.timeout_check(), rx.recv());
    assert_eq!(second, Some(Delivery::TimeoutCheck));
    assert!(rx.try_recv().is_none());
    Ok(())
}

#[tokio::test]
async fn evicted_id_registers_fresh() -> anyhow::Result<()> {
    let (lobby, notifier) = lobby_with_max_inactive(2);
    let a = lobby.admit("a1", "x").await?;
    {
        let mut rx = a.probe.deliveries(a.connection.id).await;
        lobby.update().await;
        assert!(matches!(rx.recv().await, Some(Delivery::Sensor(_))));
        lobby.timeout_check().await;
        rx.recv().await;
        lobby.update().await;
        rx.recv().await;
        lobby.timeout_check().await;
        rx.recv().await;
    }
    assert!(lobby.probe("a1").await.is_none());

    // Same credential comes back as a registration, not a reconnection.
    let b = lobby.admit("a1", "x").await?;
    assert_eq!(b.kind, AdmissionKind::Registered);
    assert!(!Arc::ptr_eq(&a.probe, &b.probe));
    assert_eq!(b.probe.snapshot().await.inactive_count, 0);
    b.probe.detach(b.connection.id).await;

    // The fresh registration defined the credential again.
    assert_eq!(lobby.admit("a1", "other").await.err(), Some(HandshakeError::InvalidPassword));
    assert!(notifier.messages().contains(&"New octapod [a1] registered".to_owned()));
    Ok(())
}

#[tokio::test]
async fn handshake_on_retired_probe_registers_fresh() -> anyhow::Result<()> {
    let (lobby, _) = test_lobby(test_config());
    let a = lobby.admit("a1", "x").await?;
    {
        let mut state = a.probe.lock().await;
        state.connection = None;
        state.retired = true;
    }

    let b = lobby.admit("a1", "new").await?;
    assert_eq!(b.kind, AdmissionKind::Registered);
    assert!(b.probe.verify_password("new"));
    Ok(())
}

// -- Rendering ----------------------------------------------------------------

#[tokio::test]
async fn render_empty_lobby() {
    let (lobby, _) = test_lobby(test_config());
    assert_eq!(lobby.render("").await, "No octapods in the lobby.");
}

#[tokio::test]
async fn render_unknown_filter_names_it() -> anyhow::Result<()> {
    let (lobby, _) = test_lobby(test_config());
    let _a = lobby.admit("a1", "x").await?;
    assert_eq!(lobby.render("Zed").await, "No octapods [Zed] in the lobby.");
    Ok(())
}

#[tokio::test]
async fn render_draws_probes_by_initial() -> anyhow::Result<()> {
    let (lobby, _) = test_lobby(test_config());
    let _a = lobby.admit("a1", "x").await?;
    let b = lobby.admit("bee", "x").await?;
    b.probe.lock().await.position = Point::new(4, 2);

    let expected = [
        "```",
        "a     #   # ",
        "# #   #   # ",
        "        b # ",
        "# # # # # # ",
        "```",
    ]
    .join("\n");
    assert_eq!(lobby.render("").await, expected);
    Ok(())
}

#[tokio::test]
async fn render_filter_is_case_insensitive() -> anyhow::Result<()> {
    let (lobby, _) = test_lobby(test_config());
    let _a = lobby.admit("a1", "x").await?;
    let b = lobby.admit("bee", "x").await?;
    b.probe.lock().await.position = Point::new(4, 2);

    let board = lobby.render("BEE").await;
    assert!(board.contains('b'));
    assert!(!board.contains('a'));
    Ok(())
}

#[tokio::test]
async fn render_includes_disconnected_probes() -> anyhow::Result<()> {
    let (lobby, _) = test_lobby(test_config());
    let a = lobby.admit("a1", "x").await?;
    a.probe.detach(a.connection.id).await;
    assert!(lobby.render("a1").await.starts_with("```\na "));
    Ok(())
}

#[tokio::test]
async fn snapshots_sorted_by_id() -> anyhow::Result<()> {
    let (lobby, _) = test_lobby(test_config());
    for id in ["zeta", "alpha", "mid"] {
        lobby.admit(id, "x").await?;
    }
    let ids: Vec<String> = lobby.probe_snapshots().await.into_iter().map(|s| s.id).collect();
    assert_eq!(ids, vec!["alpha", "mid", "zeta"]);
    Ok(())
}

#[test]
fn scheduler_claim_is_single_use() {
    let (lobby, _) = test_lobby(test_config());
    assert!(lobby.claim_scheduler());
    assert!(!lobby.claim_scheduler());
}
