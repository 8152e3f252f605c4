//! End-to-end batch lifecycle tests through the async session.
//!
//! Time is paused so the auto-print grace window and the notification expiry
//! run deterministically.

use std::time::Duration;

use printqc_batch::{BatchController, BatchError, IgnoreReason, Session, SessionHandle, Transition};
use printqc_core::config::PrintQcConfig;
use printqc_core::types::{ListenerFault, Severity, MAX_START_SEQUENCE};

// =============================================================================
// Helpers
// =============================================================================

fn spawn_with_start(start: u64) -> SessionHandle {
    let mut config = PrintQcConfig::default();
    config.batch.start_sequence = start;
    let (handle, _task) = Session::spawn(BatchController::from_config(&config));
    handle
}

async fn submit_all(handle: &SessionHandle, tokens: &[&str]) {
    for token in tokens {
        let _ = handle.submit_token(*token).await;
    }
}

async fn wait(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test(start_paused = true)]
async fn scenario_a_four_numbers_auto_print() {
    let handle = spawn_with_start(1000);
    submit_all(&handle, &["12", "25.5", "30", "5.2"]).await;

    wait(500).await;
    assert!(handle.snapshot().await.unwrap().history.is_empty());

    wait(600).await;
    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.history.len(), 1);
    let batch = &snap.history[0];
    assert_eq!(batch.start_seq, 1000);
    assert_eq!(batch.end_seq, 1003);
    assert_eq!(batch.values, ["12", "25.5", "30", "5.2"].map(String::from));
    assert_eq!(snap.next_sequence, 1004);
    assert!(snap.slots.iter().all(|s| s.value.is_none()));
}

#[tokio::test(start_paused = true)]
async fn scenario_b_reset_keyword_after_two_fills() {
    let handle = spawn_with_start(1000);
    submit_all(&handle, &["12", "25.5"]).await;
    let transition = handle.submit_token("xóa").await.unwrap();
    assert_eq!(transition, Transition::Cleared);

    let snap = handle.snapshot().await.unwrap();
    assert!(snap.slots.iter().all(|s| s.value.is_none()));
    assert_eq!(snap.next_sequence, 1000);
    assert_eq!(snap.log[0].severity, Severity::Warning);
}

#[tokio::test(start_paused = true)]
async fn scenario_c_print_keyword_with_two_fills() {
    let handle = spawn_with_start(1000);
    submit_all(&handle, &["12", "25.5"]).await;
    let result = handle.submit_token("in").await;
    assert_eq!(result, Err(BatchError::IncompleteBatch { filled: 2 }));

    let snap = handle.snapshot().await.unwrap();
    assert!(snap.history.is_empty());
    assert_eq!(snap.log[0].severity, Severity::Error);
    assert!(snap.log[0].message.contains("2/4"));
}

#[tokio::test(start_paused = true)]
async fn scenario_d_comma_decimal() {
    let handle = spawn_with_start(1000);
    handle.submit_token("7,5").await.unwrap();
    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.slots[0].value.as_deref(), Some("7.5"));
}

#[tokio::test(start_paused = true)]
async fn scenario_e_number_right_after_completion() {
    let handle = spawn_with_start(1000);
    submit_all(&handle, &["1", "2", "3", "4"]).await;
    wait(1100).await;

    let transition = handle.submit_token("9").await.unwrap();
    assert_eq!(
        transition,
        Transition::Filled {
            index: 0,
            sequence: 1004,
            value: "9".into()
        }
    );
}

// =============================================================================
// Timers
// =============================================================================

#[tokio::test(start_paused = true)]
async fn reset_during_grace_window_cancels_print() {
    let handle = spawn_with_start(1000);
    submit_all(&handle, &["1", "2", "3", "4"]).await;
    wait(500).await;
    handle.request_reset().await.unwrap();
    wait(2000).await;

    let snap = handle.snapshot().await.unwrap();
    assert!(snap.history.is_empty());
    assert!(!snap.auto_print_pending);
    assert_eq!(snap.next_sequence, 1000);
}

#[tokio::test(start_paused = true)]
async fn refill_after_reset_gets_full_grace_window() {
    let handle = spawn_with_start(1000);
    submit_all(&handle, &["1", "2", "3", "4"]).await;
    wait(900).await;
    handle.request_reset().await.unwrap();
    submit_all(&handle, &["5", "6", "7", "8"]).await;

    // The first arming would have fired here.
    wait(200).await;
    assert!(handle.snapshot().await.unwrap().history.is_empty());

    wait(900).await;
    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.history.len(), 1);
    assert_eq!(snap.history[0].values[0], "5");
}

#[tokio::test(start_paused = true)]
async fn numbers_during_grace_window_are_dropped() {
    let handle = spawn_with_start(1000);
    submit_all(&handle, &["1", "2", "3", "4"]).await;
    let transition = handle.submit_token("5").await.unwrap();
    assert_eq!(transition, Transition::Ignored(IgnoreReason::BufferFull));

    wait(1100).await;
    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.history.len(), 1);
    assert!(snap.slots.iter().all(|s| s.value.is_none()));
}

#[tokio::test(start_paused = true)]
async fn older_notification_timer_does_not_clear_newer() {
    let handle = spawn_with_start(1000);
    submit_all(&handle, &["1", "2", "3", "4", "print"]).await;
    wait(2000).await;
    submit_all(&handle, &["5", "6", "7", "8", "print"]).await;

    // First notification's timer fires at 3s; the second is still showing.
    wait(1500).await;
    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.last_printed.as_ref().unwrap().start_seq, 1004);

    wait(2000).await;
    assert!(handle.snapshot().await.unwrap().last_printed.is_none());
}

// =============================================================================
// Counter and ledger invariants
// =============================================================================

#[tokio::test(start_paused = true)]
async fn batches_are_contiguous_and_newest_first() {
    let handle = spawn_with_start(1);
    for round in 0..4 {
        let base = round * 10;
        for i in 0..4 {
            handle.submit_token(format!("{}", base + i)).await.unwrap();
        }
        wait(1100).await;
    }

    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.history.len(), 4);
    assert_eq!(snap.next_sequence, 17);
    for pair in snap.history.windows(2) {
        assert_eq!(pair[0].start_seq, pair[1].end_seq + 1);
        assert!(pair[0].id > pair[1].id);
    }

    let rows = handle.export_rows().await.unwrap();
    assert_eq!(rows.len(), 16);
    for (chunk, batch) in rows.chunks(4).zip(&snap.history) {
        let seqs: Vec<u64> = chunk.iter().map(|r| r.sequence).collect();
        assert_eq!(
            seqs,
            (batch.start_seq..=batch.start_seq + 3).collect::<Vec<_>>()
        );
        assert!(chunk.iter().all(|r| r.batch_id == batch.id));
    }
}

#[tokio::test(start_paused = true)]
async fn start_sequence_locked_mid_batch() {
    let handle = spawn_with_start(1000);
    handle.set_start_sequence(500).await.unwrap();
    handle.submit_token("1").await.unwrap();
    assert_eq!(
        handle.set_start_sequence(700).await,
        Err(BatchError::SequenceLocked { filled: 1 })
    );
    assert_eq!(handle.snapshot().await.unwrap().next_sequence, 500);
}

#[tokio::test(start_paused = true)]
async fn start_sequence_near_limit_keeps_session_alive() {
    let handle = spawn_with_start(1000);
    assert_eq!(
        handle.set_start_sequence(u64::MAX - 1).await,
        Err(BatchError::SequenceOutOfRange {
            start: u64::MAX - 1,
            max: MAX_START_SEQUENCE
        })
    );
    submit_all(&handle, &["1", "2", "3"]).await;
    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.next_sequence, 1000);
    assert_eq!(snap.slots.iter().filter(|s| s.value.is_some()).count(), 3);

    handle.request_reset().await.unwrap();
    handle.set_start_sequence(MAX_START_SEQUENCE).await.unwrap();
    submit_all(&handle, &["1", "2", "3", "4"]).await;
    wait(1100).await;
    assert_eq!(
        handle.submit_token("5").await,
        Err(BatchError::SequenceExhausted { next: u64::MAX })
    );

    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.history[0].end_seq, u64::MAX - 1);
    assert!(snap.slots.iter().all(|s| s.value.is_none()));
}

#[tokio::test(start_paused = true)]
async fn listener_fault_keeps_batch_state() {
    let handle = spawn_with_start(1000);
    handle.set_listening(true).await.unwrap();
    submit_all(&handle, &["1", "2"]).await;

    handle
        .report_listener_fault(ListenerFault::NoSpeech)
        .await
        .unwrap();
    assert!(handle.snapshot().await.unwrap().listening);

    handle
        .report_listener_fault(ListenerFault::Other("network".into()))
        .await
        .unwrap();
    let snap = handle.snapshot().await.unwrap();
    assert!(!snap.listening);
    assert_eq!(snap.slots.iter().filter(|s| s.value.is_some()).count(), 2);
    assert_eq!(snap.next_sequence, 1000);
    assert_eq!(snap.log[0].severity, Severity::Error);
}

#[tokio::test(start_paused = true)]
async fn snapshot_serializes_to_json() {
    let handle = spawn_with_start(1000);
    submit_all(&handle, &["1", "2", "3", "4", "ok"]).await;
    let snap = handle.snapshot().await.unwrap();
    let json = serde_json::to_value(&snap).unwrap();
    assert_eq!(json["next_sequence"], 1004);
    assert_eq!(json["history"][0]["start_seq"], 1000);
    assert_eq!(json["log"][0]["severity"], "success");
}
