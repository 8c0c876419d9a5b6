//! Anchoring coordination: the mutual-exclusion gate, batch all-or-nothing
//! semantics, retries and the reconciliation sweep.

mod common;

use common::*;

use chrono::{Duration as ChronoDuration, Utc};
use std::time::Duration;

use cert_anchor::app::anchor::{AnchorOutcome, MAX_BATCH_SIZE};
use cert_anchor::domain::ledger::{AnchorReceipt, LedgerError};
use cert_anchor::domain::model::CertificateStatus;
use cert_anchor::storage::CertificateStore;

#[tokio::test]
async fn concurrent_triggers_submit_exactly_once() {
    let fx = fixture();
    let cert_id = issue_certificate(&fx, "S1", 1).await;

    // Widen the race window so both tasks reach the gate while the first
    // submission is still in flight.
    fx.ledger.set_submit_delay(Duration::from_millis(100));

    let a = {
        let anchors = fx.anchors.clone();
        tokio::spawn(async move { anchors.anchor_certificate(cert_id).await.unwrap() })
    };
    let b = {
        let anchors = fx.anchors.clone();
        tokio::spawn(async move { anchors.anchor_certificate(cert_id).await.unwrap() })
    };
    let (a, b) = (a.await.unwrap(), b.await.unwrap());

    assert_eq!(fx.ledger.submit_count(), 1);
    let anchored = matches!(a, AnchorOutcome::Anchored { .. }) as usize
        + matches!(b, AnchorOutcome::Anchored { .. }) as usize;
    let skipped = (a == AnchorOutcome::Skipped) as usize + (b == AnchorOutcome::Skipped) as usize;
    assert_eq!(anchored, 1);
    assert_eq!(skipped, 1);

    let cert = get_cert(&fx, cert_id).await;
    assert_eq!(cert.status, CertificateStatus::Active);
}

#[tokio::test]
async fn failed_attempt_is_retryable_with_same_hash() {
    let fx = fixture();
    let cert_id = issue_certificate(&fx, "S2", 2).await;

    fx.ledger
        .push_submit_result(Err(LedgerError::Rejected("custom program error: 0x1".to_string())));
    let outcome = fx.anchors.anchor_certificate(cert_id).await.unwrap();
    assert!(matches!(outcome, AnchorOutcome::Failed(_)));

    let cert = get_cert(&fx, cert_id).await;
    assert_eq!(cert.status, CertificateStatus::Failed);
    assert!(cert.last_error.is_some());
    let first_hash = cert.cert_hash.expect("hash assigned at first attempt");

    // Retry succeeds and reuses the already-assigned hash.
    let outcome = fx.anchors.anchor_certificate(cert_id).await.unwrap();
    assert!(matches!(outcome, AnchorOutcome::Anchored { .. }));
    let cert = get_cert(&fx, cert_id).await;
    assert_eq!(cert.status, CertificateStatus::Active);
    assert_eq!(cert.cert_hash, Some(first_hash));
}

#[tokio::test]
async fn unavailable_ledger_fails_without_submitting() {
    let fx = fixture();
    let cert_id = issue_certificate(&fx, "S3", 3).await;

    fx.ledger.set_available(false);
    let outcome = fx.anchors.anchor_certificate(cert_id).await.unwrap();
    assert!(matches!(outcome, AnchorOutcome::Failed(_)));
    assert_eq!(fx.ledger.submit_count(), 0);

    let cert = get_cert(&fx, cert_id).await;
    assert_eq!(cert.status, CertificateStatus::Failed);
}

#[tokio::test]
async fn batch_failure_fails_every_member() {
    let fx = fixture();
    let mut ids = Vec::new();
    for i in 0..3 {
        ids.push(issue_certificate(&fx, &format!("B{}", i), 10 + i).await);
    }

    fx.ledger
        .push_submit_result(Err(LedgerError::Network("connection reset".to_string())));
    let outcome = fx.anchors.anchor_batch(ids.clone()).await.unwrap();
    assert_eq!(outcome.failed.len(), 3);
    assert!(outcome.anchored.is_empty());
    assert_eq!(fx.ledger.submit_count(), 1);

    for id in &ids {
        assert_eq!(get_cert(&fx, *id).await.status, CertificateStatus::Failed);
    }
}

#[tokio::test]
async fn batch_success_activates_every_member_with_one_receipt() {
    let fx = fixture();
    let mut ids = Vec::new();
    for i in 0..3 {
        ids.push(issue_certificate(&fx, &format!("G{}", i), 20 + i).await);
    }

    fx.ledger.push_submit_result(Ok(AnchorReceipt {
        tx_hash: "0xbatch".to_string(),
        block_number: 7777,
    }));
    let outcome = fx.anchors.anchor_batch(ids.clone()).await.unwrap();
    assert_eq!(outcome.anchored.len(), 3);
    assert_eq!(outcome.tx_hash.as_deref(), Some("0xbatch"));
    assert_eq!(fx.ledger.submit_count(), 1);

    for id in &ids {
        let cert = get_cert(&fx, *id).await;
        assert_eq!(cert.status, CertificateStatus::Active);
        assert_eq!(cert.tx_hash.as_deref(), Some("0xbatch"));
        assert_eq!(cert.block_number, Some(7777));
    }
}

#[tokio::test]
async fn oversized_and_empty_batches_are_rejected() {
    let fx = fixture();

    assert!(fx.anchors.enqueue_batch(Vec::new()).await.is_err());

    let too_many: Vec<i64> = (1..=(MAX_BATCH_SIZE as i64 + 1)).collect();
    let err = fx.anchors.enqueue_batch(too_many).await.unwrap_err();
    assert!(err.to_string().contains("exceeds"));
    assert_eq!(fx.ledger.submit_count(), 0);

    // The cap is inclusive: exactly MAX_BATCH_SIZE is accepted.
    let at_cap: Vec<i64> = (1..=MAX_BATCH_SIZE as i64).collect();
    assert!(fx.anchors.enqueue_batch(at_cap).await.is_ok());
}

#[tokio::test]
async fn batch_skips_members_already_in_flight() {
    let fx = fixture();
    let a = issue_certificate(&fx, "M1", 30).await;
    let b = issue_certificate(&fx, "M2", 31).await;

    // Anchor one member up front; the batch must not resubmit it.
    fx.anchors.anchor_certificate(a).await.unwrap();
    assert_eq!(fx.ledger.submit_count(), 1);

    let outcome = fx.anchors.anchor_batch(vec![a, b]).await.unwrap();
    assert_eq!(outcome.skipped, vec![a]);
    assert_eq!(outcome.anchored, vec![b]);
    assert_eq!(fx.ledger.submit_count(), 2);
}

#[tokio::test]
async fn worker_processes_enqueued_jobs() {
    let fx = fixture();
    let cert_id = issue_certificate(&fx, "W1", 40).await;

    fx.anchors.clone().start_worker();
    fx.anchors.enqueue(cert_id).await.unwrap();

    // The queue is asynchronous; poll briefly for the outcome.
    for _ in 0..50 {
        if get_cert(&fx, cert_id).await.status == CertificateStatus::Active {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(get_cert(&fx, cert_id).await.status, CertificateStatus::Active);
    fx.anchors.shutdown();
}

#[tokio::test]
async fn enqueue_unknown_certificate_is_not_found() {
    let fx = fixture();
    let err = fx.anchors.enqueue(999).await.unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[tokio::test]
async fn sweep_forces_stuck_processing_to_failed() {
    let fx = fixture();
    let cert_id = issue_certificate(&fx, "R1", 50).await;

    // Take the gate manually to simulate an attempt that died mid-flight.
    let cert = get_cert(&fx, cert_id).await;
    assert!(fx
        .store
        .begin_processing(cert_id, cert.derive_hash())
        .await
        .unwrap());
    fx.store
        .backdate_status_change(cert_id, Utc::now() - ChronoDuration::hours(1))
        .await;

    let reconciled = fx.anchors.reconcile_stuck().await.unwrap();
    assert_eq!(reconciled, 1);
    let cert = get_cert(&fx, cert_id).await;
    assert_eq!(cert.status, CertificateStatus::Failed);

    // A fresh PROCESSING row is left alone.
    assert!(fx
        .store
        .begin_processing(cert_id, cert.derive_hash())
        .await
        .unwrap());
    assert_eq!(fx.anchors.reconcile_stuck().await.unwrap(), 0);
}

#[tokio::test]
async fn sweep_racing_a_slow_confirmation_keeps_the_row_failed() {
    let fx = fixture();
    let cert_id = issue_certificate(&fx, "R2", 51).await;

    fx.ledger.set_submit_delay(Duration::from_millis(500));
    let attempt = {
        let anchors = fx.anchors.clone();
        tokio::spawn(async move { anchors.anchor_certificate(cert_id).await.unwrap() })
    };

    // Wait for the attempt to take the gate, then let the sweep decide it
    // is dead while the submission is still in flight.
    for _ in 0..50 {
        if get_cert(&fx, cert_id).await.status == CertificateStatus::Processing {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    fx.store
        .backdate_status_change(cert_id, Utc::now() - ChronoDuration::hours(1))
        .await;
    assert_eq!(fx.anchors.reconcile_stuck().await.unwrap(), 1);

    // The late confirmation must not resurrect the swept row.
    let outcome = attempt.await.unwrap();
    assert!(matches!(outcome, AnchorOutcome::Failed(_)));
    let cert = get_cert(&fx, cert_id).await;
    assert_eq!(cert.status, CertificateStatus::Failed);
    assert!(cert.tx_hash.is_none());
}

#[tokio::test]
async fn timeout_counts_as_failure() {
    let fx = fixture_with(false, 1);
    let cert_id = issue_certificate(&fx, "T1", 60).await;

    fx.ledger.set_submit_delay(Duration::from_secs(5));
    let outcome = fx.anchors.anchor_certificate(cert_id).await.unwrap();
    match outcome {
        AnchorOutcome::Failed(msg) => assert!(msg.contains("timed out"), "{}", msg),
        other => panic!("expected timeout failure, got {:?}", other),
    }
    assert_eq!(get_cert(&fx, cert_id).await.status, CertificateStatus::Failed);
}
