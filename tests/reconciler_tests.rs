//! # Reconciler Tests
//!
//! Whole reconciliation attempts against in-memory fakes.
//!
//! These tests verify:
//! - Secret creation is idempotent
//! - Rotation happens exactly at `exp - lifetime / 5`
//! - The requeue schedule always carries the next wake-up
//! - Failures are aggregated and the status is written once per attempt

mod common;

use common::*;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use token_controller::controller::reconciler::{reconcile, SyncStep, TokenError};
use token_controller::controller::token::{parse_expiration, ClaimError, TokenClaims};

#[tokio::test]
async fn test_first_reconcile_creates_secret_and_schedules_refresh() {
    let h = Harness::with_signing_key();
    let token = token("100s", true);

    h.reconciler.sync(&token).await.expect("sync should succeed");

    assert_eq!(h.cluster.created(), 1);
    let stored = h.cluster.stored_token().expect("token secret should exist");
    let exp = parse_expiration(stored.as_bytes(), SIGNING_KEY, t0()).unwrap();
    assert_eq!(exp, Some(t0() + secs(100)));

    // Entry push is the fallback (no secret yet), Refresh overrides it with the threshold
    let pushes = h.schedule.pushes();
    assert_eq!(pushes.first().map(|(_, d)| *d), Some(Duration::from_secs(30)));
    assert_eq!(h.schedule.last_push(), Some(Duration::from_secs(80)));
    assert!(pushes.iter().all(|(key, _)| key == "slurm/admin"));

    let report = h.status.last().expect("status should be written");
    assert!(report.is_success());
    assert_eq!(report.next_refresh, Some(t0() + secs(80)));
    assert_eq!(report.rotated_at, None);
}

#[tokio::test]
async fn test_reconcile_is_idempotent() {
    let h = Harness::with_signing_key();
    let token = token("15m", true);

    h.reconciler.sync(&token).await.unwrap();
    let first = h.cluster.stored_token();
    h.reconciler.sync(&token).await.unwrap();
    h.reconciler.sync(&token).await.unwrap();

    assert_eq!(h.cluster.writes(), 1, "only the initial create may write");
    assert_eq!(h.cluster.stored_token(), first);
}

#[tokio::test]
async fn test_no_rotation_before_threshold_and_exactly_one_after() {
    let h = Harness::with_signing_key();
    let token = token("100s", true);

    h.reconciler.sync(&token).await.unwrap();
    let original = h.cluster.stored_token();

    for offset in [10, 40, 79] {
        h.at(secs(offset));
        h.reconciler.sync(&token).await.unwrap();
        assert_eq!(h.cluster.overwritten(), 0, "no forced write at T+{offset}");
        assert_eq!(
            h.schedule.last_push(),
            Some(Duration::from_secs(80 - u64::try_from(offset).unwrap()))
        );
    }

    h.at(secs(80));
    h.reconciler.sync(&token).await.unwrap();
    assert_eq!(h.cluster.overwritten(), 1);
    assert_ne!(h.cluster.stored_token(), original);
    // Threshold of the re-issued token, measured from T+80
    assert_eq!(h.schedule.last_push(), Some(Duration::from_secs(80)));

    let report = h.status.last().unwrap();
    assert_eq!(report.rotated_at, Some(t0() + secs(80)));
    assert_eq!(report.next_refresh, Some(t0() + secs(160)));

    h.at(secs(81));
    h.reconciler.sync(&token).await.unwrap();
    assert_eq!(h.cluster.overwritten(), 1, "new token is not due yet");
}

#[tokio::test]
async fn test_hour_long_token_rotates_after_eighty_percent() {
    let h = Harness::with_signing_key();
    let token = token("1h", true);

    h.reconciler.sync(&token).await.unwrap();
    assert_eq!(h.schedule.last_push(), Some(Duration::from_secs(2880)));

    h.at(secs(2000));
    h.reconciler.sync(&token).await.unwrap();
    assert_eq!(h.cluster.writes(), 1);
    assert_eq!(h.schedule.last_push(), Some(Duration::from_secs(880)));

    h.at(secs(2900));
    h.reconciler.sync(&token).await.unwrap();
    assert_eq!(h.cluster.overwritten(), 1);
    let stored = h.cluster.stored_token().unwrap();
    let exp = parse_expiration(stored.as_bytes(), SIGNING_KEY, t0() + secs(2900)).unwrap();
    assert_eq!(exp, Some(t0() + secs(2900 + 3600)));
}

#[tokio::test]
async fn test_missing_signing_key_pushes_fallback() {
    let h = Harness::new(FakeCluster::default());
    let token = token("100s", true);

    let err = h.reconciler.sync(&token).await.expect_err("sync should fail");

    assert!(err.contains_step(SyncStep::Secret));
    assert!(matches!(
        err.errors()[0].source,
        TokenError::SecretNotFound { ref name, .. } if name == SIGNING_SECRET
    ));
    assert_eq!(h.schedule.pushes().len(), 1);
    assert_eq!(h.schedule.last_push(), Some(Duration::from_secs(30)));
    assert_eq!(h.cluster.writes(), 0);

    let report = h.status.last().unwrap();
    assert_eq!(
        report.failure.as_deref(),
        Some("[Secret]: secret slurm/jwt-key not found")
    );
}

#[tokio::test]
async fn test_expired_token_is_reissued() {
    let h = Harness::with_signing_key();
    let token = token("100s", true);
    h.cluster.put(
        NAMESPACE,
        TOKEN_SECRET,
        TOKEN_KEY,
        mint(100, t0() - secs(200)).as_bytes(),
    );

    h.reconciler.sync(&token).await.expect("expired token should be tolerated");

    assert_eq!(h.cluster.overwritten(), 1);
    let pushes = h.schedule.pushes();
    assert_eq!(pushes.first().map(|(_, d)| *d), Some(Duration::from_secs(30)));
    assert_eq!(h.schedule.last_push(), Some(Duration::from_secs(80)));
}

#[tokio::test]
async fn test_token_without_expiration_is_reissued() {
    let h = Harness::with_signing_key();
    let token = token("100s", true);
    let claims = TokenClaims {
        iat: t0().timestamp(),
        exp: None,
        sun: "admin".to_string(),
    };
    let no_exp = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SIGNING_KEY),
    )
    .unwrap();
    h.cluster
        .put(NAMESPACE, TOKEN_SECRET, TOKEN_KEY, no_exp.as_bytes());

    h.reconciler.sync(&token).await.unwrap();

    assert_eq!(h.schedule.pushes()[0].1, Duration::ZERO);
    assert_eq!(h.cluster.overwritten(), 1);
    assert_eq!(h.schedule.last_push(), Some(Duration::from_secs(80)));
}

#[tokio::test]
async fn test_invalid_signature_fails_refresh() {
    let h = Harness::with_signing_key();
    let token = token("100s", true);
    let forged = mint_token_with(b"some-other-signing-key-material!", 100);
    h.cluster
        .put(NAMESPACE, TOKEN_SECRET, TOKEN_KEY, forged.as_bytes());

    let err = h.reconciler.sync(&token).await.expect_err("sync should fail");

    assert_eq!(err.errors().len(), 1);
    assert!(err.contains_step(SyncStep::Refresh));
    assert!(matches!(
        err.errors()[0].source,
        TokenError::Claims(ClaimError::InvalidSignature)
    ));
    assert_eq!(h.schedule.last_push(), Some(Duration::from_secs(30)));
    assert_eq!(h.cluster.writes(), 0, "a forged token is never overwritten");
}

#[tokio::test]
async fn test_refresh_disabled_never_rotates() {
    let h = Harness::with_signing_key();
    let token = token("100s", false);

    h.reconciler.sync(&token).await.unwrap();
    h.at(secs(500));
    h.reconciler.sync(&token).await.unwrap();

    assert_eq!(h.cluster.created(), 1);
    assert_eq!(h.cluster.overwritten(), 0);
    assert_eq!(h.status.last().unwrap().rotated_at, None);
}

#[tokio::test]
async fn test_deleting_token_is_left_alone() {
    let h = Harness::with_signing_key();
    let token = deleting_token("100s");

    h.reconciler.sync(&token).await.unwrap();

    assert!(h.schedule.pushes().is_empty());
    assert_eq!(h.cluster.writes(), 0);
    assert!(h.status.reports().is_empty());

    let action = reconcile(Arc::new(token), Arc::clone(&h.reconciler))
        .await
        .unwrap();
    assert_eq!(action, Action::await_change());
}

#[tokio::test]
async fn test_secret_and_status_failures_are_aggregated() {
    let h = Harness::new(FakeCluster::default());
    h.status.fail(true);
    let token = token("100s", true);

    let err = h.reconciler.sync(&token).await.expect_err("sync should fail");

    assert_eq!(err.errors().len(), 2);
    assert!(matches!(
        err.errors()[0].source,
        TokenError::SecretNotFound { .. }
    ));
    assert!(matches!(
        err.errors()[1].source,
        TokenError::StatusWrite { .. }
    ));
    assert_eq!(err.errors()[1].step, SyncStep::Secret);
    assert!(err.to_string().starts_with('['));
}

#[tokio::test]
async fn test_status_failure_alone_is_labelled_status() {
    let h = Harness::with_signing_key();
    h.status.fail(true);

    let err = h
        .reconciler
        .sync(&token("100s", true))
        .await
        .expect_err("status failure should surface");

    assert_eq!(err.errors().len(), 1);
    assert!(err.contains_step(SyncStep::Status));
    assert_eq!(h.cluster.created(), 1);
}

#[tokio::test]
async fn test_status_written_exactly_once_per_attempt() {
    let h = Harness::with_signing_key();
    let token = token("100s", true);

    h.reconciler.sync(&token).await.unwrap();
    h.cluster.fail_writes(true);
    h.at(secs(90));
    let _ = h.reconciler.sync(&token).await;
    h.cluster.fail_reads(true);
    let _ = h.reconciler.sync(&token).await;

    let reports = h.status.reports();
    assert_eq!(reports.len(), 3);
    assert!(reports[0].is_success());
    assert!(reports[1].failure.as_deref().unwrap().starts_with("[Refresh]"));
    assert!(reports[2].failure.as_deref().unwrap().starts_with("[Secret]"));
}

#[tokio::test]
async fn test_cancelled_attempt_makes_no_writes() {
    let h = Harness::with_signing_key();
    h.shutdown.cancel();

    let err = h
        .reconciler
        .sync(&token("100s", true))
        .await
        .expect_err("cancelled sync should fail");

    assert!(err
        .errors()
        .iter()
        .all(|e| matches!(e.source, TokenError::Cancelled)));
    assert_eq!(h.cluster.writes(), 0);
    assert_eq!(h.schedule.last_push(), Some(Duration::from_secs(30)));
}

#[tokio::test]
async fn test_shutdown_interrupts_in_flight_write() {
    let cluster = Arc::new(FakeCluster::default().with_signing_key());
    cluster.put(NAMESPACE, TOKEN_SECRET, TOKEN_KEY, mint(100, t0()).as_bytes());
    let stalled = Arc::new(StalledArtifacts::default());
    let entered = Arc::clone(&stalled.entered);
    let h = Harness::with_artifacts(Arc::clone(&cluster), stalled);

    let token = token("100s", true);
    let (result, ()) = tokio::join!(
        tokio::time::timeout(Duration::from_secs(5), h.reconciler.sync(&token)),
        async {
            entered.notified().await;
            h.shutdown.cancel();
        }
    );
    let err = result
        .expect("sync should return promptly after shutdown")
        .expect_err("interrupted sync should fail");

    assert_eq!(err.errors()[0].step, SyncStep::Secret);
    assert!(err
        .errors()
        .iter()
        .all(|e| matches!(e.source, TokenError::Cancelled)));
    // Entry push happened before the write stalled
    assert_eq!(
        h.schedule.pushes(),
        vec![("slurm/admin".to_string(), Duration::from_secs(80))]
    );
    assert_eq!(cluster.writes(), 0);
}

#[tokio::test]
async fn test_oversized_lifetime_fails_without_panicking() {
    let h = Harness::with_signing_key();
    h.cluster
        .put(NAMESPACE, TOKEN_SECRET, TOKEN_KEY, mint(100, t0()).as_bytes());

    let err = h
        .reconciler
        .sync(&token("99999999999d", true))
        .await
        .expect_err("oversized lifetime should fail");

    assert!(err.contains_step(SyncStep::Secret));
    assert!(matches!(err.errors()[0].source, TokenError::InvalidSpec(_)));
    assert_eq!(h.schedule.last_push(), Some(Duration::from_secs(30)));
    assert_eq!(h.cluster.writes(), 0);
    assert_eq!(h.status.reports().len(), 1);
}

#[tokio::test]
async fn test_reconcile_consumes_schedule_entry() {
    let h = Harness::with_signing_key();
    let token = Arc::new(token("100s", true));

    let action = reconcile(Arc::clone(&token), Arc::clone(&h.reconciler))
        .await
        .unwrap();

    assert_ne!(action, Action::await_change());
    assert!(h.reconciler.schedule().get("slurm/admin").is_none());
}

#[tokio::test]
async fn test_failed_reconcile_returns_error() {
    let h = Harness::new(FakeCluster::default());

    let result = reconcile(Arc::new(token("100s", true)), Arc::clone(&h.reconciler)).await;

    assert!(result.is_err());
}

fn mint_token_with(key: &[u8], lifetime_secs: u64) -> String {
    token_controller::controller::token::mint_token(
        key,
        "admin",
        Duration::from_secs(lifetime_secs),
        t0(),
    )
    .unwrap()
    .token
}
