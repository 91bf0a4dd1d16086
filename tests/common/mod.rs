//! Shared fixtures for reconciler tests
//!
//! In-memory fakes for the reconciler's cluster seams plus a manual clock, so
//! whole reconciliation attempts run without an API server.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use token_controller::config::ControllerConfig;
use token_controller::controller::reconciler::{
    ArtifactStore, Clock, Reconciler, ReconcilerParts, RequeueStore, ScheduleEntry,
    ScheduleStore, SecretResolver, StatusReport, StatusReporter, TokenError, UpsertOutcome,
};
use token_controller::controller::token::{mint_token, TokenArtifact};
use token_controller::crd::{SecretKeyRef, Token};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use zeroize::Zeroizing;

pub const NAMESPACE: &str = "slurm";
pub const TOKEN_NAME: &str = "admin";
pub const TOKEN_SECRET: &str = "admin-jwt";
pub const TOKEN_KEY: &str = "auth-token";
pub const SIGNING_SECRET: &str = "jwt-key";
pub const SIGNING_KEY_NAME: &str = "jwt_hs256.key";
pub const SIGNING_KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

/// Fixed start time for every scenario
pub fn t0() -> DateTime<Utc> {
    Utc.timestamp_opt(1_760_000_000, 0).unwrap()
}

pub fn secs(n: i64) -> chrono::Duration {
    chrono::Duration::seconds(n)
}

/// Token fixture named `admin` in `slurm` with its secret at `admin-jwt/auth-token`
pub fn token(lifetime: &str, refresh: bool) -> Token {
    serde_json::from_value(serde_json::json!({
        "apiVersion": "token-management.microscaler.io/v1beta1",
        "kind": "Token",
        "metadata": {
            "name": TOKEN_NAME,
            "namespace": NAMESPACE,
            "uid": "6d1f3c0e-7a55-4d63-9a8e-1d2b3c4d5e6f",
            "generation": 1
        },
        "spec": {
            "jwtHs256KeyRef": { "name": SIGNING_SECRET, "key": SIGNING_KEY_NAME },
            "username": "admin",
            "lifetime": lifetime,
            "refresh": refresh
        }
    }))
    .expect("token fixture should deserialize")
}

/// Same as [`token`] but marked for deletion
pub fn deleting_token(lifetime: &str) -> Token {
    let mut value = serde_json::to_value(token(lifetime, true)).unwrap();
    value["metadata"]["deletionTimestamp"] = serde_json::json!("2025-10-09T08:00:00Z");
    value["metadata"]["finalizers"] = serde_json::json!(["example.com/cleanup"]);
    serde_json::from_value(value).expect("deleting token fixture should deserialize")
}

/// Mint a token string with the fixture signing key
pub fn mint(lifetime_secs: u64, now: DateTime<Utc>) -> String {
    mint_token(SIGNING_KEY, "admin", Duration::from_secs(lifetime_secs), now)
        .unwrap()
        .token
}

/// Secrets held by the fake cluster, keyed by namespace and name
#[derive(Default)]
pub struct FakeCluster {
    secrets: Mutex<HashMap<(String, String), BTreeMap<String, Vec<u8>>>>,
    created: AtomicUsize,
    overwritten: AtomicUsize,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl FakeCluster {
    pub fn put(&self, namespace: &str, name: &str, key: &str, value: &[u8]) {
        self.secrets
            .lock()
            .unwrap()
            .entry((namespace.to_string(), name.to_string()))
            .or_default()
            .insert(key.to_string(), value.to_vec());
    }

    pub fn get(&self, namespace: &str, name: &str, key: &str) -> Option<Vec<u8>> {
        self.secrets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .and_then(|data| data.get(key).cloned())
    }

    /// The token currently stored in the fixture's token secret
    pub fn stored_token(&self) -> Option<String> {
        self.get(NAMESPACE, TOKEN_SECRET, TOKEN_KEY)
            .map(|raw| String::from_utf8(raw).unwrap())
    }

    pub fn with_signing_key(self) -> Self {
        self.put(NAMESPACE, SIGNING_SECRET, SIGNING_KEY_NAME, SIGNING_KEY);
        self
    }

    /// Writes that changed the cluster
    pub fn writes(&self) -> usize {
        self.created() + self.overwritten()
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn overwritten(&self) -> usize {
        self.overwritten.load(Ordering::SeqCst)
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SecretResolver for FakeCluster {
    async fn resolve(
        &self,
        namespace: &str,
        key_ref: &SecretKeyRef,
    ) -> Result<Zeroizing<Vec<u8>>, TokenError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(TokenError::SecretUnavailable {
                namespace: namespace.to_string(),
                name: key_ref.name.clone(),
                source: "connection refused".into(),
            });
        }

        let secrets = self.secrets.lock().unwrap();
        let data = secrets
            .get(&(namespace.to_string(), key_ref.name.clone()))
            .ok_or_else(|| TokenError::SecretNotFound {
                namespace: namespace.to_string(),
                name: key_ref.name.clone(),
            })?;
        data.get(&key_ref.key)
            .map(|value| Zeroizing::new(value.clone()))
            .ok_or_else(|| TokenError::SecretKeyMissing {
                namespace: namespace.to_string(),
                name: key_ref.name.clone(),
                key: key_ref.key.clone(),
            })
    }
}

#[async_trait]
impl ArtifactStore for FakeCluster {
    async fn upsert(
        &self,
        artifact: &TokenArtifact,
        force: bool,
    ) -> Result<UpsertOutcome, TokenError> {
        let id = (
            artifact.namespace().to_string(),
            artifact.name().to_string(),
        );
        let data: BTreeMap<String, Vec<u8>> = artifact
            .secret
            .data
            .clone()
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k, v.0))
            .collect();

        let mut secrets = self.secrets.lock().unwrap();
        let exists = secrets.contains_key(&id);
        if exists && !force {
            return Ok(UpsertOutcome::Unchanged);
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TokenError::ArtifactSync {
                namespace: artifact.namespace().to_string(),
                name: artifact.name().to_string(),
                source: "admission webhook denied the request".into(),
            });
        }
        secrets.insert(id, data);
        if exists {
            self.overwritten.fetch_add(1, Ordering::SeqCst);
            Ok(UpsertOutcome::Overwritten)
        } else {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(UpsertOutcome::Created)
        }
    }
}

/// [`ArtifactStore`] whose writes never complete
///
/// `entered` is notified once a write is in flight.
#[derive(Default)]
pub struct StalledArtifacts {
    pub entered: Arc<Notify>,
}

#[async_trait]
impl ArtifactStore for StalledArtifacts {
    async fn upsert(
        &self,
        _artifact: &TokenArtifact,
        _force: bool,
    ) -> Result<UpsertOutcome, TokenError> {
        self.entered.notify_one();
        std::future::pending().await
    }
}

/// Records every status report
#[derive(Default)]
pub struct FakeStatus {
    reports: Mutex<Vec<StatusReport>>,
    fail: AtomicBool,
}

impl FakeStatus {
    pub fn reports(&self) -> Vec<StatusReport> {
        self.reports.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<StatusReport> {
        self.reports.lock().unwrap().last().cloned()
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl StatusReporter for FakeStatus {
    async fn report(&self, _token: &Token, report: &StatusReport) -> Result<(), TokenError> {
        self.reports.lock().unwrap().push(report.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(TokenError::StatusWrite {
                source: "the server is currently unable to handle the request".into(),
            });
        }
        Ok(())
    }
}

/// [`RequeueStore`] that also keeps the history of pushes
#[derive(Default)]
pub struct RecordingSchedule {
    inner: ScheduleStore,
    pushes: Mutex<Vec<(String, Duration)>>,
}

impl RecordingSchedule {
    pub fn pushes(&self) -> Vec<(String, Duration)> {
        self.pushes.lock().unwrap().clone()
    }

    /// Delay of the most recent push
    pub fn last_push(&self) -> Option<Duration> {
        self.pushes.lock().unwrap().last().map(|(_, after)| *after)
    }

    pub fn clear(&self) {
        self.pushes.lock().unwrap().clear();
    }
}

impl RequeueStore for RecordingSchedule {
    fn push(&self, key: &str, after: Duration) {
        self.pushes.lock().unwrap().push((key.to_string(), after));
        self.inner.push(key, after);
    }

    fn get(&self, key: &str) -> Option<ScheduleEntry> {
        self.inner.get(key)
    }

    fn take(&self, key: &str) -> Option<ScheduleEntry> {
        self.inner.take(key)
    }
}

/// Clock that only moves when told to
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// A reconciler wired to fakes
pub struct Harness {
    pub cluster: Arc<FakeCluster>,
    pub status: Arc<FakeStatus>,
    pub schedule: Arc<RecordingSchedule>,
    pub clock: Arc<ManualClock>,
    pub shutdown: CancellationToken,
    pub reconciler: Arc<Reconciler>,
}

impl Harness {
    pub fn new(cluster: FakeCluster) -> Self {
        let cluster = Arc::new(cluster);
        let artifacts = Arc::clone(&cluster) as Arc<dyn ArtifactStore>;
        Self::with_artifacts(cluster, artifacts)
    }

    /// Reads go to `cluster`, writes to `artifacts`
    pub fn with_artifacts(cluster: Arc<FakeCluster>, artifacts: Arc<dyn ArtifactStore>) -> Self {
        let status = Arc::new(FakeStatus::default());
        let schedule = Arc::new(RecordingSchedule::default());
        let clock = Arc::new(ManualClock::new(t0()));
        let shutdown = CancellationToken::new();

        let reconciler = Arc::new(Reconciler::from_parts(ReconcilerParts {
            resolver: Arc::clone(&cluster) as Arc<dyn SecretResolver>,
            artifacts,
            status: Arc::clone(&status) as Arc<dyn StatusReporter>,
            schedule: Arc::clone(&schedule) as Arc<dyn RequeueStore>,
            clock: Arc::clone(&clock) as Arc<dyn Clock>,
            config: Arc::new(ControllerConfig::default()),
            shutdown: shutdown.clone(),
        }));

        Self {
            cluster,
            status,
            schedule,
            clock,
            shutdown,
            reconciler,
        }
    }

    /// Cluster holding only the signing key
    pub fn with_signing_key() -> Self {
        Self::new(FakeCluster::default().with_signing_key())
    }

    /// Move the clock to `t0() + offset`
    pub fn at(&self, offset: chrono::Duration) {
        self.clock.set(t0() + offset);
    }
}
