/// Router failover and selection tests
///
/// Exercises the active-backend state machine against mock adapters
/// with programmable failure schedules.
use anyhow::anyhow;
use async_trait::async_trait;
use interaction_store::{
    BackendDescriptor, BackendKind, ChatContext, InteractionRecord, NamespaceStats, QueryFilter,
    RouterOptions, StoreAdapter, StoreError, StoreResult, StoreRouter, FILE_FALLBACK_NAME,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

struct MockStore {
    reachable: AtomicBool,
    /// 1-based insert call number from which every insert fails
    fail_inserts_from: Mutex<Option<u64>>,
    fail_finds: AtomicBool,
    insert_delay: Mutex<Option<Duration>>,
    insert_calls: AtomicU64,
    records: Mutex<Vec<InteractionRecord>>,
    size_mb: Mutex<f64>,
}

impl MockStore {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            reachable: AtomicBool::new(true),
            fail_inserts_from: Mutex::new(None),
            fail_finds: AtomicBool::new(false),
            insert_delay: Mutex::new(None),
            insert_calls: AtomicU64::new(0),
            records: Mutex::new(Vec::new()),
            size_mb: Mutex::new(0.0),
        })
    }

    fn unreachable() -> Arc<Self> {
        let mock = Self::new();
        mock.reachable.store(false, Ordering::SeqCst);
        mock
    }

    fn fail_inserts_from(self: &Arc<Self>, call: u64) {
        *self.fail_inserts_from.lock().unwrap() = Some(call);
    }

    fn fail_finds(self: &Arc<Self>) {
        self.fail_finds.store(true, Ordering::SeqCst);
    }

    fn delay_inserts(self: &Arc<Self>, delay: Duration) {
        *self.insert_delay.lock().unwrap() = Some(delay);
    }

    fn set_size_mb(self: &Arc<Self>, size: f64) {
        *self.size_mb.lock().unwrap() = size;
    }

    fn insert_count(&self) -> u64 {
        self.insert_calls.load(Ordering::SeqCst)
    }

    fn stored(&self) -> Vec<InteractionRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl StoreAdapter for MockStore {
    async fn connect(&self) -> StoreResult<()> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Connection(anyhow!("unreachable")))
        }
    }

    async fn ping(&self) -> StoreResult<bool> {
        Ok(self.reachable.load(Ordering::SeqCst))
    }

    async fn insert(&self, record: &InteractionRecord) -> StoreResult<()> {
        let delay = *self.insert_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let call = self.insert_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(from) = *self.fail_inserts_from.lock().unwrap() {
            if call >= from {
                return Err(StoreError::Write(anyhow!("simulated write failure")));
            }
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn find(
        &self,
        filter: &QueryFilter,
        limit: usize,
    ) -> StoreResult<Vec<InteractionRecord>> {
        if self.fail_finds.load(Ordering::SeqCst) {
            return Err(StoreError::Read(anyhow!("simulated read failure")));
        }
        let mut matches: Vec<InteractionRecord> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matches.truncate(limit);
        Ok(matches)
    }

    async fn stats(&self) -> StoreResult<NamespaceStats> {
        Ok(NamespaceStats {
            size_mb: *self.size_mb.lock().unwrap(),
            item_count: self.records.lock().unwrap().len() as u64,
        })
    }

    fn kind(&self) -> BackendKind {
        BackendKind::DocumentStore
    }
}

fn descriptor(name: &str, priority: u32, size_limit_mb: f64) -> BackendDescriptor {
    BackendDescriptor {
        name: name.to_string(),
        kind: BackendKind::DocumentStore,
        uri: format!("http://{}.test", name),
        priority,
        size_limit_mb,
        namespace: "user_interactions".to_string(),
        api_token: None,
        ttl_days: 30,
    }
}

fn entry(
    name: &str,
    priority: u32,
    size_limit_mb: f64,
    mock: &Arc<MockStore>,
) -> (BackendDescriptor, Option<Arc<dyn StoreAdapter>>) {
    (
        descriptor(name, priority, size_limit_mb),
        Some(mock.clone() as Arc<dyn StoreAdapter>),
    )
}

fn record_for(user: &str) -> InteractionRecord {
    InteractionRecord::conversation(user, "who won the 2020 final?", "MI", ChatContext::Private)
}

#[tokio::test]
async fn test_selects_lowest_priority_backend() {
    let dir = TempDir::new().unwrap();
    let a = MockStore::new();
    let b = MockStore::new();

    let router = StoreRouter::with_backends(
        RouterOptions::new(dir.path()),
        vec![entry("a", 1, 10.0, &a), entry("b", 2, 10.0, &b)],
    )
    .await
    .unwrap();

    assert!(!router.using_file_fallback());
    assert_eq!(router.active_backend_name(), "a");
}

#[tokio::test]
async fn test_unreachable_primary_is_skipped() {
    let dir = TempDir::new().unwrap();
    let a = MockStore::unreachable();
    let b = MockStore::new();

    let router = StoreRouter::with_backends(
        RouterOptions::new(dir.path()),
        vec![entry("a", 1, 10.0, &a), entry("b", 2, 10.0, &b)],
    )
    .await
    .unwrap();

    assert_eq!(router.active_backend_name(), "b");
    assert!(!router.using_file_fallback());
}

#[tokio::test]
async fn test_all_unreachable_falls_back_to_file() {
    let dir = TempDir::new().unwrap();
    let a = MockStore::unreachable();
    let b = MockStore::unreachable();

    let router = StoreRouter::with_backends(
        RouterOptions::new(dir.path()),
        vec![entry("a", 1, 10.0, &a), entry("b", 2, 10.0, &b)],
    )
    .await
    .unwrap();

    assert!(router.using_file_fallback());
    assert_eq!(router.active_backend_name(), FILE_FALLBACK_NAME);
}

#[tokio::test]
async fn test_backend_over_size_limit_is_skipped() {
    let dir = TempDir::new().unwrap();
    let a = MockStore::new();
    a.set_size_mb(20.0);
    let b = MockStore::new();

    let router = StoreRouter::with_backends(
        RouterOptions::new(dir.path()),
        vec![entry("a", 1, 10.0, &a), entry("b", 2, 10.0, &b)],
    )
    .await
    .unwrap();

    assert_eq!(router.active_backend_name(), "b");
}

#[tokio::test]
async fn test_write_failure_fails_over_and_sticks() {
    let dir = TempDir::new().unwrap();
    let a = MockStore::new();
    a.fail_inserts_from(5);
    let b = MockStore::new();

    let mut router = StoreRouter::with_backends(
        RouterOptions::new(dir.path()),
        vec![entry("a", 1, 10.0, &a), entry("b", 2, 10.0, &b)],
    )
    .await
    .unwrap();

    for i in 0..5 {
        router.record(record_for(&format!("u{}", i))).await;
    }

    // First four writes landed on A, the fifth failed over to B
    assert_eq!(a.stored().len(), 4);
    assert_eq!(b.stored().len(), 1);
    assert_eq!(b.stored()[0].user_id, "u4");
    assert_eq!(router.active_backend_name(), "b");

    // Subsequent writes use B without retrying A
    router.record(record_for("u5")).await;
    assert_eq!(a.insert_count(), 5);
    assert_eq!(b.stored().len(), 2);
}

#[tokio::test]
async fn test_failover_exhausted_goes_to_file() {
    let dir = TempDir::new().unwrap();
    let a = MockStore::new();
    a.fail_inserts_from(1);

    let mut router = StoreRouter::with_backends(
        RouterOptions::new(dir.path()),
        vec![entry("a", 1, 10.0, &a)],
    )
    .await
    .unwrap();

    assert_eq!(router.active_backend_name(), "a");
    router.record(record_for("u1")).await;

    // The record survived in the fallback despite the backend failure
    assert!(router.using_file_fallback());
    let found = router.query("u1", 10).await;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].user_id, "u1");
}

#[tokio::test]
async fn test_error_backend_not_reselected_until_ping_recovers() {
    let dir = TempDir::new().unwrap();
    let a = MockStore::new();
    a.fail_inserts_from(1);
    let b = MockStore::new();

    let mut router = StoreRouter::with_backends(
        RouterOptions::new(dir.path()),
        vec![entry("a", 1, 10.0, &a), entry("b", 2, 10.0, &b)],
    )
    .await
    .unwrap();

    router.record(record_for("u1")).await;
    assert_eq!(router.active_backend_name(), "b");

    // Re-running selection never resurrects an errored backend
    for _ in 0..3 {
        router.select_active_backend();
        assert_eq!(router.active_backend_name(), "b");
    }

    // A ping failure keeps it out too
    a.reachable.store(false, Ordering::SeqCst);
    router.get_stats().await;
    router.select_active_backend();
    assert_eq!(router.active_backend_name(), "b");

    // Only a successful ping resets it to connected
    a.reachable.store(true, Ordering::SeqCst);
    router.get_stats().await;
    router.select_active_backend();
    assert_eq!(router.active_backend_name(), "a");
}

#[tokio::test]
async fn test_get_stats_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let a = MockStore::new();
    a.set_size_mb(2.5);
    let b = MockStore::new();

    let mut router = StoreRouter::with_backends(
        RouterOptions::new(dir.path()),
        vec![entry("a", 1, 10.0, &a), entry("b", 2, 10.0, &b)],
    )
    .await
    .unwrap();

    let mut first = router.get_stats().await;
    let mut second = router.get_stats().await;

    // Health records differ only in last_checked
    for stats in [&mut first, &mut second] {
        for health in stats.values_mut() {
            health.last_checked = String::new();
        }
    }
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_record_query_round_trip() {
    let dir = TempDir::new().unwrap();
    let a = MockStore::new();

    let mut router = StoreRouter::with_backends(
        RouterOptions::new(dir.path()),
        vec![entry("a", 1, 10.0, &a)],
    )
    .await
    .unwrap();

    let record = record_for("u7");
    router.record(record.clone()).await;

    let found = router.query("u7", 1).await;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].user_id, record.user_id);
    assert_eq!(found[0].payload, record.payload);
    assert_eq!(found[0].chat_context, record.chat_context);
}

#[tokio::test]
async fn test_group_query_merges_backends_and_fallback() {
    let dir = TempDir::new().unwrap();
    let a = MockStore::new();

    let mut router = StoreRouter::with_backends(
        RouterOptions::new(dir.path()),
        vec![entry("a", 1, 10.0, &a)],
    )
    .await
    .unwrap();

    let in_group =
        InteractionRecord::conversation("u1", "q", "a", ChatContext::Group).with_group("g1");
    let other_group =
        InteractionRecord::conversation("u2", "q", "a", ChatContext::Group).with_group("g2");
    router.record(in_group).await;
    router.record(other_group).await;

    let found = router.query_group("g1", 10).await;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].group_id.as_deref(), Some("g1"));
}

#[tokio::test]
async fn test_learning_disabled_drops_records() {
    let dir = TempDir::new().unwrap();
    let a = MockStore::new();

    let mut options = RouterOptions::new(dir.path());
    options.learning_enabled = false;

    let mut router = StoreRouter::with_backends(options, vec![entry("a", 1, 10.0, &a)])
        .await
        .unwrap();

    router.record(record_for("u1")).await;

    assert_eq!(a.insert_count(), 0);
    assert!(router.query("u1", 10).await.is_empty());
}

#[tokio::test]
async fn test_auto_failover_disabled_writes_to_file() {
    let dir = TempDir::new().unwrap();
    let a = MockStore::new();
    a.fail_inserts_from(1);
    let b = MockStore::new();

    let mut options = RouterOptions::new(dir.path());
    options.auto_failover = false;

    let mut router = StoreRouter::with_backends(
        options,
        vec![entry("a", 1, 10.0, &a), entry("b", 2, 10.0, &b)],
    )
    .await
    .unwrap();

    router.record(record_for("u1")).await;

    // No failover attempt: B untouched, the record went to the fallback
    assert_eq!(b.insert_count(), 0);
    let found = router.query("u1", 10).await;
    assert_eq!(found.len(), 1);

    // The active backend is left for the next call to retry
    assert_eq!(router.active_backend_name(), "a");
}

#[tokio::test]
async fn test_switch_active_backend() {
    let dir = TempDir::new().unwrap();
    let a = MockStore::new();
    let b = MockStore::new();
    let c = MockStore::unreachable();

    let mut router = StoreRouter::with_backends(
        RouterOptions::new(dir.path()),
        vec![
            entry("a", 1, 10.0, &a),
            entry("b", 2, 10.0, &b),
            entry("c", 3, 10.0, &c),
        ],
    )
    .await
    .unwrap();

    assert_eq!(router.active_backend_name(), "a");

    // Operator override ignores priority
    router.switch_active_backend("b").unwrap();
    assert_eq!(router.active_backend_name(), "b");

    router.record(record_for("u1")).await;
    assert_eq!(b.stored().len(), 1);
    assert_eq!(a.insert_count(), 0);

    let err = router.switch_active_backend("nope").unwrap_err();
    assert!(matches!(err, StoreError::UnknownBackend(_)));

    let err = router.switch_active_backend("c").unwrap_err();
    assert!(matches!(err, StoreError::NotConnected(_)));

    // Failed switches leave the active backend untouched
    assert_eq!(router.active_backend_name(), "b");
}

#[tokio::test]
async fn test_query_keeps_partial_results_when_one_backend_fails() {
    let dir = TempDir::new().unwrap();
    let a = MockStore::new();
    let b = MockStore::new();

    let mut router = StoreRouter::with_backends(
        RouterOptions::new(dir.path()),
        vec![entry("a", 1, 10.0, &a), entry("b", 2, 10.0, &b)],
    )
    .await
    .unwrap();

    router
        .record(InteractionRecord::conversation(
            "u1",
            "first",
            "r1",
            ChatContext::Private,
        ))
        .await;
    router.switch_active_backend("b").unwrap();
    router
        .record(InteractionRecord::conversation(
            "u1",
            "second",
            "r2",
            ChatContext::Private,
        ))
        .await;
    assert_eq!(router.query("u1", 10).await.len(), 2);

    // A's reads start failing; B's records still come back
    a.fail_finds();
    let found = router.query("u1", 10).await;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].payload["message"], "second");
}

#[tokio::test]
async fn test_insert_timeout_fails_over_like_connection_error() {
    let dir = TempDir::new().unwrap();
    let a = MockStore::new();
    a.delay_inserts(Duration::from_millis(500));
    let b = MockStore::new();

    let mut options = RouterOptions::new(dir.path());
    options.call_timeout = Duration::from_millis(50);

    let mut router = StoreRouter::with_backends(
        options,
        vec![entry("a", 1, 10.0, &a), entry("b", 2, 10.0, &b)],
    )
    .await
    .unwrap();

    router.record(record_for("u1")).await;

    // The hung write on A was abandoned and failed over to B
    assert_eq!(router.active_backend_name(), "b");
    assert_eq!(b.stored().len(), 1);

    let stats = router.get_stats().await;
    assert!(stats["a"].error_count >= 1);
    assert!(stats["a"]
        .last_error
        .as_deref()
        .unwrap_or("")
        .contains("timed out"));
}

#[tokio::test]
async fn test_query_merges_results_across_backends() {
    let dir = TempDir::new().unwrap();
    let a = MockStore::new();
    let b = MockStore::new();

    let mut router = StoreRouter::with_backends(
        RouterOptions::new(dir.path()),
        vec![entry("a", 1, 10.0, &a), entry("b", 2, 10.0, &b)],
    )
    .await
    .unwrap();

    router.record(record_for("u1")).await;
    router.switch_active_backend("b").unwrap();
    router.record(record_for("u1")).await;

    // Both backends hold one record each; a full query merges them
    assert_eq!(router.query("u1", 10).await.len(), 2);
}

#[tokio::test]
async fn test_health_error_history_persists_across_restarts() {
    let dir = TempDir::new().unwrap();
    let a = MockStore::unreachable();

    {
        let _router = StoreRouter::with_backends(
            RouterOptions::new(dir.path()),
            vec![entry("a", 1, 10.0, &a)],
        )
        .await
        .unwrap();
    }

    // Second construction: the connect failure from the first run is
    // still visible in the loaded error count
    a.reachable.store(true, Ordering::SeqCst);
    let mut router = StoreRouter::with_backends(
        RouterOptions::new(dir.path()),
        vec![entry("a", 1, 10.0, &a)],
    )
    .await
    .unwrap();

    let stats = router.get_stats().await;
    assert!(stats["a"].error_count >= 1);
    assert!(stats["a"].last_error.is_some());
}
