//! End-to-end tests for sync, classification and warning delivery.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use scam_guard::signal_source::{async_trait, SignalSets, SignalSource, SourceConfig, SourceError};
use scam_guard::trust_store::{normalize, SignalSet, TrustStore};
use scam_guard::{
    GuardConfig, GuardError, InboundMessage, ListenerError, MemoryInbox, Reconciler, ScamGuard,
    SyncCycle, SyncOutcome, FORMAT_OR_SOURCE_MISMATCH, REPORTED_SCAMMER,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HOUR_MS: u64 = 60 * 60 * 1000;
const NOW: u64 = 1_760_000_000_000;

const VALID_BODY: &str = "You have received RWF 5,000 from MTN MoMo, TxnID: ABC123";

const TRUSTED_SENDER: &str = "+250 788 000 001";
const SCAMMER: &str = "0788 999 999";

/// Source that counts fetches and either serves fixed sets or fails.
struct CountingSource {
    calls: AtomicUsize,
    sets: Option<SignalSets>,
}

impl CountingSource {
    fn serving(trusted: &[&str], scammers: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            sets: Some(SignalSets {
                trusted: trusted.iter().map(|s| s.to_string()).collect(),
                scammers: scammers.iter().map(|s| s.to_string()).collect(),
            }),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            sets: None,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignalSource for CountingSource {
    async fn fetch_signal_sets(&self) -> Result<SignalSets, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sets.clone().ok_or_else(|| SourceError::Status {
            url: "http://authority/scammers".to_string(),
            status: 503,
        })
    }
}

async fn memory_store() -> TrustStore {
    let store = TrustStore::connect("sqlite::memory:").await.unwrap();
    store.initialize().await.unwrap();
    store
}

async fn guard_with(source: Arc<CountingSource>) -> ScamGuard {
    let store = memory_store().await;
    ScamGuard::with_parts(GuardConfig::default(), store, Some(source)).unwrap()
}

fn record(guard: &ScamGuard) -> Arc<Mutex<Vec<String>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _subscription = guard.bus().subscribe(move |message| {
        sink.lock().unwrap().push(message.to_string());
        Ok(())
    });
    seen
}

fn take(seen: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    std::mem::take(&mut *seen.lock().unwrap())
}

#[tokio::test]
async fn test_unopenable_store_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config = GuardConfig {
        database_url: format!(
            "sqlite:{}?mode=rwc",
            dir.path().join("missing").join("trust.db").display()
        ),
        ..GuardConfig::default()
    };

    let result = ScamGuard::from_config(&config).await;
    assert!(matches!(result, Err(GuardError::StorageOpenFailed(_))));
}

// =============================================================================
// Reconciliation
// =============================================================================

#[tokio::test]
async fn test_failed_fetch_leaves_store_unchanged() {
    let store = memory_store().await;
    store
        .apply_reconciliation(&[normalize(TRUSTED_SENDER)], &[normalize(SCAMMER)], NOW - 7 * HOUR_MS)
        .await
        .unwrap();
    let before_trusted = store.list(SignalSet::Trusted).await.unwrap();
    let before_scammers = store.list(SignalSet::Scammer).await.unwrap();

    let reconciler = Reconciler::new(CountingSource::failing(), store.clone());
    let result = reconciler.reconcile_at(NOW).await;
    assert!(matches!(result, Err(GuardError::SyncUnavailable(_))));

    assert_eq!(store.list(SignalSet::Trusted).await.unwrap(), before_trusted);
    assert_eq!(store.list(SignalSet::Scammer).await.unwrap(), before_scammers);
    assert_eq!(store.last_sync_time().await.unwrap(), Some(NOW - 7 * HOUR_MS));
}

#[tokio::test]
async fn test_partial_http_fetch_is_a_failed_sync() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/trusted-senders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(["0788000002"]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/scammers"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = GuardConfig {
        database_url: "sqlite::memory:".to_string(),
        source: Some(SourceConfig::new(server.uri())),
        ..GuardConfig::default()
    };
    let guard = ScamGuard::from_config(&config).await.unwrap();
    guard.mark_trusted(&[TRUSTED_SENDER]).await.unwrap();

    let result = guard.sync_now().await;
    assert!(matches!(result, Err(GuardError::SyncUnavailable(_))));

    let status = guard.status().await.unwrap();
    assert_eq!(status.trusted, 1);
    assert!(status.metadata.never_synced());
    assert!(
        !guard
            .store()
            .contains(SignalSet::Trusted, &normalize("0788000002"))
            .await
    );
}

#[tokio::test]
async fn test_http_sync_then_classify() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/trusted-senders"))
        .respond_with(ResponseTemplate::new(200).set_body_json([TRUSTED_SENDER, "0788000002"]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/scammers"))
        .respond_with(ResponseTemplate::new(200).set_body_json([SCAMMER]))
        .mount(&server)
        .await;

    let config = GuardConfig {
        database_url: "sqlite::memory:".to_string(),
        source: Some(SourceConfig::new(server.uri())),
        ..GuardConfig::default()
    };
    let guard = ScamGuard::from_config(&config).await.unwrap();
    let seen = record(&guard);

    let summary = guard.sync_now().await.unwrap();
    assert_eq!(summary.trusted, 2);
    assert_eq!(summary.scammers, 1);

    let result = guard
        .classify(&InboundMessage::new("0788000001", VALID_BODY))
        .await;
    assert!(result.warnings.is_empty());
    assert!(!result.degraded);

    guard
        .classify(&InboundMessage::new("+250788999999", VALID_BODY))
        .await;
    assert_eq!(take(&seen), vec![FORMAT_OR_SOURCE_MISMATCH, REPORTED_SCAMMER]);
}

// =============================================================================
// Freshness gating
// =============================================================================

async fn cycle_with_last_sync(last_sync: Option<u64>) -> (Arc<CountingSource>, SyncCycle, TrustStore) {
    let source = CountingSource::serving(&[TRUSTED_SENDER], &[SCAMMER]);
    let guard = guard_with(Arc::clone(&source)).await;
    if let Some(at) = last_sync {
        guard.store().set_last_sync_time(at).await.unwrap();
    }
    let cycle = guard.sync_cycle();
    (source, cycle, guard.store().clone())
}

#[tokio::test]
async fn test_fresh_store_is_not_synced() {
    let (source, cycle, store) = cycle_with_last_sync(Some(NOW - 5 * HOUR_MS)).await;

    let report = cycle.run_cycle_at(NOW).await;
    assert_eq!(report.sync, SyncOutcome::Fresh { age_ms: 5 * HOUR_MS });
    assert_eq!(source.calls(), 0);
    assert_eq!(store.last_sync_time().await.unwrap(), Some(NOW - 5 * HOUR_MS));
}

#[tokio::test]
async fn test_stale_store_is_synced_once() {
    let (source, cycle, store) = cycle_with_last_sync(Some(NOW - 7 * HOUR_MS)).await;

    let report = cycle.run_cycle_at(NOW).await;
    assert!(matches!(report.sync, SyncOutcome::Synced(summary) if summary.synced_at == NOW));
    assert_eq!(source.calls(), 1);
    assert_eq!(store.last_sync_time().await.unwrap(), Some(NOW));

    // The next cycle a minute later finds the store fresh.
    cycle.run_cycle_at(NOW + 60_000).await;
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn test_never_synced_store_is_synced() {
    let (source, cycle, store) = cycle_with_last_sync(None).await;

    cycle.run_cycle_at(NOW).await;
    assert_eq!(source.calls(), 1);
    assert!(store.contains(SignalSet::Scammer, &normalize(SCAMMER)).await);
}

#[tokio::test]
async fn test_future_sync_time_is_treated_as_stale() {
    let year_ahead = NOW + 365 * 24 * HOUR_MS;
    let (source, cycle, store) = cycle_with_last_sync(Some(year_ahead)).await;

    let report = cycle.run_cycle_at(NOW).await;
    assert!(matches!(report.sync, SyncOutcome::Synced(_)));
    assert_eq!(source.calls(), 1);
    assert_eq!(store.last_sync_time().await.unwrap(), Some(NOW));

    // Back to normal gating once the stamp is repaired.
    let report = cycle.run_cycle_at(NOW + 60_000).await;
    assert_eq!(report.sync, SyncOutcome::Fresh { age_ms: 60_000 });
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn test_failed_cycle_is_retried_next_cycle() {
    let source = CountingSource::failing();
    let guard = guard_with(Arc::clone(&source)).await;
    let cycle = guard.sync_cycle();

    let report = cycle.run_cycle_at(NOW).await;
    assert!(matches!(report.sync, SyncOutcome::Failed(_)));

    cycle.run_cycle_at(NOW + 60_000).await;
    assert_eq!(source.calls(), 2);
    assert!(guard.store().last_sync_time().await.unwrap().is_none());
}

// =============================================================================
// Classification
// =============================================================================

#[tokio::test]
async fn test_unknown_sender_with_valid_format_gets_one_warning() {
    let guard = guard_with(CountingSource::serving(&[TRUSTED_SENDER], &[SCAMMER])).await;
    guard.sync_now().await.unwrap();
    let seen = record(&guard);

    let result = guard
        .classify(&InboundMessage::new("0788123456", VALID_BODY))
        .await;

    assert!(result.outcome.is_format_valid);
    assert!(!result.outcome.is_trusted_sender);
    assert_eq!(take(&seen), vec![FORMAT_OR_SOURCE_MISMATCH]);
}

#[tokio::test]
async fn test_trusted_sender_with_invalid_format_gets_one_warning() {
    let guard = guard_with(CountingSource::serving(&[TRUSTED_SENDER], &[])).await;
    guard.sync_now().await.unwrap();
    let seen = record(&guard);

    let result = guard
        .classify(&InboundMessage::new("250788000001", "Click here to claim your prize"))
        .await;

    assert!(result.outcome.is_trusted_sender);
    assert!(!result.outcome.is_format_valid);
    assert_eq!(take(&seen), vec![FORMAT_OR_SOURCE_MISMATCH]);
}

#[tokio::test]
async fn test_sender_in_both_sets_gets_both_warnings() {
    let guard = guard_with(CountingSource::serving(&[SCAMMER], &[SCAMMER])).await;
    guard.sync_now().await.unwrap();
    let seen = record(&guard);

    let result = guard
        .classify(&InboundMessage::new(SCAMMER, "Please send the code back"))
        .await;

    assert!(result.outcome.is_trusted_sender);
    assert!(result.outcome.is_known_scammer);
    assert_eq!(take(&seen), vec![FORMAT_OR_SOURCE_MISMATCH, REPORTED_SCAMMER]);
}

#[tokio::test]
async fn test_never_synced_store_classifies_degraded() {
    let guard = guard_with(CountingSource::failing()).await;
    let seen = record(&guard);

    let result = guard
        .classify(&InboundMessage::new(TRUSTED_SENDER, VALID_BODY))
        .await;

    assert!(result.degraded);
    assert_eq!(take(&seen), vec![FORMAT_OR_SOURCE_MISMATCH]);
}

#[tokio::test]
async fn test_locally_reported_scammer_is_flagged_before_sync() {
    let guard = guard_with(CountingSource::failing()).await;
    guard.report_scammer(&["(078) 899-9999"]).await.unwrap();

    let result = guard
        .classify(&InboundMessage::new("+250788999999", VALID_BODY))
        .await;

    assert!(result.outcome.is_known_scammer);
    assert_eq!(result.warnings, vec![FORMAT_OR_SOURCE_MISMATCH, REPORTED_SCAMMER]);
}

#[tokio::test]
async fn test_unreadable_store_fails_closed() {
    let guard = guard_with(CountingSource::serving(&[TRUSTED_SENDER], &[])).await;
    guard.sync_now().await.unwrap();
    guard.store().close().await;

    let result = guard
        .classify(&InboundMessage::new(TRUSTED_SENDER, VALID_BODY))
        .await;

    assert!(!result.outcome.is_trusted_sender);
    assert!(result.degraded);
    assert_eq!(result.warnings, vec![FORMAT_OR_SOURCE_MISMATCH]);
}

#[tokio::test]
async fn test_failing_listeners_do_not_block_delivery() {
    let guard = guard_with(CountingSource::failing()).await;

    let _failing = guard
        .bus()
        .subscribe(|_| Err(ListenerError::from("ui gone")));
    let _panicking = guard.bus().subscribe(|_| panic!("listener bug"));
    let seen = record(&guard);

    guard
        .classify(&InboundMessage::new("0788123456", VALID_BODY))
        .await;

    assert_eq!(take(&seen), vec![FORMAT_OR_SOURCE_MISMATCH]);
}

// =============================================================================
// Inbox scanning
// =============================================================================

#[tokio::test]
async fn test_inbox_messages_are_classified_once() {
    let store = memory_store().await;
    let guard = ScamGuard::with_parts(GuardConfig::default(), store.clone(), None).unwrap();
    let seen = record(&guard);

    let inbox = Arc::new(MemoryInbox::new());
    inbox.push(InboundMessage::new(SCAMMER, VALID_BODY).observed_at(NOW - 2_000));
    inbox.push(InboundMessage::new("0788123456", VALID_BODY).observed_at(NOW - 1_000));

    let cycle = SyncCycle::new(
        Reconciler::new(CountingSource::serving(&[], &[SCAMMER]), store.clone()),
        guard.classifier().clone(),
    )
    .with_inbox(inbox.clone());

    let first = cycle.run_cycle_at(NOW).await;
    assert_eq!(first.classified, 2);
    assert_eq!(store.inbox_cursor().await.unwrap(), Some(NOW - 1_000));
    take(&seen);

    let second = cycle.run_cycle_at(NOW + 60_000).await;
    assert_eq!(second.classified, 0);
    assert!(take(&seen).is_empty());

    inbox.push(InboundMessage::new(SCAMMER, "RWF 100 sent via MoMo").observed_at(NOW + 90_000));
    let third = cycle.run_cycle_at(NOW + 120_000).await;
    assert_eq!(third.classified, 1);
    assert_eq!(take(&seen), vec![FORMAT_OR_SOURCE_MISMATCH, REPORTED_SCAMMER]);
}

#[tokio::test]
async fn test_untimestamped_messages_are_classified_once() {
    let store = memory_store().await;
    let guard = ScamGuard::with_parts(GuardConfig::default(), store.clone(), None).unwrap();
    let seen = record(&guard);

    let inbox = Arc::new(MemoryInbox::new());
    inbox.push(InboundMessage::new("0788123456", VALID_BODY));

    let cycle = SyncCycle::new(
        Reconciler::new(CountingSource::serving(&[TRUSTED_SENDER], &[]), store.clone()),
        guard.classifier().clone(),
    )
    .with_inbox(inbox);

    let classified: Vec<usize> = vec![
        cycle.run_cycle_at(NOW).await.classified,
        cycle.run_cycle_at(NOW + 60_000).await.classified,
        cycle.run_cycle_at(NOW + 120_000).await.classified,
    ];

    assert_eq!(classified, vec![1, 0, 0]);
    assert_eq!(take(&seen), vec![FORMAT_OR_SOURCE_MISMATCH]);
    assert_eq!(store.inbox_cursor().await.unwrap(), Some(NOW));
}

#[tokio::test]
async fn test_cycle_without_source_still_scans_inbox() {
    let dir = tempfile::tempdir().unwrap();
    let inbox_file = dir.path().join("inbox.json");
    std::fs::write(
        &inbox_file,
        format!(
            r#"[{{"sender": "{}", "body": "{}", "timestamp": {}}}]"#,
            SCAMMER,
            VALID_BODY,
            NOW - 1_000
        ),
    )
    .unwrap();

    let config = GuardConfig {
        inbox_file: Some(inbox_file),
        ..GuardConfig::default()
    };
    let store = memory_store().await;
    let guard = ScamGuard::with_parts(config, store.clone(), None).unwrap();
    guard.report_scammer(&[SCAMMER]).await.unwrap();
    let seen = record(&guard);

    let cycle = guard.sync_cycle();
    let report = cycle.run_cycle_at(NOW).await;
    assert_eq!(report.sync, SyncOutcome::NoSource);
    assert_eq!(report.classified, 1);
    assert_eq!(take(&seen), vec![FORMAT_OR_SOURCE_MISMATCH, REPORTED_SCAMMER]);

    let report = cycle.run_cycle_at(NOW + 60_000).await;
    assert_eq!(report.classified, 0);
    assert!(store.last_sync_time().await.unwrap().is_none());
}
