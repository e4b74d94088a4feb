use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, TimeDelta, Utc};
use common::{MemoryStore, RecordStore};

use stepper::cache::SessionCache;
use stepper::clock::ManualClock;
use stepper::config::DelayConfig;
use stepper::error::ApiError;
use stepper::models::{AccountConfig, SessionRecord};
use stepper::notify::Notifier;
use stepper::runlog::LogLevel;
use stepper::runner::BatchRunner;
use stepper::session::SessionManager;
use stepper::steps::StepRange;
use stepper::zepp::{TokenGrant, ZeppApi};

const CACHED: &str = "13800138000";
const FRESH: &str = "user@example.com";
const REJECTED: &str = "13900139000";

/// Vendor double: accepts every password except the rejected account's
#[derive(Default)]
struct FakeZepp {
    valid_app_tokens: Mutex<Vec<String>>,
    access_calls: AtomicUsize,
    grant_calls: AtomicUsize,
    probe_calls: AtomicUsize,
    submitted: Mutex<HashMap<String, u32>>,
}

#[async_trait]
impl ZeppApi for FakeZepp {
    async fn fetch_access_code(&self, account: &AccountConfig) -> Result<String, ApiError> {
        self.access_calls.fetch_add(1, Ordering::SeqCst);
        if account.account_id == REJECTED {
            return Err(ApiError::Rejected);
        }
        Ok(format!("code-{}", account.account_id))
    }

    async fn grant_tokens(
        &self,
        account: &AccountConfig,
        _access_code: &str,
        _device_id: &str,
    ) -> Result<TokenGrant, ApiError> {
        self.grant_calls.fetch_add(1, Ordering::SeqCst);
        let app_token = format!("app-{}", account.account_id);
        self.valid_app_tokens.lock().unwrap().push(app_token.clone());
        Ok(TokenGrant {
            login_token: format!("login-{}", account.account_id),
            app_token,
            user_id: format!("uid-{}", account.account_id),
        })
    }

    async fn probe_app_token(&self, app_token: &str) -> Result<bool, ApiError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .valid_app_tokens
            .lock()
            .unwrap()
            .iter()
            .any(|t| t == app_token))
    }

    async fn submit_steps(
        &self,
        _app_token: &str,
        user_id: &str,
        steps: u32,
        _date: NaiveDate,
    ) -> Result<(), ApiError> {
        self.submitted
            .lock()
            .unwrap()
            .insert(user_id.to_string(), steps);
        Ok(())
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, title: &str, body: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
        Ok(())
    }
}

/// Webhook that is always down
struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send(&self, _title: &str, _body: &str) -> anyhow::Result<()> {
        anyhow::bail!("webhook answered 503 Service Unavailable")
    }
}

struct Setup {
    api: Arc<FakeZepp>,
    store: Arc<MemoryStore>,
    notifier: Arc<RecordingNotifier>,
    runner: BatchRunner,
}

fn runner_for(
    api: Arc<FakeZepp>,
    store: Arc<MemoryStore>,
    notifier: Arc<dyn Notifier>,
) -> BatchRunner {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let sessions = SessionManager::new(api.clone(), SessionCache::new(store), clock.clone());
    BatchRunner::new(sessions, api, notifier, clock, DelayConfig::none())
}

fn setup() -> Setup {
    let api = Arc::new(FakeZepp::default());
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let runner = runner_for(api.clone(), store.clone(), notifier.clone());
    Setup {
        api,
        store,
        notifier,
        runner,
    }
}

/// Seed a record whose app token is two hours old and still accepted
async fn seed_cached_session(s: &Setup) {
    let issued_at = Utc::now() - TimeDelta::hours(2);
    let grant = TokenGrant {
        login_token: format!("login-{CACHED}"),
        app_token: format!("app-{CACHED}"),
        user_id: format!("uid-{CACHED}"),
    };
    s.api
        .valid_app_tokens
        .lock()
        .unwrap()
        .push(grant.app_token.clone());
    let record = SessionRecord::from_grant(CACHED, "hm-rs-seeded", &grant, issued_at);
    s.runner
        .sessions()
        .cache()
        .save(&record, issued_at)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_batch_reuses_cache_and_signs_in_the_rest() {
    let s = setup();
    seed_cached_session(&s).await;

    let cached_range = StepRange::new(15000, 20000).unwrap();
    let fresh_range = StepRange::around(12000).unwrap();
    let accounts = vec![
        AccountConfig::new(CACHED, "secret", cached_range),
        AccountConfig::new(FRESH, "secret", fresh_range),
    ];

    let mut log = s.runner.new_log();
    let summary = s.runner.run(&accounts, &mut log).await;

    assert_eq!(summary.success_count(), 2);
    assert_eq!(summary.failure_count(), 0);

    // Only the uncached account went through the vendor sign-in
    assert_eq!(s.api.access_calls.load(Ordering::SeqCst), 1);
    assert_eq!(s.api.grant_calls.load(Ordering::SeqCst), 1);
    assert_eq!(s.api.probe_calls.load(Ordering::SeqCst), 1);

    let submitted = s.api.submitted.lock().unwrap().clone();
    assert!(cached_range.contains(submitted[&format!("uid-{CACHED}")]));
    assert!(fresh_range.contains(submitted[&format!("uid-{FRESH}")]));

    // The fresh sign-in left a record behind for the next run
    assert!(s.store.read(FRESH).await.unwrap().is_some());

    let sent = s.notifier.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.contains("Succeeded: 2/2"));
    assert_eq!(log.count(LogLevel::Error), 0);

    // The exported log covers the whole run, notification included
    assert_eq!(summary.run_log, log.export());
    assert!(summary.run_log.contains("[138****8000] Cached app token is valid"));
    assert!(summary.run_log.lines().last().unwrap().ends_with("Notification sent"));
}

#[tokio::test]
async fn test_batch_continues_past_failing_accounts() {
    let s = setup();

    let accounts = vec![
        AccountConfig::new(REJECTED, "wrong", StepRange::default()),
        AccountConfig::new("", "", StepRange::default()),
        AccountConfig::new(FRESH, "secret", StepRange::default()),
    ];

    let mut log = s.runner.new_log();
    let summary = s.runner.run(&accounts, &mut log).await;

    assert_eq!(summary.outcomes.len(), 3);
    assert_eq!(summary.success_count(), 1);
    assert!(!summary.outcomes[0].success);
    assert!(!summary.outcomes[1].success);
    assert!(summary.outcomes[2].success);

    // The blank account never reaches the vendor
    assert_eq!(s.api.access_calls.load(Ordering::SeqCst), 2);
    assert!(s.store.read(REJECTED).await.unwrap().is_none());

    let sent = s.notifier.sent.lock().unwrap();
    assert!(sent[0].1.contains("Succeeded: 1/3"));
    assert!(sent[0].1.contains("Failed: 2/3"));
    assert!(log.count(LogLevel::Error) >= 2);
}

#[tokio::test]
async fn test_notification_failure_leaves_summary_intact() {
    let api = Arc::new(FakeZepp::default());
    let store = Arc::new(MemoryStore::new());
    let runner = runner_for(api.clone(), store, Arc::new(FailingNotifier));

    let range = StepRange::new(15000, 20000).unwrap();
    let accounts = vec![AccountConfig::new(FRESH, "secret", range)];

    let mut log = runner.new_log();
    let summary = runner.run(&accounts, &mut log).await;

    assert_eq!(summary.success_count(), 1);
    assert_eq!(summary.failure_count(), 0);
    assert!(summary.outcomes[0].success);
    assert!(range.contains(summary.outcomes[0].steps));
    assert_eq!(api.submitted.lock().unwrap().len(), 1);
    assert!(summary.render().contains("Succeeded: 1/1"));

    assert_eq!(log.count(LogLevel::Error), 1);
    let last = summary.run_log.lines().last().unwrap();
    assert!(last.starts_with("[ERROR] "));
    assert!(last.contains("Notification failed: webhook answered 503"));
}
