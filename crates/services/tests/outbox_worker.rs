//! Integration tests for the outbox worker against a scripted sink.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use db::{
    DBService,
    models::outbox::{OutboxEntry, OutboxEventType, OutboxStatus, SyncTarget},
    test_utils::create_test_db,
};
use services::services::{
    config::SyncConfig,
    contact::{ContactPayload, ContactRole},
    sync::{ContactSink, SyncError, worker::SyncService},
};

/// Replays queued outcomes, then succeeds.
struct ScriptedSink {
    target: SyncTarget,
    outcomes: Mutex<VecDeque<Result<(), SyncError>>>,
    delivered: Mutex<Vec<(OutboxEventType, String)>>,
}

impl ScriptedSink {
    fn new(target: SyncTarget, outcomes: Vec<Result<(), SyncError>>) -> Arc<Self> {
        Arc::new(Self {
            target,
            outcomes: Mutex::new(outcomes.into()),
            delivered: Mutex::default(),
        })
    }

    fn delivered(&self) -> Vec<(OutboxEventType, String)> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContactSink for ScriptedSink {
    fn target(&self) -> SyncTarget {
        self.target
    }

    async fn deliver(
        &self,
        event: OutboxEventType,
        contact: &ContactPayload,
    ) -> Result<(), SyncError> {
        let outcome = self.outcomes.lock().unwrap().pop_front().unwrap_or(Ok(()));
        if outcome.is_ok() {
            self.delivered
                .lock()
                .unwrap()
                .push((event, contact.email.clone()));
        }
        outcome
    }
}

fn contact(email: &str) -> ContactPayload {
    ContactPayload {
        email: email.to_string(),
        firstname: Some("Vic".to_string()),
        lastname: Some("Voter".to_string()),
        company: None,
        job_title: None,
        phone: None,
        country: None,
        linkedin: None,
        role: ContactRole::Voter,
        campaign_year: "2026".to_string(),
        subcategory_id: Some("top-recruiter".to_string()),
        category: Some("Top Recruiter".to_string()),
        live_url: None,
    }
}

async fn stage(db: &DBService, target: SyncTarget, email: &str) -> OutboxEntry {
    OutboxEntry::enqueue(&db.pool, target, OutboxEventType::VoteCast, &contact(email))
        .await
        .unwrap()
}

fn config(max_attempts: i64, base_delay: Duration) -> SyncConfig {
    SyncConfig {
        max_attempts,
        base_delay,
        ..Default::default()
    }
}

fn service(db: &DBService, config: SyncConfig, sink: &Arc<ScriptedSink>) -> SyncService {
    let sink: Arc<dyn ContactSink> = sink.clone();
    SyncService::with_sinks(db.pool.clone(), config, vec![sink])
}

fn server_error() -> SyncError {
    SyncError::Http {
        status: 503,
        body: "unavailable".to_string(),
    }
}

#[tokio::test]
async fn delivers_due_rows_in_order() {
    let (db, _dir) = create_test_db().await;
    stage(&db, SyncTarget::Hubspot, "a@example.com").await;
    stage(&db, SyncTarget::Hubspot, "b@example.com").await;
    let sink = ScriptedSink::new(SyncTarget::Hubspot, vec![]);
    let sync = service(&db, SyncConfig::default(), &sink);

    let report = sync.run_once(SyncTarget::Hubspot).await.unwrap();
    assert_eq!(report.claimed, 2);
    assert_eq!(report.delivered, 2);
    assert_eq!(
        sink.delivered(),
        vec![
            (OutboxEventType::VoteCast, "a@example.com".to_string()),
            (OutboxEventType::VoteCast, "b@example.com".to_string()),
        ]
    );

    let stats = OutboxEntry::stats(&db.pool, SyncTarget::Hubspot).await.unwrap();
    assert_eq!(stats.done, 2);
    assert_eq!(stats.pending, 0);

    let again = sync.run_once(SyncTarget::Hubspot).await.unwrap();
    assert_eq!(again.claimed, 0);
}

#[tokio::test]
async fn transient_failure_backs_off() {
    let (db, _dir) = create_test_db().await;
    let row = stage(&db, SyncTarget::Loops, "a@example.com").await;
    let sink = ScriptedSink::new(SyncTarget::Loops, vec![Err(server_error())]);
    let sync = service(&db, config(5, Duration::from_secs(60)), &sink);

    let report = sync.run_once(SyncTarget::Loops).await.unwrap();
    assert_eq!(report.retried, 1);

    let after = OutboxEntry::find_by_id(&db.pool, SyncTarget::Loops, row.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.status, OutboxStatus::Pending);
    assert_eq!(after.attempt_count, 1);
    assert!(after.last_error.as_deref().is_some_and(|e| e.contains("503")));
    assert!(after.next_attempt_at > chrono::Utc::now() + chrono::Duration::seconds(30));

    // Not due yet.
    let report = sync.run_once(SyncTarget::Loops).await.unwrap();
    assert_eq!(report.claimed, 0);
    assert!(sink.delivered().is_empty());
}

#[tokio::test]
async fn retries_stop_at_max_attempts() {
    let (db, _dir) = create_test_db().await;
    let row = stage(&db, SyncTarget::Hubspot, "a@example.com").await;
    let sink = ScriptedSink::new(
        SyncTarget::Hubspot,
        vec![Err(server_error()), Err(server_error()), Err(server_error())],
    );
    let sync = service(&db, config(2, Duration::ZERO), &sink);

    let first = sync.run_once(SyncTarget::Hubspot).await.unwrap();
    assert_eq!(first.retried, 1);
    let second = sync.run_once(SyncTarget::Hubspot).await.unwrap();
    assert_eq!(second.failed, 1);

    let after = OutboxEntry::find_by_id(&db.pool, SyncTarget::Hubspot, row.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.status, OutboxStatus::Failed);
    assert_eq!(after.attempt_count, 2);
}

#[tokio::test]
async fn permanent_failure_fails_immediately_and_can_be_requeued() {
    let (db, _dir) = create_test_db().await;
    let row = stage(&db, SyncTarget::Hubspot, "a@example.com").await;
    let sink = ScriptedSink::new(
        SyncTarget::Hubspot,
        vec![Err(SyncError::Http {
            status: 400,
            body: "Property values were not valid".to_string(),
        })],
    );
    let sync = service(&db, SyncConfig::default(), &sink);

    let report = sync.run_once(SyncTarget::Hubspot).await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.retried, 0);

    let requeued = OutboxEntry::requeue_failed(&db.pool, SyncTarget::Hubspot)
        .await
        .unwrap();
    assert_eq!(requeued, 1);
    let pending = OutboxEntry::find_by_id(&db.pool, SyncTarget::Hubspot, row.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pending.status, OutboxStatus::Pending);
    assert_eq!(pending.attempt_count, 0);

    let report = sync.run_once(SyncTarget::Hubspot).await.unwrap();
    assert_eq!(report.delivered, 1);
    assert_eq!(sink.delivered().len(), 1);
}

#[tokio::test]
async fn undecodable_payload_is_failed() {
    let (db, _dir) = create_test_db().await;
    let row = OutboxEntry::enqueue(
        &db.pool,
        SyncTarget::Loops,
        OutboxEventType::VoteCast,
        &serde_json::json!({ "unexpected": true }),
    )
    .await
    .unwrap();
    let sink = ScriptedSink::new(SyncTarget::Loops, vec![]);
    let sync = service(&db, SyncConfig::default(), &sink);

    let report = sync.run_once(SyncTarget::Loops).await.unwrap();
    assert_eq!(report.failed, 1);
    assert!(sink.delivered().is_empty());

    let after = OutboxEntry::find_by_id(&db.pool, SyncTarget::Loops, row.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.status, OutboxStatus::Failed);
    assert!(
        after
            .last_error
            .as_deref()
            .is_some_and(|e| e.starts_with("undecodable payload:"))
    );
}

#[tokio::test]
async fn unconfigured_target_leaves_rows_pending() {
    let (db, _dir) = create_test_db().await;
    stage(&db, SyncTarget::Loops, "a@example.com").await;
    let sink = ScriptedSink::new(SyncTarget::Hubspot, vec![]);
    let sync = service(&db, SyncConfig::default(), &sink);

    assert!(sync.is_enabled(SyncTarget::Hubspot));
    assert!(!sync.is_enabled(SyncTarget::Loops));
    let err = sync.run_once(SyncTarget::Loops).await.unwrap_err();
    assert!(matches!(err, SyncError::Disabled(SyncTarget::Loops)));

    let stats = OutboxEntry::stats(&db.pool, SyncTarget::Loops).await.unwrap();
    assert_eq!(stats.pending, 1);
}
