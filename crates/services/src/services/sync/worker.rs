//! Background consumer of the outbox tables.
//!
//! One tokio task per enabled target ticks every `poll_interval`. Each pass
//! puts abandoned `processing` rows back in the queue, claims a batch of due
//! rows and hands every row to the target's [`ContactSink`].

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use db::{
    exponential_delay,
    models::outbox::{OutboxEntry, SyncTarget},
};
use serde::Serialize;
use sqlx::SqlitePool;
use strum::IntoEnumIterator;
use tokio::{
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};
use ts_rs::TS;

use super::{ContactSink, SyncError, hubspot::HubspotClient, loops::LoopsClient};
use crate::services::{
    config::{AppConfig, SyncConfig},
    contact::ContactPayload,
};

/// Outcome of one worker pass.
#[derive(Debug, Clone, Serialize, TS)]
pub struct SyncReport {
    pub target: SyncTarget,
    pub released: u64,
    pub claimed: usize,
    pub delivered: usize,
    pub retried: usize,
    pub failed: usize,
}

impl SyncReport {
    fn new(target: SyncTarget) -> Self {
        Self {
            target,
            released: 0,
            claimed: 0,
            delivered: 0,
            retried: 0,
            failed: 0,
        }
    }
}

enum Disposition {
    Delivered,
    Retried,
    Failed,
}

#[derive(Clone)]
pub struct OutboxWorker {
    pool: SqlitePool,
    sink: Arc<dyn ContactSink>,
    config: SyncConfig,
}

impl OutboxWorker {
    pub fn new(pool: SqlitePool, sink: Arc<dyn ContactSink>, config: SyncConfig) -> Self {
        Self { pool, sink, config }
    }

    pub fn target(&self) -> SyncTarget {
        self.sink.target()
    }

    /// When a row that has already failed `attempts_so_far` times should be
    /// tried again.
    pub fn next_attempt_at(&self, attempts_so_far: i64, now: DateTime<Utc>) -> DateTime<Utc> {
        let attempt = u32::try_from(attempts_so_far.max(0)).unwrap_or(u32::MAX);
        let delay = exponential_delay(self.config.base_delay, attempt, self.config.max_delay);
        now + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::hours(1))
    }

    pub async fn run_once(&self) -> Result<SyncReport, SyncError> {
        let target = self.target();
        let mut report = SyncReport::new(target);
        let now = Utc::now();

        let stale_cutoff = now
            - chrono::Duration::from_std(self.config.stale_after)
                .unwrap_or(chrono::Duration::minutes(10));
        report.released = OutboxEntry::release_stale(&self.pool, target, stale_cutoff).await?;
        if report.released > 0 {
            warn!(sync_target = %target, released = report.released, "Released stale outbox rows");
        }

        let batch =
            OutboxEntry::claim_batch(&self.pool, target, self.config.batch_size, now).await?;
        report.claimed = batch.len();

        for entry in batch {
            match self.process(&entry).await? {
                Disposition::Delivered => report.delivered += 1,
                Disposition::Retried => report.retried += 1,
                Disposition::Failed => report.failed += 1,
            }
        }

        if report.claimed > 0 {
            info!(
                sync_target = %target,
                claimed = report.claimed,
                delivered = report.delivered,
                retried = report.retried,
                failed = report.failed,
                "Outbox pass finished"
            );
        } else {
            debug!(sync_target = %target, "Outbox empty");
        }
        Ok(report)
    }

    async fn process(&self, entry: &OutboxEntry) -> Result<Disposition, SyncError> {
        let target = self.target();

        let contact: ContactPayload = match entry.decode_payload() {
            Ok(contact) => contact,
            Err(e) => {
                let err = SyncError::from(e);
                error!(sync_target = %target, entry_id = %entry.id, error = %err, "Undecodable outbox payload");
                OutboxEntry::mark_failed(&self.pool, target, entry.id, &err.to_string()).await?;
                return Ok(Disposition::Failed);
            }
        };

        match self.sink.deliver(entry.event_type, &contact).await {
            Ok(()) => {
                OutboxEntry::mark_done(&self.pool, target, entry.id).await?;
                Ok(Disposition::Delivered)
            }
            Err(e) => {
                let attempts = entry.attempt_count + 1;
                let message = e.to_string();
                if e.is_transient() && attempts < self.config.max_attempts {
                    let next = self.next_attempt_at(entry.attempt_count, Utc::now());
                    warn!(
                        sync_target = %target,
                        entry_id = %entry.id,
                        attempts = attempts,
                        next_attempt_at = %next,
                        error = %message,
                        "Contact sync failed, will retry"
                    );
                    OutboxEntry::mark_retry(&self.pool, target, entry.id, &message, next).await?;
                    Ok(Disposition::Retried)
                } else {
                    error!(
                        sync_target = %target,
                        entry_id = %entry.id,
                        attempts = attempts,
                        transient = e.is_transient(),
                        error = %message,
                        "Contact sync failed permanently"
                    );
                    OutboxEntry::mark_failed(&self.pool, target, entry.id, &message).await?;
                    Ok(Disposition::Failed)
                }
            }
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let target = self.target();
            let mut interval = time::interval(self.config.poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(
                sync_target = %target,
                interval_secs = self.config.poll_interval.as_secs(),
                "Outbox worker started"
            );

            loop {
                interval.tick().await;
                if let Err(e) = self.run_once().await {
                    error!(sync_target = %target, error = %e, "Outbox pass failed");
                }
            }
        })
    }
}

/// The set of configured sync targets.
#[derive(Clone)]
pub struct SyncService {
    pool: SqlitePool,
    config: SyncConfig,
    sinks: HashMap<SyncTarget, Arc<dyn ContactSink>>,
}

impl SyncService {
    /// Build clients for every target with credentials in `config`.
    pub fn from_config(pool: SqlitePool, config: &AppConfig) -> Result<Self, SyncError> {
        let mut sinks: Vec<Arc<dyn ContactSink>> = Vec::new();
        if let Some(hubspot) = &config.hubspot {
            sinks.push(Arc::new(HubspotClient::new(hubspot)?));
        }
        if let Some(loops) = &config.loops {
            sinks.push(Arc::new(LoopsClient::new(loops)?));
        }
        Ok(Self::with_sinks(pool, config.sync.clone(), sinks))
    }

    pub fn with_sinks(
        pool: SqlitePool,
        config: SyncConfig,
        sinks: Vec<Arc<dyn ContactSink>>,
    ) -> Self {
        let sinks = sinks.into_iter().map(|s| (s.target(), s)).collect();
        Self { pool, config, sinks }
    }

    pub fn is_enabled(&self, target: SyncTarget) -> bool {
        self.sinks.contains_key(&target)
    }

    pub fn worker(&self, target: SyncTarget) -> Result<OutboxWorker, SyncError> {
        let sink = self
            .sinks
            .get(&target)
            .cloned()
            .ok_or(SyncError::Disabled(target))?;
        Ok(OutboxWorker::new(self.pool.clone(), sink, self.config.clone()))
    }

    pub async fn run_once(&self, target: SyncTarget) -> Result<SyncReport, SyncError> {
        self.worker(target)?.run_once().await
    }

    /// Start a worker for every enabled target. Disabled targets keep their
    /// rows pending.
    pub fn spawn_workers(&self) -> Vec<JoinHandle<()>> {
        SyncTarget::iter()
            .filter_map(|target| match self.worker(target) {
                Ok(worker) => Some(worker.spawn()),
                Err(_) => {
                    warn!(sync_target = %target, "No API credentials, outbox rows will stay pending");
                    None
                }
            })
            .collect()
    }
}
