//! Extraction status poller
//!
//! One background watcher task per submitted receipt. Each watcher queries
//! the extraction service on a fixed interval until the job turns terminal,
//! the attempt bound runs out, or the watcher is cancelled. Watchers for
//! different receipts never share state beyond the database pool.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use larder_common::events::{EventBus, LarderEvent};
use larder_common::Result;

use crate::config::IngestConfig;
use crate::db;
use crate::models::{NewLineItem, PollOutcome, ReceiptStatus};
use crate::services::extraction::{ExtractionService, ExtractionStatus, RemoteStatus};

/// Cancellation tokens for active watcher tasks, keyed by receipt id
pub type WatcherMap = Arc<RwLock<HashMap<Uuid, CancellationToken>>>;

/// Poll loop bounds
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    /// Delay between status queries
    pub interval: Duration,
    /// Status queries issued before reporting a timeout
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 20,
        }
    }
}

impl PollPolicy {
    pub fn from_config(config: &IngestConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.poll_interval_ms),
            max_attempts: config.poll_max_attempts,
        }
    }
}

/// Drives bounded status polling for dispatched receipts
#[derive(Clone)]
pub struct StatusPoller {
    db: SqlitePool,
    extraction: Arc<dyn ExtractionService>,
    event_bus: EventBus,
    policy: PollPolicy,
}

impl StatusPoller {
    pub fn new(
        db: SqlitePool,
        extraction: Arc<dyn ExtractionService>,
        event_bus: EventBus,
        policy: PollPolicy,
    ) -> Self {
        Self {
            db,
            extraction,
            event_bus,
            policy,
        }
    }

    /// Spawn a watcher task for one receipt
    ///
    /// Registers a cancellation token in `watchers` under the receipt id
    /// and removes it when the task exits, however it exits.
    pub async fn spawn_watcher(
        &self,
        watchers: &WatcherMap,
        receipt_id: Uuid,
        extraction_job_id: String,
    ) -> CancellationToken {
        let token = CancellationToken::new();
        watchers
            .write()
            .await
            .insert(receipt_id, token.clone());

        let poller = self.clone();
        let watchers = Arc::clone(watchers);
        let task_token = token.clone();

        tokio::spawn(async move {
            match poller
                .poll_until_terminal(receipt_id, &extraction_job_id, task_token)
                .await
            {
                Ok(outcome) => {
                    tracing::debug!(
                        receipt_id = %receipt_id,
                        outcome = ?outcome,
                        "Watcher task finished"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        receipt_id = %receipt_id,
                        error = %e,
                        "Watcher task failed"
                    );
                }
            }

            watchers.write().await.remove(&receipt_id);
        });

        token
    }

    /// Re-spawn watchers for receipts left non-terminal by a previous run
    ///
    /// In-flight poll tasks die with the process; the rows do not. Jobs
    /// still PENDING or PROCESSING at startup get a fresh bounded poll
    /// against the extraction job handle already on record. Nothing is
    /// resubmitted.
    pub async fn resume_unfinished(&self, watchers: &WatcherMap) -> Result<usize> {
        let receipts = db::receipts::list_unfinished(&self.db).await?;
        let mut resumed = 0;

        for receipt in receipts {
            if watchers.read().await.contains_key(&receipt.id) {
                continue;
            }
            self.spawn_watcher(watchers, receipt.id, receipt.extraction_job_id.clone())
                .await;
            resumed += 1;
        }

        if resumed > 0 {
            tracing::info!(count = resumed, "Resumed polling for unfinished receipts");
        }

        Ok(resumed)
    }

    /// The bounded poll loop
    ///
    /// Issues up to `max_attempts` status queries, one per interval tick.
    /// A failed query costs an attempt and is retried on the next tick.
    /// Exhausting the bound reports [`PollOutcome::TimedOut`] and leaves
    /// the receipt row exactly as it was; the job may still finish later.
    pub async fn poll_until_terminal(
        &self,
        receipt_id: Uuid,
        extraction_job_id: &str,
        cancel_token: CancellationToken,
    ) -> Result<PollOutcome> {
        let mut interval = tokio::time::interval(self.policy.interval);
        // The first tick of a tokio interval completes immediately;
        // consume it so every attempt waits one full interval
        interval.tick().await;

        for attempt in 1..=self.policy.max_attempts {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    tracing::debug!(receipt_id = %receipt_id, attempt, "Poll cancelled");
                    return Ok(PollOutcome::Cancelled);
                }
                _ = interval.tick() => {}
            }

            let report = match self.extraction.fetch_status(extraction_job_id).await {
                Ok(report) => report,
                Err(e) => {
                    tracing::warn!(
                        receipt_id = %receipt_id,
                        attempt,
                        error = %e,
                        "Status query failed, retrying next tick"
                    );
                    continue;
                }
            };

            // A cancellation that raced the query wins: report nothing,
            // write nothing
            if cancel_token.is_cancelled() {
                return Ok(PollOutcome::Cancelled);
            }

            match report.status {
                RemoteStatus::Pending => {
                    tracing::debug!(receipt_id = %receipt_id, attempt, "Still pending");
                }
                RemoteStatus::Processing => {
                    self.observe_processing(receipt_id).await?;
                }
                RemoteStatus::Completed => {
                    return self.observe_completion(receipt_id, report).await;
                }
                RemoteStatus::Failed => {
                    return self.observe_failure(receipt_id, report).await;
                }
            }
        }

        tracing::info!(
            receipt_id = %receipt_id,
            attempts = self.policy.max_attempts,
            "Poll bound exhausted without a terminal status"
        );
        self.event_bus.emit_lossy(LarderEvent::ReceiptPollTimedOut {
            receipt_id,
            attempts: self.policy.max_attempts,
            timestamp: chrono::Utc::now(),
        });

        Ok(PollOutcome::TimedOut {
            attempts: self.policy.max_attempts,
        })
    }

    /// Persist and announce the PENDING → PROCESSING advance
    ///
    /// The SQL guard makes repeated or stale observations no-ops.
    async fn observe_processing(&self, receipt_id: Uuid) -> Result<()> {
        let advanced = db::receipts::mark_processing(&self.db, receipt_id).await?;
        if advanced {
            tracing::info!(receipt_id = %receipt_id, "Extraction in progress");
            self.event_bus.emit_lossy(LarderEvent::ReceiptStatusChanged {
                receipt_id,
                old_status: ReceiptStatus::Pending.to_string(),
                new_status: ReceiptStatus::Processing.to_string(),
                timestamp: chrono::Utc::now(),
            });
        }
        Ok(())
    }

    async fn observe_completion(
        &self,
        receipt_id: Uuid,
        report: ExtractionStatus,
    ) -> Result<PollOutcome> {
        let items: Vec<NewLineItem> = report
            .line_items
            .iter()
            .map(|item| NewLineItem {
                description: item.description.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                total_price: item.total_price,
                matched_product_code: item.product_code.clone(),
            })
            .collect();

        // The service names the duplicated receipt by its own job handle;
        // resolve it to our id and drop it when no local receipt matches
        let duplicate_of_id = match report.duplicate_of.as_deref() {
            Some(remote_handle) if report.is_duplicate => {
                db::receipts::find_by_extraction_job(&self.db, remote_handle).await?
            }
            _ => None,
        };

        let completion = db::receipts::CompletionRecord {
            merchant_name: report.merchant_name.clone(),
            purchase_date: report.purchase_date.clone(),
            total_amount: report.total_amount,
            tax_amount: report.tax_amount,
            is_duplicate: report.is_duplicate,
            duplicate_of_id,
        };

        let applied =
            db::receipts::record_completion(&self.db, receipt_id, &items, &completion).await?;

        if applied {
            tracing::info!(
                receipt_id = %receipt_id,
                line_items = items.len(),
                is_duplicate = report.is_duplicate,
                "Extraction completed"
            );
            self.event_bus.emit_lossy(LarderEvent::ReceiptCompleted {
                receipt_id,
                line_item_count: items.len(),
                is_duplicate: report.is_duplicate,
                timestamp: chrono::Utc::now(),
            });
        } else {
            tracing::warn!(
                receipt_id = %receipt_id,
                "Receipt already terminal, dropping stale completion"
            );
        }

        Ok(PollOutcome::Completed {
            line_item_count: items.len(),
            is_duplicate: report.is_duplicate,
        })
    }

    async fn observe_failure(
        &self,
        receipt_id: Uuid,
        report: ExtractionStatus,
    ) -> Result<PollOutcome> {
        let error = report
            .error
            .unwrap_or_else(|| "extraction failed without detail".to_string());

        let applied = db::receipts::record_failure(&self.db, receipt_id, &error).await?;

        if applied {
            tracing::warn!(receipt_id = %receipt_id, error = %error, "Extraction failed");
            self.event_bus.emit_lossy(LarderEvent::ReceiptFailed {
                receipt_id,
                error: error.clone(),
                timestamp: chrono::Utc::now(),
            });
        } else {
            tracing::warn!(
                receipt_id = %receipt_id,
                "Receipt already terminal, dropping stale failure"
            );
        }

        Ok(PollOutcome::Failed { error })
    }
}
