//! Folds per-recipient outcomes into a sent notification's aggregate counters.

use std::{sync::Arc, time::Duration};

use metrics::counter;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::application::queues::{DataQueue, DataQueueMessage, QueueError};
use crate::application::repos::{
    DeliveryUpdate, NotificationsRepo, RepoError, SentNotificationsRepo,
};
use crate::domain::entities::{DeliveryCounters, NotificationRecord};
use crate::domain::error::DomainError;
use crate::domain::types::{NotificationPartition, NotificationStatus};

pub const METRIC_RECONCILE_COMPLETED: &str = "bulletin_reconcile_completed_total";
pub const METRIC_RECONCILE_RESCHEDULED: &str = "bulletin_reconcile_rescheduled_total";

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The notification no longer exists in the sent partition.
    Stale,
    /// The send already reached a terminal status; counters are frozen.
    AlreadyFinal,
    /// Another pass finalized the send after this one read it; nothing was written.
    Superseded,
    Completed {
        status: NotificationStatus,
        counters: DeliveryCounters,
    },
    Rescheduled {
        counters: DeliveryCounters,
    },
}

pub struct DeliveryReconciler {
    notifications: Arc<dyn NotificationsRepo>,
    sent: Arc<dyn SentNotificationsRepo>,
    data_queue: Arc<dyn DataQueue>,
    recheck_delay: Duration,
}

impl DeliveryReconciler {
    pub fn new(
        notifications: Arc<dyn NotificationsRepo>,
        sent: Arc<dyn SentNotificationsRepo>,
        data_queue: Arc<dyn DataQueue>,
        recheck_delay: Duration,
    ) -> Self {
        Self {
            notifications,
            sent,
            data_queue,
            recheck_delay,
        }
    }

    pub async fn reconcile(
        &self,
        message: &DataQueueMessage,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let Some(record) = self
            .notifications
            .find(NotificationPartition::Sent, &message.notification_id)
            .await?
        else {
            warn!(
                target = "application::reconcile",
                notification_id = %message.notification_id,
                "data queue message refers to an unknown sent notification"
            );
            return Ok(ReconcileOutcome::Stale);
        };

        if record.status.is_terminal() {
            debug!(
                target = "application::reconcile",
                notification_id = %record.id,
                status = record.status.as_str(),
                "send already final"
            );
            return Ok(ReconcileOutcome::AlreadyFinal);
        }

        let counts = self.sent.outcome_counts(&record.id).await?;
        let total = record.counters.total_message_count.max(counts.recorded());
        let mut observed = DeliveryCounters {
            succeeded: counts.succeeded,
            failed: counts.failed,
            throttled: counts.throttled,
            unknown: counts.unknown,
            total_message_count: total,
        };

        let outstanding = (total - observed.reconciled()).max(0);
        let complete = total > 0 && outstanding == 0;

        if message.force_complete {
            observed.unknown += outstanding;
        }

        let counters = record.counters.merge_monotonic(&observed);
        let finish = complete || message.force_complete;
        let next_status = next_status(&record, &counters, finish);
        let status = record.status.transition_to(next_status)?;

        let warning_message = if message.force_complete && outstanding > 0 {
            Some(format!(
                "{outstanding} recipients had no delivery outcome when the send was force-completed"
            ))
        } else {
            record.warning_message.clone()
        };

        let applied = self
            .notifications
            .update_delivery(&DeliveryUpdate {
                notification_id: record.id.clone(),
                counters,
                status,
                sent_at: finish.then(OffsetDateTime::now_utc),
                warning_message,
            })
            .await?;

        if !applied {
            debug!(
                target = "application::reconcile",
                notification_id = %record.id,
                "send finalized by a concurrent pass"
            );
            return Ok(ReconcileOutcome::Superseded);
        }

        if finish {
            let forced = if complete { "false" } else { "true" };
            counter!(METRIC_RECONCILE_COMPLETED, "forced" => forced).increment(1);
            info!(
                target = "application::reconcile",
                notification_id = %record.id,
                status = status.as_str(),
                succeeded = counters.succeeded,
                failed = counters.failed,
                throttled = counters.throttled,
                unknown = counters.unknown,
                total = counters.total_message_count,
                forced = message.force_complete,
                "send completed"
            );
            return Ok(ReconcileOutcome::Completed { status, counters });
        }

        self.data_queue
            .send_delayed(
                DataQueueMessage {
                    notification_id: record.id.clone(),
                    force_complete: false,
                },
                self.recheck_delay,
            )
            .await?;
        counter!(METRIC_RECONCILE_RESCHEDULED).increment(1);

        Ok(ReconcileOutcome::Rescheduled { counters })
    }
}

fn next_status(
    record: &NotificationRecord,
    counters: &DeliveryCounters,
    finish: bool,
) -> NotificationStatus {
    if finish {
        if counters.succeeded == 0 && counters.failed > 0 {
            NotificationStatus::Failed
        } else {
            NotificationStatus::Sent
        }
    } else if counters.total_message_count == 0 {
        record.status
    } else {
        NotificationStatus::Sending
    }
}
