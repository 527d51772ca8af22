//! Producer side of the delivery queue pair.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

use crate::application::jobs::enqueue_job;
use crate::application::repos::{JobsRepo, RepoError};
use crate::domain::types::JobType;

pub const METRIC_QUEUE_ENQUEUED: &str = "bulletin_queue_enqueued_total";

const PREPARE_TO_SEND_MAX_ATTEMPTS: i32 = 5;
const DATA_QUEUE_MAX_ATTEMPTS: i32 = 10;

/// Triggers audience expansion into per-recipient delivery tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareToSendMessage {
    pub notification_id: String,
}

/// Asks the reconciler to fold recipient outcomes into the notification's counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataQueueMessage {
    pub notification_id: String,
    pub force_complete: bool,
}

#[derive(Debug, Error)]
#[error("failed to enqueue `{queue}` message: {source}")]
pub struct QueueError {
    pub queue: &'static str,
    #[source]
    pub source: RepoError,
}

#[async_trait]
pub trait PrepareToSendQueue: Send + Sync {
    async fn send(&self, message: PrepareToSendMessage) -> Result<String, QueueError>;
}

#[async_trait]
pub trait DataQueue: Send + Sync {
    /// Deliver no earlier than `delay` from now.
    async fn send_delayed(
        &self,
        message: DataQueueMessage,
        delay: Duration,
    ) -> Result<String, QueueError>;
}

/// Both queues backed by the job store.
#[derive(Clone)]
pub struct JobQueues {
    jobs: Arc<dyn JobsRepo>,
}

impl JobQueues {
    pub fn new(jobs: Arc<dyn JobsRepo>) -> Self {
        Self { jobs }
    }
}

#[async_trait]
impl PrepareToSendQueue for JobQueues {
    async fn send(&self, message: PrepareToSendMessage) -> Result<String, QueueError> {
        let job_type = JobType::PrepareToSend;
        let job_id = enqueue_job(
            self.jobs.as_ref(),
            job_type,
            &message,
            None,
            PREPARE_TO_SEND_MAX_ATTEMPTS,
            0,
        )
        .await
        .map_err(|source| QueueError {
            queue: job_type.as_str(),
            source,
        })?;

        counter!(METRIC_QUEUE_ENQUEUED, "queue" => job_type.as_str()).increment(1);
        debug!(
            target = "application::queues",
            job_id = %job_id,
            notification_id = %message.notification_id,
            "prepare-to-send message enqueued"
        );
        Ok(job_id)
    }
}

#[async_trait]
impl DataQueue for JobQueues {
    async fn send_delayed(
        &self,
        message: DataQueueMessage,
        delay: Duration,
    ) -> Result<String, QueueError> {
        let job_type = JobType::DataQueue;
        let run_at = OffsetDateTime::now_utc() + delay;
        let job_id = enqueue_job(
            self.jobs.as_ref(),
            job_type,
            &message,
            Some(run_at),
            DATA_QUEUE_MAX_ATTEMPTS,
            0,
        )
        .await
        .map_err(|source| QueueError {
            queue: job_type.as_str(),
            source,
        })?;

        counter!(METRIC_QUEUE_ENQUEUED, "queue" => job_type.as_str()).increment(1);
        debug!(
            target = "application::queues",
            job_id = %job_id,
            notification_id = %message.notification_id,
            force_complete = message.force_complete,
            delay_secs = delay.as_secs_f64(),
            "data queue message scheduled"
        );
        Ok(job_id)
    }
}
