//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::entities::{DeliveryCounters, ExportRecord, NotificationRecord};
use crate::domain::types::{JobType, NotificationPartition, NotificationStatus};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Durable notification state, split into draft and sent partitions.
#[async_trait]
pub trait NotificationsRepo: Send + Sync {
    async fn find(
        &self,
        partition: NotificationPartition,
        id: &str,
    ) -> Result<Option<NotificationRecord>, RepoError>;

    /// Insert the record or overwrite an existing one with the same partition and id.
    async fn create_or_update(&self, record: &NotificationRecord) -> Result<(), RepoError>;

    /// Move a draft into the sent partition under a freshly generated id, returning that id.
    /// Fails with [`RepoError::NotFound`] when the draft no longer exists.
    async fn move_draft_to_sent(&self, draft: &NotificationRecord) -> Result<String, RepoError>;

    async fn delete(&self, record: &NotificationRecord) -> Result<(), RepoError>;

    /// Sent notifications, newest first.
    async fn most_recent_sent(&self, limit: u32) -> Result<Vec<NotificationRecord>, RepoError>;

    /// Draft notifications, oldest first.
    async fn all_drafts(&self) -> Result<Vec<NotificationRecord>, RepoError>;

    /// Fold reconciled counters into a sent notification. Counters only grow, and a status of
    /// `preparing` never replaces a later one. Returns `false` without writing when the send
    /// is missing or already terminal.
    async fn update_delivery(&self, update: &DeliveryUpdate) -> Result<bool, RepoError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryUpdate {
    pub notification_id: String,
    pub counters: DeliveryCounters,
    pub status: NotificationStatus,
    pub sent_at: Option<OffsetDateTime>,
    pub warning_message: Option<String>,
}

/// Per-status tallies of the recipient outcome rows written by delivery workers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub queued: i64,
    pub succeeded: i64,
    pub failed: i64,
    pub throttled: i64,
    pub unknown: i64,
}

impl OutcomeCounts {
    pub fn recorded(&self) -> i64 {
        self.queued + self.succeeded + self.failed + self.throttled + self.unknown
    }
}

#[async_trait]
pub trait SentNotificationsRepo: Send + Sync {
    /// Create the recipient outcome storage when it does not exist yet.
    async fn ensure_storage(&self) -> Result<(), RepoError>;

    async fn outcome_counts(&self, notification_id: &str) -> Result<OutcomeCounts, RepoError>;
}

#[async_trait]
pub trait TeamsRepo: Send + Sync {
    /// Names of the known teams among `ids`. Unknown ids are skipped.
    async fn team_names_by_ids(&self, ids: &[String]) -> Result<Vec<String>, RepoError>;
}

#[async_trait]
pub trait ExportsRepo: Send + Sync {
    async fn find_export(
        &self,
        user_id: &str,
        notification_id: &str,
    ) -> Result<Option<ExportRecord>, RepoError>;
}

#[async_trait]
pub trait AppSettingsRepo: Send + Sync {
    async fn user_app_id(&self) -> Result<Option<String>, RepoError>;

    async fn set_user_app_id(&self, app_id: &str) -> Result<(), RepoError>;
}

#[derive(Debug, Clone)]
pub struct NewJobRecord {
    pub job_type: JobType,
    pub payload: serde_json::Value,
    pub run_at: OffsetDateTime,
    pub max_attempts: i32,
    pub priority: i32,
}

#[async_trait]
pub trait JobsRepo: Send + Sync {
    async fn enqueue_job(&self, job: NewJobRecord) -> Result<String, RepoError>;
}
