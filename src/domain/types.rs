//! Shared domain enumerations aligned with persisted database enums.

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Storage region a notification currently lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "notification_partition", rename_all = "snake_case")]
pub enum NotificationPartition {
    Draft,
    Sent,
}

impl NotificationPartition {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationPartition::Draft => "draft",
            NotificationPartition::Sent => "sent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "notification_status", rename_all = "snake_case")]
pub enum NotificationStatus {
    Draft,
    Preparing,
    Sending,
    Sent,
    Failed,
}

impl NotificationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationStatus::Draft => "draft",
            NotificationStatus::Preparing => "preparing",
            NotificationStatus::Sending => "sending",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Failed => "failed",
        }
    }

    /// Sent and failed sends no longer accept counter updates.
    pub fn is_terminal(self) -> bool {
        matches!(self, NotificationStatus::Sent | NotificationStatus::Failed)
    }

    /// Validate a lifecycle step. Staying in the same non-terminal state is allowed so that
    /// repeated reconciliation passes stay idempotent.
    pub fn transition_to(self, next: NotificationStatus) -> Result<NotificationStatus, DomainError> {
        use NotificationStatus::*;

        let allowed = match (self, next) {
            (current, next) if current == next => !current.is_terminal(),
            (Draft, Preparing) => true,
            (Preparing, Sending | Sent | Failed) => true,
            (Sending, Sent | Failed) => true,
            _ => false,
        };

        if allowed {
            Ok(next)
        } else {
            Err(DomainError::invariant(format!(
                "notification status cannot move from `{}` to `{}`",
                self.as_str(),
                next.as_str()
            )))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    PrepareToSend,
    DataQueue,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::PrepareToSend => "prepare_to_send",
            JobType::DataQueue => "data_queue",
        }
    }
}

impl TryFrom<&str> for JobType {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "prepare_to_send" => Ok(JobType::PrepareToSend),
            "data_queue" => Ok(JobType::DataQueue),
            _ => Err(()),
        }
    }
}
