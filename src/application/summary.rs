//! Read models for sent notifications.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

use crate::application::audience::{AudienceError, AudienceResolver};
use crate::application::repos::{ExportsRepo, NotificationsRepo, RepoError};
use crate::domain::entities::{DeliveryCounters, NotificationContent, NotificationRecord};
use crate::domain::types::{NotificationPartition, NotificationStatus};

pub const DEFAULT_RECENT_SENT_LIMIT: u32 = 25;

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("sent notification id is required")]
    MissingId,
    #[error("Sent notification, Id: {id}, could not be found.")]
    NotFound { id: String },
    #[error(transparent)]
    Audience(#[from] AudienceError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// List row built from stored counters only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SentNotificationSummary {
    pub id: String,
    pub title: String,
    pub created_by: Option<String>,
    pub status: NotificationStatus,
    pub sending_started_at: Option<OffsetDateTime>,
    pub sent_at: Option<OffsetDateTime>,
    pub counters: DeliveryCounters,
}

impl From<NotificationRecord> for SentNotificationSummary {
    fn from(record: NotificationRecord) -> Self {
        Self {
            id: record.id,
            title: record.content.title,
            created_by: record.created_by,
            status: record.status,
            sending_started_at: record.sending_started_at,
            sent_at: record.sent_at,
            counters: record.counters,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentNotificationView {
    pub id: String,
    pub content: NotificationContent,
    pub created_by: Option<String>,
    pub created_at: OffsetDateTime,
    pub sending_started_at: Option<OffsetDateTime>,
    pub sent_at: Option<OffsetDateTime>,
    pub status: NotificationStatus,
    pub counters: DeliveryCounters,
    pub team_names: Vec<String>,
    pub roster_names: Vec<String>,
    pub group_names: Vec<String>,
    pub all_users: bool,
    pub error_message: Option<String>,
    pub warning_message: Option<String>,
    /// False once the requesting user has already asked for an export.
    pub can_download: bool,
    pub sending_completed: bool,
}

pub struct SummaryAggregator {
    notifications: Arc<dyn NotificationsRepo>,
    exports: Arc<dyn ExportsRepo>,
    audience: AudienceResolver,
    recent_limit: u32,
}

impl SummaryAggregator {
    pub fn new(
        notifications: Arc<dyn NotificationsRepo>,
        exports: Arc<dyn ExportsRepo>,
        audience: AudienceResolver,
        recent_limit: u32,
    ) -> Self {
        Self {
            notifications,
            exports,
            audience,
            recent_limit: recent_limit.max(1),
        }
    }

    pub async fn sent_notification_summaries(
        &self,
    ) -> Result<Vec<SentNotificationSummary>, SummaryError> {
        let records = self.notifications.most_recent_sent(self.recent_limit).await?;
        Ok(records.into_iter().map(SentNotificationSummary::from).collect())
    }

    pub async fn sent_notification(
        &self,
        id: &str,
        user_id: &str,
    ) -> Result<SentNotificationView, SummaryError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(SummaryError::MissingId);
        }

        let record = self
            .notifications
            .find(NotificationPartition::Sent, id)
            .await?
            .ok_or_else(|| SummaryError::NotFound { id: id.to_string() })?;

        let names = self.audience.expand_audience(&record).await?;
        let export = self.exports.find_export(user_id, &record.id).await?;

        Ok(SentNotificationView {
            sending_completed: record.status.is_terminal(),
            can_download: export.is_none(),
            id: record.id,
            content: record.content,
            created_by: record.created_by,
            created_at: record.created_at,
            sending_started_at: record.sending_started_at,
            sent_at: record.sent_at,
            status: record.status,
            counters: record.counters,
            team_names: names.team_names,
            roster_names: names.roster_names,
            group_names: names.group_names,
            all_users: names.all_users,
            error_message: record.error_message,
            warning_message: record.warning_message,
        })
    }
}
