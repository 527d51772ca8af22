//! Draft authoring over the draft partition.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;

use crate::application::audience::{AudienceError, AudienceLimitMessages, AudienceResolver};
use crate::application::card::{AdaptiveCard, CardSettings, render_card};
use crate::application::repos::{NotificationsRepo, RepoError};
use crate::domain::audience::{Audience, AudienceLimits};
use crate::domain::entities::{NotificationContent, NotificationRecord};
use crate::domain::error::DomainError;
use crate::domain::types::NotificationPartition;

pub const DEFAULT_DUPLICATE_TITLE: &str = "{title} (copy)";

#[derive(Debug, Error)]
pub enum DraftError {
    #[error("draft notification id is required")]
    MissingId,
    #[error("Draft notification, Id: {id}, could not be found.")]
    NotFound { id: String },
    #[error("{0}")]
    AudienceLimit(String),
    #[error("audience contains a group with hidden membership")]
    HiddenMembership,
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Audience(#[from] AudienceError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftNotificationCommand {
    pub content: NotificationContent,
    pub audience: Audience,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DraftNotificationSummary {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftNotificationView {
    pub id: String,
    pub content: NotificationContent,
    pub audience: Audience,
    pub created_by: Option<String>,
    pub created_at: OffsetDateTime,
}

impl From<NotificationRecord> for DraftNotificationView {
    fn from(record: NotificationRecord) -> Self {
        Self {
            id: record.id,
            content: record.content,
            audience: record.audience,
            created_by: record.created_by,
            created_at: record.created_at,
        }
    }
}

/// Audience review shown before the author confirms a send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsentSummary {
    pub notification_id: String,
    pub team_names: Vec<String>,
    pub roster_names: Vec<String>,
    pub group_names: Vec<String>,
    pub all_users: bool,
}

#[derive(Debug, Clone)]
pub struct DraftSettings {
    pub limits: AudienceLimits,
    pub limit_messages: AudienceLimitMessages,
    pub duplicate_title: String,
    pub card: CardSettings,
}

impl Default for DraftSettings {
    fn default() -> Self {
        Self {
            limits: AudienceLimits::default(),
            limit_messages: AudienceLimitMessages::default(),
            duplicate_title: DEFAULT_DUPLICATE_TITLE.to_string(),
            card: CardSettings::default(),
        }
    }
}

pub struct DraftNotificationService {
    settings: DraftSettings,
    notifications: Arc<dyn NotificationsRepo>,
    audience: AudienceResolver,
}

impl DraftNotificationService {
    pub fn new(
        settings: DraftSettings,
        notifications: Arc<dyn NotificationsRepo>,
        audience: AudienceResolver,
    ) -> Self {
        Self {
            settings,
            notifications,
            audience,
        }
    }

    pub async fn create(
        &self,
        created_by: Option<String>,
        command: DraftNotificationCommand,
    ) -> Result<String, DraftError> {
        self.validate(&command).await?;

        let record = NotificationRecord::new_draft(command.content, command.audience, created_by);
        self.notifications.create_or_update(&record).await?;

        info!(
            target = "application::drafts",
            draft_id = %record.id,
            "draft notification created"
        );
        Ok(record.id)
    }

    pub async fn update(
        &self,
        id: &str,
        command: DraftNotificationCommand,
    ) -> Result<(), DraftError> {
        let id = required_id(id)?;
        self.validate(&command).await?;

        let mut record = self.load(id).await?;
        record.content = command.content;
        record.audience = command.audience;
        self.notifications.create_or_update(&record).await?;
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<(), DraftError> {
        let record = self.load(required_id(id)?).await?;
        self.notifications.delete(&record).await?;

        info!(
            target = "application::drafts",
            draft_id = %record.id,
            "draft notification deleted"
        );
        Ok(())
    }

    pub async fn duplicate(
        &self,
        id: &str,
        created_by: Option<String>,
    ) -> Result<String, DraftError> {
        let source = self.load(required_id(id)?).await?;

        let mut content = source.content;
        content.title = self
            .settings
            .duplicate_title
            .replace("{title}", &content.title);
        let copy = NotificationRecord::new_draft(content, source.audience, created_by);
        self.notifications.create_or_update(&copy).await?;

        Ok(copy.id)
    }

    pub async fn list(&self) -> Result<Vec<DraftNotificationSummary>, DraftError> {
        let drafts = self.notifications.all_drafts().await?;
        Ok(drafts
            .into_iter()
            .map(|record| DraftNotificationSummary {
                id: record.id,
                title: record.content.title,
            })
            .collect())
    }

    pub async fn get(&self, id: &str) -> Result<DraftNotificationView, DraftError> {
        let record = self.load(required_id(id)?).await?;
        Ok(DraftNotificationView::from(record))
    }

    pub async fn consent_summary(&self, id: &str) -> Result<ConsentSummary, DraftError> {
        let record = self.load(required_id(id)?).await?;
        let names = self.audience.expand_audience(&record).await?;

        Ok(ConsentSummary {
            notification_id: record.id,
            team_names: names.team_names,
            roster_names: names.roster_names,
            group_names: names.group_names,
            all_users: names.all_users,
        })
    }

    pub async fn card(&self, id: &str) -> Result<AdaptiveCard, DraftError> {
        let record = self.load(required_id(id)?).await?;
        Ok(render_card(&record.content, &self.settings.card))
    }

    /// The hidden-membership guard runs first so that it wins over every other rejection.
    async fn validate(&self, command: &DraftNotificationCommand) -> Result<(), DraftError> {
        if self
            .audience
            .contains_hidden_membership(&command.audience.groups)
            .await?
        {
            return Err(DraftError::HiddenMembership);
        }

        command
            .audience
            .check_limits(&self.settings.limits)
            .map_err(|exceeded| {
                DraftError::AudienceLimit(self.settings.limit_messages.render(&exceeded))
            })?;

        command.content.validate()?;
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<NotificationRecord, DraftError> {
        self.notifications
            .find(NotificationPartition::Draft, id)
            .await?
            .ok_or_else(|| DraftError::NotFound { id: id.to_string() })
    }
}

fn required_id(id: &str) -> Result<&str, DraftError> {
    let id = id.trim();
    if id.is_empty() {
        Err(DraftError::MissingId)
    } else {
        Ok(id)
    }
}
