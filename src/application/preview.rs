//! Posts a draft's card to one channel so its author can review it before sending.

use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use thiserror::Error;
use tracing::{info, warn};

use crate::application::card::{AdaptiveCard, CardSettings, render_card};
use crate::application::repos::{NotificationsRepo, RepoError};
use crate::domain::types::NotificationPartition;

pub const METRIC_PREVIEWS_SENT: &str = "bulletin_previews_sent_total";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewTarget {
    pub team_id: String,
    pub channel_id: String,
}

#[derive(Debug, Error)]
pub enum PreviewSendError {
    #[error("preview was rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("preview channel unavailable: {0}")]
    Unavailable(String),
}

/// Delivers a rendered card into a team channel.
#[async_trait]
pub trait PreviewSender: Send + Sync {
    async fn send_preview(
        &self,
        card: &AdaptiveCard,
        target: &PreviewTarget,
    ) -> Result<(), PreviewSendError>;
}

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("{field} is required")]
    MissingField { field: &'static str },
    #[error("Notification {id} not found.")]
    NotFound { id: String },
    #[error(transparent)]
    Send(#[from] PreviewSendError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

pub struct DraftPreviewService {
    card: CardSettings,
    notifications: Arc<dyn NotificationsRepo>,
    sender: Arc<dyn PreviewSender>,
}

impl DraftPreviewService {
    pub fn new(
        card: CardSettings,
        notifications: Arc<dyn NotificationsRepo>,
        sender: Arc<dyn PreviewSender>,
    ) -> Self {
        Self {
            card,
            notifications,
            sender,
        }
    }

    pub async fn preview(
        &self,
        draft_id: &str,
        team_id: &str,
        channel_id: &str,
    ) -> Result<(), PreviewError> {
        let draft_id = required(draft_id, "draftNotificationId")?;
        let target = PreviewTarget {
            team_id: required(team_id, "teamsTeamId")?.to_string(),
            channel_id: required(channel_id, "teamsChannelId")?.to_string(),
        };

        let draft = self
            .notifications
            .find(NotificationPartition::Draft, draft_id)
            .await?
            .ok_or_else(|| PreviewError::NotFound {
                id: draft_id.to_string(),
            })?;

        let card = render_card(&draft.content, &self.card);
        if let Err(err) = self.sender.send_preview(&card, &target).await {
            counter!(METRIC_PREVIEWS_SENT, "result" => "failed").increment(1);
            warn!(
                target = "application::preview",
                draft_id = %draft.id,
                team_id = %target.team_id,
                error = %err,
                "draft preview failed"
            );
            return Err(err.into());
        }

        counter!(METRIC_PREVIEWS_SENT, "result" => "sent").increment(1);
        info!(
            target = "application::preview",
            draft_id = %draft.id,
            team_id = %target.team_id,
            channel_id = %target.channel_id,
            "draft preview sent"
        );
        Ok(())
    }
}

fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str, PreviewError> {
    let value = value.trim();
    if value.is_empty() {
        Err(PreviewError::MissingField { field })
    } else {
        Ok(value)
    }
}
