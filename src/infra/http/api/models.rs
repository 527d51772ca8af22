use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::application::card::AdaptiveCard;
use crate::application::delivery::SentNotificationAccepted;
use crate::application::drafts::{
    ConsentSummary, DraftNotificationCommand, DraftNotificationSummary, DraftNotificationView,
};
use crate::application::summary::{SentNotificationSummary, SentNotificationView};
use crate::domain::audience::Audience;
use crate::domain::entities::{DeliveryCounters, NotificationContent};
use crate::domain::types::NotificationStatus;

#[derive(Debug, Deserialize, Serialize)]
pub struct SendRequest {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DraftNotificationRequest {
    pub id: Option<String>,
    pub title: String,
    pub image_link: Option<String>,
    pub summary: Option<String>,
    pub author: Option<String>,
    pub button_title: Option<String>,
    pub button_link: Option<String>,
    pub teams: Vec<String>,
    pub rosters: Vec<String>,
    pub groups: Vec<String>,
    pub all_users: bool,
}

impl DraftNotificationRequest {
    pub fn into_command(self) -> (Option<String>, DraftNotificationCommand) {
        let command = DraftNotificationCommand {
            content: NotificationContent {
                title: self.title,
                image_link: self.image_link,
                summary: self.summary,
                author: self.author,
                button_title: self.button_title,
                button_link: self.button_link,
            },
            audience: Audience {
                teams: self.teams,
                rosters: self.rosters,
                groups: self.groups,
                all_users: self.all_users,
            },
        };
        (self.id, command)
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DraftPreviewRequest {
    pub draft_notification_id: String,
    pub teams_team_id: String,
    pub teams_channel_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendAcceptedResponse {
    pub id: String,
    pub sent_notification_id: String,
}

impl From<SentNotificationAccepted> for SendAcceptedResponse {
    fn from(accepted: SentNotificationAccepted) -> Self {
        Self {
            id: accepted.draft_id,
            sent_notification_id: accepted.sent_id,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentResponse {
    pub title: String,
    pub image_link: Option<String>,
    pub summary: Option<String>,
    pub author: Option<String>,
    pub button_title: Option<String>,
    pub button_link: Option<String>,
}

impl From<NotificationContent> for ContentResponse {
    fn from(content: NotificationContent) -> Self {
        Self {
            title: content.title,
            image_link: content.image_link,
            summary: content.summary,
            author: content.author,
            button_title: content.button_title,
            button_link: content.button_link,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountersResponse {
    pub succeeded: i64,
    pub failed: i64,
    pub throttled: i64,
    pub unknown: i64,
    pub total_message_count: i64,
}

impl From<DeliveryCounters> for CountersResponse {
    fn from(counters: DeliveryCounters) -> Self {
        Self {
            succeeded: counters.succeeded,
            failed: counters.failed,
            throttled: counters.throttled,
            unknown: counters.unknown,
            total_message_count: counters.total_message_count,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentNotificationSummaryResponse {
    pub id: String,
    pub title: String,
    pub created_by: Option<String>,
    pub status: NotificationStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub sending_started_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub sent_at: Option<OffsetDateTime>,
    #[serde(flatten)]
    pub counters: CountersResponse,
}

impl From<SentNotificationSummary> for SentNotificationSummaryResponse {
    fn from(summary: SentNotificationSummary) -> Self {
        Self {
            id: summary.id,
            title: summary.title,
            created_by: summary.created_by,
            status: summary.status,
            sending_started_at: summary.sending_started_at,
            sent_at: summary.sent_at,
            counters: summary.counters.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentNotificationResponse {
    pub id: String,
    #[serde(flatten)]
    pub content: ContentResponse,
    pub created_by: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_date_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub sending_started_date: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub sent_date: Option<OffsetDateTime>,
    pub status: NotificationStatus,
    #[serde(flatten)]
    pub counters: CountersResponse,
    pub team_names: Vec<String>,
    pub roster_names: Vec<String>,
    pub group_names: Vec<String>,
    pub all_users: bool,
    pub error_message: Option<String>,
    pub warning_message: Option<String>,
    pub can_download: bool,
    pub sending_completed: bool,
}

impl From<SentNotificationView> for SentNotificationResponse {
    fn from(view: SentNotificationView) -> Self {
        Self {
            id: view.id,
            content: view.content.into(),
            created_by: view.created_by,
            created_date_time: view.created_at,
            sending_started_date: view.sending_started_at,
            sent_date: view.sent_at,
            status: view.status,
            counters: view.counters.into(),
            team_names: view.team_names,
            roster_names: view.roster_names,
            group_names: view.group_names,
            all_users: view.all_users,
            error_message: view.error_message,
            warning_message: view.warning_message,
            can_download: view.can_download,
            sending_completed: view.sending_completed,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftNotificationSummaryResponse {
    pub id: String,
    pub title: String,
}

impl From<DraftNotificationSummary> for DraftNotificationSummaryResponse {
    fn from(summary: DraftNotificationSummary) -> Self {
        Self {
            id: summary.id,
            title: summary.title,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftNotificationResponse {
    pub id: String,
    #[serde(flatten)]
    pub content: ContentResponse,
    pub teams: Vec<String>,
    pub rosters: Vec<String>,
    pub groups: Vec<String>,
    pub all_users: bool,
    pub created_by: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_date_time: OffsetDateTime,
}

impl From<DraftNotificationView> for DraftNotificationResponse {
    fn from(view: DraftNotificationView) -> Self {
        Self {
            id: view.id,
            content: view.content.into(),
            teams: view.audience.teams,
            rosters: view.audience.rosters,
            groups: view.audience.groups,
            all_users: view.audience.all_users,
            created_by: view.created_by,
            created_date_time: view.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentSummaryResponse {
    pub notification_id: String,
    pub team_names: Vec<String>,
    pub roster_names: Vec<String>,
    pub group_names: Vec<String>,
    pub all_users: bool,
}

impl From<ConsentSummary> for ConsentSummaryResponse {
    fn from(summary: ConsentSummary) -> Self {
        Self {
            notification_id: summary.notification_id,
            team_names: summary.team_names,
            roster_names: summary.roster_names,
            group_names: summary.group_names,
            all_users: summary.all_users,
        }
    }
}

/// Cards are already in their wire shape.
pub type CardResponse = AdaptiveCard;
