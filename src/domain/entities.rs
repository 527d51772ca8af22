//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::{
    audience::Audience,
    error::DomainError,
    types::{NotificationPartition, NotificationStatus},
};

/// Generate a notification key. UUIDv7 text sorts in creation order, so listing by key
/// is listing by age.
pub fn new_notification_id() -> String {
    Uuid::now_v7().to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotificationContent {
    pub title: String,
    pub image_link: Option<String>,
    pub summary: Option<String>,
    pub author: Option<String>,
    pub button_title: Option<String>,
    pub button_link: Option<String>,
}

impl NotificationContent {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.title.trim().is_empty() {
            return Err(DomainError::validation("notification title must not be empty"));
        }
        Ok(())
    }
}

/// Aggregated per-recipient outcomes. Written only by reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryCounters {
    pub succeeded: i64,
    pub failed: i64,
    pub throttled: i64,
    pub unknown: i64,
    pub total_message_count: i64,
}

impl DeliveryCounters {
    pub fn reconciled(&self) -> i64 {
        self.succeeded + self.failed + self.throttled + self.unknown
    }

    /// Combine with a fresh observation without letting any counter go backwards.
    pub fn merge_monotonic(&self, observed: &DeliveryCounters) -> DeliveryCounters {
        DeliveryCounters {
            succeeded: self.succeeded.max(observed.succeeded),
            failed: self.failed.max(observed.failed),
            throttled: self.throttled.max(observed.throttled),
            unknown: self.unknown.max(observed.unknown),
            total_message_count: self.total_message_count.max(observed.total_message_count),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationRecord {
    pub id: String,
    pub partition: NotificationPartition,
    pub content: NotificationContent,
    pub audience: Audience,
    pub status: NotificationStatus,
    pub created_by: Option<String>,
    pub created_at: OffsetDateTime,
    pub sent_at: Option<OffsetDateTime>,
    pub sending_started_at: Option<OffsetDateTime>,
    pub counters: DeliveryCounters,
    pub error_message: Option<String>,
    pub warning_message: Option<String>,
    pub source_draft_id: Option<String>,
}

impl NotificationRecord {
    pub fn new_draft(
        content: NotificationContent,
        audience: Audience,
        created_by: Option<String>,
    ) -> Self {
        Self {
            id: new_notification_id(),
            partition: NotificationPartition::Draft,
            content,
            audience,
            status: NotificationStatus::Draft,
            created_by,
            created_at: OffsetDateTime::now_utc(),
            sent_at: None,
            sending_started_at: None,
            counters: DeliveryCounters::default(),
            error_message: None,
            warning_message: None,
            source_draft_id: None,
        }
    }

    pub fn is_draft(&self) -> bool {
        self.partition == NotificationPartition::Draft
    }
}

/// A user's export request for a sent notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRecord {
    pub user_id: String,
    pub notification_id: String,
    pub status: String,
    pub file_name: Option<String>,
    pub sent_at: Option<OffsetDateTime>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_ids_sort_in_creation_order() {
        let ids: Vec<String> = (0..64).map(|_| new_notification_id()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn merging_never_lowers_a_counter() {
        let stored = DeliveryCounters {
            succeeded: 10,
            failed: 2,
            throttled: 0,
            unknown: 0,
            total_message_count: 20,
        };
        let observed = DeliveryCounters {
            succeeded: 8,
            failed: 3,
            throttled: 1,
            unknown: 0,
            total_message_count: 20,
        };

        let merged = stored.merge_monotonic(&observed);
        assert_eq!(merged.succeeded, 10);
        assert_eq!(merged.failed, 3);
        assert_eq!(merged.throttled, 1);
        assert_eq!(merged.reconciled(), 14);
    }

    #[test]
    fn blank_title_is_rejected() {
        let content = NotificationContent {
            title: "   ".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            content.validate(),
            Err(DomainError::Validation { .. })
        ));
    }
}
