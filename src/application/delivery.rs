//! Send orchestration: turns a validated draft into an in-flight sent notification.

use std::{sync::Arc, time::Duration};

use metrics::counter;
use thiserror::Error;
use tracing::{info, warn};

use crate::application::app_identity::AppIdentityProvisioner;
use crate::application::audience::{AudienceError, AudienceLimitMessages, AudienceResolver};
use crate::application::queues::{
    DataQueue, DataQueueMessage, PrepareToSendMessage, PrepareToSendQueue, QueueError,
};
use crate::application::repos::{NotificationsRepo, RepoError, SentNotificationsRepo};
use crate::domain::audience::AudienceLimits;
use crate::domain::types::NotificationPartition;

pub const METRIC_NOTIFICATIONS_SENT: &str = "bulletin_notifications_sent_total";
pub const METRIC_SEND_REJECTED: &str = "bulletin_send_rejected_total";

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("draft notification id is required")]
    MissingId,
    #[error("Draft notification, Id: {id}, could not be found.")]
    NotFound { id: String },
    #[error("{0}")]
    AudienceLimit(String),
    #[error("audience contains a group with hidden membership")]
    HiddenMembership,
    #[error(transparent)]
    Audience(#[from] AudienceError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl DeliveryError {
    fn reason(&self) -> &'static str {
        match self {
            DeliveryError::MissingId => "missing_id",
            DeliveryError::NotFound { .. } => "not_found",
            DeliveryError::AudienceLimit(_) => "audience_limit",
            DeliveryError::HiddenMembership => "hidden_membership",
            DeliveryError::Audience(_) => "directory",
            DeliveryError::Repo(_) => "store",
            DeliveryError::Queue(_) => "queue",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeliverySettings {
    pub force_complete_delay: Duration,
    pub limits: AudienceLimits,
    pub limit_messages: AudienceLimitMessages,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotificationAccepted {
    pub draft_id: String,
    pub sent_id: String,
}

pub struct DeliveryOrchestrator {
    settings: DeliverySettings,
    notifications: Arc<dyn NotificationsRepo>,
    sent: Arc<dyn SentNotificationsRepo>,
    audience: AudienceResolver,
    app_identity: Arc<AppIdentityProvisioner>,
    prepare_queue: Arc<dyn PrepareToSendQueue>,
    data_queue: Arc<dyn DataQueue>,
}

impl DeliveryOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settings: DeliverySettings,
        notifications: Arc<dyn NotificationsRepo>,
        sent: Arc<dyn SentNotificationsRepo>,
        audience: AudienceResolver,
        app_identity: Arc<AppIdentityProvisioner>,
        prepare_queue: Arc<dyn PrepareToSendQueue>,
        data_queue: Arc<dyn DataQueue>,
    ) -> Self {
        Self {
            // Groups are only capped while authoring drafts.
            settings: DeliverySettings {
                limits: settings.limits.without_group_cap(),
                ..settings
            },
            notifications,
            sent,
            audience,
            app_identity,
            prepare_queue,
            data_queue,
        }
    }

    /// Accept a draft for sending. Returns once the fan-out trigger and the force-complete
    /// safety net are enqueued; delivery itself happens elsewhere.
    ///
    /// The partition move is the commit point. Failures after it are reported but the sent
    /// record is left in place.
    pub async fn create_sent_notification(
        &self,
        draft_id: &str,
    ) -> Result<SentNotificationAccepted, DeliveryError> {
        let result = self.send(draft_id).await;
        if let Err(err) = &result {
            counter!(METRIC_SEND_REJECTED, "reason" => err.reason()).increment(1);
        }
        result
    }

    async fn send(&self, draft_id: &str) -> Result<SentNotificationAccepted, DeliveryError> {
        let draft_id = draft_id.trim();
        if draft_id.is_empty() {
            return Err(DeliveryError::MissingId);
        }

        let draft = self
            .notifications
            .find(NotificationPartition::Draft, draft_id)
            .await?
            .ok_or_else(|| DeliveryError::NotFound {
                id: draft_id.to_string(),
            })?;

        draft
            .audience
            .check_limits(&self.settings.limits)
            .map_err(|exceeded| {
                DeliveryError::AudienceLimit(self.settings.limit_messages.render(&exceeded))
            })?;

        if !draft.audience.groups.is_empty()
            && self
                .audience
                .contains_hidden_membership(&draft.audience.groups)
                .await?
        {
            return Err(DeliveryError::HiddenMembership);
        }

        let provisioning = self.app_identity.ensure_app_identity().await;

        self.sent.ensure_storage().await?;

        let sent_id = self
            .notifications
            .move_draft_to_sent(&draft)
            .await
            .map_err(|err| match err {
                // Another request moved it first.
                RepoError::NotFound => DeliveryError::NotFound {
                    id: draft_id.to_string(),
                },
                other => DeliveryError::Repo(other),
            })?;

        info!(
            target = "application::delivery",
            draft_id = %draft_id,
            sent_id = %sent_id,
            provisioning = ?provisioning,
            "notification moved to sent partition"
        );

        if let Err(err) = self.enqueue(&sent_id).await {
            warn!(
                target = "application::delivery",
                sent_id = %sent_id,
                error = %err,
                "sent notification committed but queueing failed"
            );
            return Err(err.into());
        }

        counter!(METRIC_NOTIFICATIONS_SENT).increment(1);
        Ok(SentNotificationAccepted {
            draft_id: draft_id.to_string(),
            sent_id,
        })
    }

    async fn enqueue(&self, sent_id: &str) -> Result<(), QueueError> {
        self.prepare_queue
            .send(PrepareToSendMessage {
                notification_id: sent_id.to_string(),
            })
            .await?;

        self.data_queue
            .send_delayed(
                DataQueueMessage {
                    notification_id: sent_id.to_string(),
                    force_complete: true,
                },
                self.settings.force_complete_delay,
            )
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::app_identity::AppIdentitySettings;
    use crate::application::catalog::CatalogError;
    use crate::application::test_support::{
        CallLog, InMemoryNotificationsRepo, RecordingAppSettings, RecordingQueues,
        RecordingSentRepo, StubCatalog, StubDirectory, StubTeamsRepo, draft_with_audience,
    };
    use crate::domain::audience::Audience;

    struct Harness {
        orchestrator: DeliveryOrchestrator,
        notifications: Arc<InMemoryNotificationsRepo>,
        queues: Arc<RecordingQueues>,
        app_settings: Arc<RecordingAppSettings>,
        catalog: Arc<StubCatalog>,
        log: CallLog,
    }

    fn harness(catalog: StubCatalog, directory: StubDirectory) -> Harness {
        let log = CallLog::default();
        let notifications = Arc::new(InMemoryNotificationsRepo::with_log(log.clone()));
        let sent = Arc::new(RecordingSentRepo::with_log(log.clone()));
        let queues = Arc::new(RecordingQueues::with_log(log.clone()));
        let app_settings = Arc::new(RecordingAppSettings::default());
        let catalog = Arc::new(catalog);

        let provisioner = Arc::new(AppIdentityProvisioner::new(
            AppIdentitySettings {
                proactively_install_user_app: true,
                external_id: "externalId".to_string(),
            },
            catalog.clone(),
            app_settings.clone(),
        ));
        let resolver = AudienceResolver::new(Arc::new(StubTeamsRepo::default()), Arc::new(directory));

        let orchestrator = DeliveryOrchestrator::new(
            DeliverySettings {
                force_complete_delay: Duration::from_secs(100),
                limits: AudienceLimits::default(),
                limit_messages: AudienceLimitMessages {
                    teams: "NumberOfTeamsExceededLimitWarningFormat {count} {limit}".to_string(),
                    ..Default::default()
                },
            },
            notifications.clone(),
            sent,
            resolver,
            provisioner,
            queues.clone(),
            queues.clone(),
        );

        Harness {
            orchestrator,
            notifications,
            queues,
            app_settings,
            catalog,
            log,
        }
    }

    fn ids(prefix: &str, count: usize) -> Vec<String> {
        (0..count).map(|index| format!("{prefix}-{index}")).collect()
    }

    #[tokio::test]
    async fn unknown_draft_is_not_found_and_nothing_is_queued() {
        let h = harness(
            StubCatalog::returning(Ok(Some("appId".to_string()))),
            StubDirectory::default(),
        );

        let err = h
            .orchestrator
            .create_sent_notification("ghost")
            .await
            .expect_err("unknown draft");

        assert!(matches!(err, DeliveryError::NotFound { ref id } if id == "ghost"));
        assert_eq!(
            err.to_string(),
            "Draft notification, Id: ghost, could not be found."
        );
        assert!(h.queues.prepared().is_empty());
        assert!(h.queues.delayed().is_empty());
        assert_eq!(h.catalog.calls(), 0);
    }

    #[tokio::test]
    async fn blank_id_is_rejected_before_any_lookup() {
        let h = harness(StubCatalog::returning(Ok(None)), StubDirectory::default());

        let err = h
            .orchestrator
            .create_sent_notification("  ")
            .await
            .expect_err("blank id");

        assert!(matches!(err, DeliveryError::MissingId));
        assert!(h.log.entries().is_empty());
    }

    #[tokio::test]
    async fn valid_send_provisions_app_id_and_enqueues_both_messages() {
        let h = harness(
            StubCatalog::returning(Ok(Some("appId".to_string()))),
            StubDirectory::default(),
        );
        h.notifications
            .insert(draft_with_audience("id", Audience::default()));

        let accepted = h
            .orchestrator
            .create_sent_notification("id")
            .await
            .expect("send accepted");

        assert_eq!(accepted.draft_id, "id");
        assert_eq!(h.app_settings.writes(), vec!["appId".to_string()]);

        let prepared = h.queues.prepared();
        assert_eq!(prepared.len(), 1);
        assert_eq!(prepared[0].notification_id, accepted.sent_id);

        let delayed = h.queues.delayed();
        assert_eq!(delayed.len(), 1);
        assert_eq!(delayed[0].0.notification_id, accepted.sent_id);
        assert!(delayed[0].0.force_complete);
        assert_eq!(delayed[0].1, Duration::from_secs(100));

        assert!(h.notifications.draft("id").is_none());
        assert!(h.notifications.sent(&accepted.sent_id).is_some());
    }

    #[tokio::test]
    async fn unauthorized_catalog_does_not_block_the_send() {
        let h = harness(
            StubCatalog::returning(Err(CatalogError::Service {
                status: 401,
                message: "Unauthorized".to_string(),
            })),
            StubDirectory::default(),
        );
        h.notifications
            .insert(draft_with_audience("id", Audience::default()));

        h.orchestrator
            .create_sent_notification("id")
            .await
            .expect("send still accepted");

        assert!(h.app_settings.writes().is_empty());
        assert_eq!(h.queues.prepared().len(), 1);
        assert_eq!(h.queues.delayed().len(), 1);
    }

    #[tokio::test]
    async fn partition_move_happens_before_queueing() {
        let h = harness(StubCatalog::returning(Ok(None)), StubDirectory::default());
        h.notifications
            .insert(draft_with_audience("id", Audience::default()));

        h.orchestrator
            .create_sent_notification("id")
            .await
            .expect("send accepted");

        assert_eq!(
            h.log.entries(),
            vec![
                "find",
                "ensure_storage",
                "move_draft_to_sent",
                "prepare_to_send",
                "data_queue",
            ]
        );
    }

    #[tokio::test]
    async fn twenty_one_teams_is_rejected_with_configured_message() {
        let h = harness(StubCatalog::returning(Ok(None)), StubDirectory::default());
        h.notifications.insert(draft_with_audience(
            "id",
            Audience {
                teams: ids("team", 21),
                ..Default::default()
            },
        ));

        let err = h
            .orchestrator
            .create_sent_notification("id")
            .await
            .expect_err("too many teams");

        match err {
            DeliveryError::AudienceLimit(message) => {
                assert_eq!(message, "NumberOfTeamsExceededLimitWarningFormat 21 20")
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(h.notifications.draft("id").is_some());
        assert!(h.queues.prepared().is_empty());
    }

    #[tokio::test]
    async fn large_group_audience_is_not_capped_when_sending() {
        let h = harness(StubCatalog::returning(Ok(None)), StubDirectory::default());
        h.notifications.insert(draft_with_audience(
            "id",
            Audience {
                groups: ids("group", 40),
                ..Default::default()
            },
        ));

        h.orchestrator
            .create_sent_notification("id")
            .await
            .expect("groups are uncapped here");
    }

    #[tokio::test]
    async fn hidden_group_forbids_the_send() {
        let directory = StubDirectory::default()
            .with_group("g1", "Visible", false)
            .with_group("g2", "Hidden", true);
        let h = harness(StubCatalog::returning(Ok(None)), directory);
        h.notifications.insert(draft_with_audience(
            "id",
            Audience {
                groups: vec!["g1".to_string(), "g2".to_string()],
                ..Default::default()
            },
        ));

        let err = h
            .orchestrator
            .create_sent_notification("id")
            .await
            .expect_err("hidden membership");

        assert!(matches!(err, DeliveryError::HiddenMembership));
        assert!(h.notifications.draft("id").is_some());
        assert_eq!(h.catalog.calls(), 0);
    }

    #[tokio::test]
    async fn queue_failure_leaves_sent_record_committed() {
        let h = harness(StubCatalog::returning(Ok(None)), StubDirectory::default());
        h.queues.fail_prepare_to_send();
        h.notifications
            .insert(draft_with_audience("id", Audience::default()));

        let err = h
            .orchestrator
            .create_sent_notification("id")
            .await
            .expect_err("queue failure surfaces");

        assert!(matches!(err, DeliveryError::Queue(_)));
        assert!(h.notifications.draft("id").is_none());
        assert_eq!(h.notifications.sent_ids().len(), 1);
        assert!(h.queues.delayed().is_empty());
    }
}
