use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics_util::debugging::DebuggingRecorder;
use sqlx::PgPool;

use bulletin::application::app_identity::{
    AppIdentityProvisioner, AppIdentitySettings, METRIC_APP_IDENTITY_FAILURES,
};
use bulletin::application::audience::{AudienceLimitMessages, AudienceResolver};
use bulletin::application::catalog::{AppCatalog, CatalogError};
use bulletin::application::delivery::{
    DeliveryError, DeliveryOrchestrator, DeliverySettings, METRIC_NOTIFICATIONS_SENT,
    METRIC_SEND_REJECTED,
};
use bulletin::application::directory::{DirectoryError, GroupInfo, GroupsDirectory};
use bulletin::application::drafts::{
    DraftNotificationCommand, DraftNotificationService, DraftSettings,
};
use bulletin::application::queues::{JobQueues, METRIC_QUEUE_ENQUEUED};
use bulletin::domain::audience::{Audience, AudienceLimits};
use bulletin::domain::entities::NotificationContent;
use bulletin::infra::db::PostgresRepositories;

struct EmptyDirectory;

#[async_trait]
impl GroupsDirectory for EmptyDirectory {
    async fn group_by_id(&self, _id: &str) -> Result<Option<GroupInfo>, DirectoryError> {
        Ok(None)
    }
}

struct UnavailableCatalog;

#[async_trait]
impl AppCatalog for UnavailableCatalog {
    async fn teams_app_id(&self, _external_id: &str) -> Result<Option<String>, CatalogError> {
        Err(CatalogError::Service {
            status: 503,
            message: "catalog offline".to_string(),
        })
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn send_paths_emit_expected_metric_keys(pool: PgPool) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    PostgresRepositories::run_migrations(&pool)
        .await
        .expect("job storage schema");
    let repos = Arc::new(PostgresRepositories::new(pool));
    let audience = AudienceResolver::new(repos.clone(), Arc::new(EmptyDirectory));
    let queues = Arc::new(JobQueues::new(repos.clone()));

    // Catalog failures are swallowed; the send still goes through.
    let provisioner = Arc::new(AppIdentityProvisioner::new(
        AppIdentitySettings {
            proactively_install_user_app: true,
            external_id: "external-app".to_string(),
        },
        Arc::new(UnavailableCatalog),
        repos.clone(),
    ));
    let orchestrator = DeliveryOrchestrator::new(
        DeliverySettings {
            force_complete_delay: Duration::from_secs(60),
            limits: AudienceLimits::default(),
            limit_messages: AudienceLimitMessages::default(),
        },
        repos.clone(),
        repos.clone(),
        audience.clone(),
        provisioner,
        queues.clone(),
        queues,
    );
    let drafts = DraftNotificationService::new(DraftSettings::default(), repos, audience);

    let err = orchestrator
        .create_sent_notification("ghost")
        .await
        .expect_err("unknown draft");
    assert!(matches!(err, DeliveryError::NotFound { .. }));

    let draft_id = drafts
        .create(
            Some("alice".to_string()),
            DraftNotificationCommand {
                content: NotificationContent {
                    title: "Metrics".to_string(),
                    ..Default::default()
                },
                audience: Audience {
                    all_users: true,
                    ..Default::default()
                },
            },
        )
        .await
        .expect("create draft");
    orchestrator
        .create_sent_notification(&draft_id)
        .await
        .expect("send accepted");

    let snapshot = snapshotter.snapshot().into_vec();
    let metric_names: HashSet<String> = snapshot
        .iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    for expected in [
        METRIC_SEND_REJECTED,
        METRIC_NOTIFICATIONS_SENT,
        METRIC_QUEUE_ENQUEUED,
        METRIC_APP_IDENTITY_FAILURES,
    ] {
        assert!(
            metric_names.contains(expected),
            "missing metric key: {expected}; got {metric_names:?}"
        );
    }
}
