use std::{process, sync::Arc};

use apalis::{
    layers::WorkerBuilderExt,
    prelude::{Monitor, WorkerBuilder, WorkerFactoryFn},
};
use apalis_sql::{Config as ApalisSqlConfig, postgres::PostgresStorage};
use bulletin::{
    application::{
        app_identity::{AppIdentityProvisioner, AppIdentitySettings},
        audience::{AudienceLimitMessages, AudienceResolver},
        card::CardSettings,
        catalog::AppCatalog,
        delivery::{DeliveryOrchestrator, DeliverySettings},
        directory::GroupsDirectory,
        drafts::{DEFAULT_DUPLICATE_TITLE, DraftNotificationService, DraftSettings},
        error::AppError,
        jobs::{JobWorkerContext, process_data_queue_job},
        preview::{DraftPreviewService, PreviewSender},
        queues::{DataQueue, JobQueues, PrepareToSendQueue},
        reconcile::DeliveryReconciler,
        repos::{
            AppSettingsRepo, ExportsRepo, JobsRepo, NotificationsRepo, SentNotificationsRepo,
            TeamsRepo,
        },
        summary::SummaryAggregator,
    },
    config,
    domain::{audience::AudienceLimits, types::JobType},
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        graph::{
            BotConnectorPreviewSender, GraphAppCatalog, GraphClient, GraphGroupsDirectory,
            UnconfiguredPreviewSender,
        },
        http::{self, ApiState},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let (http_repositories, job_repositories) = init_repositories(&settings).await?;
    let app = build_application_context(http_repositories, job_repositories.clone(), &settings)?;

    let monitor_handle = spawn_job_monitor(job_repositories, app.job_context, &settings.jobs);

    let result = serve_http(&settings, app.api_state).await;

    monitor_handle.abort();
    let _ = monitor_handle.await;

    result
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<(Arc<PostgresRepositories>, Arc<PostgresRepositories>), AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let http_pool =
        PostgresRepositories::connect(database_url, settings.database.http_max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&http_pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    let jobs_pool =
        PostgresRepositories::connect(database_url, settings.database.jobs_max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok((
        Arc::new(PostgresRepositories::new(http_pool)),
        Arc::new(PostgresRepositories::new(jobs_pool)),
    ))
}

struct ApplicationContext {
    api_state: ApiState,
    job_context: JobWorkerContext,
}

fn limit_messages(messages: &config::MessageSettings) -> AudienceLimitMessages {
    let defaults = AudienceLimitMessages::default();
    AudienceLimitMessages {
        teams: messages
            .teams_limit_warning
            .clone()
            .unwrap_or(defaults.teams),
        rosters: messages
            .rosters_limit_warning
            .clone()
            .unwrap_or(defaults.rosters),
        groups: messages
            .groups_limit_warning
            .clone()
            .unwrap_or(defaults.groups),
    }
}

fn build_application_context(
    http_repositories: Arc<PostgresRepositories>,
    job_repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<ApplicationContext, AppError> {
    let notifications_repo: Arc<dyn NotificationsRepo> = http_repositories.clone();
    let sent_repo: Arc<dyn SentNotificationsRepo> = http_repositories.clone();
    let teams_repo: Arc<dyn TeamsRepo> = http_repositories.clone();
    let exports_repo: Arc<dyn ExportsRepo> = http_repositories.clone();
    let app_settings_repo: Arc<dyn AppSettingsRepo> = http_repositories.clone();
    let jobs_repo: Arc<dyn JobsRepo> = http_repositories.clone();

    let graph = Arc::new(GraphClient::new(&settings.graph).map_err(AppError::from)?);
    let directory: Arc<dyn GroupsDirectory> = Arc::new(GraphGroupsDirectory::new(graph.clone()));
    let catalog: Arc<dyn AppCatalog> = Arc::new(GraphAppCatalog::new(graph));

    let preview_sender: Arc<dyn PreviewSender> = match settings.bot.as_ref() {
        Some(bot) => {
            let connector = Arc::new(GraphClient::new(bot).map_err(AppError::from)?);
            Arc::new(BotConnectorPreviewSender::new(connector))
        }
        None => {
            warn!(
                target = "bulletin::serve",
                "bot connector is not configured, draft previews are unavailable"
            );
            Arc::new(UnconfiguredPreviewSender)
        }
    };
    let card_settings = CardSettings {
        header_image_url: settings.card.header_image_url.clone(),
        footer_image_url: settings.card.footer_image_url.clone(),
    };

    let audience = AudienceResolver::new(teams_repo, directory)
        .with_lookup_concurrency(settings.graph.lookup_concurrency.get() as usize);

    let queues = Arc::new(JobQueues::new(jobs_repo));
    let prepare_queue: Arc<dyn PrepareToSendQueue> = queues.clone();
    let data_queue: Arc<dyn DataQueue> = queues.clone();

    let limits = AudienceLimits {
        teams: settings.delivery.max_teams,
        rosters: settings.delivery.max_rosters,
        groups: Some(settings.delivery.max_groups),
    };
    let messages = limit_messages(&settings.messages);

    let app_identity = Arc::new(AppIdentityProvisioner::new(
        AppIdentitySettings {
            proactively_install_user_app: settings.user_app.proactively_install_user_app,
            external_id: settings.user_app.external_id.clone(),
        },
        catalog,
        app_settings_repo,
    ));

    let delivery = Arc::new(DeliveryOrchestrator::new(
        DeliverySettings {
            force_complete_delay: settings.delivery.force_complete_delay,
            limits,
            limit_messages: messages.clone(),
        },
        notifications_repo.clone(),
        sent_repo.clone(),
        audience.clone(),
        app_identity,
        prepare_queue,
        data_queue.clone(),
    ));

    let drafts = Arc::new(DraftNotificationService::new(
        DraftSettings {
            limits,
            limit_messages: messages,
            duplicate_title: settings
                .messages
                .duplicate_title
                .clone()
                .unwrap_or_else(|| DEFAULT_DUPLICATE_TITLE.to_string()),
            card: card_settings.clone(),
        },
        notifications_repo.clone(),
        audience.clone(),
    ));

    let previews = Arc::new(DraftPreviewService::new(
        card_settings,
        notifications_repo.clone(),
        preview_sender,
    ));

    let summaries = Arc::new(SummaryAggregator::new(
        notifications_repo.clone(),
        exports_repo,
        audience,
        settings.delivery.recent_sent_limit.get(),
    ));

    // Workers use the jobs pool so reconciliation never starves HTTP handlers.
    let job_notifications: Arc<dyn NotificationsRepo> = job_repositories.clone();
    let job_sent: Arc<dyn SentNotificationsRepo> = job_repositories;
    let reconciler = Arc::new(DeliveryReconciler::new(
        job_notifications,
        job_sent,
        data_queue,
        settings.delivery.aggregation_recheck_delay,
    ));

    Ok(ApplicationContext {
        api_state: ApiState {
            delivery,
            drafts,
            previews,
            summaries,
            db: http_repositories,
        },
        job_context: JobWorkerContext { reconciler },
    })
}

fn spawn_job_monitor(
    repositories: Arc<PostgresRepositories>,
    context: JobWorkerContext,
    jobs: &config::JobsSettings,
) -> tokio::task::JoinHandle<()> {
    let data_queue_storage = PostgresStorage::new_with_config(
        repositories.pool().clone(),
        ApalisSqlConfig::new(JobType::DataQueue.as_str()),
    );

    let data_queue_worker = WorkerBuilder::new("data-queue-worker")
        .concurrency(jobs.data_queue_concurrency.get() as usize)
        .data(context)
        .backend(data_queue_storage)
        .build_fn(process_data_queue_job);

    let monitor = Monitor::new().register(data_queue_worker);

    tokio::spawn(async move {
        if let Err(err) = monitor.run().await {
            error!(error = %err, "job monitor stopped");
        }
    })
}

async fn serve_http(settings: &config::Settings, api_state: ApiState) -> Result<(), AppError> {
    let router = http::build_router(api_state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "bulletin::serve",
        addr = %settings.server.addr,
        "http server listening"
    );

    let grace = settings.server.graceful_shutdown;
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal(grace))
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal(grace: std::time::Duration) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    info!(
        target = "bulletin::serve",
        grace_seconds = grace.as_secs(),
        "shutdown requested, draining connections"
    );

    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        warn!(
            target = "bulletin::serve",
            "graceful shutdown window elapsed, exiting"
        );
        process::exit(0);
    });
}
