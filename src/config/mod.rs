//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, num::NonZeroU32, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

mod cli;

pub use cli::*;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "bulletin";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_HTTP_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_DB_JOBS_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_JOB_DATA_QUEUE_CONCURRENCY: u32 = 4;
const DEFAULT_FORCE_COMPLETE_DELAY_SECS: f64 = 86_400.0;
const DEFAULT_RECHECK_DELAY_SECS: u64 = 10;
const DEFAULT_RECENT_SENT_LIMIT: u32 = 25;
const DEFAULT_AUDIENCE_LIMIT: u32 = 20;
const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";
const DEFAULT_GRAPH_AUTHORITY_URL: &str = "https://login.microsoftonline.com";
const DEFAULT_GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";
const DEFAULT_GRAPH_TIMEOUT_SECS: u64 = 30;
const DEFAULT_GRAPH_LOOKUP_CONCURRENCY: u32 = 8;
const DEFAULT_BOT_TENANT_ID: &str = "botframework.com";
const DEFAULT_BOT_SCOPE: &str = "https://api.botframework.com/.default";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub jobs: JobsSettings,
    pub delivery: DeliveryConfig,
    pub user_app: UserAppSettings,
    pub graph: GraphSettings,
    /// Bot connector client used for draft previews; `None` when no bot credentials are set.
    /// Its `base_url` is the connector service url.
    pub bot: Option<GraphSettings>,
    pub messages: MessageSettings,
    pub card: CardConfig,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub http_max_connections: NonZeroU32,
    pub jobs_max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct JobsSettings {
    pub data_queue_concurrency: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub force_complete_delay: Duration,
    pub aggregation_recheck_delay: Duration,
    pub recent_sent_limit: NonZeroU32,
    pub max_teams: usize,
    pub max_rosters: usize,
    /// Applied to draft authoring only.
    pub max_groups: usize,
}

#[derive(Debug, Clone)]
pub struct UserAppSettings {
    pub proactively_install_user_app: bool,
    pub external_id: String,
}

#[derive(Debug, Clone)]
pub struct GraphSettings {
    pub base_url: Url,
    pub authority_url: Url,
    pub scope: String,
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub request_timeout: Duration,
    pub lookup_concurrency: NonZeroU32,
}

#[derive(Debug, Clone, Default)]
pub struct MessageSettings {
    pub teams_limit_warning: Option<String>,
    pub rosters_limit_warning: Option<String>,
    pub groups_limit_warning: Option<String>,
    pub duplicate_title: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CardConfig {
    pub header_image_url: Option<String>,
    pub footer_image_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("BULLETIN").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    jobs: RawJobsSettings,
    delivery: RawDeliverySettings,
    user_app: RawUserAppSettings,
    graph: RawGraphSettings,
    bot: RawBotSettings,
    messages: RawMessageSettings,
    card: RawCardSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_http_max_connections {
            self.database.http_max_connections = Some(max);
        }
        if let Some(max) = overrides.database_jobs_max_connections {
            self.database.jobs_max_connections = Some(max);
        }
        if let Some(value) = overrides.jobs_data_queue_concurrency {
            self.jobs.data_queue_concurrency = Some(value);
        }
        if let Some(seconds) = overrides.delivery_force_complete_delay_seconds {
            self.delivery.force_complete_message_delay_seconds = Some(seconds);
        }
        if let Some(enabled) = overrides.user_app_proactive_install {
            self.user_app.proactively_install_user_app = Some(enabled);
        }
        if let Some(external_id) = overrides.user_app_external_id.as_ref() {
            self.user_app.external_id = Some(external_id.clone());
        }
        if let Some(tenant) = overrides.graph_tenant_id.as_ref() {
            self.graph.tenant_id = Some(tenant.clone());
        }
        if let Some(client) = overrides.graph_client_id.as_ref() {
            self.graph.client_id = Some(client.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            jobs,
            delivery,
            user_app,
            graph,
            bot,
            messages,
            card,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let database = build_database_settings(database)?;
        let jobs = build_jobs_settings(jobs)?;
        let delivery = build_delivery_settings(delivery)?;
        let user_app = build_user_app_settings(user_app)?;
        let graph = build_graph_settings(graph)?;
        let bot = build_bot_settings(bot, &graph)?;
        let messages = build_message_settings(messages);
        let card = CardConfig {
            header_image_url: non_blank(card.header_image_url),
            footer_image_url: non_blank(card.footer_image_url),
        };

        Ok(Self {
            server,
            logging,
            database,
            jobs,
            delivery,
            user_app,
            graph,
            bot,
            messages,
            card,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = non_blank(database.url);

    let http_value = database
        .http_max_connections
        .unwrap_or(DEFAULT_DB_HTTP_MAX_CONNECTIONS);
    let jobs_value = database
        .jobs_max_connections
        .unwrap_or(DEFAULT_DB_JOBS_MAX_CONNECTIONS);

    let http_max_connections = non_zero_u32(http_value.into(), "database.http_max_connections")?;
    let jobs_max_connections = non_zero_u32(jobs_value.into(), "database.jobs_max_connections")?;

    Ok(DatabaseSettings {
        url,
        http_max_connections,
        jobs_max_connections,
    })
}

fn build_jobs_settings(jobs: RawJobsSettings) -> Result<JobsSettings, LoadError> {
    let data_queue = jobs
        .data_queue_concurrency
        .unwrap_or(DEFAULT_JOB_DATA_QUEUE_CONCURRENCY);

    Ok(JobsSettings {
        data_queue_concurrency: non_zero_u32(data_queue.into(), "jobs.data_queue_concurrency")?,
    })
}

fn build_delivery_settings(delivery: RawDeliverySettings) -> Result<DeliveryConfig, LoadError> {
    let force_secs = delivery
        .force_complete_message_delay_seconds
        .unwrap_or(DEFAULT_FORCE_COMPLETE_DELAY_SECS);
    if !force_secs.is_finite() || force_secs < 0.0 {
        return Err(LoadError::invalid(
            "delivery.force_complete_message_delay_seconds",
            "must be a finite, non-negative number of seconds",
        ));
    }
    let force_complete_delay = Duration::try_from_secs_f64(force_secs).map_err(|err| {
        LoadError::invalid(
            "delivery.force_complete_message_delay_seconds",
            err.to_string(),
        )
    })?;

    let recheck_secs = delivery
        .aggregation_recheck_delay_seconds
        .unwrap_or(DEFAULT_RECHECK_DELAY_SECS);
    if recheck_secs == 0 {
        return Err(LoadError::invalid(
            "delivery.aggregation_recheck_delay_seconds",
            "must be greater than zero",
        ));
    }

    let recent = delivery
        .recent_sent_limit
        .unwrap_or(DEFAULT_RECENT_SENT_LIMIT);

    Ok(DeliveryConfig {
        force_complete_delay,
        aggregation_recheck_delay: Duration::from_secs(recheck_secs),
        recent_sent_limit: non_zero_u32(recent.into(), "delivery.recent_sent_limit")?,
        max_teams: audience_limit(delivery.max_teams, "delivery.max_teams")?,
        max_rosters: audience_limit(delivery.max_rosters, "delivery.max_rosters")?,
        max_groups: audience_limit(delivery.max_groups, "delivery.max_groups")?,
    })
}

fn build_user_app_settings(user_app: RawUserAppSettings) -> Result<UserAppSettings, LoadError> {
    let proactively_install_user_app = user_app.proactively_install_user_app.unwrap_or(true);
    let external_id = non_blank(user_app.external_id);

    match (proactively_install_user_app, external_id) {
        (true, None) => Err(LoadError::invalid(
            "user_app.external_id",
            "required when proactively_install_user_app is enabled",
        )),
        (enabled, external_id) => Ok(UserAppSettings {
            proactively_install_user_app: enabled,
            external_id: external_id.unwrap_or_default(),
        }),
    }
}

fn build_graph_settings(graph: RawGraphSettings) -> Result<GraphSettings, LoadError> {
    let base_url = parse_url(
        graph.base_url.as_deref().unwrap_or(DEFAULT_GRAPH_BASE_URL),
        "graph.base_url",
    )?;
    let authority_url = parse_url(
        graph
            .authority_url
            .as_deref()
            .unwrap_or(DEFAULT_GRAPH_AUTHORITY_URL),
        "graph.authority_url",
    )?;
    let scope = non_blank(graph.scope).unwrap_or_else(|| DEFAULT_GRAPH_SCOPE.to_string());

    let timeout_secs = graph
        .request_timeout_seconds
        .unwrap_or(DEFAULT_GRAPH_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "graph.request_timeout_seconds",
            "must be greater than zero",
        ));
    }

    let concurrency = graph
        .lookup_concurrency
        .unwrap_or(DEFAULT_GRAPH_LOOKUP_CONCURRENCY);

    Ok(GraphSettings {
        base_url,
        authority_url,
        scope,
        tenant_id: non_blank(graph.tenant_id),
        client_id: non_blank(graph.client_id),
        client_secret: non_blank(graph.client_secret),
        request_timeout: Duration::from_secs(timeout_secs),
        lookup_concurrency: non_zero_u32(concurrency.into(), "graph.lookup_concurrency")?,
    })
}

fn build_bot_settings(
    bot: RawBotSettings,
    graph: &GraphSettings,
) -> Result<Option<GraphSettings>, LoadError> {
    let (client_id, client_secret) = match (non_blank(bot.app_id), non_blank(bot.app_password)) {
        (None, None) => return Ok(None),
        (Some(app_id), Some(app_password)) => (app_id, app_password),
        _ => {
            return Err(LoadError::invalid(
                "bot.app_password",
                "bot.app_id and bot.app_password must be set together",
            ));
        }
    };

    let service_url = non_blank(bot.service_url).ok_or_else(|| {
        LoadError::invalid("bot.service_url", "required when bot credentials are set")
    })?;
    let base_url = parse_url(&service_url, "bot.service_url")?;

    let authority_url = match non_blank(bot.authority_url) {
        Some(url) => parse_url(&url, "bot.authority_url")?,
        None => graph.authority_url.clone(),
    };

    Ok(Some(GraphSettings {
        base_url,
        authority_url,
        scope: non_blank(bot.scope).unwrap_or_else(|| DEFAULT_BOT_SCOPE.to_string()),
        tenant_id: Some(
            non_blank(bot.tenant_id).unwrap_or_else(|| DEFAULT_BOT_TENANT_ID.to_string()),
        ),
        client_id: Some(client_id),
        client_secret: Some(client_secret),
        request_timeout: graph.request_timeout,
        lookup_concurrency: graph.lookup_concurrency,
    }))
}

fn build_message_settings(messages: RawMessageSettings) -> MessageSettings {
    MessageSettings {
        teams_limit_warning: non_blank(messages.teams_limit_warning),
        rosters_limit_warning: non_blank(messages.rosters_limit_warning),
        groups_limit_warning: non_blank(messages.groups_limit_warning),
        duplicate_title: non_blank(messages.duplicate_title),
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    http_max_connections: Option<u32>,
    jobs_max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawJobsSettings {
    data_queue_concurrency: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDeliverySettings {
    force_complete_message_delay_seconds: Option<f64>,
    aggregation_recheck_delay_seconds: Option<u64>,
    recent_sent_limit: Option<u32>,
    max_teams: Option<u32>,
    max_rosters: Option<u32>,
    max_groups: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawUserAppSettings {
    proactively_install_user_app: Option<bool>,
    external_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawGraphSettings {
    base_url: Option<String>,
    authority_url: Option<String>,
    scope: Option<String>,
    tenant_id: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    request_timeout_seconds: Option<u64>,
    lookup_concurrency: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBotSettings {
    service_url: Option<String>,
    authority_url: Option<String>,
    tenant_id: Option<String>,
    scope: Option<String>,
    app_id: Option<String>,
    app_password: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawMessageSettings {
    teams_limit_warning: Option<String>,
    rosters_limit_warning: Option<String>,
    groups_limit_warning: Option<String>,
    duplicate_title: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCardSettings {
    header_image_url: Option<String>,
    footer_image_url: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn parse_url(value: &str, key: &'static str) -> Result<Url, LoadError> {
    Url::parse(value).map_err(|err| LoadError::invalid(key, format!("invalid url: {err}")))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn audience_limit(value: Option<u32>, key: &'static str) -> Result<usize, LoadError> {
    let limit = non_zero_u32(value.unwrap_or(DEFAULT_AUDIENCE_LIMIT).into(), key)?;
    usize::try_from(limit.get())
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
