use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the Bulletin binary.
#[derive(Debug, Parser)]
#[command(name = "bulletin", version, about = "Bulletin notification service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "BULLETIN_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP API and the background workers.
    Serve(Box<ServeArgs>),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the HTTP database pool size.
    #[arg(long = "database-http-max-connections", value_name = "COUNT")]
    pub database_http_max_connections: Option<u32>,

    /// Override the jobs database pool size.
    #[arg(long = "database-jobs-max-connections", value_name = "COUNT")]
    pub database_jobs_max_connections: Option<u32>,

    /// Override the data-queue worker concurrency.
    #[arg(long = "jobs-data-queue-concurrency", value_name = "COUNT")]
    pub jobs_data_queue_concurrency: Option<u32>,

    /// Override the delay before a send is force-completed.
    #[arg(long = "delivery-force-complete-delay-seconds", value_name = "SECONDS")]
    pub delivery_force_complete_delay_seconds: Option<f64>,

    /// Toggle proactive provisioning of the user app id before a send.
    #[arg(
        long = "user-app-proactive-install",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub user_app_proactive_install: Option<bool>,

    /// Override the external (manifest) id of the user app.
    #[arg(long = "user-app-external-id", value_name = "ID")]
    pub user_app_external_id: Option<String>,

    /// Override the directory tenant id.
    #[arg(long = "graph-tenant-id", value_name = "TENANT")]
    pub graph_tenant_id: Option<String>,

    /// Override the directory client id.
    #[arg(long = "graph-client-id", value_name = "CLIENT")]
    pub graph_client_id: Option<String>,
}
