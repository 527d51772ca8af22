use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::app_identity::METRIC_APP_IDENTITY_FAILURES;
use crate::application::delivery::{METRIC_NOTIFICATIONS_SENT, METRIC_SEND_REJECTED};
use crate::application::preview::METRIC_PREVIEWS_SENT;
use crate::application::queues::METRIC_QUEUE_ENQUEUED;
use crate::application::reconcile::{METRIC_RECONCILE_COMPLETED, METRIC_RECONCILE_RESCHEDULED};
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_NOTIFICATIONS_SENT,
            Unit::Count,
            "Total number of drafts accepted for sending."
        );
        describe_counter!(
            METRIC_SEND_REJECTED,
            Unit::Count,
            "Total number of send requests rejected, labelled by reason."
        );
        describe_counter!(
            METRIC_APP_IDENTITY_FAILURES,
            Unit::Count,
            "Total number of failed user app id provisioning attempts."
        );
        describe_counter!(
            METRIC_QUEUE_ENQUEUED,
            Unit::Count,
            "Total number of delivery queue messages enqueued, labelled by queue."
        );
        describe_counter!(
            METRIC_RECONCILE_COMPLETED,
            Unit::Count,
            "Total number of sends brought to a final status by reconciliation."
        );
        describe_counter!(
            METRIC_RECONCILE_RESCHEDULED,
            Unit::Count,
            "Total number of reconciliation rechecks scheduled."
        );
        describe_counter!(
            METRIC_PREVIEWS_SENT,
            Unit::Count,
            "Total number of draft previews attempted, labelled by result."
        );
    });
}
