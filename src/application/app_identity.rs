use std::sync::Arc;

use metrics::counter;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::application::catalog::AppCatalog;
use crate::application::repos::AppSettingsRepo;

pub const METRIC_APP_IDENTITY_FAILURES: &str = "bulletin_app_identity_provision_failures_total";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppIdentitySettings {
    pub proactively_install_user_app: bool,
    pub external_id: String,
}

/// Result of one provisioning attempt. Never fatal to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Disabled,
    AlreadyProvisioned,
    Provisioned,
    NotInCatalog,
    Failed,
}

/// Makes sure the user app id is known before a send. The id is cached in memory after the
/// first successful read or write; concurrent callers may race and write the same value.
pub struct AppIdentityProvisioner {
    settings: AppIdentitySettings,
    catalog: Arc<dyn AppCatalog>,
    store: Arc<dyn AppSettingsRepo>,
    cached: RwLock<Option<String>>,
}

impl AppIdentityProvisioner {
    pub fn new(
        settings: AppIdentitySettings,
        catalog: Arc<dyn AppCatalog>,
        store: Arc<dyn AppSettingsRepo>,
    ) -> Self {
        Self {
            settings,
            catalog,
            store,
            cached: RwLock::new(None),
        }
    }

    pub async fn ensure_app_identity(&self) -> ProvisionOutcome {
        if !self.settings.proactively_install_user_app {
            return ProvisionOutcome::Disabled;
        }

        match self.cached_app_id().await {
            Ok(Some(_)) => return ProvisionOutcome::AlreadyProvisioned,
            Ok(None) => {}
            Err(outcome) => return outcome,
        }

        let app_id = match self.catalog.teams_app_id(&self.settings.external_id).await {
            Ok(Some(app_id)) if !app_id.trim().is_empty() => app_id,
            Ok(_) => {
                info!(
                    target = "application::app_identity",
                    external_id = %self.settings.external_id,
                    "user app is not published in the tenant catalog"
                );
                return ProvisionOutcome::NotInCatalog;
            }
            Err(err) => {
                counter!(METRIC_APP_IDENTITY_FAILURES).increment(1);
                warn!(
                    target = "application::app_identity",
                    external_id = %self.settings.external_id,
                    status = err.status().unwrap_or_default(),
                    error = %err,
                    "failed to look up user app id; continuing without it"
                );
                return ProvisionOutcome::Failed;
            }
        };

        if let Err(err) = self.store.set_user_app_id(&app_id).await {
            counter!(METRIC_APP_IDENTITY_FAILURES).increment(1);
            warn!(
                target = "application::app_identity",
                error = %err,
                "failed to persist user app id"
            );
            return ProvisionOutcome::Failed;
        }

        *self.cached.write().await = Some(app_id.clone());
        info!(
            target = "application::app_identity",
            app_id = %app_id,
            "user app id provisioned"
        );
        ProvisionOutcome::Provisioned
    }

    async fn cached_app_id(&self) -> Result<Option<String>, ProvisionOutcome> {
        if let Some(app_id) = self.cached.read().await.clone() {
            return Ok(Some(app_id));
        }

        let stored = self.store.user_app_id().await.map_err(|err| {
            counter!(METRIC_APP_IDENTITY_FAILURES).increment(1);
            warn!(
                target = "application::app_identity",
                error = %err,
                "failed to read stored user app id"
            );
            ProvisionOutcome::Failed
        })?;

        match stored.filter(|value| !value.trim().is_empty()) {
            Some(app_id) => {
                debug!(target = "application::app_identity", "user app id loaded from store");
                *self.cached.write().await = Some(app_id.clone());
                Ok(Some(app_id))
            }
            None => Ok(None),
        }
    }
}
