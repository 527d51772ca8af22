//! Tenant app catalog collaborator used to provision the user app identity.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("app catalog request failed with status {status}: {message}")]
    Service { status: u16, message: String },
    #[error("app catalog unavailable: {0}")]
    Unavailable(String),
}

impl CatalogError {
    pub fn status(&self) -> Option<u16> {
        match self {
            CatalogError::Service { status, .. } => Some(*status),
            CatalogError::Unavailable(_) => None,
        }
    }
}

#[async_trait]
pub trait AppCatalog: Send + Sync {
    /// Resolve the tenant-scoped app id for a published app manifest id.
    async fn teams_app_id(&self, external_id: &str) -> Result<Option<String>, CatalogError>;
}
