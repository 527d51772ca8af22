//! Group directory collaborator used for audience checks and display names.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInfo {
    pub id: String,
    pub display_name: String,
    pub hidden_membership: bool,
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory request failed with status {status}: {message}")]
    Service { status: u16, message: String },
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait GroupsDirectory: Send + Sync {
    /// Look up one group. `Ok(None)` means the directory does not know the id.
    async fn group_by_id(&self, id: &str) -> Result<Option<GroupInfo>, DirectoryError>;
}
