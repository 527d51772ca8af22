use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::application::directory::{DirectoryError, GroupsDirectory};
use crate::application::repos::{RepoError, TeamsRepo};
use crate::domain::audience::{AudienceKind, AudienceLimitExceeded};
use crate::domain::entities::NotificationRecord;

pub const DEFAULT_LOOKUP_CONCURRENCY: usize = 8;

#[derive(Debug, Error)]
pub enum AudienceError {
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Display names of a notification's audience.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AudienceNames {
    pub team_names: Vec<String>,
    pub roster_names: Vec<String>,
    pub group_names: Vec<String>,
    pub all_users: bool,
}

/// Operator-facing text used when an audience exceeds a size limit.
/// Templates may reference `{count}` and `{limit}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudienceLimitMessages {
    pub teams: String,
    pub rosters: String,
    pub groups: String,
}

impl Default for AudienceLimitMessages {
    fn default() -> Self {
        Self {
            teams: "The number of teams ({count}) exceeds the limit of {limit}.".to_string(),
            rosters: "The number of team rosters ({count}) exceeds the limit of {limit}."
                .to_string(),
            groups: "The number of groups ({count}) exceeds the limit of {limit}.".to_string(),
        }
    }
}

impl AudienceLimitMessages {
    pub fn render(&self, exceeded: &AudienceLimitExceeded) -> String {
        let template = match exceeded.kind {
            AudienceKind::Teams => &self.teams,
            AudienceKind::Rosters => &self.rosters,
            AudienceKind::Groups => &self.groups,
        };
        template
            .replace("{count}", &exceeded.count.to_string())
            .replace("{limit}", &exceeded.limit.to_string())
    }
}

#[derive(Clone)]
pub struct AudienceResolver {
    teams: Arc<dyn TeamsRepo>,
    groups: Arc<dyn GroupsDirectory>,
    lookup_concurrency: usize,
}

impl AudienceResolver {
    pub fn new(teams: Arc<dyn TeamsRepo>, groups: Arc<dyn GroupsDirectory>) -> Self {
        Self {
            teams,
            groups,
            lookup_concurrency: DEFAULT_LOOKUP_CONCURRENCY,
        }
    }

    pub fn with_lookup_concurrency(mut self, concurrency: usize) -> Self {
        self.lookup_concurrency = concurrency.max(1);
        self
    }

    pub async fn expand_audience(
        &self,
        notification: &NotificationRecord,
    ) -> Result<AudienceNames, AudienceError> {
        let audience = &notification.audience;

        let team_names = self.team_names(&audience.teams).await?;
        let roster_names = self.team_names(&audience.rosters).await?;
        let group_names = self.group_names(&audience.groups).await?;

        Ok(AudienceNames {
            team_names,
            roster_names,
            group_names,
            all_users: audience.all_users,
        })
    }

    /// True when any of the groups hides its membership. Stops at the first hidden group;
    /// directory failures are returned to the caller.
    pub async fn contains_hidden_membership(
        &self,
        group_ids: &[String],
    ) -> Result<bool, AudienceError> {
        if group_ids.is_empty() {
            return Ok(false);
        }

        let mut lookups = stream::iter(group_ids.iter().cloned())
            .map(|id| {
                let groups = Arc::clone(&self.groups);
                async move { groups.group_by_id(&id).await }
            })
            .buffer_unordered(self.lookup_concurrency);

        while let Some(lookup) = lookups.next().await {
            if let Some(group) = lookup? {
                if group.hidden_membership {
                    return Ok(true);
                }
            }
        }

        Ok(false)
    }

    async fn team_names(&self, ids: &[String]) -> Result<Vec<String>, AudienceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.teams.team_names_by_ids(ids).await?)
    }

    /// Best effort: unknown or failing ids are skipped, and an error is only returned when
    /// every lookup failed.
    pub async fn group_names(&self, ids: &[String]) -> Result<Vec<String>, AudienceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let lookups: Vec<_> = stream::iter(ids.iter().cloned())
            .map(|id| {
                let groups = Arc::clone(&self.groups);
                async move {
                    let lookup = groups.group_by_id(&id).await;
                    (id, lookup)
                }
            })
            .buffered(self.lookup_concurrency)
            .collect()
            .await;

        let mut names = Vec::with_capacity(lookups.len());
        let mut first_error = None;
        let mut failures = 0usize;

        for (id, lookup) in lookups {
            match lookup {
                Ok(Some(group)) => names.push(group.display_name),
                Ok(None) => {}
                Err(err) => {
                    failures += 1;
                    warn!(
                        target = "application::audience",
                        group_id = %id,
                        error = %err,
                        "group name lookup failed"
                    );
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }

        match first_error {
            Some(err) if failures == ids.len() => Err(err.into()),
            _ => Ok(names),
        }
    }
}
