//! Audience declarations and the size rules applied to them.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_AUDIENCE_LIMIT: usize = 20;

/// Delivery targets of a notification. All four parts may be combined.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audience {
    pub teams: Vec<String>,
    pub rosters: Vec<String>,
    pub groups: Vec<String>,
    pub all_users: bool,
}

impl Audience {
    pub fn is_empty(&self) -> bool {
        !self.all_users && self.teams.is_empty() && self.rosters.is_empty() && self.groups.is_empty()
    }

    pub fn check_limits(&self, limits: &AudienceLimits) -> Result<(), AudienceLimitExceeded> {
        check_kind(AudienceKind::Teams, self.teams.len(), Some(limits.teams))?;
        check_kind(AudienceKind::Rosters, self.rosters.len(), Some(limits.rosters))?;
        check_kind(AudienceKind::Groups, self.groups.len(), limits.groups)
    }
}

fn check_kind(
    kind: AudienceKind,
    count: usize,
    limit: Option<usize>,
) -> Result<(), AudienceLimitExceeded> {
    match limit {
        Some(limit) if count > limit => Err(AudienceLimitExceeded { kind, count, limit }),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudienceKind {
    Teams,
    Rosters,
    Groups,
}

impl AudienceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AudienceKind::Teams => "teams",
            AudienceKind::Rosters => "rosters",
            AudienceKind::Groups => "groups",
        }
    }
}

impl fmt::Display for AudienceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-kind caps. A `None` groups cap leaves groups unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudienceLimits {
    pub teams: usize,
    pub rosters: usize,
    pub groups: Option<usize>,
}

impl Default for AudienceLimits {
    fn default() -> Self {
        Self {
            teams: DEFAULT_AUDIENCE_LIMIT,
            rosters: DEFAULT_AUDIENCE_LIMIT,
            groups: Some(DEFAULT_AUDIENCE_LIMIT),
        }
    }
}

impl AudienceLimits {
    /// The send pipeline caps teams and rosters only; groups are capped while authoring.
    pub fn without_group_cap(self) -> Self {
        Self {
            groups: None,
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("audience lists {count} {kind}, more than the limit of {limit}")]
pub struct AudienceLimitExceeded {
    pub kind: AudienceKind,
    pub count: usize,
    pub limit: usize,
}
