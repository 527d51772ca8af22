//! Application services layer.

pub mod app_identity;
pub mod audience;
pub mod card;
pub mod catalog;
pub mod delivery;
pub mod directory;
pub mod drafts;
pub mod error;
pub mod jobs;
pub mod preview;
pub mod queues;
pub mod reconcile;
pub mod repos;
pub mod summary;

#[cfg(test)]
pub(crate) mod test_support;
