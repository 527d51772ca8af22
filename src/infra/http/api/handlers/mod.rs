//! API handlers grouped by notification partition.

mod drafts;
mod sent;

pub use drafts::*;
pub use sent::*;
