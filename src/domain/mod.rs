//! Domain layer types and invariants.

pub mod audience;
pub mod entities;
pub mod error;
pub mod types;
