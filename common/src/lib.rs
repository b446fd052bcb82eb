//! Ratekeeper Common Types
//!
//! This crate contains the data model shared across the Ratekeeper
//! workspace: currency codes, the per-currency display entries, immutable
//! rate snapshots, and the timestamp format stamped on fresh snapshots.

pub mod currency;
pub mod snapshot;
pub mod error;
pub mod time;

pub use currency::*;
pub use snapshot::*;
pub use error::*;
pub use time::*;
