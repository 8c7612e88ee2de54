//! Append new legislative status changes from OpenStates to an Airtable base.
//!
//! Each run reads the tracked bills table, fetches every bill's action
//! history upstream (paced by a [`RateLimiter`]), and inserts one status row
//! per action newer than the bill's recorded last update.

pub mod airtable;
pub mod config;
pub mod error;
pub mod openstates;
pub mod ratelimit;
pub mod sync;
pub mod types;

pub use airtable::AirtableClient;
pub use config::{Config, ConfigBuilder, Settings};
pub use error::{Error, Result};
pub use openstates::OpenStatesClient;
pub use ratelimit::{Clock, RateLimitedSource, RateLimiter, SystemClock};
pub use sync::{diff_bill, BillDiff, BillOutcome, BillReport, BillSource, BillStore, BillSync, SyncSummary};
pub use types::{
    normalize_bill_id, BillQuery, Chamber, Reading, Session, StatusRow, TrackedBill, UpstreamAction,
    UpstreamBill,
};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::{Config, ConfigBuilder, Settings};
    pub use crate::error::{Error, Result};
    pub use crate::ratelimit::{RateLimitedSource, RateLimiter};
    pub use crate::sync::{BillSource, BillStore, BillSync, SyncSummary};
    pub use crate::types::{StatusRow, TrackedBill, UpstreamAction, UpstreamBill};
}
