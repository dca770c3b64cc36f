//! Core domain types for the campaign engagement pipeline.
//!
//! Provides strongly-typed identifiers, the provider envelope model,
//! error handling, clock abstraction, and the repository layer shared by
//! the ingestion endpoint and the background pipeline. All other crates
//! depend on these foundational types.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod envelope;
pub mod error;
pub mod models;
pub mod storage;
pub mod time;

pub use envelope::{CampaignRef, EngagementEvent, Envelope, EventKind};
pub use error::{CoreError, Result};
pub use models::{
    ActiveCampaign, BounceRecord, Campaign, CampaignId, CampaignStats, EngagementSet, EventId,
    RawEvent,
};
pub use time::{Clock, RealClock, TestClock};
