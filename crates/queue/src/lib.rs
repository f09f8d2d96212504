//! Outbound delivery queue for corvid.
//!
//! This crate turns the fan-outs scheduled by the side-effect handlers into
//! attempts against remote inboxes:
//!
//! - **Jobs**: one [`DeliveryJob`] per fan-out, tracking its pending inboxes
//! - **Client**: the [`FederationClient`] transport capability
//! - **Retry**: exponential backoff with per-recipient abandonment
//! - **Scheduler**: bounded intake, attempt passes, graceful shutdown
//! - **Delivery impl**: the channel-backed [`ChannelDelivery`] capability
//!   handed to the side-effect handlers

pub mod client;
pub mod delivery_impl;
pub mod jobs;
pub mod retry;
pub mod scheduler;

pub use client::{DeliveryOutcome, FederationClient};
pub use delivery_impl::ChannelDelivery;
pub use jobs::DeliveryJob;
pub use retry::{AbandonedDelivery, RetryConfig};
pub use scheduler::DeliveryScheduler;
