//! DolphinScheduler-compatible HTTP client.

pub mod client;

pub use client::{DsClient, InstanceQuery};
