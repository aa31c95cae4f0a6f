//! Shared domain types for Flowdeck.
//!
//! This crate contains the core domain types used across the Flowdeck console:
//! workflow index records, commit-store entries, upstream scheduler payloads,
//! and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, serde_yaml_ng, uuid, thiserror.

pub mod config;
pub mod error;
pub mod upstream;
pub mod workflow;
