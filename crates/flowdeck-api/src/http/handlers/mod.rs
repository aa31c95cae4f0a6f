//! REST API request handlers.

pub mod mirror;
pub mod workflow;
