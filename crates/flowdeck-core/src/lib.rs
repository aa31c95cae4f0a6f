//! Business logic for Flowdeck.
//!
//! This crate defines the ports (commit store, workflow index, upstream
//! scheduler) and the services that drive them. It depends only on
//! `flowdeck-types`. IO implementations live in `flowdeck-infra`.

pub mod mirror;
pub mod projection;
pub mod repository;
pub mod store;
