//! Infrastructure implementations for Flowdeck.
//!
//! Concrete adapters behind the ports defined in `flowdeck-core`: the SQLite
//! workflow index, the git-backed commit store, and the HTTP client for the
//! upstream scheduler, plus configuration loading.

pub mod config;
pub mod ds;
pub mod git;
pub mod sqlite;
