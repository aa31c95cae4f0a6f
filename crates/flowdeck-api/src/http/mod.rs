//! HTTP/REST API layer for Flowdeck.
//!
//! Axum-based REST API at `/api/` with plain-string error bodies and CORS
//! support. Route handlers live in [`handlers`], the error-to-status mapping
//! in [`error`].

pub mod error;
pub mod handlers;
pub mod router;
