//! Observability setup for Flowdeck: tracing subscriber configuration and
//! optional OpenTelemetry span export.

pub mod tracing_setup;
