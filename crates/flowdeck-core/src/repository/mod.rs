//! Repository trait for the workflow metadata index.
//!
//! The index is the queryable complement to the commit store: one row per
//! workflow carrying its name, online version and upstream linkage. The
//! sqlite implementation lives in `flowdeck-infra`.

pub mod workflow;

pub use workflow::WorkflowIndex;
