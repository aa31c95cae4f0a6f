//! Git-backed commit store.
//!
//! The workflow directory is a plain git repository; every save, delete,
//! restore and revert becomes a commit on its single branch.

pub mod store;

pub use store::GitCommitStore;
