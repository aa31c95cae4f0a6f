//! Version-controlled workflow storage.
//!
//! Workflow definitions live as `<uuid>.yaml` files in a single directory
//! whose full history is kept in a commit graph. [`CommitStore`] is the port
//! over that directory plus its history; [`WorkflowStore`] layers the
//! business rules (naming, conflict checks, online-version tracking) on top.

pub mod service;

use flowdeck_types::error::CommitStoreError;
use flowdeck_types::workflow::{CommitEntry, CommitRelation, DeletedWorkflow};

pub use service::WorkflowStore;

/// Message prefix for deletion commits. The deleted-workflow listing parses
/// workflow names back out of it.
pub const DELETE_MESSAGE_PREFIX: &str = "Delete workflow: ";

/// Working tree plus commit history for the workflow directory.
///
/// Paths are plain file names relative to the store root; implementations
/// own the root directory and must not accept path separators. All
/// operations are serialized internally so callers never observe a
/// half-committed tree.
pub trait CommitStore: Send + Sync {
    /// Write `content` to `filename` in the working tree, creating the
    /// store directory if needed. Does not commit.
    fn write_file(
        &self,
        filename: &str,
        content: &str,
    ) -> impl std::future::Future<Output = Result<(), CommitStoreError>> + Send;

    /// Read `filename` from the working tree. `None` when absent.
    fn read_file(
        &self,
        filename: &str,
    ) -> impl std::future::Future<Output = Result<Option<String>, CommitStoreError>> + Send;

    /// Remove `filename` from the working tree without committing.
    fn remove_file(
        &self,
        filename: &str,
    ) -> impl std::future::Future<Output = Result<(), CommitStoreError>> + Send;

    /// Whether `filename` exists in the working tree.
    fn file_exists(
        &self,
        filename: &str,
    ) -> impl std::future::Future<Output = Result<bool, CommitStoreError>> + Send;

    /// Last modification time of `filename` in milliseconds since the
    /// epoch. `None` when the file is absent.
    fn file_mtime_ms(
        &self,
        filename: &str,
    ) -> impl std::future::Future<Output = Result<Option<i64>, CommitStoreError>> + Send;

    /// Stage the given paths (additions, edits and removals alike) and
    /// commit them with `message`. When none of the paths changed relative
    /// to the head tree, no commit is made and the head hash is returned.
    fn commit_paths(
        &self,
        paths: &[String],
        message: &str,
    ) -> impl std::future::Future<Output = Result<String, CommitStoreError>> + Send;

    /// Remove `filename` from the working tree and commit the deletion.
    fn remove_and_commit(
        &self,
        filename: &str,
        message: &str,
    ) -> impl std::future::Future<Output = Result<String, CommitStoreError>> + Send;

    /// Commits that touched `filename`, newest first, bounded by the most
    /// recent deletion of the file so a restored workflow starts with a
    /// clean history. Commits in which the file is absent from the tree are
    /// skipped.
    fn history(
        &self,
        filename: &str,
    ) -> impl std::future::Future<Output = Result<Vec<CommitEntry>, CommitStoreError>> + Send;

    /// Hash of the most recent commit touching `filename`, or `None` when
    /// the file has no history.
    fn latest_commit(
        &self,
        filename: &str,
    ) -> impl std::future::Future<Output = Result<Option<String>, CommitStoreError>> + Send;

    /// Exact content of `filename` as of `hash`.
    fn content_at(
        &self,
        filename: &str,
        hash: &str,
    ) -> impl std::future::Future<Output = Result<String, CommitStoreError>> + Send;

    /// Content of `filename` just before `hash`: the parent version when
    /// the commit has one, otherwise the version at `hash` itself.
    fn content_before_change(
        &self,
        filename: &str,
        hash: &str,
    ) -> impl std::future::Future<Output = Result<String, CommitStoreError>> + Send;

    /// Unified diff introduced by `hash`, limited to `filename`. For a
    /// parentless commit this is the full introduction patch.
    fn diff(
        &self,
        filename: &str,
        hash: &str,
    ) -> impl std::future::Future<Output = Result<String, CommitStoreError>> + Send;

    /// Workflows whose file was deleted and not since restored: the newest
    /// deletion commit per `*.yaml` file, skipping files present in the
    /// working tree. The display name comes from the deletion commit
    /// message when it carries the standard prefix, else from the YAML at
    /// the deletion's parent commit.
    fn deleted_entries(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<DeletedWorkflow>, CommitStoreError>> + Send;

    /// Bring `filename` back from the parent of its deletion commit
    /// `hash`, committing the restoration. Fails with
    /// [`CommitStoreError::PreconditionFailed`] when the file already
    /// exists. Returns the restore commit hash.
    fn restore_path_from(
        &self,
        filename: &str,
        hash: &str,
    ) -> impl std::future::Future<Output = Result<String, CommitStoreError>> + Send;

    /// Overwrite `filename` with its exact content at `hash` and commit.
    /// Returns the revert commit hash.
    fn revert_path_to(
        &self,
        filename: &str,
        hash: &str,
    ) -> impl std::future::Future<Output = Result<String, CommitStoreError>> + Send;

    /// Ancestry relation between two commits: how `a` stands relative to
    /// `b`. `Ahead` means `b` is an ancestor of `a`.
    fn relationship(
        &self,
        a: &str,
        b: &str,
    ) -> impl std::future::Future<Output = Result<CommitRelation, CommitStoreError>> + Send;
}
