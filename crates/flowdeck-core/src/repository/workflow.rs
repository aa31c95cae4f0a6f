//! Workflow index repository trait.

use flowdeck_types::error::RepositoryError;
use flowdeck_types::workflow::WorkflowRecord;
use uuid::Uuid;

/// Queryable index over locally stored workflows.
///
/// `put` is an upsert keyed on UUID. Workflow names are unique across the
/// index; a `put` that would collide with a different row fails with
/// [`RepositoryError::Conflict`].
pub trait WorkflowIndex: Send + Sync {
    /// Insert or replace the row for `record.uuid`.
    fn put(
        &self,
        record: &WorkflowRecord,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Fetch a row by UUID.
    fn get(
        &self,
        uuid: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<WorkflowRecord>, RepositoryError>> + Send;

    /// Remove a row. Returns `false` when no row existed.
    fn delete(
        &self,
        uuid: &Uuid,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Whether a row exists for `uuid`.
    fn exists(
        &self,
        uuid: &Uuid,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Look a row up by its exact name.
    fn find_by_name(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<Option<WorkflowRecord>, RepositoryError>> + Send;

    /// Look a row up by name, ignoring the row owned by `uuid`.
    ///
    /// Used on update to detect a rename onto a name another workflow
    /// already holds.
    fn find_by_name_excluding(
        &self,
        name: &str,
        uuid: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<WorkflowRecord>, RepositoryError>> + Send;

    /// All rows, ordered by name.
    fn list_all(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<WorkflowRecord>, RepositoryError>> + Send;
}
