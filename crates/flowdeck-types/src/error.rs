use thiserror::Error;

/// Errors from workflow store operations.
///
/// Display strings double as HTTP error bodies, so the user-facing variants
/// keep the exact wording the web UI matches against.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("A workflow with the name '{0}' already exists.")]
    NameConflict(String),

    #[error("Workflow with UUID {0} not found.")]
    NotFound(String),

    #[error("workflow file '{0}' is missing from the store")]
    FileMissing(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error(transparent)]
    Commit(#[from] CommitStoreError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Errors from the commit-graph store backing the workflow repository.
#[derive(Debug, Error)]
pub enum CommitStoreError {
    #[error("path '{0}' not found in commit tree")]
    NotInTree(String),

    #[error("no commits found for path '{0}'")]
    NoHistory(String),

    #[error("{0}")]
    PreconditionFailed(String),

    #[error("git error: {0}")]
    Backend(String),

    #[error("io error: {0}")]
    Io(String),
}

/// Errors from the upstream scheduler API.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("DS API error ({op}): {msg}")]
    Api { op: String, code: i64, msg: String },

    #[error("upstream scheduler unreachable: {0}")]
    Unavailable(String),

    #[error("workflow definition not found in DolphinScheduler")]
    NotFound,

    #[error("A workflow named '{0}' already exists in DolphinScheduler.")]
    DuplicateName(String),

    #[error("{0}")]
    PreconditionFailed(String),

    #[error("invalid response from upstream scheduler: {0}")]
    Decode(String),

    #[error("operation cancelled")]
    Cancelled,
}

/// Errors from repository operations (used by trait definitions in flowdeck-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}
