//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by the REST API.
//! Services are generic over commit-store/index/upstream traits, but AppState
//! pins them to the concrete infra implementations.

use std::path::PathBuf;
use std::sync::Arc;

use flowdeck_core::mirror::MirrorService;
use flowdeck_core::store::WorkflowStore;
use flowdeck_infra::config::{load_console_config, resolve_data_dir, resolve_repo_dir};
use flowdeck_infra::ds::DsClient;
use flowdeck_infra::git::GitCommitStore;
use flowdeck_infra::sqlite::pool::DatabasePool;
use flowdeck_infra::sqlite::workflow::SqliteWorkflowIndex;
use flowdeck_types::config::ConsoleConfig;

/// Concrete type aliases for the service generics pinned to infra implementations.
pub type ConcreteWorkflowStore = WorkflowStore<GitCommitStore, SqliteWorkflowIndex>;

pub type ConcreteMirrorService = MirrorService<DsClient>;

/// Shared application state holding all services.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ConcreteWorkflowStore>,
    pub mirror: Arc<ConcreteMirrorService>,
    /// Read-side upstream access (instances, logs, state counts, listings).
    pub ds: Arc<DsClient>,
    pub config: Arc<ConsoleConfig>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Initialize the application state: load config, connect to the
    /// database, open the workflow repository, wire services.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();

        // Ensure data directory exists
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_console_config(&data_dir).await;

        // Initialize database
        let db_url = match std::env::var("FLOWDECK_DB") {
            Ok(path) => format!("sqlite://{path}?mode=rwc"),
            Err(_) => format!(
                "sqlite://{}?mode=rwc",
                data_dir.join("flowdeck.db").display()
            ),
        };
        let db_pool = DatabasePool::new(&db_url).await?;

        // Open the git-backed workflow repository
        let repo_dir = resolve_repo_dir(&config, &data_dir);
        let commits = GitCommitStore::open(repo_dir).await?;

        // Wire the local store
        let index = SqliteWorkflowIndex::new(db_pool.clone());
        let store = WorkflowStore::new(commits, index);

        // One upstream client shared between the mirror service and the
        // read-side passthrough handlers.
        let ds = DsClient::new(config.ds.url.clone(), config.ds.token.clone());
        let mirror = MirrorService::new(ds.clone());

        Ok(Self {
            store: Arc::new(store),
            mirror: Arc::new(mirror),
            ds: Arc::new(ds),
            config: Arc::new(config),
            data_dir,
        })
    }
}
