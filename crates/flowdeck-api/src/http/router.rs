//! Axum router configuration with middleware.
//!
//! All routes are under `/api/`.
//! Middleware: CORS, tracing.
//!
//! In production, the built UI is served from `web/dist/` (configurable via
//! `FLOWDECK_WEB_DIR`). API routes take priority; unknown paths fall through
//! to the SPA's `index.html` for client-side routing. If the directory does
//! not exist, only the API is served.

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Local workflow store
        .route("/workflow/yaml", post(handlers::workflow::save_workflow))
        .route("/workflow/local", get(handlers::workflow::list_local))
        .route("/workflow/combined", get(handlers::workflow::list_combined))
        .route("/workflow/deleted", get(handlers::workflow::list_deleted))
        .route("/workflow/reparse", post(handlers::workflow::reparse))
        .route(
            "/workflow/{uuid}",
            get(handlers::workflow::details).delete(handlers::workflow::delete_workflow),
        )
        // Commit history
        .route("/workflow/{uuid}/history", get(handlers::workflow::history))
        .route(
            "/workflow/{uuid}/commit/{hash}",
            get(handlers::workflow::commit_diff),
        )
        .route("/workflow/restore", post(handlers::workflow::restore))
        .route("/workflow/revert", post(handlers::workflow::revert))
        .route(
            "/workflow/content/{hash}/{filename}",
            get(handlers::workflow::content_at_change),
        )
        // Upstream mirror
        .route(
            "/workflow/{uuid}/online",
            post(handlers::mirror::online_workflow),
        )
        .route(
            "/workflow/{uuid}/execute",
            post(handlers::mirror::execute_workflow),
        )
        .route("/workflow/ds", post(handlers::mirror::reconcile_direct))
        // Execution tracking (passthrough)
        .route(
            "/workflow/instances",
            get(handlers::mirror::list_instances),
        )
        .route(
            "/workflow/instances/{project_code}/{instance_id}/tasks",
            get(handlers::mirror::instance_tasks),
        )
        .route("/task/instances", get(handlers::mirror::list_task_instances))
        .route("/task/log", get(handlers::mirror::task_log))
        .route(
            "/dashboard/state-counts",
            get(handlers::mirror::state_counts),
        );

    let mut router = Router::new()
        .nest("/api", api_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Serve the built UI from disk if the directory exists. API routes and
    // /health take priority; unknown paths fall through to index.html for
    // client-side routing.
    let web_dir = std::env::var("FLOWDECK_WEB_DIR").unwrap_or_else(|_| "web/dist".to_string());
    if std::path::Path::new(&web_dir).exists() {
        let index_path = format!("{}/index.html", web_dir);
        let serve_dir = ServeDir::new(&web_dir).fallback(ServeFile::new(index_path));
        router = router.fallback_service(serve_dir);
        tracing::info!(path = %web_dir, "SPA static file serving enabled");
    }

    router
}

/// GET /health - Simple health check endpoint.
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
