pub mod access;
pub mod auth;
pub mod error;
pub mod groups;
pub mod middleware;
pub mod permissions;
pub mod sections;
pub mod threads;

use std::sync::Arc;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
};
use tracing::error;

use agora_db::Database;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub session_days: i64,
}

/// Builds the full router: public auth routes plus everything behind the
/// session gate.
pub fn app(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/me", get(auth::me))
        .route("/sections", get(sections::list_sections).post(sections::create_section))
        .route("/sections/hierarchy", get(sections::hierarchy))
        .route("/sections/{section_id}", delete(sections::delete_section))
        .route("/sections/{section_id}/path", get(sections::section_path))
        .route(
            "/sections/{section_id}/threads",
            get(threads::list_threads).post(threads::create_thread),
        )
        .route(
            "/threads/{thread_id}",
            get(threads::get_thread).delete(threads::delete_thread),
        )
        .route("/groups", get(groups::list_groups).post(groups::create_group))
        .route("/groups/hierarchy", get(groups::hierarchy))
        .route("/groups/{group_id}", delete(groups::delete_group))
        .route(
            "/groups/{group_id}/sections/{section_id}/permissions",
            get(permissions::get_permissions).put(permissions::set_permissions),
        )
        .layer(from_fn_with_state(state.clone(), middleware::require_auth))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}

/// Runs blocking DB work off the async runtime.
pub(crate) async fn run_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> agora_db::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal
        })?
        .map_err(ApiError::from)
}
