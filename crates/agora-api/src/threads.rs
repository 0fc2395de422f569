use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use agora_db::models::ThreadView;
use agora_types::api::{Claims, CreateThreadRequest, CreatedResponse, DeletedResponse, ThreadResponse};

use crate::access::{require, section_permissions};
use crate::error::ApiError;
use crate::{AppState, run_db};

fn to_response(view: ThreadView) -> ThreadResponse {
    ThreadResponse {
        id: view.id,
        section_id: view.section_id,
        title: view.title,
        author_id: view.author_id,
        creation_date: view.creation_date,
    }
}

async fn load_thread(state: &AppState, thread_id: i64) -> Result<ThreadView, ApiError> {
    run_db(state, move |db| db.get_thread(thread_id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("thread {} does not exist", thread_id)))
}

pub async fn list_threads(
    State(state): State<AppState>,
    Path(section_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let perms = section_permissions(&state, &claims, section_id).await?;
    require(perms.can_view, "view this section")?;

    let threads = run_db(&state, move |db| db.get_threads(section_id)).await?;
    Ok(Json(threads.into_iter().map(to_response).collect::<Vec<_>>()))
}

/// Creates the thread together with its creation data; the current user is
/// the author.
pub async fn create_thread(
    State(state): State<AppState>,
    Path(section_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateThreadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let perms = section_permissions(&state, &claims, section_id).await?;
    require(perms.can_create_thread, "create threads in this section")?;

    let author_id = claims.sub;
    let title = req.title;
    let id = run_db(&state, move |db| db.create_thread(section_id, &title, author_id)).await?;

    info!(thread_id = id, section_id, author_id, "Thread created");
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

pub async fn get_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let thread = load_thread(&state, thread_id).await?;

    let perms = section_permissions(&state, &claims, thread.section_id).await?;
    require(perms.can_view, "view this section")?;

    Ok(Json(to_response(thread)))
}

pub async fn delete_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let thread = load_thread(&state, thread_id).await?;

    let perms = section_permissions(&state, &claims, thread.section_id).await?;
    require(perms.can_delete_thread, "delete threads in this section")?;

    let deleted = run_db(&state, move |db| db.delete_thread(thread_id)).await?;

    info!(thread_id, deleted, user_id = claims.sub, "Thread deleted");
    Ok(Json(DeletedResponse { deleted }))
}
