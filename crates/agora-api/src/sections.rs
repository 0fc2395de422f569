use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use agora_types::api::{
    Claims, CreateSectionRequest, CreatedResponse, DeletedResponse, SectionNode, SectionResponse,
};
use agora_types::models::Privileges;

use crate::access::{require, require_privilege, section_permissions};
use crate::error::ApiError;
use crate::{AppState, run_db};

/// Every section in pre-order with its depth.
pub async fn list_sections(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let tree = run_db(&state, |db| db.section_tree()).await?;

    let nodes: Vec<SectionNode> = tree
        .into_iter()
        .map(|(row, depth)| SectionNode {
            id: row.id,
            parent_id: row.parent_id,
            name: row.name,
            depth,
        })
        .collect();

    Ok(Json(nodes))
}

pub async fn hierarchy(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<String, ApiError> {
    run_db(&state, |db| db.section_hierarchy()).await
}

pub async fn create_section(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateSectionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_privilege(&state, &claims, Privileges::MANAGE_SECTIONS, "manage sections").await?;

    let parent = req.parent_id;
    let name = req.name;
    let id = run_db(&state, move |db| db.create_section(parent, &name)).await?;

    info!(section_id = id, user_id = claims.sub, "Section created");
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// The section followed by its ancestors, nearest first.
pub async fn section_path(
    State(state): State<AppState>,
    Path(section_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let perms = section_permissions(&state, &claims, section_id).await?;
    require(perms.can_view, "view this section")?;

    let path = run_db(&state, move |db| db.section_path(section_id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("section {} does not exist", section_id)))?;

    let path: Vec<SectionResponse> = path
        .into_iter()
        .map(|row| SectionResponse {
            id: row.id,
            parent_id: row.parent_id,
            name: row.name,
        })
        .collect();

    Ok(Json(path))
}

/// Removes the section, every section below it and all their threads.
pub async fn delete_section(
    State(state): State<AppState>,
    Path(section_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let perms = section_permissions(&state, &claims, section_id).await?;
    require(perms.can_delete_section, "delete this section")?;

    let deleted = run_db(&state, move |db| db.delete_section_tree(section_id)).await?;

    info!(section_id, deleted, user_id = claims.sub, "Section tree deleted");
    Ok(Json(DeletedResponse { deleted }))
}
