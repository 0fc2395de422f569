use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use agora_db::migrations::{ADMIN_GROUP_ID, MEMBER_GROUP_ID};
use agora_types::api::{Claims, CreateGroupRequest, CreatedResponse, DeletedResponse, GroupNode};
use agora_types::models::Privileges;

use crate::access::require_privilege;
use crate::error::ApiError;
use crate::{AppState, run_db};

pub async fn list_groups(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_privilege(&state, &claims, Privileges::MANAGE_GROUPS, "manage groups").await?;

    let tree = run_db(&state, |db| db.group_tree()).await?;
    let nodes: Vec<GroupNode> = tree
        .into_iter()
        .map(|(row, depth)| GroupNode {
            id: row.id,
            parent_id: row.parent_id,
            name: row.name,
            privileges: row.privileges,
            depth,
        })
        .collect();

    Ok(Json(nodes))
}

pub async fn hierarchy(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<String, ApiError> {
    require_privilege(&state, &claims, Privileges::MANAGE_GROUPS, "manage groups").await?;
    run_db(&state, |db| db.group_hierarchy()).await
}

pub async fn create_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateGroupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_privilege(&state, &claims, Privileges::MANAGE_GROUPS, "manage groups").await?;

    let CreateGroupRequest {
        parent_id,
        name,
        privileges,
    } = req;
    let id = run_db(&state, move |db| db.create_group(parent_id, &name, privileges)).await?;

    info!(group_id = id, %privileges, user_id = claims.sub, "Group created");
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// Removes the group and all groups below it. Refused while any of them
/// still has members. The two seeded groups are permanent.
pub async fn delete_group(
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_privilege(&state, &claims, Privileges::MANAGE_GROUPS, "manage groups").await?;

    if group_id == ADMIN_GROUP_ID {
        return Err(ApiError::Conflict("the administrators group cannot be deleted".into()));
    }
    if group_id == MEMBER_GROUP_ID {
        return Err(ApiError::Conflict("the members group cannot be deleted".into()));
    }
    if run_db(&state, move |db| db.get_group(group_id)).await?.is_none() {
        return Err(ApiError::NotFound(format!("group {} does not exist", group_id)));
    }

    let deleted = run_db(&state, move |db| db.delete_group_tree(group_id)).await?;

    info!(group_id, deleted, user_id = claims.sub, "Group tree deleted");
    Ok(Json(DeletedResponse { deleted }))
}
