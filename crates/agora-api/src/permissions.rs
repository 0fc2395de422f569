use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::info;

use agora_types::api::{Claims, PermissionsResponse};
use agora_types::models::{Privileges, SectionPermissions};

use crate::access::require_privilege;
use crate::error::ApiError;
use crate::{AppState, run_db};

/// The explicit row for the pair. Inherited permissions are not reported.
pub async fn get_permissions(
    State(state): State<AppState>,
    Path((group_id, section_id)): Path<(i64, i64)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_privilege(&state, &claims, Privileges::MANAGE_PERMISSIONS, "manage permissions").await?;

    let permissions = run_db(&state, move |db| db.get_permissions(group_id, section_id))
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "group {} has no permissions set on section {}",
                group_id, section_id
            ))
        })?;

    Ok(Json(PermissionsResponse {
        group_id,
        section_id,
        permissions,
    }))
}

pub async fn set_permissions(
    State(state): State<AppState>,
    Path((group_id, section_id)): Path<(i64, i64)>,
    Extension(claims): Extension<Claims>,
    Json(permissions): Json<SectionPermissions>,
) -> Result<impl IntoResponse, ApiError> {
    require_privilege(&state, &claims, Privileges::MANAGE_PERMISSIONS, "manage permissions").await?;

    run_db(&state, move |db| db.set_permissions(group_id, section_id, permissions)).await?;

    info!(group_id, section_id, user_id = claims.sub, "Section permissions replaced");
    Ok(Json(PermissionsResponse {
        group_id,
        section_id,
        permissions,
    }))
}
