//! Authorization checks shared by the handlers.
//!
//! Structural changes (sections, groups, permission rows) are gated by the
//! group's [`Privileges`]. Everything inside a section is gated by the
//! group's [`SectionPermissions`] there, inherited from the nearest ancestor
//! section that has an explicit row.

use agora_types::api::Claims;
use agora_types::models::{Privileges, SectionPermissions};

use crate::error::ApiError;
use crate::{AppState, run_db};

/// Privileges of the current user's group, looked up fresh so a deleted
/// account or changed group takes effect immediately.
pub async fn privileges(state: &AppState, claims: &Claims) -> Result<Privileges, ApiError> {
    let user_id = claims.sub;
    let found = run_db(state, move |db| db.get_user_with_group(user_id)).await?;
    let (_, group) = found.ok_or(ApiError::Unauthorized("account no longer exists"))?;
    Ok(group.privileges)
}

pub async fn require_privilege(
    state: &AppState,
    claims: &Claims,
    required: Privileges,
    action: &str,
) -> Result<(), ApiError> {
    if privileges(state, claims).await?.contains(required) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!("not allowed to {}", action)))
    }
}

/// What the current user may do in `section_id`. 404 when the section does
/// not exist.
pub async fn section_permissions(
    state: &AppState,
    claims: &Claims,
    section_id: i64,
) -> Result<SectionPermissions, ApiError> {
    let user_id = claims.sub;
    let found = run_db(state, move |db| {
        let Some((_, group)) = db.get_user_with_group(user_id)? else {
            return Ok(None);
        };
        let inherited = db.inherited_permissions(group.id, section_id)?;
        Ok(Some((group.privileges, inherited)))
    })
    .await?;

    let (privileges, inherited) = found.ok_or(ApiError::Unauthorized("account no longer exists"))?;
    let inherited =
        inherited.ok_or_else(|| ApiError::NotFound(format!("section {} does not exist", section_id)))?;

    Ok(effective_permissions(privileges, inherited))
}

/// Section managers can do everything; moderators get the moderator set on
/// top of whatever the section grants.
pub fn effective_permissions(privileges: Privileges, inherited: SectionPermissions) -> SectionPermissions {
    if privileges.contains(Privileges::MANAGE_SECTIONS) {
        SectionPermissions::ALL
    } else if privileges.contains(Privileges::MODERATE) {
        inherited.union(SectionPermissions::MODERATOR)
    } else {
        inherited
    }
}

pub fn require(allowed: bool, action: &str) -> Result<(), ApiError> {
    if allowed {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!("not allowed to {}", action)))
    }
}
