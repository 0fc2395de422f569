use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{Privileges, SectionPermissions};

// -- Session claims --

/// Session token claims. A request carrying valid claims is "logged in";
/// `sub` is the current user id. The group is not carried here: it is looked
/// up on every request so a changed group takes effect immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: i64,
    pub group_id: i64,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: i64,
    pub username: String,
    pub group_id: i64,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub birth_date: Option<NaiveDate>,
    pub registration_date: NaiveDate,
    pub group_id: i64,
    pub group_name: String,
    pub privileges: Privileges,
}

// -- Sections --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateSectionRequest {
    #[serde(default)]
    pub parent_id: Option<i64>,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionResponse {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub name: String,
}

/// One entry of a pre-order tree listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionNode {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub name: String,
    pub depth: usize,
}

// -- Groups --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateGroupRequest {
    #[serde(default)]
    pub parent_id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub privileges: Privileges,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupNode {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub name: String,
    pub privileges: Privileges,
    pub depth: usize,
}

// -- Permissions --

#[derive(Debug, Serialize, Deserialize)]
pub struct PermissionsResponse {
    pub group_id: i64,
    pub section_id: i64,
    pub permissions: SectionPermissions,
}

// -- Threads --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateThreadRequest {
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadResponse {
    pub id: i64,
    pub section_id: i64,
    pub title: String,
    pub author_id: i64,
    pub creation_date: NaiveDate,
}

// -- Generic --

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub deleted: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
