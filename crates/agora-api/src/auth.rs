use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand_core::OsRng;
use tracing::{error, info};

use agora_db::migrations::MEMBER_GROUP_ID;
use agora_db::models::NewUser;
use agora_types::api::{
    Claims, LoginRequest, LoginResponse, ProfileResponse, RegisterRequest, RegisterResponse,
};

use crate::error::ApiError;
use crate::{AppState, run_db};

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate input
    let username = req.username.trim().to_string();
    if username.len() < 3 || username.len() > 32 {
        return Err(ApiError::BadRequest("username must be 3 to 32 characters".into()));
    }
    if req.password.len() < 8 {
        return Err(ApiError::BadRequest("password must be at least 8 characters".into()));
    }
    if !req.email.contains('@') {
        return Err(ApiError::BadRequest("email address is invalid".into()));
    }

    // Check if username is taken
    let lookup = username.clone();
    if run_db(&state, move |db| db.get_user_by_username(&lookup)).await?.is_some() {
        return Err(ApiError::Conflict("username is already taken".into()));
    }

    let password_hash = hash_password(&req.password)?;

    let user = NewUser {
        group_id: MEMBER_GROUP_ID,
        username: username.clone(),
        password_hash,
        email: req.email.trim().to_string(),
        registration_date: chrono::Utc::now().date_naive(),
        firstname: req.firstname.trim().to_string(),
        lastname: req.lastname.trim().to_string(),
        birth_date: req.birth_date,
    };
    let (user_id, group_id) = run_db(&state, move |db| db.register_user(user)).await?;

    info!(user_id, username = %username, "User registered");

    let token = create_token(&state.jwt_secret, state.session_days, user_id, &username)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id,
            group_id,
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.clone();
    let user = run_db(&state, move |db| db.get_user_by_username(&username)).await?;

    let Some(user) = user.filter(|u| verify_password(&req.password, &u.password_hash)) else {
        info!(username = %req.username, "Invalid credentials");
        return Err(ApiError::Unauthorized("invalid username or password"));
    };

    info!(user_id = user.id, username = %user.username, "Login successful");

    let token = create_token(&state.jwt_secret, state.session_days, user.id, &user.username)?;

    Ok(Json(LoginResponse {
        user_id: user.id,
        username: user.username,
        group_id: user.group_id,
        token,
    }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let (user, group) = run_db(&state, move |db| db.get_user_with_group(user_id))
        .await?
        .ok_or(ApiError::Unauthorized("account no longer exists"))?;

    Ok(Json(ProfileResponse {
        id: user.id,
        username: user.username,
        email: user.email,
        firstname: user.firstname,
        lastname: user.lastname,
        birth_date: user.birth_date,
        registration_date: user.registration_date,
        group_id: group.id,
        group_name: group.name,
        privileges: group.privileges,
    }))
}

/// Hash with Argon2id.
fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Password hashing failed: {}", e);
            ApiError::Internal
        })
}

fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        error!("Stored password hash is unreadable");
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

pub fn create_token(
    secret: &str,
    session_days: i64,
    user_id: i64,
    username: &str,
) -> Result<String, ApiError> {
    let expires = chrono::TimeDelta::try_days(session_days)
        .and_then(|ttl| chrono::Utc::now().checked_add_signed(ttl))
        .ok_or_else(|| {
            error!(session_days, "Session lifetime out of range");
            ApiError::Internal
        })?;

    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: expires.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        error!("Token encoding failed: {}", e);
        ApiError::Internal
    })
}

pub fn decode_token(secret: &str, token: &str) -> jsonwebtoken::errors::Result<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip_keeps_identity() {
        let token = create_token("s3cret", 1, 42, "ada").unwrap();
        let claims = decode_token("s3cret", &token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.username, "ada");
    }

    #[test]
    fn token_with_wrong_secret_is_rejected() {
        let token = create_token("s3cret", 1, 42, "ada").unwrap();
        assert!(decode_token("other", &token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = create_token("s3cret", -2, 42, "ada").unwrap();
        assert!(decode_token("s3cret", &token).is_err());
    }

    #[test]
    fn out_of_range_session_lifetime_is_an_error() {
        let err = create_token("s3cret", 1_000_000_000_000_000, 42, "ada").unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        assert!(create_token("s3cret", i64::MIN, 42, "ada").is_err());
    }

    #[test]
    fn password_hash_verifies_only_its_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("battery staple", &hash));
        assert!(!verify_password("correct horse", "not-a-hash"));
    }
}
