use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::AppState;
use crate::auth::decode_token;
use crate::error::ApiError;

/// Session gate: extracts and validates the bearer token, then attaches its
/// claims to the request. Handlers read the current user from
/// `Extension<Claims>`.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized("not logged in"))?;

    let claims = decode_token(&state.jwt_secret, token).map_err(|e| {
        debug!("Rejected session token: {}", e);
        ApiError::Unauthorized("invalid or expired session")
    })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
