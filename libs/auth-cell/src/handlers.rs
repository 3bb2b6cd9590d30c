use std::sync::Arc;

use axum::{
    extract::{Extension, State, Json},
    http::HeaderMap,
};
use serde_json::json;
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::{TokenResponse, User};
use shared_models::error::AppError;
use shared_utils::extractor::bearer_token_from_headers;
use shared_utils::jwt::validate_token as decode_token;

pub async fn validate_token(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Validating token");

    let token = bearer_token_from_headers(&headers)?;
    let user = decode_token(token, &config.supabase_jwt_secret).map_err(AppError::Auth)?;

    Ok(Json(TokenResponse {
        valid: true,
        user_id: user.id,
        email: user.email,
        role: user.role,
    }))
}

/// Never fails on a bad token; reports `{"valid": false}` instead.
pub async fn verify_token(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    debug!("Verifying token");

    let token = bearer_token_from_headers(&headers)?;
    let valid = decode_token(token, &config.supabase_jwt_secret).is_ok();

    Ok(Json(json!({ "valid": valid })))
}

/// Role resolved by the auth middleware for the calling user.
pub async fn get_role(Extension(user): Extension<User>) -> Json<serde_json::Value> {
    debug!("Resolved role {} for user {}", user.role, user.id);

    Json(json!({
        "role": user.role,
        "staff_code": user.staff_code
    }))
}
