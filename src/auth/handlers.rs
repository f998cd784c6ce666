use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use axum_extra::extract::CookieJar;
use chrono::Utc;
use tracing::{debug, info};
use validator::Validate;

use super::cookies::{cleared_cookies, session_cookies, CookieHeaders, REFRESH_COOKIE};
use super::middleware::AuthUser;
use super::password::{hash_password, verify_password};
use super::token::{Identity, TokenKind};
use super::types::*;
use crate::db::{DbError, User};
use crate::error::ApiError;
use crate::server::AppState;

fn invalid_credentials() -> ApiError {
    ApiError::Unauthorized("Invalid email or password".to_string())
}

pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let Json(req) = body?;
    req.validate()?;

    let conflict = || ApiError::Conflict("User with this email already exists".to_string());

    if state.db.count_users_by_email(&req.email).await? > 0 {
        return Err(conflict());
    }

    let hash = hash_password(&req.password, state.config.auth.bcrypt_cost)
        .await
        .map_err(|e| ApiError::internal("Error hashing password", e))?;

    let now = Utc::now();
    let user = User {
        user_id: uuid::Uuid::new_v4().to_string(),
        first_name: req.first_name,
        last_name: req.last_name,
        email: req.email,
        password: hash,
        role: req.role,
        favourite_genres: req.favourite_genres,
        token: String::new(),
        refresh_token: String::new(),
        created_at: now,
        updated_at: now,
    };

    // The unique index catches a registration that raced past the count.
    state.db.insert_user(&user).await.map_err(|e| match e {
        DbError::AlreadyExists(_) => conflict(),
        other => other.into(),
    })?;

    info!(user_id = %user.user_id, role = user.role.as_str(), "Registered user");

    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieHeaders, Json<UserResponse>), ApiError> {
    let Json(req) = body?;

    let user = match state.db.get_user_by_email(&req.email).await {
        Ok(user) => user,
        Err(DbError::NotFound(_)) => return Err(invalid_credentials()),
        Err(e) => return Err(e.into()),
    };

    let matches = verify_password(&req.password, &user.password)
        .await
        .map_err(|e| ApiError::internal("Error verifying password", e))?;
    if !matches {
        debug!(user_id = %user.user_id, "Password mismatch");
        return Err(invalid_credentials());
    }

    let pair = state.tokens.issue(&Identity::from(&user))?;
    state
        .tokens
        .persist(state.db.as_ref(), &user.user_id, &pair)
        .await
        .map_err(|e| ApiError::internal("Error updating tokens", e))?;

    info!(user_id = %user.user_id, "User logged in");

    Ok((session_cookies(&pair), Json(UserResponse::from(&user))))
}

pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieHeaders, Json<MessageResponse>), ApiError> {
    let token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Refresh token not found".to_string()))?;

    let invalid = || ApiError::Unauthorized("Invalid refresh token".to_string());

    let claims = state
        .tokens
        .validate(&token, TokenKind::Refresh)
        .map_err(|e| {
            debug!("Refresh token rejected: {}", e);
            invalid()
        })?;

    let user = state
        .db
        .get_user_by_id(&claims.user_id)
        .await
        .map_err(|e| match e {
            DbError::NotFound(_) => ApiError::Unauthorized("User not found".to_string()),
            other => other.into(),
        })?;

    if state.config.auth.enforce_revocation && user.refresh_token != token {
        debug!(user_id = %user.user_id, "Refresh token no longer current");
        return Err(invalid());
    }

    let pair = state.tokens.issue(&Identity::from(&user))?;
    state
        .tokens
        .persist(state.db.as_ref(), &user.user_id, &pair)
        .await
        .map_err(|e| ApiError::internal("Error updating tokens", e))?;

    Ok((
        session_cookies(&pair),
        Json(MessageResponse::new("Tokens refreshed successfully")),
    ))
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| {
            let mime = mime.trim();
            mime.eq_ignore_ascii_case("application/json") || mime.ends_with("+json")
        })
        .unwrap_or(false)
}

/// Clears the caller's own stored tokens. The body is optional; a `user_id`
/// in it is accepted for older clients but must name the caller.
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(CookieHeaders, Json<MessageResponse>), ApiError> {
    let req = if body.iter().all(u8::is_ascii_whitespace) || !is_json(&headers) {
        LogoutRequest { user_id: None }
    } else {
        let Json(req) = Json::<LogoutRequest>::from_bytes(&body)?;
        req
    };

    if let Some(ref user_id) = req.user_id {
        if user_id != &auth.user_id {
            return Err(ApiError::Forbidden(
                "Cannot log out another user".to_string(),
            ));
        }
    }

    state
        .tokens
        .revoke(state.db.as_ref(), &auth.user_id)
        .await
        .map_err(|e| ApiError::internal("Error logging out user", e))?;

    info!(user_id = %auth.user_id, "User logged out");

    Ok((
        cleared_cookies(),
        Json(MessageResponse::new("User logged out successfully")),
    ))
}
