use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use super::token::TokenKind;
use crate::db::{DbError, Role};
use crate::error::ApiError;
use crate::server::AppState;

/// Identity of the caller on a protected route, put in place by `require_auth`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("Unauthorized".to_string()))
    }
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers())
        .map(str::to_string)
        .ok_or_else(|| {
            debug!(path = %req.uri().path(), "Missing bearer token");
            ApiError::Unauthorized("Authorization header missing".to_string())
        })?;

    let claims = state.tokens.validate(&token, TokenKind::Access)?;

    if state.config.auth.enforce_revocation {
        let user = state
            .db
            .get_user_by_id(&claims.user_id)
            .await
            .map_err(|e| match e {
                DbError::NotFound(_) => ApiError::Unauthorized("Invalid or expired token".to_string()),
                other => other.into(),
            })?;
        if user.token.is_empty() || user.token != token {
            debug!(user_id = %claims.user_id, "Access token no longer current");
            return Err(ApiError::Unauthorized("Invalid or expired token".to_string()));
        }
    }

    req.extensions_mut().insert(AuthUser {
        user_id: claims.user_id,
        role: claims.role,
    });

    Ok(next.run(req).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
