//! Signed session tokens.
//!
//! Access and refresh tokens carry the same claims but are signed with
//! different HS256 secrets, so one kind can never be accepted as the other.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::db::{DbResult, Role, User, UserRepo};

pub const ACCESS_TOKEN_TTL_HOURS: i64 = 24;
pub const REFRESH_TOKEN_TTL_HOURS: i64 = 168;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn ttl(&self) -> Duration {
        match self {
            TokenKind::Access => Duration::hours(ACCESS_TOKEN_TTL_HOURS),
            TokenKind::Refresh => Duration::hours(REFRESH_TOKEN_TTL_HOURS),
        }
    }
}

/// Verified identity a token pair is issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Identity {
            user_id: user.user_id.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub user_id: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    /// Unique per issued token.
    pub jti: String,
}

impl Claims {
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.user_id.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            role: self.role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("malformed token")]
    Malformed,
    #[error("bad token signature")]
    BadSignature,
    #[error("failed to sign token: {0}")]
    Encoding(jsonwebtoken::errors::Error),
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Keys {
    fn new(secret: &str) -> Self {
        Keys {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

pub struct TokenService {
    access: Keys,
    refresh: Keys,
    issuer: String,
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Self {
        TokenService {
            access: Keys::new(&config.access_secret),
            refresh: Keys::new(&config.refresh_secret),
            issuer: config.issuer.clone(),
        }
    }

    fn keys(&self, kind: TokenKind) -> &Keys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    pub fn issue(&self, identity: &Identity) -> Result<TokenPair, TokenError> {
        self.issue_at(identity, Utc::now())
    }

    /// Issue a pair as if it were `now`.
    pub fn issue_at(&self, identity: &Identity, now: DateTime<Utc>) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.sign(TokenKind::Access, identity, now)?,
            refresh_token: self.sign(TokenKind::Refresh, identity, now)?,
        })
    }

    fn sign(&self, kind: TokenKind, identity: &Identity, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = Claims {
            email: identity.email.clone(),
            first_name: identity.first_name.clone(),
            last_name: identity.last_name.clone(),
            role: identity.role,
            user_id: identity.user_id.clone(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: (now + kind.ttl()).timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.keys(kind).encoding,
        )
        .map_err(TokenError::Encoding)
    }

    /// Check signature, algorithm, issuer and expiry. Stored tokens are not
    /// consulted, so a revoked but unexpired token still validates.
    pub fn validate(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iat", "iss"]);

        let data = decode::<Claims>(token, &self.keys(kind).decoding, &validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    TokenError::BadSignature
                }
                _ => TokenError::Malformed,
            },
        )?;

        // The library accepts exp == now; expiry is exclusive here.
        if data.claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(data.claims)
    }

    pub async fn persist<R: UserRepo + ?Sized>(
        &self,
        users: &R,
        user_id: &str,
        pair: &TokenPair,
    ) -> DbResult<()> {
        users
            .update_tokens(user_id, &pair.access_token, &pair.refresh_token, Utc::now())
            .await
    }

    pub async fn revoke<R: UserRepo + ?Sized>(&self, users: &R, user_id: &str) -> DbResult<()> {
        users.update_tokens(user_id, "", "", Utc::now()).await
    }
}
