use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::AppError,
    models::{Role, User},
    repository::RepositoryState,
};

/// Header accepted in `Env::Local` in place of a bearer token.
pub const DEV_USER_HEADER: &str = "x-user-id";
const ACCESS_TOKEN_TYPE: &str = "access";

/// Claims
///
/// Payload of an issued access token (HS256).
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Always `"access"`; guards against other token kinds signed with the same key.
    pub token_type: String,
    /// Primary key of the account the token was issued for.
    pub user_id: i64,
    /// Unique token identifier.
    pub jti: String,
    /// Issued At (iat), UTC Unix timestamp.
    pub iat: i64,
    /// Expiration Time (exp), UTC Unix timestamp.
    pub exp: i64,
}

/// Issues a signed access token for `user`, valid for the configured lifetime.
pub fn issue_access_token(
    user: &User,
    config: &AppConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        token_type: ACCESS_TOKEN_TYPE.to_string(),
        user_id: user.id,
        jti: Uuid::new_v4().simple().to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::hours(config.access_token_ttl_hours)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret_key.as_bytes()),
    )
}

/// AuthUser
///
/// The resolved identity of an authenticated request. The role is re-read
/// from the database on every request, so role changes apply immediately.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub is_superuser: bool,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin || self.is_superuser
    }

    pub fn is_moderator(&self) -> bool {
        self.role == Role::Moderator
    }
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            role: user.role,
            is_superuser: user.is_superuser,
        }
    }
}

/// AuthUser Extractor Implementation
///
/// Resolution order:
/// 1. Local bypass: in `Env::Local`, an `x-user-id` header naming an existing
///    account is accepted.
/// 2. `Authorization: Bearer <jwt>` is decoded and validated (signature, expiry).
/// 3. The account is loaded, so tokens of deleted users stop working.
///
/// Rejection: `AppError::Unauthorized` (401) on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            if let Some(user_id) = parts
                .headers
                .get(DEV_USER_HEADER)
                .and_then(|value| value.to_str().ok())
                .and_then(|raw| raw.parse::<i64>().ok())
            {
                if let Some(user) = repo.get_user(user_id).await? {
                    return Ok(user.into());
                }
            }
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(AppError::Unauthorized(
                "Authentication credentials were not provided.",
            ))?;

        let decoding_key = DecodingKey::from_secret(config.secret_key.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let claims = decode::<Claims>(token, &decoding_key, &validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected bearer token");
                AppError::Unauthorized("Given token not valid for any token type")
            })?
            .claims;

        if claims.token_type != ACCESS_TOKEN_TYPE {
            return Err(AppError::Unauthorized(
                "Given token not valid for any token type",
            ));
        }

        let user = repo
            .get_user(claims.user_id)
            .await?
            .ok_or(AppError::Unauthorized("User not found"))?;

        Ok(user.into())
    }
}

/// Optional variant used by endpoints that also serve anonymous readers:
/// no credentials at all yields `None`, while invalid credentials are still
/// rejected with 401.
impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        let config = AppConfig::from_ref(state);
        let has_bearer = parts.headers.contains_key(header::AUTHORIZATION);
        let has_dev_header =
            config.env == Env::Local && parts.headers.contains_key(DEV_USER_HEADER);
        if !has_bearer && !has_dev_header {
            return Ok(None);
        }
        <AuthUser as FromRequestParts<S>>::from_request_parts(parts, state)
            .await
            .map(Some)
    }
}
