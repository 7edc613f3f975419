use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;
use uuid::Uuid;

use super::{
    dto::TokenKind,
    jwt::{JwtKeys, TokenError},
};
use crate::error::ApiError;

/// Authenticated caller; rejects the request when no valid access token is sent.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

/// Caller identity on routes that also serve anonymous visitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Anonymous,
    User(Uuid),
}

impl Viewer {
    pub fn user_id(self) -> Option<Uuid> {
        match self {
            Viewer::Anonymous => None,
            Viewer::User(id) => Some(id),
        }
    }
}

impl From<AuthUser> for Viewer {
    fn from(AuthUser(id): AuthUser) -> Self {
        Viewer::User(id)
    }
}

fn bearer_token(parts: &Parts) -> Result<Option<&str>, ApiError> {
    let Some(header) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = header
        .to_str()
        .map_err(|_| ApiError::Unauthenticated("Invalid Authorization header".into()))?;
    value
        .strip_prefix("Bearer ")
        .map(Some)
        .ok_or_else(|| ApiError::Unauthenticated("Invalid Authorization header".into()))
}

fn access_subject(keys: &JwtKeys, token: &str) -> Result<Uuid, ApiError> {
    match keys.verify(token, TokenKind::Access) {
        Ok(claims) => Ok(claims.sub),
        Err(TokenError::WrongKind { .. }) => {
            Err(ApiError::Unauthenticated("Access token required".into()))
        }
        Err(e) => {
            warn!(error = %e, "rejected bearer token");
            Err(ApiError::Unauthenticated("Invalid or expired token".into()))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?
            .ok_or_else(|| ApiError::Unauthenticated("Missing Authorization header".into()))?;
        let keys = JwtKeys::from_ref(state);
        access_subject(&keys, token).map(AuthUser)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match bearer_token(parts)? {
            None => Ok(Viewer::Anonymous),
            Some(token) => {
                let keys = JwtKeys::from_ref(state);
                access_subject(&keys, token).map(Viewer::User)
            }
        }
    }
}
