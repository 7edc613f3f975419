use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::dto::{Claims, TokenKind};
use crate::{config::JwtConfig, state::AppState};

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid or expired token")]
    Invalid(#[from] jsonwebtoken::errors::Error),
    #[error("expected a {expected:?} token, got {found:?}")]
    WrongKind { expected: TokenKind, found: TokenKind },
}

/// HMAC keys and the issuer/audience pair every token is bound to.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl From<&JwtConfig> for JwtKeys {
    fn from(cfg: &JwtConfig) -> Self {
        let secret = cfg.secret.as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::minutes(cfg.ttl_minutes.max(0)),
            refresh_ttl: Duration::minutes(cfg.refresh_ttl_minutes.max(0)),
        }
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        JwtKeys::from(&state.config.jwt)
    }
}

impl JwtKeys {
    fn lifetime(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    fn claims(&self, user_id: Uuid, kind: TokenKind, issued_at: OffsetDateTime) -> Claims {
        Claims {
            sub: user_id,
            iat: issued_at.unix_timestamp() as usize,
            exp: (issued_at + self.lifetime(kind)).unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        }
    }

    pub fn issue(&self, user_id: Uuid, kind: TokenKind) -> anyhow::Result<String> {
        let claims = self.claims(user_id, kind, OffsetDateTime::now_utc());
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(%user_id, ?kind, "token issued");
        Ok(token)
    }

    /// Checks signature, expiry, issuer and audience, then the token kind.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let mut validation = Validation::default();
        validation.set_audience(&[self.audience.as_str()]);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);

        let claims = decode::<Claims>(token, &self.decoding, &validation)?.claims;
        if claims.kind != expected {
            return Err(TokenError::WrongKind {
                expected,
                found: claims.kind,
            });
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(secret: &str, audience: &str) -> JwtKeys {
        JwtKeys::from(&JwtConfig {
            secret: secret.into(),
            issuer: "foodgram".into(),
            audience: audience.into(),
            ttl_minutes: 15,
            refresh_ttl_minutes: 60 * 24,
        })
    }

    #[test]
    fn token_names_the_user_it_was_issued_for() {
        let keys = keys("kitchen", "cooks");
        let cook = Uuid::new_v4();
        let token = keys.issue(cook, TokenKind::Access).unwrap();
        assert_eq!(keys.verify(&token, TokenKind::Access).unwrap().sub, cook);
    }

    #[test]
    fn refresh_outlives_access() {
        let keys = keys("kitchen", "cooks");
        let now = OffsetDateTime::now_utc();
        let access = keys.claims(Uuid::nil(), TokenKind::Access, now);
        let refresh = keys.claims(Uuid::nil(), TokenKind::Refresh, now);
        assert_eq!(access.exp - access.iat, 15 * 60);
        assert!(refresh.exp > access.exp);
    }

    #[test]
    fn kinds_are_not_interchangeable() {
        let keys = keys("kitchen", "cooks");
        let refresh = keys.issue(Uuid::new_v4(), TokenKind::Refresh).unwrap();
        let access = keys.issue(Uuid::new_v4(), TokenKind::Access).unwrap();

        assert!(matches!(
            keys.verify(&refresh, TokenKind::Access),
            Err(TokenError::WrongKind {
                expected: TokenKind::Access,
                found: TokenKind::Refresh
            })
        ));
        assert!(matches!(
            keys.verify(&access, TokenKind::Refresh),
            Err(TokenError::WrongKind { .. })
        ));
    }

    #[test]
    fn expired_token_is_invalid() {
        let keys = keys("kitchen", "cooks");
        let long_ago = OffsetDateTime::now_utc() - Duration::days(2);
        let stale = keys.claims(Uuid::new_v4(), TokenKind::Access, long_ago);
        let token = encode(&Header::default(), &stale, &keys.encoding).unwrap();
        assert!(matches!(
            keys.verify(&token, TokenKind::Access),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn foreign_secret_or_audience_is_invalid() {
        let ours = keys("kitchen", "cooks");
        let token = ours.issue(Uuid::new_v4(), TokenKind::Access).unwrap();

        assert!(keys("pantry", "cooks")
            .verify(&token, TokenKind::Access)
            .is_err());
        assert!(keys("kitchen", "waiters")
            .verify(&token, TokenKind::Access)
            .is_err());
    }
}
