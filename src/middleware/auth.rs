use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::error::ChronikosError;
use crate::router::AppState;

/// Claims of the auth provider's access token that the service relies on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub exp: i64,
}

/// Verifies HS256 access tokens issued by the hosted auth provider.
///
/// Without a secret there is no key, and every token is rejected.
#[derive(Clone)]
pub struct TokenVerifier {
    key: Option<DecodingKey>,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str, audience: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[audience]);
        Self {
            key: (!secret.is_empty()).then(|| DecodingKey::from_secret(secret.as_bytes())),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<AccessClaims, ChronikosError> {
        let Some(key) = self.key.as_ref() else {
            debug!("no jwt secret configured; access token rejected");
            return Err(ChronikosError::Unauthorized(
                "token verification is not configured".to_string(),
            ));
        };
        decode::<AccessClaims>(token, key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "access token rejected");
                ChronikosError::Unauthorized("invalid access token".to_string())
            })
    }
}

/// An authenticated end user, taken from `Authorization: Bearer` or the session cookie.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let auth = headers.get("authorization")?.to_str().ok()?.trim();
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ChronikosError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = match bearer_token(&parts.headers) {
            Some(token) => token.to_string(),
            None => CookieJar::from_headers(&parts.headers)
                .get(&state.config.auth.cookie_name)
                .map(|c| c.value().to_string())
                .ok_or_else(|| ChronikosError::Unauthorized("missing access token".to_string()))?,
        };

        let claims = state.verifier.verify(&token)?;
        Ok(AuthUser {
            user_id: claims.sub,
        })
    }
}

/// Guard for cron/admin routes: `Authorization: Bearer <cron_secret>` when a secret is configured.
#[derive(Debug, Clone, Copy)]
pub struct RequireCronSecret;

pub fn ensure_cron_secret(headers: &HeaderMap, expected: Option<&str>) -> Result<(), ChronikosError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    match bearer_token(headers) {
        Some(token) if bool::from(token.as_bytes().ct_eq(expected.as_bytes())) => Ok(()),
        _ => Err(ChronikosError::Unauthorized("invalid cron secret".to_string())),
    }
}

impl FromRequestParts<AppState> for RequireCronSecret {
    type Rejection = ChronikosError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        ensure_cron_secret(&parts.headers, state.config.auth.cron_secret.as_deref())?;
        Ok(Self)
    }
}
