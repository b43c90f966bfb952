use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::models::auth::{AuthenticatedOwner, Claims};
use crate::tenancy::TenantError;
use crate::AppState;

impl FromRequestParts<AppState> for AuthenticatedOwner {
    type Rejection = TenantError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // Already authenticated by the tenant gate.
        if let Some(owner) = parts.extensions.get::<AuthenticatedOwner>() {
            return Ok(*owner);
        }
        authenticate(&parts.headers, &state.config.jwt_secret)
    }
}

/// Reads and validates the bearer token of a request.
pub fn authenticate(headers: &HeaderMap, secret: &str) -> Result<AuthenticatedOwner, TenantError> {
    let auth_header = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| TenantError::Unauthorized("Missing Authorization header".into()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| TenantError::Unauthorized("Invalid Authorization header format".into()))?;

    decode_access_token(token, secret)
        .map_err(|_| TenantError::Unauthorized("Invalid or expired token".into()))
}

pub fn decode_access_token(token: &str, secret: &str) -> Result<AuthenticatedOwner, anyhow::Error> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let data = decode::<Claims>(token, &key, &validation)?;

    Ok(AuthenticatedOwner {
        owner_id: data.claims.sub.parse()?,
    })
}
