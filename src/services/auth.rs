use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use sqlx::PgPool;

use crate::{
    models::{
        auth::{Claims, LoginResponse},
        owner::ProvisioningStatus,
    },
    services::{metrics::LOGINS_COUNTER, owners::OwnerService},
};

/// Result of a login attempt.
pub enum LoginOutcome {
    Authenticated(LoginResponse),
    InvalidCredentials,
    /// Credentials are valid but the tenant database is not usable yet.
    TenantNotReady(Option<ProvisioningStatus>),
}

pub struct AuthService;

impl AuthService {
    pub async fn login(
        pool: &PgPool,
        email: &str,
        password: &str,
        jwt_secret: &str,
        access_ttl: u64,
    ) -> anyhow::Result<LoginOutcome> {
        let Some(owner) = OwnerService::find_by_email(pool, email.trim()).await? else {
            LOGINS_COUNTER.with_label_values(&["invalid"]).inc();
            return Ok(LoginOutcome::InvalidCredentials);
        };

        if !bcrypt::verify(password, &owner.password_hash)? {
            LOGINS_COUNTER.with_label_values(&["invalid"]).inc();
            return Ok(LoginOutcome::InvalidCredentials);
        }

        let status = owner.status();
        if status != Some(ProvisioningStatus::Ready) {
            tracing::warn!(
                owner = owner.id,
                status = %owner.provisioning_status,
                "Login refused: tenant database not ready"
            );
            LOGINS_COUNTER.with_label_values(&["not_ready"]).inc();
            return Ok(LoginOutcome::TenantNotReady(status));
        }

        let access_token = Self::issue_access_token(owner.id, jwt_secret, access_ttl)?;
        LOGINS_COUNTER.with_label_values(&["ok"]).inc();

        Ok(LoginOutcome::Authenticated(LoginResponse {
            access_token,
            token_type: "Bearer",
            expires_in: access_ttl,
        }))
    }

    pub fn issue_access_token(owner_id: i64, jwt_secret: &str, access_ttl: u64) -> anyhow::Result<String> {
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: owner_id.to_string(),
            iat: now,
            exp: now + access_ttl as usize,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(jwt_secret.as_bytes()),
        )?;
        Ok(token)
    }
}
