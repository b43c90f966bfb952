use serde::{Deserialize, Serialize};

use crate::tenancy::{TenantId, TenantOwner};

/// Claims embedded in the JWT access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // owner id
    pub exp: usize,
    pub iat: usize,
}

/// Extracted from the validated JWT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedOwner {
    pub owner_id: i64,
}

impl TenantOwner for AuthenticatedOwner {
    fn tenant_id(&self) -> TenantId {
        TenantId(self.owner_id)
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
}
