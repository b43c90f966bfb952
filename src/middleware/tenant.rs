use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};

use crate::middleware::auth::authenticate;
use crate::tenancy::{TenantContext, TenantError, TenantOwner};
use crate::AppState;

/// Gate in front of every tenant-scoped route.
///
/// Authenticates the owner, activates their tenant connection on a fresh
/// [`TenantContext`] and hands both to the handler through request
/// extensions. The request is rejected before the handler runs when either
/// step fails.
pub async fn require_tenant_connection(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, TenantError> {
    let owner = authenticate(request.headers(), &state.config.jwt_secret)?;

    let context = TenantContext::new();
    if let Err(e) = state.router.activate(&context, &owner).await {
        tracing::warn!(
            owner = owner.owner_id,
            database = %owner.database(),
            "Tenant connection unavailable: {e}"
        );
        return Err(e);
    }

    request.extensions_mut().insert(owner);
    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

/// The tenant connection activated for this request.
#[derive(Debug, Clone)]
pub struct TenantScope(pub TenantContext);

impl<S> FromRequestParts<S> for TenantScope
where
    S: Send + Sync,
{
    type Rejection = TenantError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<TenantContext>() {
            Some(context) if context.is_bound() => Ok(TenantScope(context.clone())),
            _ => Err(TenantError::NoTenantContext),
        }
    }
}
