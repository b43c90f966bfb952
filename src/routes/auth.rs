use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::{
    models::auth::{AuthenticatedOwner, LoginRequest},
    services::{
        auth::{AuthService, LoginOutcome},
        owners::OwnerService,
    },
    tenancy::TenantOwner,
    AppState,
};

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let outcome = AuthService::login(
        &state.db,
        &body.email,
        &body.password,
        &state.config.jwt_secret,
        state.config.jwt_expiry_seconds,
    )
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?;

    match outcome {
        LoginOutcome::Authenticated(response) => Ok(Json(json!(response))),
        LoginOutcome::InvalidCredentials => Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Invalid email or password" })),
        )),
        LoginOutcome::TenantNotReady(status) => Err((
            StatusCode::CONFLICT,
            Json(json!({
                "error": "Tenant database is not ready",
                "status": status,
            })),
        )),
    }
}

/// GET /auth/me: the owner row, including provisioning state.
pub async fn me(
    State(state): State<AppState>,
    owner: AuthenticatedOwner,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let row = OwnerService::find(&state.db, owner.owner_id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?
        .ok_or((StatusCode::NOT_FOUND, Json(json!({ "error": "Owner not found" }))))?;

    Ok(Json(json!({
        "id": row.id,
        "name": row.name,
        "email": row.email,
        "database": row.database(),
        "provisioning_status": row.provisioning_status,
        "last_migration_version": row.last_migration_version,
        "provisioning_error": row.provisioning_error,
        "created_at": row.created_at,
    })))
}
