use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::{
    models::owner::{ProvisioningStatus, SignupRequest},
    services::owners::OwnerService,
    tenancy::TenantOwner,
    AppState,
};

type ApiError = (StatusCode, Json<Value>);

fn bad_request(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

/// POST /signup: creates the owner, then provisions their tenant database
/// before answering.
pub async fn signup(
    State(state): State<AppState>,
    Json(body): Json<SignupRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let name = body.name.trim();
    let email = body.email.trim().to_lowercase();

    if name.is_empty() {
        return Err(bad_request("Name is required"));
    }
    if !email.contains('@') {
        return Err(bad_request("Invalid email address"));
    }
    if body.password.len() < 8 {
        return Err(bad_request("Password must be at least 8 characters"));
    }

    let password_hash = bcrypt::hash(&body.password, 12)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?;

    let owner = match OwnerService::create(&state.db, name, &email, &password_hash).await {
        Ok(owner) => owner,
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err((
                StatusCode::CONFLICT,
                Json(json!({ "error": "An account already exists for this email" })),
            ));
        }
        Err(e) => {
            return Err((StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))));
        }
    };

    tracing::info!(owner = owner.id, database = %owner.database(), "Owner created, provisioning tenant database");

    let version = OwnerService::provision(state.db.clone(), state.provisioner.clone(), owner.clone())
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": format!("Tenant provisioning failed: {e}"),
                    "owner_id": owner.id,
                    "status": ProvisioningStatus::Failed,
                })),
            )
        })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": owner.id,
            "name": owner.name,
            "email": owner.email,
            "database": owner.database(),
            "status": ProvisioningStatus::Ready,
            "migration_version": version,
        })),
    ))
}
