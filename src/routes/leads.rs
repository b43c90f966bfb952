use axum::{
    extract::{Path, Query},
    http::StatusCode,
    Json,
};

use crate::{
    middleware::tenant::TenantScope,
    models::lead::{CreateLeadRequest, Lead, LeadPage, LeadQuery},
    services::leads::LeadService,
    tenancy::TenantError,
};

pub async fn list_leads(
    TenantScope(context): TenantScope,
    Query(query): Query<LeadQuery>,
) -> Result<Json<LeadPage>, TenantError> {
    let page = LeadService::list(&context, &query).await?;
    Ok(Json(page))
}

pub async fn get_lead(
    TenantScope(context): TenantScope,
    Path(id): Path<i64>,
) -> Result<Json<Lead>, TenantError> {
    let lead = LeadService::find(&context, id).await?;
    Ok(Json(lead))
}

pub async fn create_lead(
    TenantScope(context): TenantScope,
    Json(body): Json<CreateLeadRequest>,
) -> Result<(StatusCode, Json<Lead>), TenantError> {
    validate(&body)?;
    let lead = LeadService::create(&context, &body).await?;
    Ok((StatusCode::CREATED, Json(lead)))
}

fn validate(body: &CreateLeadRequest) -> Result<(), TenantError> {
    if body.name.trim().is_empty() {
        return Err(TenantError::InvalidInput("Name is required".into()));
    }
    if !body.email.trim().is_empty() && !body.email.contains('@') {
        return Err(TenantError::InvalidInput("Invalid email address".into()));
    }
    Ok(())
}
