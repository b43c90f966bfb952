use crate::{
    models::lead::{CreateLeadRequest, Lead, LeadPage, LeadQuery},
    tenancy::{Result, TenantContext, TenantError},
};

/// Lead storage. Every call runs on the connection bound to `context` and
/// fails with `NoTenantContext` before touching any database when unbound.
pub struct LeadService;

impl LeadService {
    pub async fn list(context: &TenantContext, query: &LeadQuery) -> Result<LeadPage> {
        let source = context.require()?;
        Ok(source.database().list_leads(query).await?)
    }

    pub async fn find(context: &TenantContext, id: i64) -> Result<Lead> {
        let source = context.require()?;
        source
            .database()
            .find_lead(id)
            .await?
            .ok_or(TenantError::Database(sqlx::Error::RowNotFound))
    }

    pub async fn create(context: &TenantContext, req: &CreateLeadRequest) -> Result<Lead> {
        let source = context.require()?;
        let lead = source.database().insert_lead(req).await?;
        tracing::debug!(tenant = %source.tenant_id(), lead = lead.id, "Created lead");
        Ok(lead)
    }
}
