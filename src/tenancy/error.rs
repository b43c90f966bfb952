use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use super::TenantId;

pub type Result<T> = std::result::Result<T, TenantError>;

#[derive(Debug, Error)]
pub enum TenantError {
    #[error("Database {0} already exists")]
    DatabaseAlreadyExists(String),

    #[error("Permission denied creating database {database}: {reason}")]
    PermissionDenied { database: String, reason: String },

    #[error(
        "Migration {failed_version} failed on {database} (last applied: {}): {source}",
        describe_version(.last_applied_version)
    )]
    Migration {
        database: String,
        failed_version: i64,
        last_applied_version: Option<i64>,
        #[source]
        source: sqlx::Error,
    },

    #[error("Connection to {database} failed: {reason}")]
    Connection { database: String, reason: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("No tenant connection is bound to this unit of work")]
    NoTenantContext,

    #[error("Unit of work is already bound to tenant {bound}, refusing {requested}")]
    ContextAlreadyBound { bound: TenantId, requested: TenantId },

    #[error("Provisioning already running for tenant {0}")]
    ProvisioningInProgress(TenantId),

    #[error("Invalid migration set: {0}")]
    InvalidMigrationSet(String),

    #[error("Invalid request: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn describe_version(version: &Option<i64>) -> String {
    version.map_or_else(|| "none".to_string(), |v| v.to_string())
}

impl TenantError {
    pub fn connection(database: &str, reason: impl ToString) -> Self {
        Self::Connection {
            database: database.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Connection { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::DatabaseAlreadyExists(_) | Self::ProvisioningInProgress(_) => StatusCode::CONFLICT,
            Self::ContextAlreadyBound { .. } => StatusCode::FORBIDDEN,
            Self::Database(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for TenantError {
    fn into_response(self) -> Response {
        if matches!(self, Self::NoTenantContext) {
            tracing::error!("tenant-scoped access attempted without an activated connection");
        }
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
