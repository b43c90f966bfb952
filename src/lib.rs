pub mod config;
pub mod db;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod tenancy;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

use config::Config;
use tenancy::{ConnectionRouter, TenantProvisioner};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Control-plane pool. Tenant data never goes through it.
    pub db: PgPool,
    pub config: Arc<Config>,
    pub router: ConnectionRouter,
    pub provisioner: Arc<TenantProvisioner>,
}

pub fn app(state: AppState) -> Router {
    // Tenant-scoped routes; the gate runs before every handler in here.
    let leads = Router::new()
        .route("/leads", get(routes::leads::list_leads).post(routes::leads::create_lead))
        .route("/leads/{id}", get(routes::leads::get_lead))
        .route_layer(from_fn_with_state(state.clone(), middleware::tenant::require_tenant_connection));

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::metrics::metrics_handler))
        .route("/signup", post(routes::signup::signup))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/me", get(routes::auth::me))
        .merge(leads)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
