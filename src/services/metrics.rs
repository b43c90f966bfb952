use lazy_static::lazy_static;
use prometheus::{register_counter, register_counter_vec, register_gauge, Counter, CounterVec, Gauge};

lazy_static! {
    pub static ref PROVISIONING_COUNTER: CounterVec = register_counter_vec!(
        "tenant_provisioning_total",
        "Tenant provisioning attempts by outcome",
        &["status"]
    ).unwrap();

    pub static ref MIGRATIONS_COUNTER: Counter = register_counter!(
        "tenant_migrations_applied_total",
        "Tenant migrations applied"
    ).unwrap();

    pub static ref ACTIVATIONS_COUNTER: CounterVec = register_counter_vec!(
        "tenant_activations_total",
        "Tenant connection activations by outcome",
        &["status"]
    ).unwrap();

    pub static ref LOGINS_COUNTER: CounterVec = register_counter_vec!(
        "api_logins_total",
        "Login attempts by status",
        &["status"]
    ).unwrap();

    pub static ref TENANT_CONNECTIONS_GAUGE: Gauge = register_gauge!(
        "tenant_connections_cached",
        "Tenant connection pools currently cached"
    ).unwrap();
}
