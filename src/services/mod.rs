pub mod auth;
pub mod leads;
pub mod metrics;
pub mod owners;
