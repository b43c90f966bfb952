pub mod auth;
pub mod health;
pub mod leads;
pub mod metrics;
pub mod signup;
