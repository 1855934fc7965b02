pub mod app_state;
pub mod authentication;
pub mod configuration;
pub mod domain;
pub mod email_client;
pub mod entitlements;
pub mod notifications;
pub mod payment_client;
pub mod routes;
pub mod session_state;
pub mod startup;
pub mod subscriptions;
pub mod telemetry;
pub mod utils;
