pub mod accounts;
pub mod entitlements;
pub mod health_check;
pub mod messages;
pub mod notifications;
pub mod payments;
