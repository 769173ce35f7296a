pub mod auth;
pub mod webhooks;
