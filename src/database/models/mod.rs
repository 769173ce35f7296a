pub mod activity;
pub mod client;
pub mod invoice;
pub mod payment;
pub mod rate_rule;
pub mod service_type;
pub mod user;
