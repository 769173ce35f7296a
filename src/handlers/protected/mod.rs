pub mod activities;
pub mod invoices;
pub mod rate_rules;
pub mod service_types;
