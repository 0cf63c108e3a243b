pub mod config;
pub mod error;
pub mod integrations;
pub mod records;
pub mod store;
pub mod telemetry;
pub mod workflows;
