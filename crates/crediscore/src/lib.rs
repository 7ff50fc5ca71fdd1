pub mod bureau;
pub mod config;
pub mod error;
pub mod telemetry;
