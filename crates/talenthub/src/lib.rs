pub mod access;
pub mod board;
pub mod config;
pub mod error;
pub mod query;
pub mod telemetry;
