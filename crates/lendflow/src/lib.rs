//! Core library for the loan underwriting service: configuration, telemetry,
//! error scaffolding, and the staged underwriting workflow.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
