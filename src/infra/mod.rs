//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod github;
pub mod http;
pub mod local;
pub mod telemetry;
