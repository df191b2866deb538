//! Infrastructure adapters and runtime bootstrap.

pub mod content;
pub mod context;
pub mod error;
pub mod http;
pub mod origin;
pub mod telemetry;
pub mod tenants;
