//! Application services over the tenant registry and content store.

pub mod content;
pub mod error;
pub mod repos;
pub mod tenants;
