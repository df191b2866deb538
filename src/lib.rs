//! Multi-tenant edge: subdomain routing in front of a two-tier response cache
//! with ordered tag invalidation.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod routing;
