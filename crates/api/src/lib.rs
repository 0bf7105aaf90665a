//! HTTP API: request gate, authorization guard, routing, and configuration.

pub mod app;
pub mod authz;
pub mod config;
pub mod context;
pub mod middleware;
