//! HTTP API: configuration, routing, guards and request/response mapping.

pub mod app;
pub mod config;
pub mod middleware;
