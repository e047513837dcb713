//! Library crate for fleetdeck-back, exposing modules for binaries and integration tests.

/// Runtime configuration loading.
pub mod config;
/// Wire shapes for HTTP, WebSocket and SSE payloads.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// Axum routers.
pub mod routes;
/// Use-cases and background loops.
pub mod services;
/// Authoritative in-memory state.
pub mod state;
