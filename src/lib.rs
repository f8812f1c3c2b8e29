//! Library crate for arranjo-back: room store, theme catalog, session controller and HTTP service.

/// Theme catalog loading and lookup.
pub mod catalog;
/// Runtime configuration.
pub mod config;
/// Data access: entities and room stores.
pub mod dao;
/// Wire types of the HTTP API.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// Axum route trees.
pub mod routes;
/// Business logic behind the routes.
pub mod services;
/// Participant session controller.
pub mod session;
/// Shared application state.
pub mod state;
