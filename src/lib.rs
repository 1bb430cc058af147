//! Auth Backend API.
//!
//! Small axum service that authenticates requests with JWTs issued by an Appwrite
//! project (verified against the project's JWKS) and serves a few sample endpoints.
pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;
