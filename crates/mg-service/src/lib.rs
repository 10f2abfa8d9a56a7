//! Media Gateway Service Library
//!
//! This library provides the core functionality for the Media Gateway -
//! a stateless authentication gateway in front of the file-upload
//! service, responsible for:
//!
//! - Bearer token verification (EdDSA-signed JWTs)
//! - Per-issuer signing-key resolution via JWKS endpoints
//! - Uniform 401 rejection with server-side failure categories
//!
//! # Architecture
//!
//! Requests flow through the middleware gate before reaching handlers:
//!
//! ```text
//! routes/mod.rs -> middleware/auth.rs -> auth/verifier.rs -> auth/resolver.rs
//! ```
//!
//! # Modules
//!
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `auth` - Token verification, claims, and key resolution
//! - `middleware` - Authentication gate and HTTP metrics
//! - `handlers` - HTTP request handlers
//! - `routes` - Axum router setup
//! - `observability` - Prometheus metrics

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;
