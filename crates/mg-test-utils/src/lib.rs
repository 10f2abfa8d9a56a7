//! Test utilities for Media Gateway integration and unit tests.
//!
//! Provides deterministic Ed25519 keypairs, a fluent token builder,
//! and a wiremock-backed mock issuer that serves a JWKS document.

pub mod issuer_harness;
pub mod token_builders;

pub use issuer_harness::MockIssuer;
pub use token_builders::{TestKeypair, TokenBuilder};
