//! Common utilities shared across Media Gateway components.

#![warn(clippy::pedantic)]

/// Module for JWT utilities (unverified envelope decoding, size limits,
/// clock-skew constants, JWK key decoding)
pub mod jwt;
