//! Verified JWT claims.
//!
//! These types deserialize the token payload during signature
//! verification; they are trusted only once `jsonwebtoken::decode`
//! has succeeded. The `sub` field is redacted in Debug output to keep
//! principal identifiers out of logs.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// The `aud` claim: a single audience string or a collection.
///
/// RFC 7519 allows either shape. Modeling it as a sum type (rather
/// than branching on a JSON value at check time) means the membership
/// check always runs against a normalized set.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Audience {
    /// `"aud": "media"`
    Single(String),
    /// `"aud": ["media", "other"]`
    Many(Vec<String>),
}

impl Audience {
    /// Whether the audience set contains `required`.
    pub fn contains(&self, required: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == required,
            Audience::Many(auds) => auds.iter().any(|aud| aud == required),
        }
    }

    /// Normalize to a set of audience values.
    pub fn values(&self) -> HashSet<&str> {
        match self {
            Audience::Single(aud) => HashSet::from([aud.as_str()]),
            Audience::Many(auds) => auds.iter().map(String::as_str).collect(),
        }
    }
}

/// JWT claims structure for verified tokens.
///
/// `iss`, `sub` and `aud` are required: the pre-check stage rejects
/// tokens lacking them before verification is attempted, and a token
/// without an `aud` could never pass the audience gate anyway.
#[derive(Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer URL - must match the issuer used for key lookup.
    pub iss: String,

    /// Subject (principal identifier) - redacted in Debug output.
    pub sub: String,

    /// Audience(s) the token is intended for.
    pub aud: Audience,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Not-before timestamp (Unix epoch seconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    /// Issued-at timestamp (Unix epoch seconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

/// Custom Debug implementation that redacts the `sub` field.
impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("iss", &self.iss)
            .field("sub", &"[REDACTED]")
            .field("aud", &self.aud)
            .field("exp", &self.exp)
            .field("nbf", &self.nbf)
            .field("iat", &self.iat)
            .finish()
    }
}
