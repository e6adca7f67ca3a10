//! Bearer-token plumbing shared by the relay and its test utilities.
//!
//! The relay verifies tokens; the test utilities mint them. Both sides
//! need the same claims layout and the same pre-parse size limit, so
//! they live here rather than in the service crate.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE any decoding (denial-of-service
//!   prevention: an oversized token is rejected without allocating for
//!   base64 decode or running signature verification).
//! - The `sub` field carries the caller identity and is redacted in
//!   `Debug` output so claims can appear in error context without
//!   leaking who was calling.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum allowed token size in bytes (8 KB).
///
/// Typical tokens are a few hundred bytes; anything near this limit is
/// either misconfiguration or abuse. Checked before base64 decode and
/// signature verification.
pub const MAX_TOKEN_SIZE_BYTES: usize = 8192;

/// Claims carried by a caller's bearer token.
///
/// - `sub`: the authenticated identity (redacted in Debug output)
/// - `exp`: expiration timestamp (Unix epoch seconds)
/// - `iat`: issued-at timestamp (Unix epoch seconds)
#[derive(Clone, Serialize, Deserialize)]
pub struct UserClaims {
    /// Subject (caller identity) - redacted in Debug output.
    pub sub: String,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: i64,
}

impl UserClaims {
    /// Creates a new `UserClaims` instance.
    #[must_use]
    pub fn new(sub: String, exp: i64, iat: i64) -> Self {
        Self { sub, exp, iat }
    }
}

impl fmt::Debug for UserClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserClaims")
            .field("sub", &"[REDACTED]")
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .finish()
    }
}

/// Whether a raw token is within the pre-parse size limit.
#[must_use]
pub fn within_size_limit(token: &str) -> bool {
    token.len() <= MAX_TOKEN_SIZE_BYTES
}
