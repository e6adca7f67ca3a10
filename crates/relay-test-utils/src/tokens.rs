//! Bearer-token minting for authenticated test clients.

use common::jwt::UserClaims;
use jsonwebtoken::{encode, EncodingKey, Header};

/// Mint an HS256 token for `sub`, valid for `ttl_seconds` from now.
///
/// # Panics
///
/// Panics if encoding fails, which cannot happen for HS256.
#[must_use]
pub fn mint_token(secret: &str, sub: &str, ttl_seconds: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = UserClaims::new(sub.to_string(), now + ttl_seconds, now);
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("HS256 token encoding cannot fail")
}
