//! Bearer-token verification for the signaling upgrade.
//!
//! The credential arrives as a query parameter on the upgrade request
//! and is verified exactly once, before any envelope is processed. The
//! resulting [`Identity`] is bound immutably to the connection; every
//! relayed envelope is stamped with it, never with a client claim.

use crate::errors::AuthError;
use common::jwt::{within_size_limit, UserClaims};
use common::secret::{ExposeSecret, SecretString};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use std::fmt;

/// The authenticated principal bound to a connection.
///
/// Established once at connect time from the verified token's `sub`
/// claim; immutable for the connection's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    /// The identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Identity(value.to_string())
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Identity(value)
    }
}

/// Verifies bearer tokens against the shared signing secret.
///
/// Pure: holds a prepared decoding key and validation rules, performs
/// no I/O.
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    /// Build a verifier for HS256 tokens signed with `secret`.
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let decoding_key = DecodingKey::from_secret(secret.expose_secret().as_bytes());
        let validation = Validation::new(Algorithm::HS256);
        Self {
            decoding_key,
            validation,
        }
    }

    /// Verify a credential and extract the caller identity.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Missing`] when no token was supplied
    /// - [`AuthError::Invalid`] on oversized tokens, signature or expiry
    ///   failures, and tokens without a usable `sub` claim
    pub fn verify(&self, token: Option<&str>) -> Result<Identity, AuthError> {
        let token = token.filter(|t| !t.is_empty()).ok_or(AuthError::Missing)?;

        if !within_size_limit(token) {
            tracing::debug!(
                target: "relay.auth",
                token_size = token.len(),
                "token rejected: size exceeds maximum allowed"
            );
            return Err(AuthError::Invalid);
        }

        let data = jsonwebtoken::decode::<UserClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!(
                    target: "relay.auth",
                    error = %e,
                    "token rejected: verification failed"
                );
                AuthError::Invalid
            })?;

        if data.claims.sub.is_empty() {
            tracing::debug!(target: "relay.auth", "token rejected: empty subject claim");
            return Err(AuthError::Invalid);
        }

        Ok(Identity(data.claims.sub))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::jwt::MAX_TOKEN_SIZE_BYTES;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    const SECRET: &str = "unit-test-secret";

    fn now() -> i64 {
        #[allow(clippy::cast_possible_wrap)]
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock before epoch")
            .as_secs() as i64;
        secs
    }

    fn mint(secret: &str, sub: &str, exp_offset: i64) -> String {
        let claims = UserClaims::new(sub.to_string(), now() + exp_offset, now());
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("encode")
    }

    fn verifier() -> TokenVerifier {
        TokenVerifier::new(&SecretString::from(SECRET.to_string()))
    }

    #[test]
    fn valid_token_yields_identity() {
        let token = mint(SECRET, "u1", 3600);
        let identity = verifier().verify(Some(&token)).expect("should verify");
        assert_eq!(identity.as_str(), "u1");
        assert_eq!(identity, Identity::from("u1"));
    }

    #[test]
    fn missing_token_is_distinguished_from_invalid() {
        assert_eq!(verifier().verify(None), Err(AuthError::Missing));
        assert_eq!(verifier().verify(Some("")), Err(AuthError::Missing));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = mint("some-other-secret", "u1", 3600);
        assert_eq!(verifier().verify(Some(&token)), Err(AuthError::Invalid));
    }

    #[test]
    fn expired_token_is_rejected() {
        // Well past any validation leeway
        let token = mint(SECRET, "u1", -3600);
        assert_eq!(verifier().verify(Some(&token)), Err(AuthError::Invalid));
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert_eq!(
            verifier().verify(Some("not-a-token")),
            Err(AuthError::Invalid)
        );
    }

    #[test]
    fn oversized_token_is_rejected_before_parsing() {
        let oversized = "a".repeat(MAX_TOKEN_SIZE_BYTES + 1);
        assert_eq!(verifier().verify(Some(&oversized)), Err(AuthError::Invalid));
    }

    #[test]
    fn empty_subject_is_rejected() {
        let token = mint(SECRET, "", 3600);
        assert_eq!(verifier().verify(Some(&token)), Err(AuthError::Invalid));
    }
}
