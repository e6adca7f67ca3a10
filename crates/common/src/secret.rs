//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports from the [`secrecy`] crate. `SecretString` and `SecretBox<T>`
//! implement `Debug` with redaction, so any struct that derives `Debug` and
//! holds one cannot leak its contents through `{:?}` formatting or tracing
//! fields. Values are zeroized when dropped.
//!
//! Use `SecretString` for the token-verification secret and anything else
//! that arrives from the environment and must never reach a log line.
//! Reading the actual value requires an explicit [`ExposeSecret::expose_secret`]
//! call, which keeps every access greppable.
//!
//! ```
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct Upstream {
//!     url: String,
//!     api_key: SecretString,
//! }
//!
//! let upstream = Upstream {
//!     url: "https://registry.internal".to_string(),
//!     api_key: SecretString::from("k-123456"),
//! };
//!
//! assert!(!format!("{upstream:?}").contains("k-123456"));
//! assert_eq!(upstream.api_key.expose_secret(), "k-123456");
//! ```

pub use secrecy::{ExposeSecret, SecretBox, SecretString};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_is_redacted() {
        let secret = SecretString::from("super-secret-value");
        let debug = format!("{secret:?}");
        assert!(!debug.contains("super-secret-value"));
    }

    #[test]
    fn expose_secret_returns_inner_value() {
        let secret = SecretString::from("super-secret-value");
        assert_eq!(secret.expose_secret(), "super-secret-value");
    }
}
