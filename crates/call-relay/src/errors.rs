//! Relay error types.
//!
//! Split along the fault lines of the protocol: authentication failures
//! are fatal to the connection, join failures and protocol violations
//! are reported back as `error` envelopes while the connection stays
//! open. Internal details are logged server-side and never exposed to
//! clients.

use thiserror::Error;

/// WebSocket close code sent when authentication fails at upgrade time.
pub const AUTH_FAILURE_CLOSE_CODE: u16 = 4401;

/// Credential verification failures.
///
/// Fatal to the connection: the socket is closed with
/// [`AUTH_FAILURE_CLOSE_CODE`] and no envelope is ever processed.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// No credential was supplied on the upgrade request.
    #[error("missing credential")]
    Missing,

    /// The credential failed verification or carried no usable identity.
    #[error("invalid credential")]
    Invalid,
}

impl AuthError {
    /// Close reason string distinguishing the failure mode.
    #[must_use]
    pub const fn close_reason(&self) -> &'static str {
        match self {
            AuthError::Missing => "authentication failed: missing credential",
            AuthError::Invalid => "authentication failed: invalid credential",
        }
    }
}

/// Failures of a join attempt.
///
/// Recoverable: reported to the requesting connection as an `error`
/// envelope; the connection remains open and may retry or leave.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    /// The call already has two occupants.
    #[error("call is full")]
    Full,

    /// This identity already occupies a slot in the call.
    #[error("already joined this call")]
    AlreadyPresent,

    /// The identity is not one of the call's designated participants.
    #[error("not a participant of this call")]
    NotAuthorized,

    /// The call registry has no such call.
    #[error("call not found")]
    CallNotFound,

    /// The call registry did not answer in time.
    #[error("call lookup timed out")]
    RegistryTimeout,

    /// The room confirmed destruction between lookup and join. The
    /// caller retries against a fresh room; never reported to clients.
    #[error("room closed")]
    Closed,
}

/// Call registry lookup failures.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The registry has no record of the call.
    #[error("call not found")]
    NotFound,

    /// The lookup exceeded its deadline.
    #[error("registry lookup timed out")]
    Timeout,

    /// Transport or server-side failure reaching the registry.
    #[error("registry unavailable: {0}")]
    Unavailable(String),
}

/// Top-level relay error.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Credential verification failed.
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// A join attempt was rejected.
    #[error("join error: {0}")]
    Join(#[from] JoinError),

    /// An envelope kind was invalid for the connection's current state.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// An inbound frame could not be parsed into an envelope.
    #[error("malformed envelope: {0}")]
    Malformed(String),

    /// Unexpected internal failure. Details are logged, not sent.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<RegistryError> for RelayError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound => RelayError::Join(JoinError::CallNotFound),
            RegistryError::Timeout => RelayError::Join(JoinError::RegistryTimeout),
            RegistryError::Unavailable(detail) => RelayError::Internal(detail),
        }
    }
}

impl RelayError {
    /// Client-safe message for an `error` envelope (no internal details).
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            RelayError::Auth(e) => e.to_string(),
            RelayError::Join(JoinError::Closed) | RelayError::Internal(_) => {
                "An internal error occurred".to_string()
            }
            RelayError::Join(e) => e.to_string(),
            RelayError::Protocol(msg) => format!("protocol violation: {msg}"),
            RelayError::Malformed(msg) => format!("malformed envelope: {msg}"),
        }
    }
}
