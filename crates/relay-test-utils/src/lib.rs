//! Test utilities for the call relay.
//!
//! - [`registry`] - in-memory call registry implementations
//! - [`tokens`] - bearer-token minting for authenticated test clients

pub mod registry;
pub mod tokens;

pub use registry::{PendingCallRegistry, StaticCallRegistry};
pub use tokens::mint_token;
