//! In-memory call registry implementations.

use async_trait::async_trait;
use call_relay::errors::RegistryError;
use call_relay::registry::{CallRecord, CallRegistry};
use std::collections::HashMap;

/// In-memory registry with a fixed set of calls.
#[derive(Debug, Default)]
pub struct StaticCallRegistry {
    calls: HashMap<String, CallRecord>,
}

impl StaticCallRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a call with its two designated participants.
    #[must_use]
    pub fn with_call(mut self, call_id: &str, initiator_id: &str, participant_id: &str) -> Self {
        self.calls.insert(
            call_id.to_string(),
            CallRecord {
                initiator_id: initiator_id.to_string(),
                participant_id: participant_id.to_string(),
            },
        );
        self
    }
}

#[async_trait]
impl CallRegistry for StaticCallRegistry {
    async fn get_call(&self, call_id: &str) -> Result<CallRecord, RegistryError> {
        self.calls
            .get(call_id)
            .cloned()
            .ok_or(RegistryError::NotFound)
    }
}

/// A registry that never answers, for exercising lookup timeouts.
#[derive(Debug, Default)]
pub struct PendingCallRegistry;

#[async_trait]
impl CallRegistry for PendingCallRegistry {
    async fn get_call(&self, _call_id: &str) -> Result<CallRecord, RegistryError> {
        std::future::pending().await
    }
}
