//! Call registry collaborator.
//!
//! The registry owns call records; this core only queries it, once per
//! join attempt, to resolve a call's two designated participants and
//! decide authorization. The trait is injected as `Arc<dyn CallRegistry>`
//! so tests run against an in-memory implementation.

use crate::auth::Identity;
use crate::errors::RegistryError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// A call's two designated participants, as recorded by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    /// Identity that created the call.
    pub initiator_id: String,
    /// Identity invited to the call.
    pub participant_id: String,
}

impl CallRecord {
    /// Whether `identity` is one of the call's designated participants.
    #[must_use]
    pub fn authorizes(&self, identity: &Identity) -> bool {
        identity.as_str() == self.initiator_id || identity.as_str() == self.participant_id
    }
}

/// External source of call metadata.
#[async_trait]
pub trait CallRegistry: Send + Sync {
    /// Look up a call's participants.
    async fn get_call(&self, call_id: &str) -> Result<CallRecord, RegistryError>;
}

/// HTTP-backed registry client.
///
/// Each lookup is bounded by `lookup_timeout`; the join path treats an
/// elapsed deadline as [`RegistryError::Timeout`] so a connection task
/// never hangs on an unresponsive registry.
pub struct HttpCallRegistry {
    client: reqwest::Client,
    base_url: String,
    lookup_timeout: Duration,
}

impl HttpCallRegistry {
    /// Build a client for the registry at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, lookup_timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
            lookup_timeout,
        }
    }
}

#[async_trait]
impl CallRegistry for HttpCallRegistry {
    async fn get_call(&self, call_id: &str) -> Result<CallRecord, RegistryError> {
        let url = format!("{}/internal/calls/{call_id}", self.base_url);

        let response = self
            .client
            .get(&url)
            .timeout(self.lookup_timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    debug!(target: "relay.registry", call_id = %call_id, "lookup timed out");
                    RegistryError::Timeout
                } else {
                    RegistryError::Unavailable(e.to_string())
                }
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound);
        }
        if !response.status().is_success() {
            return Err(RegistryError::Unavailable(format!(
                "registry returned {}",
                response.status()
            )));
        }

        response.json::<CallRecord>().await.map_err(|e| {
            if e.is_timeout() {
                RegistryError::Timeout
            } else {
                RegistryError::Unavailable(e.to_string())
            }
        })
    }
}
