//! Wire envelopes exchanged over the signaling socket.
//!
//! Every frame is one self-contained JSON envelope, tagged by `type`.
//! Negotiation payloads (`data`) are opaque to the relay: they are
//! parsed as raw JSON values and forwarded untouched.
//!
//! Inbound `userId` is accepted but never trusted; the server re-stamps
//! every relayed envelope with the sending connection's authenticated
//! identity via [`Envelope::stamp_sender`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One discrete signaling message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Envelope {
    /// Client request to join a call.
    #[serde(rename_all = "camelCase")]
    Join {
        call_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
    },

    /// Session description offer, relayed verbatim to the peer.
    #[serde(rename_all = "camelCase")]
    Offer {
        call_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        data: Value,
    },

    /// Session description answer, relayed verbatim to the peer.
    #[serde(rename_all = "camelCase")]
    Answer {
        call_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        data: Value,
    },

    /// Transport candidate, relayed verbatim to the peer.
    #[serde(rename_all = "camelCase")]
    IceCandidate {
        call_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        data: Value,
    },

    /// Client request to leave the joined call.
    #[serde(rename_all = "camelCase")]
    Leave {
        call_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
    },

    /// Server ack for a successful join; `count` includes the joiner.
    #[serde(rename_all = "camelCase")]
    Joined { call_id: String, count: usize },

    /// Server notice: another participant joined the call.
    #[serde(rename_all = "camelCase")]
    UserJoined { call_id: String, user_id: String },

    /// Server notice: a participant left the call.
    #[serde(rename_all = "camelCase")]
    UserLeft { call_id: String, user_id: String },

    /// Server notice: a request failed. The connection stays open.
    #[serde(rename_all = "camelCase")]
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
        message: String,
    },
}

/// Envelope kind, used by the dispatcher's routing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    Join,
    Offer,
    Answer,
    IceCandidate,
    Leave,
    Joined,
    UserJoined,
    UserLeft,
    Error,
}

impl EnvelopeKind {
    /// All kinds, in wire order. Used to enumerate the routing table.
    pub const ALL: [EnvelopeKind; 9] = [
        EnvelopeKind::Join,
        EnvelopeKind::Offer,
        EnvelopeKind::Answer,
        EnvelopeKind::IceCandidate,
        EnvelopeKind::Leave,
        EnvelopeKind::Joined,
        EnvelopeKind::UserJoined,
        EnvelopeKind::UserLeft,
        EnvelopeKind::Error,
    ];

    /// Wire name of this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            EnvelopeKind::Join => "join",
            EnvelopeKind::Offer => "offer",
            EnvelopeKind::Answer => "answer",
            EnvelopeKind::IceCandidate => "ice-candidate",
            EnvelopeKind::Leave => "leave",
            EnvelopeKind::Joined => "joined",
            EnvelopeKind::UserJoined => "user-joined",
            EnvelopeKind::UserLeft => "user-left",
            EnvelopeKind::Error => "error",
        }
    }
}

impl Envelope {
    /// The envelope's kind tag.
    #[must_use]
    pub const fn kind(&self) -> EnvelopeKind {
        match self {
            Envelope::Join { .. } => EnvelopeKind::Join,
            Envelope::Offer { .. } => EnvelopeKind::Offer,
            Envelope::Answer { .. } => EnvelopeKind::Answer,
            Envelope::IceCandidate { .. } => EnvelopeKind::IceCandidate,
            Envelope::Leave { .. } => EnvelopeKind::Leave,
            Envelope::Joined { .. } => EnvelopeKind::Joined,
            Envelope::UserJoined { .. } => EnvelopeKind::UserJoined,
            Envelope::UserLeft { .. } => EnvelopeKind::UserLeft,
            Envelope::Error { .. } => EnvelopeKind::Error,
        }
    }

    /// The call this envelope addresses, if any.
    #[must_use]
    pub fn call_id(&self) -> Option<&str> {
        match self {
            Envelope::Join { call_id, .. }
            | Envelope::Offer { call_id, .. }
            | Envelope::Answer { call_id, .. }
            | Envelope::IceCandidate { call_id, .. }
            | Envelope::Leave { call_id, .. }
            | Envelope::Joined { call_id, .. }
            | Envelope::UserJoined { call_id, .. }
            | Envelope::UserLeft { call_id, .. } => Some(call_id),
            Envelope::Error { call_id, .. } => call_id.as_deref(),
        }
    }

    /// Override the sender identity with the authenticated one.
    ///
    /// Client-supplied `userId` claims are never forwarded.
    pub fn stamp_sender(&mut self, sender_id: &str) {
        match self {
            Envelope::Join { user_id, .. }
            | Envelope::Offer { user_id, .. }
            | Envelope::Answer { user_id, .. }
            | Envelope::IceCandidate { user_id, .. }
            | Envelope::Leave { user_id, .. } => *user_id = Some(sender_id.to_string()),
            Envelope::Joined { .. }
            | Envelope::UserJoined { .. }
            | Envelope::UserLeft { .. }
            | Envelope::Error { .. } => {}
        }
    }

    /// Build an `error` envelope with a client-safe message.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Envelope::Error {
            call_id: None,
            message: message.into(),
        }
    }
}
