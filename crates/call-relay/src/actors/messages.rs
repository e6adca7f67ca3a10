//! Messages exchanged with the room and directory actors.

use crate::auth::Identity;
use crate::errors::JoinError;
use crate::signaling::protocol::Envelope;
use tokio::sync::{mpsc, oneshot};

use super::room::CallRoomHandle;

/// Outbound queue feeding one connection's socket writer.
///
/// Rooms hold one of these per occupant; sends are best-effort (a peer
/// that disconnected mid-notification is simply missed).
pub type PeerSender = mpsc::Sender<Envelope>;

/// Snapshot returned from a successful join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinSnapshot {
    /// Occupant count including the joiner.
    pub occupants: usize,
}

/// Mailbox messages for a `CallRoomActor`.
pub enum RoomMessage {
    /// Take a slot in the room.
    Join {
        identity: Identity,
        peer: PeerSender,
        respond_to: oneshot::Sender<Result<JoinSnapshot, JoinError>>,
    },

    /// Release a slot. Responds with whether membership actually changed.
    Leave {
        identity: Identity,
        respond_to: oneshot::Sender<bool>,
    },

    /// Forward an envelope to every occupant except the sender.
    Relay { from: Identity, envelope: Envelope },

    /// Second phase of destroy-on-empty: close only if membership is
    /// still empty, and confirm either way.
    CloseIfEmpty { respond_to: oneshot::Sender<bool> },

    /// Current occupant count.
    Occupancy { respond_to: oneshot::Sender<usize> },
}

/// Mailbox messages for the `RoomDirectoryActor`.
pub enum DirectoryMessage {
    /// Resolve the room for a call, creating it on first join.
    GetOrCreate {
        call_id: String,
        respond_to: oneshot::Sender<CallRoomHandle>,
    },

    /// Current directory status.
    Status {
        respond_to: oneshot::Sender<DirectoryStatus>,
    },
}

/// Directory status snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryStatus {
    /// Number of live rooms.
    pub rooms: usize,
}
