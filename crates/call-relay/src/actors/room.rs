//! `CallRoomActor` - per-call actor owning the two-party membership.
//!
//! Each `CallRoomActor`:
//! - Owns the membership map for one call (at most two occupants)
//! - Serializes join/leave/relay through its mailbox, so concurrent
//!   operations on one call never observe a half-applied membership
//! - Fans notifications out to occupants' outbound queues
//!
//! # Destroy-on-empty
//!
//! When the last occupant leaves, the actor reports itself idle to the
//! directory. Destruction is a second, confirmed step (`CloseIfEmpty`):
//! a join that lands in the mailbox before the confirm keeps the room
//! alive; a join that loses the race observes `Closed` and retries
//! against a fresh room.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::auth::Identity;
use crate::errors::JoinError;
use crate::signaling::protocol::Envelope;

use super::messages::{JoinSnapshot, PeerSender, RoomMessage};

/// Mailbox capacity for a room actor.
const ROOM_CHANNEL_BUFFER: usize = 64;

/// Maximum occupants of a session room.
pub const MAX_OCCUPANTS: usize = 2;

/// Handle to a `CallRoomActor`.
///
/// Every method degrades to a benign result when the actor is gone:
/// joins report [`JoinError::Closed`], leaves report no change.
#[derive(Clone)]
pub struct CallRoomHandle {
    sender: mpsc::Sender<RoomMessage>,
    call_id: String,
}

impl CallRoomHandle {
    /// The call this room serves.
    #[must_use]
    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    /// Take a slot in the room.
    pub async fn join(
        &self,
        identity: Identity,
        peer: PeerSender,
    ) -> Result<JoinSnapshot, JoinError> {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(RoomMessage::Join {
                identity,
                peer,
                respond_to: tx,
            })
            .await
            .is_err()
        {
            return Err(JoinError::Closed);
        }
        rx.await.unwrap_or(Err(JoinError::Closed))
    }

    /// Release a slot. Idempotent; returns whether membership changed.
    pub async fn leave(&self, identity: Identity) -> bool {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(RoomMessage::Leave {
                identity,
                respond_to: tx,
            })
            .await
            .is_err()
        {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// Forward an envelope to every occupant except `from`.
    pub async fn relay(&self, from: Identity, envelope: Envelope) {
        let _ = self.sender.send(RoomMessage::Relay { from, envelope }).await;
    }

    /// Confirm destruction: close the room if it is still empty.
    ///
    /// Returns true when the room closed (or was already gone).
    pub async fn close_if_empty(&self) -> bool {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(RoomMessage::CloseIfEmpty { respond_to: tx })
            .await
            .is_err()
        {
            return true;
        }
        rx.await.unwrap_or(true)
    }

    /// Current occupant count (0 when the actor is gone).
    pub async fn occupancy(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(RoomMessage::Occupancy { respond_to: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

/// The `CallRoomActor` implementation.
pub struct CallRoomActor {
    /// Call ID.
    call_id: String,
    /// Message receiver.
    receiver: mpsc::Receiver<RoomMessage>,
    /// Cancellation token (child of the directory's token).
    cancel_token: CancellationToken,
    /// Occupants by identity.
    members: HashMap<Identity, PeerSender>,
    /// Reports this room idle to the directory when it becomes empty.
    idle_notice: mpsc::UnboundedSender<String>,
}

impl CallRoomActor {
    /// Spawn a new room actor.
    ///
    /// Returns a handle and the task join handle.
    pub fn spawn(
        call_id: String,
        cancel_token: CancellationToken,
        idle_notice: mpsc::UnboundedSender<String>,
    ) -> (CallRoomHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(ROOM_CHANNEL_BUFFER);

        let actor = Self {
            call_id: call_id.clone(),
            receiver,
            cancel_token,
            members: HashMap::new(),
            idle_notice,
        };

        let task_handle = tokio::spawn(actor.run());
        let handle = CallRoomHandle { sender, call_id };

        (handle, task_handle)
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "relay.room", fields(call_id = %self.call_id))]
    async fn run(mut self) {
        debug!(target: "relay.room", "room actor started");

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    debug!(
                        target: "relay.room",
                        occupants = self.members.len(),
                        "room actor cancelled"
                    );
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            if self.handle_message(message).await {
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        debug!(target: "relay.room", "room actor stopped");
    }

    /// Handle a single message. Returns true when the room closed.
    async fn handle_message(&mut self, message: RoomMessage) -> bool {
        match message {
            RoomMessage::Join {
                identity,
                peer,
                respond_to,
            } => {
                let result = self.handle_join(identity, peer).await;
                let _ = respond_to.send(result);
                false
            }

            RoomMessage::Leave {
                identity,
                respond_to,
            } => {
                let changed = self.handle_leave(&identity).await;
                let _ = respond_to.send(changed);
                false
            }

            RoomMessage::Relay { from, envelope } => {
                self.handle_relay(&from, envelope).await;
                false
            }

            RoomMessage::CloseIfEmpty { respond_to } => {
                let empty = self.members.is_empty();
                let _ = respond_to.send(empty);
                if empty {
                    debug!(target: "relay.room", "room closing on confirmed empty");
                } else {
                    debug!(target: "relay.room", "room busy again, destruction aborted");
                }
                empty
            }

            RoomMessage::Occupancy { respond_to } => {
                let _ = respond_to.send(self.members.len());
                false
            }
        }
    }

    /// Handle a join attempt.
    async fn handle_join(
        &mut self,
        identity: Identity,
        peer: PeerSender,
    ) -> Result<JoinSnapshot, JoinError> {
        if self.members.contains_key(&identity) {
            return Err(JoinError::AlreadyPresent);
        }
        if self.members.len() >= MAX_OCCUPANTS {
            return Err(JoinError::Full);
        }

        // Notify current occupants before inserting, so the joiner is
        // never told about itself.
        let notice = Envelope::UserJoined {
            call_id: self.call_id.clone(),
            user_id: identity.to_string(),
        };
        for sender in self.members.values() {
            let _ = sender.send(notice.clone()).await;
        }

        self.members.insert(identity.clone(), peer);

        info!(
            target: "relay.room",
            identity = %identity,
            occupants = self.members.len(),
            "peer joined"
        );

        Ok(JoinSnapshot {
            occupants: self.members.len(),
        })
    }

    /// Handle a leave. Returns whether membership actually changed.
    ///
    /// Idempotent: a second leave for the same identity (explicit leave
    /// followed by transport close) is a no-op with no notification.
    async fn handle_leave(&mut self, identity: &Identity) -> bool {
        if self.members.remove(identity).is_none() {
            return false;
        }

        info!(
            target: "relay.room",
            identity = %identity,
            remaining = self.members.len(),
            "peer left"
        );

        let notice = Envelope::UserLeft {
            call_id: self.call_id.clone(),
            user_id: identity.to_string(),
        };
        for sender in self.members.values() {
            let _ = sender.send(notice.clone()).await;
        }

        if self.members.is_empty() {
            let _ = self.idle_notice.send(self.call_id.clone());
        }

        true
    }

    /// Forward `envelope` to every occupant except `from`.
    ///
    /// A lone sender's message is dropped silently: the peer may join
    /// moments later, and negotiation messages are not queued.
    async fn handle_relay(&mut self, from: &Identity, envelope: Envelope) {
        if !self.members.contains_key(from) {
            warn!(target: "relay.room", identity = %from, "relay from non-occupant dropped");
            return;
        }

        let mut delivered = 0usize;
        for (identity, sender) in &self.members {
            if identity != from {
                let _ = sender.send(envelope.clone()).await;
                delivered += 1;
            }
        }

        if delivered == 0 {
            debug!(target: "relay.room", "no peer present, message dropped");
        }
    }
}
