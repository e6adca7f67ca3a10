//! `RoomDirectoryActor` - singleton mapping call ids to room actors.
//!
//! The directory is the only creator and destroyer of rooms:
//!
//! - Rooms are created lazily on the first join for a call id
//! - Rooms report themselves idle when their last occupant leaves; the
//!   directory then runs the `CloseIfEmpty` confirm round and removes
//!   the room only when the confirmation holds
//!
//! Both halves of that lifecycle run inside the directory's single
//! message loop, so a join for a call can never interleave with that
//! call's destruction: it either reaches the room before the confirm
//! (aborting it) or observes `Closed` and creates a fresh room on
//! retry.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::RelayError;

use super::messages::{DirectoryMessage, DirectoryStatus};
use super::room::{CallRoomActor, CallRoomHandle};

/// Mailbox capacity for the directory actor.
const DIRECTORY_CHANNEL_BUFFER: usize = 256;

/// Bound on waiting for a room task to finish during removal/shutdown.
const ROOM_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the `RoomDirectoryActor`.
#[derive(Clone)]
pub struct RoomDirectoryHandle {
    sender: mpsc::Sender<DirectoryMessage>,
    cancel_token: CancellationToken,
}

impl RoomDirectoryHandle {
    /// Spawn the directory actor and return a handle to it.
    #[must_use]
    pub fn new(cancel_token: CancellationToken) -> Self {
        let (sender, receiver) = mpsc::channel(DIRECTORY_CHANNEL_BUFFER);
        let (idle_tx, idle_rx) = mpsc::unbounded_channel();

        let actor = RoomDirectoryActor {
            receiver,
            idle_rx,
            idle_tx,
            cancel_token: cancel_token.clone(),
            rooms: HashMap::new(),
        };

        tokio::spawn(actor.run());

        Self {
            sender,
            cancel_token,
        }
    }

    /// Resolve the room for `call_id`, creating it on first use.
    pub async fn get_or_create(&self, call_id: &str) -> Result<CallRoomHandle, RelayError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(DirectoryMessage::GetOrCreate {
                call_id: call_id.to_string(),
                respond_to: tx,
            })
            .await
            .map_err(|e| RelayError::Internal(format!("directory send failed: {e}")))?;

        rx.await
            .map_err(|e| RelayError::Internal(format!("directory response failed: {e}")))
    }

    /// Current directory status.
    pub async fn status(&self) -> DirectoryStatus {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(DirectoryMessage::Status { respond_to: tx })
            .await
            .is_err()
        {
            return DirectoryStatus { rooms: 0 };
        }
        rx.await.unwrap_or(DirectoryStatus { rooms: 0 })
    }

    /// Cancel the directory and every room under it.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the directory is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// Internal state for a managed room.
struct ManagedRoom {
    /// Handle to the room actor.
    handle: CallRoomHandle,
    /// Join handle for monitoring the actor task.
    task_handle: JoinHandle<()>,
}

/// The `RoomDirectoryActor` implementation.
struct RoomDirectoryActor {
    /// Message receiver.
    receiver: mpsc::Receiver<DirectoryMessage>,
    /// Idle notices from rooms whose last occupant left.
    idle_rx: mpsc::UnboundedReceiver<String>,
    /// Cloned into each spawned room; also keeps `idle_rx` open.
    idle_tx: mpsc::UnboundedSender<String>,
    /// Cancellation token (root for all rooms).
    cancel_token: CancellationToken,
    /// Managed rooms by call id.
    rooms: HashMap<String, ManagedRoom>,
}

impl RoomDirectoryActor {
    /// Run the actor message loop.
    async fn run(mut self) {
        info!(target: "relay.directory", "room directory started");

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    self.graceful_shutdown().await;
                    break;
                }

                Some(call_id) = self.idle_rx.recv() => {
                    self.handle_idle(&call_id).await;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => self.handle_message(message),
                        None => break,
                    }
                }
            }
        }

        info!(
            target: "relay.directory",
            rooms_remaining = self.rooms.len(),
            "room directory stopped"
        );
    }

    /// Handle a single message.
    fn handle_message(&mut self, message: DirectoryMessage) {
        match message {
            DirectoryMessage::GetOrCreate {
                call_id,
                respond_to,
            } => {
                let handle = self.get_or_create(call_id);
                let _ = respond_to.send(handle);
            }

            DirectoryMessage::Status { respond_to } => {
                let _ = respond_to.send(DirectoryStatus {
                    rooms: self.rooms.len(),
                });
            }
        }
    }

    /// Resolve or create the room for `call_id`.
    fn get_or_create(&mut self, call_id: String) -> CallRoomHandle {
        if let Some(managed) = self.rooms.get(&call_id) {
            return managed.handle.clone();
        }

        let room_token = self.cancel_token.child_token();
        let (handle, task_handle) =
            CallRoomActor::spawn(call_id.clone(), room_token, self.idle_tx.clone());

        info!(
            target: "relay.directory",
            call_id = %call_id,
            total_rooms = self.rooms.len() + 1,
            "room created"
        );

        self.rooms.insert(
            call_id,
            ManagedRoom {
                handle: handle.clone(),
                task_handle,
            },
        );

        handle
    }

    /// Handle an idle notice: confirm emptiness, then destroy.
    async fn handle_idle(&mut self, call_id: &str) {
        let Some(managed) = self.rooms.get(call_id) else {
            // Already destroyed by an earlier notice
            return;
        };

        if !managed.handle.close_if_empty().await {
            debug!(
                target: "relay.directory",
                call_id = %call_id,
                "idle room occupied again, kept"
            );
            return;
        }

        if let Some(managed) = self.rooms.remove(call_id) {
            info!(
                target: "relay.directory",
                call_id = %call_id,
                total_rooms = self.rooms.len(),
                "room destroyed"
            );

            // Don't block the message loop on the task winding down
            let call_id = call_id.to_string();
            tokio::spawn(async move {
                match tokio::time::timeout(ROOM_DRAIN_TIMEOUT, managed.task_handle).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        warn!(
                            target: "relay.directory",
                            call_id = %call_id,
                            error = ?e,
                            "room task failed during removal"
                        );
                    }
                    Err(_) => {
                        warn!(
                            target: "relay.directory",
                            call_id = %call_id,
                            "room task removal timed out"
                        );
                    }
                }
            });
        }
    }

    /// Wait for room tasks to finish after cancellation.
    async fn graceful_shutdown(&mut self) {
        info!(
            target: "relay.directory",
            rooms = self.rooms.len(),
            "directory shutting down"
        );

        // Child tokens are already cancelled with the root
        for (call_id, managed) in self.rooms.drain() {
            match tokio::time::timeout(ROOM_DRAIN_TIMEOUT, managed.task_handle).await {
                Ok(Ok(())) => {
                    debug!(target: "relay.directory", call_id = %call_id, "room drained");
                }
                Ok(Err(e)) => {
                    warn!(
                        target: "relay.directory",
                        call_id = %call_id,
                        error = ?e,
                        "room task failed during shutdown"
                    );
                }
                Err(_) => {
                    warn!(
                        target: "relay.directory",
                        call_id = %call_id,
                        "room shutdown timed out"
                    );
                }
            }
        }
    }
}
