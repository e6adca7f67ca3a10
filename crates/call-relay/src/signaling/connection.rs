//! Per-connection signaling handler.
//!
//! Each WebSocket gets one task running a [`ConnectionHandler`]:
//!
//! 1. The upgrade request's `token` query parameter is verified before
//!    any envelope is processed; failure closes the socket with close
//!    code 4401 and a reason naming the failure mode.
//! 2. The task select-loops over inbound frames, the outbound queue fed
//!    by its room, and the shutdown token.
//! 3. However the socket goes away - explicit leave, clean close, or a
//!    dropped transport - the leave cleanup path runs exactly once.
//!
//! The authenticated identity is bound at upgrade time and stamped onto
//! every relayed envelope; client-claimed `userId` fields are ignored.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::actors::directory::RoomDirectoryHandle;
use crate::actors::messages::JoinSnapshot;
use crate::actors::room::CallRoomHandle;
use crate::auth::{Identity, TokenVerifier};
use crate::errors::{AuthError, JoinError, RegistryError, RelayError, AUTH_FAILURE_CLOSE_CODE};
use crate::registry::CallRegistry;
use crate::signaling::dispatcher::{route, Action, HandlerState};
use crate::signaling::protocol::Envelope;

/// Outbound queue depth per connection.
const OUTBOUND_CHANNEL_BUFFER: usize = 64;

/// Close code sent to connections dropped by a server shutdown.
const GOING_AWAY_CLOSE_CODE: u16 = 1001;

/// Shared state injected into the upgrade handler.
#[derive(Clone)]
pub struct SignalingState {
    /// Verifies upgrade credentials.
    pub verifier: Arc<TokenVerifier>,
    /// Resolves calls and authorization.
    pub registry: Arc<dyn CallRegistry>,
    /// Upper bound on one registry lookup during join.
    pub registry_timeout: Duration,
    /// The room directory.
    pub directory: RoomDirectoryHandle,
    /// Root shutdown token; connections close when it cancels.
    pub shutdown: CancellationToken,
}

/// Query parameters accepted on the upgrade request.
#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    token: Option<String>,
}

/// Upgrade handler bound to the signaling path.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<SignalingState>,
) -> Response {
    match state.verifier.verify(params.token.as_deref()) {
        Ok(identity) => ws.on_upgrade(move |socket| {
            let handler = ConnectionHandler::new(identity, state);
            handler.run(socket)
        }),
        Err(error) => ws.on_upgrade(move |socket| close_unauthenticated(socket, error)),
    }
}

/// Close a socket that failed authentication at upgrade.
///
/// The upgrade is completed first so the client observes a close code
/// rather than an opaque handshake failure.
async fn close_unauthenticated(mut socket: WebSocket, error: AuthError) {
    debug!(target: "relay.connection", error = %error, "closing unauthenticated connection");
    let frame = CloseFrame {
        code: AUTH_FAILURE_CLOSE_CODE,
        reason: error.close_reason().into(),
    };
    let _ = socket.send(Message::Close(Some(frame))).await;
}

/// A connection's current room association.
struct JoinedCall {
    call_id: String,
    room: CallRoomHandle,
}

/// Per-connection state machine.
struct ConnectionHandler {
    /// Connection ID (log correlation).
    connection_id: Uuid,
    /// Authenticated identity, set exactly once at upgrade.
    identity: Identity,
    /// Shared relay state.
    state: SignalingState,
    /// The joined call, if any. `None` means `Authenticated` state.
    joined: Option<JoinedCall>,
    /// Sender half handed to rooms on join.
    outbound_tx: mpsc::Sender<Envelope>,
    /// Receiver half drained by the socket loop.
    outbound_rx: mpsc::Receiver<Envelope>,
}

impl ConnectionHandler {
    fn new(identity: Identity, state: SignalingState) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_BUFFER);
        Self {
            connection_id: Uuid::new_v4(),
            identity,
            state,
            joined: None,
            outbound_tx,
            outbound_rx,
        }
    }

    /// Run the connection loop until the socket or the process goes away.
    #[instrument(
        skip_all,
        name = "relay.connection",
        fields(connection_id = %self.connection_id, identity = %self.identity)
    )]
    async fn run(mut self, mut socket: WebSocket) {
        info!(target: "relay.connection", "connection established");

        let shutdown = self.state.shutdown.clone();

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    let frame = CloseFrame {
                        code: GOING_AWAY_CLOSE_CODE,
                        reason: "server shutting down".into(),
                    };
                    let _ = socket.send(Message::Close(Some(frame))).await;
                    break;
                }

                outbound = self.outbound_rx.recv() => {
                    // The sender half lives on self, so recv() cannot
                    // observe a closed channel here.
                    if let Some(envelope) = outbound {
                        if send_envelope(&mut socket, &envelope).await.is_err() {
                            break;
                        }
                    }
                }

                inbound = socket.recv() => {
                    match inbound {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(reply) = self.handle_text(&text).await {
                                if send_envelope(&mut socket, &reply).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Some(Ok(Message::Binary(_))) => {
                            let reply = Envelope::error(
                                RelayError::Malformed("binary frames are not supported".to_string())
                                    .client_message(),
                            );
                            if send_envelope(&mut socket, &reply).await.is_err() {
                                break;
                            }
                        }
                        // Ping/pong are answered by the websocket layer
                        Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(e)) => {
                            debug!(target: "relay.connection", error = %e, "socket error");
                            break;
                        }
                    }
                }
            }
        }

        self.cleanup().await;
        info!(target: "relay.connection", "connection closed");
    }

    /// Parse one text frame and dispatch it through the rule table.
    ///
    /// Returns the envelope to send back to this connection, if any.
    async fn handle_text(&mut self, text: &str) -> Option<Envelope> {
        let envelope: Envelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(target: "relay.connection", error = %e, "malformed envelope");
                return Some(Envelope::error(
                    RelayError::Malformed(e.to_string()).client_message(),
                ));
            }
        };

        let state = if self.joined.is_some() {
            HandlerState::InRoom
        } else {
            HandlerState::Authenticated
        };

        match route(state, envelope.kind()) {
            Action::AttemptJoin => self.attempt_join(envelope).await,
            Action::RelayToPeer => self.relay_to_peer(envelope).await,
            Action::ProcessLeave => self.process_leave().await,
            Action::Violation(reason) => {
                debug!(
                    target: "relay.connection",
                    kind = envelope.kind().as_str(),
                    reason = reason,
                    "protocol violation"
                );
                Some(Envelope::error(
                    RelayError::Protocol(reason.to_string()).client_message(),
                ))
            }
        }
    }

    /// Resolve, authorize, and join a call.
    async fn attempt_join(&mut self, envelope: Envelope) -> Option<Envelope> {
        let Envelope::Join { call_id, user_id } = envelope else {
            // route() only selects AttemptJoin for join envelopes
            return None;
        };

        if let Some(claimed) = user_id {
            if claimed != self.identity.as_str() {
                debug!(
                    target: "relay.connection",
                    claimed = %claimed,
                    "client-claimed identity ignored"
                );
            }
        }

        match self.join_call(&call_id).await {
            Ok(snapshot) => Some(Envelope::Joined {
                call_id,
                count: snapshot.occupants,
            }),
            Err(error) => {
                debug!(
                    target: "relay.connection",
                    call_id = %call_id,
                    error = %error,
                    "join rejected"
                );
                Some(Envelope::error(error.client_message()))
            }
        }
    }

    async fn join_call(&mut self, call_id: &str) -> Result<JoinSnapshot, RelayError> {
        let lookup = tokio::time::timeout(
            self.state.registry_timeout,
            self.state.registry.get_call(call_id),
        );
        let record = match lookup.await {
            Err(_) => {
                warn!(target: "relay.connection", call_id = %call_id, "registry lookup timed out");
                return Err(JoinError::RegistryTimeout.into());
            }
            Ok(Err(RegistryError::Timeout)) => return Err(JoinError::RegistryTimeout.into()),
            Ok(Err(RegistryError::NotFound)) => return Err(JoinError::CallNotFound.into()),
            Ok(Err(RegistryError::Unavailable(detail))) => {
                warn!(target: "relay.connection", call_id = %call_id, detail = %detail, "registry unavailable");
                return Err(RelayError::Internal(detail));
            }
            Ok(Ok(record)) => record,
        };

        if !record.authorizes(&self.identity) {
            return Err(JoinError::NotAuthorized.into());
        }

        loop {
            let room = self.state.directory.get_or_create(call_id).await?;
            match room.join(self.identity.clone(), self.outbound_tx.clone()).await {
                Ok(snapshot) => {
                    info!(
                        target: "relay.connection",
                        call_id = %call_id,
                        occupants = snapshot.occupants,
                        "joined call"
                    );
                    self.joined = Some(JoinedCall {
                        call_id: call_id.to_string(),
                        room,
                    });
                    return Ok(snapshot);
                }
                // The room confirmed destruction between lookup and
                // join; a fresh lookup creates a new one.
                Err(JoinError::Closed) => continue,
                Err(error) => return Err(error.into()),
            }
        }
    }

    /// Stamp the sender identity and forward to the joined room.
    async fn relay_to_peer(&mut self, mut envelope: Envelope) -> Option<Envelope> {
        let Some(joined) = &self.joined else {
            // route() only selects RelayToPeer in the InRoom state
            return None;
        };

        if envelope.call_id() != Some(joined.call_id.as_str()) {
            return Some(Envelope::error(
                RelayError::Protocol("message addressed to a different call".to_string())
                    .client_message(),
            ));
        }

        envelope.stamp_sender(self.identity.as_str());
        joined.room.relay(self.identity.clone(), envelope).await;
        None
    }

    /// Explicit leave: release the slot and forget the call.
    async fn process_leave(&mut self) -> Option<Envelope> {
        if let Some(joined) = self.joined.take() {
            joined.room.leave(self.identity.clone()).await;
            info!(target: "relay.connection", call_id = %joined.call_id, "left call");
        }
        None
    }

    /// Release room membership when the socket goes away.
    ///
    /// `joined` is cleared by an explicit leave, so the combination of
    /// leave envelope followed by transport close runs the room-side
    /// removal once; the room's leave is idempotent regardless.
    async fn cleanup(&mut self) {
        if let Some(joined) = self.joined.take() {
            joined.room.leave(self.identity.clone()).await;
            debug!(
                target: "relay.connection",
                call_id = %joined.call_id,
                "membership released on disconnect"
            );
        }
    }
}

/// Serialize and send one envelope; failures mean the socket is gone.
async fn send_envelope(socket: &mut WebSocket, envelope: &Envelope) -> Result<(), axum::Error> {
    match serde_json::to_string(envelope) {
        Ok(text) => socket.send(Message::Text(text)).await,
        Err(e) => {
            warn!(target: "relay.connection", error = %e, "failed to encode envelope");
            Ok(())
        }
    }
}
