//! Call Relay Library
//!
//! A stateful WebSocket signaling server that brokers WebRTC session
//! setup between exactly two peers per call. The relay:
//!
//! - Authenticates each connection at upgrade time and binds the
//!   identity immutably to the connection
//! - Resolves calls and authorization through an external call registry
//! - Enforces the two-party capacity invariant per call
//! - Relays opaque negotiation payloads (offer/answer/candidate) to the
//!   other occupant, in the order each connection sent them
//! - Tears room state down deterministically on disconnect, graceful
//!   or not
//!
//! Media never flows through the relay; it exchanges only session
//! descriptions and candidate metadata.
//!
//! # Architecture
//!
//! ```text
//! RoomDirectoryActor (singleton)
//! └── supervises N CallRoomActors (one per active call)
//!     └── CallRoomActor owns membership (at most 2 peers) and fan-out
//! Connection tasks (one per WebSocket) authenticate, parse envelopes,
//! and dispatch into the directory/room actors.
//! ```
//!
//! # Modules
//!
//! - [`actors`] - room directory and per-call room actors
//! - [`auth`] - bearer-token verification
//! - [`config`] - service configuration from environment
//! - [`errors`] - error taxonomy with client-safe messages
//! - [`observability`] - liveness/readiness endpoints
//! - [`registry`] - call registry collaborator interface
//! - [`signaling`] - wire protocol, routing rules, connection handler

pub mod actors;
pub mod auth;
pub mod config;
pub mod errors;
pub mod observability;
pub mod registry;
pub mod signaling;
