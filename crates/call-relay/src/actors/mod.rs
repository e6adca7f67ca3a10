//! Actor model for the relay's shared mutable state.
//!
//! The room directory and the per-call rooms are the only shared state
//! in the relay; both are actors owning their state behind a mailbox:
//!
//! ```text
//! RoomDirectoryActor (singleton)
//! └── supervises N CallRoomActors (one per active call)
//!     └── CallRoomActor owns membership (at most 2 peers) and fan-out
//! ```
//!
//! Serialization discipline: join/leave/relay for one call flow through
//! that call's room mailbox; room creation and destruction flow through
//! the directory mailbox. Operations on different calls never contend.

pub mod directory;
pub mod messages;
pub mod room;

pub use directory::RoomDirectoryHandle;
pub use messages::{DirectoryStatus, JoinSnapshot, PeerSender};
pub use room::{CallRoomHandle, MAX_OCCUPANTS};
