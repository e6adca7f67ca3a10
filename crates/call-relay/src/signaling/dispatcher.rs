//! Stateless routing of inbound envelopes against the connection state.
//!
//! The connection handler's transitions are expressed as a data-driven
//! rule table rather than branching embedded in the socket loop: every
//! (state, kind) pair maps to exactly one [`Action`], and the full
//! table is enumerable and tested on its own.

use crate::signaling::protocol::EnvelopeKind;

/// Connection-handler state relevant to routing.
///
/// `Connecting` never sees envelopes (authentication happens at upgrade
/// time) and `Closed` is terminal, so only these two states route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    /// Authenticated, not associated with a call.
    Authenticated,
    /// Authenticated and occupying a slot in a session room.
    InRoom,
}

/// Action selected for one (state, kind) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Resolve the call, check authorization, and try to take a slot.
    AttemptJoin,
    /// Forward the envelope to the other occupant of the joined room.
    RelayToPeer,
    /// Release the occupied slot and notify the peer.
    ProcessLeave,
    /// Protocol violation: report to the offending connection only.
    Violation(&'static str),
}

/// The routing table.
#[must_use]
pub const fn route(state: HandlerState, kind: EnvelopeKind) -> Action {
    match (state, kind) {
        (HandlerState::Authenticated, EnvelopeKind::Join) => Action::AttemptJoin,
        (HandlerState::InRoom, EnvelopeKind::Join) => Action::Violation("already joined a call"),

        (
            HandlerState::InRoom,
            EnvelopeKind::Offer | EnvelopeKind::Answer | EnvelopeKind::IceCandidate,
        ) => Action::RelayToPeer,
        (
            HandlerState::Authenticated,
            EnvelopeKind::Offer | EnvelopeKind::Answer | EnvelopeKind::IceCandidate,
        ) => Action::Violation("not joined to a call"),

        (HandlerState::InRoom, EnvelopeKind::Leave) => Action::ProcessLeave,
        (HandlerState::Authenticated, EnvelopeKind::Leave) => {
            Action::Violation("not joined to a call")
        }

        (
            _,
            EnvelopeKind::Joined
            | EnvelopeKind::UserJoined
            | EnvelopeKind::UserLeft
            | EnvelopeKind::Error,
        ) => Action::Violation("server-only message kind"),
    }
}
