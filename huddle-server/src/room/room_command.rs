use crate::signaling::SessionOutput;
use huddle_core::{ClientSignal, ParticipantId, SessionId};
use std::fmt;
use std::sync::Arc;

/// A freshly accepted connection asking to be admitted to a room.
pub struct SessionHandle {
    pub session_id: SessionId,
    pub participant_id: ParticipantId,
    pub display_name: String,
    pub output: Arc<dyn SessionOutput>,
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session_id", &self.session_id)
            .field("participant_id", &self.participant_id)
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Transport closed or errored.
    Closed,
    /// Explicit `leave`.
    Left,
    /// Liveness window elapsed.
    Timeout,
}

/// Commands a room actor processes, one at a time.
#[derive(Debug)]
pub enum RoomCommand {
    /// Admit a session, evicting any older one for the same participant.
    Join { session: SessionHandle },

    /// Decoded envelope from a session of this room.
    Signal {
        session_id: SessionId,
        participant_id: ParticipantId,
        signal: ClientSignal,
    },

    /// The session's transport is gone.
    Disconnect {
        session_id: SessionId,
        participant_id: ParticipantId,
        reason: DisconnectReason,
    },

    /// Liveness tick: reap stale sessions, ping the rest.
    Heartbeat,
}

impl RoomCommand {
    /// Only admissions may bring a room into existence.
    pub(crate) fn creates_room(&self) -> bool {
        matches!(self, Self::Join { .. })
    }
}
