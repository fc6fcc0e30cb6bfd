use crate::media::RemoteTrackInfo;
use crate::relay::RelayState;
use huddle_core::{ParticipantId, ParticipantInfo, RoomId, StatusUpdates};

/// Why a call session stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    HungUp,
    /// Reconnect attempts exhausted.
    RelayLost,
    /// The relay closed this session, e.g. the same participant joined elsewhere.
    Replaced,
}

/// Everything the UI layer hears about a call.
#[derive(Debug, Clone, PartialEq)]
pub enum CallEvent {
    Joined {
        room_id: RoomId,
        participant_id: ParticipantId,
        participants: Vec<ParticipantInfo>,
    },
    ParticipantsChanged {
        participants: Vec<ParticipantInfo>,
    },
    PeerConnected {
        participant: ParticipantId,
    },
    RemoteTrack {
        participant: ParticipantId,
        track: RemoteTrackInfo,
    },
    /// Terminal for that peer only; the rest of the mesh is unaffected.
    PeerFailed {
        participant: ParticipantId,
        reason: String,
    },
    PeerClosed {
        participant: ParticipantId,
    },
    ParticipantUpdated {
        participant: ParticipantId,
        updates: StatusUpdates,
    },
    RelayStateChanged(RelayState),
    Ended {
        reason: EndReason,
    },
}
