use crate::error::EnvelopeError;
use crate::model::participant::{ParticipantId, ParticipantInfo};
use crate::model::room::RoomId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form status flags carried by `participant-update` (e.g. `muted`, `videoOff`).
pub type StatusUpdates = Map<String, Value>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }
}

/// A trickled ICE candidate. `candidate` is mandatory: an envelope without it
/// does not decode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default)]
    pub sdp_mid: Option<String>,
}

/// Envelopes a client sends to the relay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientSignal {
    Offer {
        target_user_id: ParticipantId,
        sdp: String,
    },
    Answer {
        target_user_id: ParticipantId,
        sdp: String,
    },
    IceCandidate {
        target_user_id: ParticipantId,
        candidate: IceCandidate,
    },
    CallEnded {
        target_user_id: ParticipantId,
    },
    ParticipantUpdate {
        updates: StatusUpdates,
    },
    Leave,
    Ping,
    Pong,
}

impl ClientSignal {
    pub fn decode(text: &str) -> Result<Self, EnvelopeError> {
        serde_json::from_str(text).map_err(EnvelopeError::Malformed)
    }

    pub fn encode(&self) -> Result<String, EnvelopeError> {
        serde_json::to_string(self).map_err(EnvelopeError::Encode)
    }

    /// Recipient of a peer-targeted envelope; `None` for room-wide ones.
    pub fn target(&self) -> Option<&ParticipantId> {
        match self {
            Self::Offer { target_user_id, .. }
            | Self::Answer { target_user_id, .. }
            | Self::IceCandidate { target_user_id, .. }
            | Self::CallEnded { target_user_id } => Some(target_user_id),
            _ => None,
        }
    }

    /// Rewrites a peer-targeted envelope into the form delivered to its
    /// target, stamped with the sender.
    pub fn into_forward(self, from: ParticipantId) -> Option<ServerSignal> {
        let forwarded = match self {
            Self::Offer { sdp, .. } => ServerSignal::Offer {
                from_user_id: from,
                sdp,
            },
            Self::Answer { sdp, .. } => ServerSignal::Answer {
                from_user_id: from,
                sdp,
            },
            Self::IceCandidate { candidate, .. } => ServerSignal::IceCandidate {
                from_user_id: from,
                candidate,
            },
            Self::CallEnded { .. } => ServerSignal::CallEnded { from_user_id: from },
            _ => return None,
        };
        Some(forwarded)
    }
}

/// Envelopes the relay sends to a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerSignal {
    Welcome {
        room_id: RoomId,
        participant_id: ParticipantId,
        participants: Vec<ParticipantInfo>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        ice_servers: Vec<IceServerConfig>,
    },
    ExistingParticipants {
        participants: Vec<ParticipantInfo>,
    },
    ParticipantJoined {
        user_id: ParticipantId,
        user_name: String,
        participants: Vec<ParticipantInfo>,
    },
    ParticipantLeft {
        user_id: ParticipantId,
        user_name: String,
        participants: Vec<ParticipantInfo>,
    },
    Offer {
        from_user_id: ParticipantId,
        sdp: String,
    },
    Answer {
        from_user_id: ParticipantId,
        sdp: String,
    },
    IceCandidate {
        from_user_id: ParticipantId,
        candidate: IceCandidate,
    },
    CallEnded {
        from_user_id: ParticipantId,
    },
    ParticipantUpdate {
        from_user_id: ParticipantId,
        updates: StatusUpdates,
    },
    Ping,
    Pong,
}

impl ServerSignal {
    pub fn decode(text: &str) -> Result<Self, EnvelopeError> {
        serde_json::from_str(text).map_err(EnvelopeError::Malformed)
    }

    pub fn encode(&self) -> Result<String, EnvelopeError> {
        serde_json::to_string(self).map_err(EnvelopeError::Encode)
    }

    /// Wire tag, handy for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Welcome { .. } => "welcome",
            Self::ExistingParticipants { .. } => "existing-participants",
            Self::ParticipantJoined { .. } => "participant-joined",
            Self::ParticipantLeft { .. } => "participant-left",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::IceCandidate { .. } => "ice-candidate",
            Self::CallEnded { .. } => "call-ended",
            Self::ParticipantUpdate { .. } => "participant-update",
            Self::Ping => "ping",
            Self::Pong => "pong",
        }
    }
}
