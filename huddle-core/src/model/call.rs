use crate::model::participant::ParticipantId;
use crate::model::room::RoomId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[serde(transparent)]
pub struct CallId(pub String);

impl From<&str> for CallId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for CallId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&RoomId> for CallId {
    fn from(room: &RoomId) -> Self {
        Self(room.0.clone())
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Durable "who is on this call" record shared by every client of a call.
///
/// The participant set is a superset snapshot of live mesh membership: it may
/// lag behind, but a record with no participants must not exist.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActiveCallRecord {
    pub call_id: CallId,
    pub room_id: RoomId,
    pub participants: BTreeSet<ParticipantId>,
    pub started_at: DateTime<Utc>,
}

impl ActiveCallRecord {
    pub fn new(call_id: CallId, room_id: RoomId) -> Self {
        Self {
            call_id,
            room_id,
            participants: BTreeSet::new(),
            started_at: Utc::now(),
        }
    }

    pub fn contains(&self, participant: &ParticipantId) -> bool {
        self.participants.contains(participant)
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}
