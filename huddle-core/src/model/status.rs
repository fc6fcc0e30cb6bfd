use crate::model::participant::ParticipantInfo;
use crate::model::room::RoomId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Membership of one room at the time of the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub participants: Vec<ParticipantInfo>,
}

/// Read-only operational view of the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayStatus {
    pub room_count: usize,
    pub connection_count: usize,
    pub rooms: Vec<RoomSnapshot>,
    pub timestamp: DateTime<Utc>,
}

impl RelayStatus {
    pub fn from_rooms(mut rooms: Vec<RoomSnapshot>) -> Self {
        rooms.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        Self {
            room_count: rooms.len(),
            connection_count: rooms.iter().map(|r| r.participants.len()).sum(),
            rooms,
            timestamp: Utc::now(),
        }
    }
}
