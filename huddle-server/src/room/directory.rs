use dashmap::DashMap;
use huddle_core::{ParticipantInfo, RelayStatus, RoomId, RoomSnapshot};
use std::sync::Arc;

/// Read-only membership view published by room actors.
///
/// Rooms overwrite their own entry after each membership change; readers
/// never reach into a room actor.
#[derive(Clone, Default)]
pub struct RoomDirectory {
    rooms: Arc<DashMap<RoomId, Vec<ParticipantInfo>>>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn publish(&self, room_id: &RoomId, participants: Vec<ParticipantInfo>) {
        self.rooms.insert(room_id.clone(), participants);
    }

    pub(crate) fn remove(&self, room_id: &RoomId) {
        self.rooms.remove(room_id);
    }

    pub fn room(&self, room_id: &RoomId) -> Option<RoomSnapshot> {
        self.rooms.get(room_id).map(|entry| RoomSnapshot {
            room_id: entry.key().clone(),
            participants: entry.value().clone(),
        })
    }

    pub fn rooms(&self) -> Vec<RoomSnapshot> {
        let mut rooms: Vec<RoomSnapshot> = self
            .rooms
            .iter()
            .map(|entry| RoomSnapshot {
                room_id: entry.key().clone(),
                participants: entry.value().clone(),
            })
            .collect();
        rooms.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        rooms
    }

    pub fn status(&self) -> RelayStatus {
        RelayStatus::from_rooms(self.rooms())
    }
}
