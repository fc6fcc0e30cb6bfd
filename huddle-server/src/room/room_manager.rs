use crate::config::ServerConfig;
use crate::error::RoomError;
use crate::room::{Room, RoomCommand, RoomDirectory};
use dashmap::DashMap;
use huddle_core::RoomId;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// A command can bounce off a room that is retiring at most this many times.
const MAX_DISPATCH_ATTEMPTS: usize = 3;

struct ManagerInner {
    rooms: DashMap<RoomId, mpsc::Sender<RoomCommand>>,
    directory: RoomDirectory,
    config: Arc<ServerConfig>,
}

/// Registry of room actors, keyed by room id.
///
/// Rooms are created by the first join and remove themselves once empty.
#[derive(Clone)]
pub struct RoomManager {
    inner: Arc<ManagerInner>,
}

impl RoomManager {
    pub fn new(config: Arc<ServerConfig>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                rooms: DashMap::new(),
                directory: RoomDirectory::new(),
                config,
            }),
        }
    }

    pub fn directory(&self) -> &RoomDirectory {
        &self.inner.directory
    }

    pub fn config(&self) -> &Arc<ServerConfig> {
        &self.inner.config
    }

    pub fn room_count(&self) -> usize {
        self.inner.rooms.len()
    }

    pub fn contains_room(&self, room_id: &RoomId) -> bool {
        self.inner.rooms.contains_key(room_id)
    }

    /// Delivers a command to its room, creating the room for joins.
    ///
    /// Non-join commands addressed to a room that no longer exists are dropped.
    pub async fn dispatch(&self, room_id: &RoomId, mut cmd: RoomCommand) -> Result<(), RoomError> {
        for _ in 0..MAX_DISPATCH_ATTEMPTS {
            let sender = if cmd.creates_room() {
                self.get_or_create(room_id)
            } else {
                match self.inner.rooms.get(room_id) {
                    Some(sender) => sender.clone(),
                    None => {
                        debug!(room = %room_id, "Dropping command for unknown room");
                        return Ok(());
                    }
                }
            };

            match sender.send(cmd).await {
                Ok(()) => return Ok(()),
                Err(mpsc::error::SendError(returned)) => {
                    self.deregister(room_id, &sender);
                    cmd = returned;
                }
            }
        }

        Err(RoomError::Unavailable(room_id.clone()))
    }

    /// Sends a heartbeat to every live room.
    pub async fn heartbeat_all(&self) {
        let senders: Vec<mpsc::Sender<RoomCommand>> = self
            .inner
            .rooms
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        for sender in senders {
            let _ = sender.send(RoomCommand::Heartbeat).await;
        }
    }

    fn get_or_create(&self, room_id: &RoomId) -> mpsc::Sender<RoomCommand> {
        if let Some(sender) = self.inner.rooms.get(room_id) {
            return sender.clone();
        }

        self.inner
            .rooms
            .entry(room_id.clone())
            .or_insert_with(|| self.spawn_room(room_id.clone()))
            .clone()
    }

    fn spawn_room(&self, room_id: RoomId) -> mpsc::Sender<RoomCommand> {
        info!(room = %room_id, "Creating new room");
        let (tx, rx) = mpsc::channel(self.inner.config.room_queue_capacity);
        let room = Room::new(room_id, rx, tx.downgrade(), self.clone());
        tokio::spawn(room.run());
        tx
    }

    /// Removes `room_id` only if it still maps to `sender`'s channel.
    pub(crate) fn deregister(&self, room_id: &RoomId, sender: &mpsc::Sender<RoomCommand>) {
        self.inner
            .rooms
            .remove_if(room_id, |_, current| current.same_channel(sender));
    }
}
