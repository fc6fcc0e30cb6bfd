use crate::config::ServerConfig;
use crate::room::{
    ConnectionRecord, DisconnectReason, RoomCommand, RoomDirectory, RoomManager, SessionHandle,
};
use crate::signaling::CloseReason;
use huddle_core::{ClientSignal, ParticipantId, ParticipantInfo, RoomId, ServerSignal, SessionId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Actor owning the membership of one room.
///
/// Every mutation of the room happens inside [`Room::handle_command`], one
/// command at a time, and nothing in here awaits network I/O: outbound
/// envelopes are only queued on the session outputs.
pub struct Room {
    id: RoomId,
    members: HashMap<ParticipantId, ConnectionRecord>,
    command_rx: mpsc::Receiver<RoomCommand>,
    self_tx: mpsc::WeakSender<RoomCommand>,
    manager: RoomManager,
    directory: RoomDirectory,
    config: Arc<ServerConfig>,
}

impl Room {
    pub(crate) fn new(
        id: RoomId,
        command_rx: mpsc::Receiver<RoomCommand>,
        self_tx: mpsc::WeakSender<RoomCommand>,
        manager: RoomManager,
    ) -> Self {
        let directory = manager.directory().clone();
        let config = manager.config().clone();
        Self {
            id,
            members: HashMap::new(),
            command_rx,
            self_tx,
            manager,
            directory,
            config,
        }
    }

    pub async fn run(mut self) {
        info!(room = %self.id, "Room event loop started");

        while let Some(cmd) = self.command_rx.recv().await {
            self.handle_command(cmd);

            if self.members.is_empty() {
                break;
            }
        }

        let room_id = self.id.clone();
        self.retire().await;
        info!(room = %room_id, "Room event loop finished");
    }

    fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join { session } => self.handle_join(session),

            RoomCommand::Signal {
                session_id,
                participant_id,
                signal,
            } => self.handle_signal(session_id, &participant_id, signal),

            RoomCommand::Disconnect {
                session_id,
                participant_id,
                reason,
            } => {
                self.remove_session(session_id, &participant_id, reason);
            }

            RoomCommand::Heartbeat => self.handle_heartbeat(Instant::now()),
        }
    }

    fn handle_join(&mut self, session: SessionHandle) {
        let participant_id = session.participant_id.clone();

        if let Some(previous) = self.members.remove(&participant_id) {
            info!(
                room = %self.id,
                participant = %participant_id,
                old_session = %previous.session_id,
                "Evicting duplicate connection"
            );
            previous.output.close(CloseReason::Duplicate);
        }

        let record = ConnectionRecord::new(session);
        let output = record.output.clone();
        let user_name = record.info.user_name.clone();
        info!(
            room = %self.id,
            participant = %participant_id,
            session = %record.session_id,
            "Participant joined"
        );
        self.members.insert(participant_id.clone(), record);

        let participants = self.participants();

        // The room learns about the newcomer before the newcomer learns about
        // the room; both go through FIFO session queues.
        self.broadcast_except(
            &participant_id,
            ServerSignal::ParticipantJoined {
                user_id: participant_id.clone(),
                user_name,
                participants: participants.clone(),
            },
        );

        let existing: Vec<ParticipantInfo> = participants
            .iter()
            .filter(|p| p.user_id != participant_id)
            .cloned()
            .collect();

        output.send(ServerSignal::Welcome {
            room_id: self.id.clone(),
            participant_id: participant_id.clone(),
            participants,
            ice_servers: self.config.ice_servers.clone(),
        });

        if !existing.is_empty() {
            output.send(ServerSignal::ExistingParticipants {
                participants: existing,
            });
        }

        self.publish();
    }

    fn handle_signal(
        &mut self,
        session_id: SessionId,
        participant_id: &ParticipantId,
        signal: ClientSignal,
    ) {
        let Some(record) = self
            .members
            .get_mut(participant_id)
            .filter(|r| r.session_id == session_id)
        else {
            debug!(
                room = %self.id,
                participant = %participant_id,
                session = %session_id,
                "Dropping signal from stale session"
            );
            return;
        };
        record.touch();

        match signal {
            ClientSignal::Ping => {
                record.output.send(ServerSignal::Pong);
            }

            ClientSignal::Pong => {}

            ClientSignal::Leave => {
                self.remove_session(session_id, participant_id, DisconnectReason::Left);
            }

            ClientSignal::ParticipantUpdate { updates } => {
                self.broadcast_except(
                    participant_id,
                    ServerSignal::ParticipantUpdate {
                        from_user_id: participant_id.clone(),
                        updates,
                    },
                );
            }

            targeted => self.forward(participant_id, targeted),
        }
    }

    /// Routes a peer-targeted envelope to the target's current session.
    fn forward(&self, from: &ParticipantId, signal: ClientSignal) {
        let Some(target) = signal.target().cloned() else {
            return;
        };

        if &target == from {
            debug!(room = %self.id, participant = %from, "Dropping self-targeted signal");
            return;
        }

        let Some(recipient) = self.members.get(&target) else {
            debug!(
                room = %self.id,
                from = %from,
                target = %target,
                "Dropping signal for absent participant"
            );
            return;
        };

        if let Some(forwarded) = signal.into_forward(from.clone()) {
            if !recipient.output.send(forwarded) {
                debug!(room = %self.id, target = %target, "Recipient transport already closed");
            }
        }
    }

    /// The single exit path for a session. Returns whether anything was removed.
    fn remove_session(
        &mut self,
        session_id: SessionId,
        participant_id: &ParticipantId,
        reason: DisconnectReason,
    ) -> bool {
        let is_current = self
            .members
            .get(participant_id)
            .is_some_and(|r| r.session_id == session_id);
        if !is_current {
            return false;
        }

        let Some(record) = self.members.remove(participant_id) else {
            return false;
        };

        info!(
            room = %self.id,
            participant = %participant_id,
            session = %session_id,
            ?reason,
            "Participant removed"
        );

        match reason {
            DisconnectReason::Left => record.output.close(CloseReason::Left),
            DisconnectReason::Timeout => record.output.close(CloseReason::Timeout),
            DisconnectReason::Closed => {}
        }

        if self.members.is_empty() {
            return true;
        }

        let participants = self.participants();
        self.broadcast(ServerSignal::ParticipantLeft {
            user_id: record.info.user_id,
            user_name: record.info.user_name,
            participants,
        });
        self.publish();
        true
    }

    fn handle_heartbeat(&mut self, now: Instant) {
        let stale_after = self.config.stale_after();

        let expired: Vec<(SessionId, ParticipantId)> = self
            .members
            .values()
            .filter(|r| {
                !r.output.is_open() || now.saturating_duration_since(r.last_seen) > stale_after
            })
            .map(|r| (r.session_id, r.participant_id().clone()))
            .collect();

        for (session_id, participant_id) in expired {
            warn!(
                room = %self.id,
                participant = %participant_id,
                "Reaping stale session"
            );
            self.remove_session(session_id, &participant_id, DisconnectReason::Timeout);
        }

        for record in self.members.values() {
            record.output.send(ServerSignal::Ping);
        }
    }

    /// Membership in join order.
    fn participants(&self) -> Vec<ParticipantInfo> {
        let mut participants: Vec<ParticipantInfo> =
            self.members.values().map(|r| r.info.clone()).collect();
        participants.sort_by(|a, b| {
            a.joined_at
                .cmp(&b.joined_at)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        participants
    }

    fn broadcast(&self, signal: ServerSignal) {
        for record in self.members.values() {
            record.output.send(signal.clone());
        }
    }

    fn broadcast_except(&self, excluded: &ParticipantId, signal: ServerSignal) {
        for record in self.members.values() {
            if record.participant_id() != excluded {
                record.output.send(signal.clone());
            }
        }
    }

    fn publish(&self) {
        self.directory.publish(&self.id, self.participants());
    }

    /// Unregisters the empty room. Commands that raced into the queue are
    /// handed back to the manager in order so joins land in a fresh room.
    async fn retire(mut self) {
        self.directory.remove(&self.id);
        if let Some(tx) = self.self_tx.upgrade() {
            self.manager.deregister(&self.id, &tx);
        }

        self.command_rx.close();
        let mut leftovers = Vec::new();
        while let Some(cmd) = self.command_rx.recv().await {
            if cmd.creates_room() {
                leftovers.push(cmd);
            }
        }

        if leftovers.is_empty() {
            return;
        }

        debug!(room = %self.id, count = leftovers.len(), "Re-dispatching joins from retired room");
        let manager = self.manager.clone();
        let room_id = self.id.clone();
        tokio::spawn(async move {
            for cmd in leftovers {
                if let Err(e) = manager.dispatch(&room_id, cmd).await {
                    warn!("Failed to re-dispatch join: {}", e);
                }
            }
        });
    }
}
