use crate::config::ServerConfig;
use crate::error::RoomError;
use crate::room::{DisconnectReason, RoomCommand, RoomDirectory, RoomManager, SessionHandle};
use crate::signaling::SessionOutput;
use huddle_core::{ClientSignal, ParticipantId, RelayStatus, RoomId, SessionId};
use std::sync::Arc;
use tracing::warn;

/// Identity of an admitted session, kept by its transport task.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub room_id: RoomId,
    pub participant_id: ParticipantId,
}

struct SignalingInner {
    rooms: RoomManager,
    config: Arc<ServerConfig>,
}

/// Entry point used by transports: admit, feed and drop sessions.
#[derive(Clone)]
pub struct SignalingService {
    inner: Arc<SignalingInner>,
}

impl SignalingService {
    pub fn new(config: ServerConfig) -> Self {
        let config = Arc::new(config);
        Self {
            inner: Arc::new(SignalingInner {
                rooms: RoomManager::new(config.clone()),
                config,
            }),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    pub fn rooms(&self) -> &RoomManager {
        &self.inner.rooms
    }

    pub fn directory(&self) -> &RoomDirectory {
        self.inner.rooms.directory()
    }

    pub fn status(&self) -> RelayStatus {
        self.directory().status()
    }

    pub async fn connect(
        &self,
        room_id: RoomId,
        participant_id: ParticipantId,
        display_name: String,
        output: Arc<dyn SessionOutput>,
    ) -> Result<Session, RoomError> {
        let session = Session {
            id: SessionId::new(),
            room_id,
            participant_id,
        };

        let cmd = RoomCommand::Join {
            session: SessionHandle {
                session_id: session.id,
                participant_id: session.participant_id.clone(),
                display_name,
                output,
            },
        };
        self.inner.rooms.dispatch(&session.room_id, cmd).await?;

        Ok(session)
    }

    /// Decodes one inbound text frame. Malformed envelopes are logged and
    /// dropped; the session stays up.
    pub async fn handle(&self, session: &Session, text: &str) {
        match ClientSignal::decode(text) {
            Ok(signal) => self.handle_signal(session, signal).await,
            Err(e) => warn!(
                room = %session.room_id,
                participant = %session.participant_id,
                "Invalid envelope: {}",
                e
            ),
        }
    }

    pub async fn handle_signal(&self, session: &Session, signal: ClientSignal) {
        let cmd = RoomCommand::Signal {
            session_id: session.id,
            participant_id: session.participant_id.clone(),
            signal,
        };
        if let Err(e) = self.inner.rooms.dispatch(&session.room_id, cmd).await {
            warn!("Failed to route signal: {}", e);
        }
    }

    pub async fn disconnect(&self, session: &Session) {
        let cmd = RoomCommand::Disconnect {
            session_id: session.id,
            participant_id: session.participant_id.clone(),
            reason: DisconnectReason::Closed,
        };
        if let Err(e) = self.inner.rooms.dispatch(&session.room_id, cmd).await {
            warn!("Failed to deliver disconnect: {}", e);
        }
    }
}
