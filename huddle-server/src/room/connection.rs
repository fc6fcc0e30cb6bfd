use crate::room::SessionHandle;
use crate::signaling::SessionOutput;
use huddle_core::{ParticipantId, ParticipantInfo, SessionId};
use std::sync::Arc;
use tokio::time::Instant;

/// A live session registered in a room.
pub struct ConnectionRecord {
    pub session_id: SessionId,
    pub info: ParticipantInfo,
    pub last_seen: Instant,
    pub output: Arc<dyn SessionOutput>,
}

impl ConnectionRecord {
    pub fn new(session: SessionHandle) -> Self {
        Self {
            session_id: session.session_id,
            info: ParticipantInfo::new(session.participant_id, session.display_name),
            last_seen: Instant::now(),
            output: session.output,
        }
    }

    pub fn participant_id(&self) -> &ParticipantId {
        &self.info.user_id
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }
}
