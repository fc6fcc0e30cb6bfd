use crate::media::{LocalStream, TrackKind};
use crate::orchestrator::PeerOrchestrator;
use crate::signal_sink::SignalSink;
use huddle_core::{ClientSignal, StatusUpdates};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Local mute / camera state shown by the UI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaState {
    pub muted: bool,
    pub camera_off: bool,
}

impl MediaState {
    pub fn from_stream(stream: &LocalStream) -> Self {
        Self {
            muted: !stream.is_enabled(TrackKind::Audio),
            camera_off: !stream.is_enabled(TrackKind::Video),
        }
    }

    /// Payload of the `participant-update` announcing this state.
    pub fn to_updates(&self) -> StatusUpdates {
        let mut updates = StatusUpdates::new();
        updates.insert("muted".into(), Value::Bool(self.muted));
        updates.insert("videoOff".into(), Value::Bool(self.camera_off));
        updates
    }
}

/// Mute and camera toggles, applied to outgoing tracks, local UI state and
/// (optionally) the room.
pub struct MediaControl {
    state: watch::Sender<MediaState>,
    signals: Arc<dyn SignalSink>,
    broadcast: bool,
}

impl MediaControl {
    pub fn new(initial: MediaState, signals: Arc<dyn SignalSink>, broadcast: bool) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            state,
            signals,
            broadcast,
        }
    }

    pub fn state(&self) -> MediaState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<MediaState> {
        self.state.subscribe()
    }

    /// Returns `false` when the local stream has no audio track; nothing is
    /// applied or announced then.
    pub async fn set_muted(&self, orchestrator: &mut PeerOrchestrator, muted: bool) -> bool {
        if !orchestrator
            .toggle_local_track(TrackKind::Audio, !muted)
            .await
        {
            debug!("No local audio track to toggle");
            return false;
        }
        self.apply(|s| s.muted = muted);
        true
    }

    pub async fn set_camera_enabled(
        &self,
        orchestrator: &mut PeerOrchestrator,
        enabled: bool,
    ) -> bool {
        if !orchestrator
            .toggle_local_track(TrackKind::Video, enabled)
            .await
        {
            debug!("No local video track to toggle");
            return false;
        }
        self.apply(|s| s.camera_off = !enabled);
        true
    }

    pub async fn toggle_mute(&self, orchestrator: &mut PeerOrchestrator) -> bool {
        let muted = !self.state().muted;
        self.set_muted(orchestrator, muted).await
    }

    pub async fn toggle_camera(&self, orchestrator: &mut PeerOrchestrator) -> bool {
        let enabled = self.state().camera_off;
        self.set_camera_enabled(orchestrator, enabled).await
    }

    /// Re-sends the current state, e.g. after (re)joining a room.
    pub fn announce(&self) {
        if self.broadcast {
            self.signals.send(ClientSignal::ParticipantUpdate {
                updates: self.state().to_updates(),
            });
        }
    }

    fn apply(&self, change: impl FnOnce(&mut MediaState)) {
        let changed = self.state.send_if_modified(|state| {
            let before = *state;
            change(state);
            *state != before
        });
        if changed {
            debug!(state = ?self.state(), "Local media state changed");
            self.announce();
        }
    }
}
