use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// A captured local track. Clones share the `enabled` and `stopped` flags.
#[derive(Debug, Clone)]
pub struct LocalTrack {
    pub id: String,
    pub kind: TrackKind,
    pub stream_id: String,
    enabled: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
}

impl LocalTrack {
    pub fn new(id: impl Into<String>, kind: TrackKind, stream_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            stream_id: stream_id.into(),
            enabled: Arc::new(AtomicBool::new(true)),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// The local capture handed to a call: zero or one track per kind.
#[derive(Debug, Clone, Default)]
pub struct LocalStream {
    tracks: Vec<LocalTrack>,
}

impl LocalStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stream with one audio and one video track sharing `stream_id`.
    pub fn audio_video(stream_id: &str) -> Self {
        Self::new()
            .with_track(LocalTrack::new(format!("{stream_id}-audio"), TrackKind::Audio, stream_id))
            .with_track(LocalTrack::new(format!("{stream_id}-video"), TrackKind::Video, stream_id))
    }

    /// Adds `track`, replacing any existing track of the same kind.
    pub fn with_track(mut self, track: LocalTrack) -> Self {
        self.tracks.retain(|t| t.kind != track.kind);
        self.tracks.push(track);
        self
    }

    pub fn tracks(&self) -> &[LocalTrack] {
        &self.tracks
    }

    pub fn track(&self, kind: TrackKind) -> Option<&LocalTrack> {
        self.tracks.iter().find(|t| t.kind == kind)
    }

    /// A stream is usable while it has at least one live track.
    pub fn is_usable(&self) -> bool {
        self.tracks.iter().any(|t| !t.is_stopped())
    }

    pub fn is_enabled(&self, kind: TrackKind) -> bool {
        self.track(kind).is_some_and(LocalTrack::is_enabled)
    }

    /// Returns `false` if the stream has no track of that kind.
    pub fn set_enabled(&self, kind: TrackKind, enabled: bool) -> bool {
        match self.track(kind) {
            Some(track) => {
                track.set_enabled(enabled);
                true
            }
            None => false,
        }
    }

    pub fn stop(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}
