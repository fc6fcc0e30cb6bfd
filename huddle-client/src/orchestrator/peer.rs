use crate::media::PeerLink;
use huddle_core::IceCandidate;
use std::sync::Arc;
use tokio::time::Instant;

/// Negotiation state of one peer connection. Closed links are removed from
/// the orchestrator, so there is no closed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    New,
    HaveLocalOffer,
    HaveRemoteOffer,
    /// Both descriptions set, ICE still running.
    Stable,
    Connected,
    /// ICE failed once; waiting on the restart.
    Failed,
}

impl PeerState {
    pub fn accepts_offer(&self) -> bool {
        matches!(self, Self::New | Self::Stable | Self::Connected | Self::Failed)
    }
}

pub(crate) struct PeerEntry {
    pub link: Arc<dyn PeerLink>,
    pub generation: u64,
    pub state: PeerState,
    pub initiator: bool,
    pub tracks_attached: bool,
    pub remote_description_set: bool,
    pub pending_candidates: Vec<IceCandidate>,
    pub restart_attempted: bool,
    /// Set while waiting on the remote side (answer or restart offer).
    pub deadline: Option<Instant>,
}

impl PeerEntry {
    pub fn new(link: Arc<dyn PeerLink>, generation: u64, initiator: bool) -> Self {
        Self {
            link,
            generation,
            state: PeerState::New,
            initiator,
            tracks_attached: false,
            remote_description_set: false,
            pending_candidates: Vec::new(),
            restart_attempted: false,
            deadline: None,
        }
    }
}
