use crate::error::MediaError;
use crate::media::{LocalTrack, TrackKind};
use async_trait::async_trait;
use huddle_core::{IceCandidate, IceServerConfig, ParticipantId};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpKind {
    Offer,
    Answer,
}

/// Connectivity of a peer link as reported by the media stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connecting,
    Connected,
    /// Transient loss; the stack may still recover on its own.
    Disconnected,
    Failed,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrackInfo {
    pub id: String,
    pub kind: TrackKind,
    pub stream_id: String,
}

/// Asynchronous notifications from one peer link.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    LocalCandidate(IceCandidate),
    StateChanged(LinkState),
    RemoteTrack(RemoteTrackInfo),
}

/// A [`LinkEvent`] tagged with the peer link that produced it.
#[derive(Debug, Clone)]
pub struct PeerLinkEvent {
    pub remote: ParticipantId,
    /// Distinguishes a replaced link from its successor for the same remote.
    pub generation: u64,
    pub event: LinkEvent,
}

/// Where a link delivers its events; handed out by the orchestrator.
#[derive(Debug, Clone)]
pub struct LinkEventSender {
    remote: ParticipantId,
    generation: u64,
    tx: mpsc::UnboundedSender<PeerLinkEvent>,
}

impl LinkEventSender {
    pub fn new(
        remote: ParticipantId,
        generation: u64,
        tx: mpsc::UnboundedSender<PeerLinkEvent>,
    ) -> Self {
        Self {
            remote,
            generation,
            tx,
        }
    }

    pub fn remote(&self) -> &ParticipantId {
        &self.remote
    }

    pub fn emit(&self, event: LinkEvent) -> bool {
        self.tx
            .send(PeerLinkEvent {
                remote: self.remote.clone(),
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

/// Factory for peer connections.
#[async_trait]
pub trait MediaTransport: Send + Sync {
    async fn create_peer_connection(
        &self,
        remote: &ParticipantId,
        ice_servers: &[IceServerConfig],
        events: LinkEventSender,
    ) -> Result<Arc<dyn PeerLink>, MediaError>;
}

/// One direct media channel to a remote participant.
#[async_trait]
pub trait PeerLink: Send + Sync {
    /// Creates an offer, sets it as local description and returns its SDP.
    async fn create_offer(&self, ice_restart: bool) -> Result<String, MediaError>;

    /// Creates an answer, sets it as local description and returns its SDP.
    async fn create_answer(&self) -> Result<String, MediaError>;

    async fn set_remote_description(&self, kind: SdpKind, sdp: String) -> Result<(), MediaError>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), MediaError>;

    async fn add_track(&self, track: LocalTrack) -> Result<(), MediaError>;

    async fn remove_track(&self, kind: TrackKind) -> Result<(), MediaError>;

    /// Starts or stops sending on the outbound sender of `kind` without
    /// renegotiation.
    async fn set_track_enabled(&self, kind: TrackKind, enabled: bool) -> Result<(), MediaError>;

    async fn close(&self) -> Result<(), MediaError>;
}
