use crate::config::ClientConfig;
use crate::error::MediaError;
use crate::media::{
    LinkEvent, LinkEventSender, LinkState, LocalStream, MediaTransport, PeerLink, PeerLinkEvent,
    SdpKind, TrackKind,
};
use crate::orchestrator::{CallEvent, PeerEntry, PeerState};
use crate::signal_sink::SignalSink;
use huddle_core::{
    ClientSignal, IceCandidate, IceServerConfig, ParticipantId, ParticipantInfo, ServerSignal,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Tunables of the orchestrator taken from [`ClientConfig`].
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub ice_servers: Vec<IceServerConfig>,
    pub negotiation_timeout: Duration,
}

impl From<&ClientConfig> for OrchestratorSettings {
    fn from(config: &ClientConfig) -> Self {
        Self {
            ice_servers: config.ice_servers.clone(),
            negotiation_timeout: config.negotiation_timeout,
        }
    }
}

/// Drives one peer connection per remote participant.
///
/// Initiator rule: whoever observes `participant-joined` for a newcomer
/// offers to it; a newcomer never offers to the members listed in
/// `existing-participants`.
///
/// Every method takes `&mut self`, so signals and link events are handled one
/// at a time. Signals that do not fit the current [`PeerState`] are dropped
/// with a warning instead of being queued.
pub struct PeerOrchestrator {
    local_id: ParticipantId,
    local: LocalStream,
    transport: Arc<dyn MediaTransport>,
    signals: Arc<dyn SignalSink>,
    events: mpsc::UnboundedSender<CallEvent>,
    link_tx: mpsc::UnboundedSender<PeerLinkEvent>,
    settings: OrchestratorSettings,
    peers: HashMap<ParticipantId, PeerEntry>,
    next_generation: u64,
    welcomed: bool,
    closed: bool,
}

impl PeerOrchestrator {
    /// Returns the orchestrator and the stream of link events it expects to
    /// be fed back through [`PeerOrchestrator::on_link_event`].
    pub fn new(
        local_id: ParticipantId,
        local: LocalStream,
        transport: Arc<dyn MediaTransport>,
        signals: Arc<dyn SignalSink>,
        events: mpsc::UnboundedSender<CallEvent>,
        settings: OrchestratorSettings,
    ) -> (Self, mpsc::UnboundedReceiver<PeerLinkEvent>) {
        let (link_tx, link_rx) = mpsc::unbounded_channel();
        let orchestrator = Self {
            local_id,
            local,
            transport,
            signals,
            events,
            link_tx,
            settings,
            peers: HashMap::new(),
            next_generation: 0,
            welcomed: false,
            closed: false,
        };
        (orchestrator, link_rx)
    }

    pub fn local_id(&self) -> &ParticipantId {
        &self.local_id
    }

    pub fn local_stream(&self) -> &LocalStream {
        &self.local
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn peer_state(&self, remote: &ParticipantId) -> Option<PeerState> {
        self.peers.get(remote).map(|p| p.state)
    }

    pub fn is_initiator(&self, remote: &ParticipantId) -> Option<bool> {
        self.peers.get(remote).map(|p| p.initiator)
    }

    pub fn pending_candidates(&self, remote: &ParticipantId) -> usize {
        self.peers
            .get(remote)
            .map_or(0, |p| p.pending_candidates.len())
    }

    pub fn peers(&self) -> Vec<ParticipantId> {
        let mut ids: Vec<ParticipantId> = self.peers.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Routes any relay envelope to the room or the signal handler.
    pub async fn handle(&mut self, signal: ServerSignal) {
        match signal {
            ServerSignal::Welcome { .. }
            | ServerSignal::ExistingParticipants { .. }
            | ServerSignal::ParticipantJoined { .. }
            | ServerSignal::ParticipantLeft { .. } => self.on_room_event(signal).await,
            other => self.on_signal(other).await,
        }
    }

    /// Membership events: `welcome`, `existing-participants`,
    /// `participant-joined`, `participant-left`.
    pub async fn on_room_event(&mut self, event: ServerSignal) {
        if self.closed {
            return;
        }

        match event {
            ServerSignal::Welcome { ice_servers, .. } => {
                if !ice_servers.is_empty() {
                    self.settings.ice_servers = ice_servers;
                }
                // A second welcome means the relay session was replaced; every
                // remote side now sees us as a newcomer and will offer again.
                if self.welcomed {
                    info!(participant = %self.local_id, "Rejoined relay, resetting peers");
                    self.reset_peers().await;
                }
                self.welcomed = true;
            }

            ServerSignal::ExistingParticipants { participants } => {
                self.on_existing_participants(participants).await;
            }

            ServerSignal::ParticipantJoined { user_id, .. } => {
                if user_id != self.local_id {
                    self.initiate(user_id).await;
                }
            }

            ServerSignal::ParticipantLeft { user_id, .. } => {
                self.close_peer(&user_id).await;
            }

            other => debug!("Not a room event: {}", other.kind()),
        }
    }

    /// Peer-to-peer envelopes relayed by the server.
    pub async fn on_signal(&mut self, signal: ServerSignal) {
        if self.closed {
            return;
        }

        match signal {
            ServerSignal::Offer { from_user_id, sdp } => self.on_offer(from_user_id, sdp).await,
            ServerSignal::Answer { from_user_id, sdp } => self.on_answer(from_user_id, sdp).await,
            ServerSignal::IceCandidate {
                from_user_id,
                candidate,
            } => self.on_remote_candidate(from_user_id, candidate).await,
            ServerSignal::CallEnded { from_user_id } => {
                info!(remote = %from_user_id, "Remote ended the call");
                self.close_peer(&from_user_id).await;
            }
            ServerSignal::ParticipantUpdate {
                from_user_id,
                updates,
            } => self.emit(CallEvent::ParticipantUpdated {
                participant: from_user_id,
                updates,
            }),
            ServerSignal::Ping | ServerSignal::Pong => {}
            other => debug!("Not a peer signal: {}", other.kind()),
        }
    }

    pub async fn on_link_event(&mut self, event: PeerLinkEvent) {
        if self.closed {
            return;
        }

        let PeerLinkEvent {
            remote,
            generation,
            event,
        } = event;

        let Some(entry) = self
            .peers
            .get_mut(&remote)
            .filter(|p| p.generation == generation)
        else {
            debug!(remote = %remote, generation, "Dropping event from replaced link");
            return;
        };

        match event {
            LinkEvent::LocalCandidate(candidate) => {
                self.signals.send(ClientSignal::IceCandidate {
                    target_user_id: remote,
                    candidate,
                });
            }

            LinkEvent::RemoteTrack(track) => self.emit(CallEvent::RemoteTrack {
                participant: remote,
                track,
            }),

            LinkEvent::StateChanged(LinkState::Connected) => {
                if entry.state != PeerState::Connected {
                    entry.state = PeerState::Connected;
                    entry.restart_attempted = false;
                    entry.deadline = None;
                    info!(remote = %remote, "Peer connected");
                    self.emit(CallEvent::PeerConnected {
                        participant: remote,
                    });
                }
            }

            LinkEvent::StateChanged(LinkState::Failed) => self.on_link_failed(remote).await,

            LinkEvent::StateChanged(state) => {
                debug!(remote = %remote, "Link state {:?}", state);
            }
        }
    }

    /// Flips the local track of `kind` and every outbound sender carrying it.
    /// Returns `false` if there is no local track of that kind.
    pub async fn toggle_local_track(&mut self, kind: TrackKind, enabled: bool) -> bool {
        if !self.local.set_enabled(kind, enabled) {
            return false;
        }

        for (remote, peer) in &self.peers {
            if !peer.tracks_attached {
                continue;
            }
            if let Err(e) = peer.link.set_track_enabled(kind, enabled).await {
                warn!(remote = %remote, "Failed to toggle {} track: {}", kind, e);
            }
        }
        true
    }

    /// Earliest instant at which [`PeerOrchestrator::expire_negotiations`]
    /// has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.peers.values().filter_map(|p| p.deadline).min()
    }

    /// Fails every peer still waiting on its remote side at `now`.
    pub async fn expire_negotiations(&mut self, now: Instant) {
        let expired: Vec<ParticipantId> = self
            .peers
            .iter()
            .filter(|(_, p)| p.deadline.is_some_and(|d| d <= now))
            .map(|(id, _)| id.clone())
            .collect();

        for remote in expired {
            warn!(remote = %remote, "Negotiation timed out");
            self.fail_peer(&remote, "negotiation timed out".to_string())
                .await;
        }
    }

    /// Stops local tracks and closes every peer connection. Returns the
    /// peers that were open; later calls return nothing.
    pub async fn teardown(&mut self) -> Vec<ParticipantId> {
        if self.closed {
            return Vec::new();
        }
        self.closed = true;
        self.local.stop();

        let mut closed: Vec<ParticipantId> = Vec::with_capacity(self.peers.len());
        for (remote, peer) in self.peers.drain() {
            if let Err(e) = peer.link.close().await {
                debug!(remote = %remote, "Error closing link: {}", e);
            }
            closed.push(remote);
        }
        closed.sort();

        info!(participant = %self.local_id, peers = closed.len(), "Orchestrator torn down");
        closed
    }

    async fn on_existing_participants(&mut self, participants: Vec<ParticipantInfo>) {
        for participant in participants {
            let remote = participant.user_id;
            if remote == self.local_id || self.peers.contains_key(&remote) {
                continue;
            }
            if let Err(e) = self.open_peer(&remote, false).await {
                self.report_failure(&remote, format!("peer connection setup failed: {e}"));
            }
        }
    }

    async fn initiate(&mut self, remote: ParticipantId) {
        if let Err(e) = self.open_peer(&remote, true).await {
            self.report_failure(&remote, format!("peer connection setup failed: {e}"));
            return;
        }
        if let Err(e) = self.attach_tracks(&remote).await {
            self.fail_peer(&remote, format!("attaching local tracks failed: {e}"))
                .await;
            return;
        }
        self.send_offer(&remote, false).await;
    }

    async fn on_offer(&mut self, remote: ParticipantId, sdp: String) {
        match self.peers.get(&remote).map(|p| p.state) {
            None => {
                if let Err(e) = self.open_peer(&remote, false).await {
                    self.report_failure(&remote, format!("peer connection setup failed: {e}"));
                    return;
                }
            }
            Some(state) if !state.accepts_offer() => {
                warn!(remote = %remote, ?state, "Ignoring offer in current state");
                return;
            }
            Some(_) => {}
        }

        let Some(link) = self.link(&remote) else {
            return;
        };
        if let Err(e) = link.set_remote_description(SdpKind::Offer, sdp).await {
            self.fail_peer(&remote, format!("applying offer failed: {e}"))
                .await;
            return;
        }
        if let Some(peer) = self.peers.get_mut(&remote) {
            peer.state = PeerState::HaveRemoteOffer;
            peer.remote_description_set = true;
            peer.deadline = None;
        }
        self.flush_candidates(&remote).await;

        if let Err(e) = self.attach_tracks(&remote).await {
            self.fail_peer(&remote, format!("attaching local tracks failed: {e}"))
                .await;
            return;
        }

        match link.create_answer().await {
            Ok(answer) => {
                if let Some(peer) = self.peers.get_mut(&remote) {
                    peer.state = PeerState::Stable;
                }
                debug!(remote = %remote, "Sending answer");
                self.signals.send(ClientSignal::Answer {
                    target_user_id: remote,
                    sdp: answer,
                });
            }
            Err(e) => {
                self.fail_peer(&remote, format!("creating answer failed: {e}"))
                    .await
            }
        }
    }

    async fn on_answer(&mut self, remote: ParticipantId, sdp: String) {
        let Some(peer) = self.peers.get(&remote) else {
            debug!(remote = %remote, "Dropping answer for unknown peer");
            return;
        };
        if peer.state != PeerState::HaveLocalOffer {
            warn!(remote = %remote, state = ?peer.state, "Ignoring answer without pending offer");
            return;
        }

        let link = peer.link.clone();
        if let Err(e) = link.set_remote_description(SdpKind::Answer, sdp).await {
            self.fail_peer(&remote, format!("applying answer failed: {e}"))
                .await;
            return;
        }
        if let Some(peer) = self.peers.get_mut(&remote) {
            peer.state = PeerState::Stable;
            peer.remote_description_set = true;
            peer.deadline = None;
        }
        self.flush_candidates(&remote).await;
    }

    async fn on_remote_candidate(&mut self, remote: ParticipantId, candidate: IceCandidate) {
        let Some(peer) = self.peers.get_mut(&remote) else {
            debug!(remote = %remote, "Dropping candidate for unknown peer");
            return;
        };
        if !peer.remote_description_set {
            peer.pending_candidates.push(candidate);
            return;
        }

        let link = peer.link.clone();
        if let Err(e) = link.add_ice_candidate(candidate).await {
            warn!(remote = %remote, "Failed to apply ICE candidate: {}", e);
        }
    }

    async fn on_link_failed(&mut self, remote: ParticipantId) {
        let Some(peer) = self.peers.get_mut(&remote) else {
            return;
        };

        if peer.restart_attempted {
            self.fail_peer(&remote, "ICE failed after restart".to_string())
                .await;
            return;
        }

        peer.restart_attempted = true;
        peer.state = PeerState::Failed;
        if peer.initiator {
            warn!(remote = %remote, "ICE failed, restarting");
            self.send_offer(&remote, true).await;
        } else {
            warn!(remote = %remote, "ICE failed, waiting for restart offer");
            peer.deadline = Some(Instant::now() + self.settings.negotiation_timeout);
        }
    }

    async fn send_offer(&mut self, remote: &ParticipantId, ice_restart: bool) {
        let Some(link) = self.link(remote) else {
            return;
        };

        match link.create_offer(ice_restart).await {
            Ok(sdp) => {
                let deadline = Instant::now() + self.settings.negotiation_timeout;
                if let Some(peer) = self.peers.get_mut(remote) {
                    peer.state = PeerState::HaveLocalOffer;
                    peer.deadline = Some(deadline);
                }
                debug!(remote = %remote, ice_restart, "Sending offer");
                self.signals.send(ClientSignal::Offer {
                    target_user_id: remote.clone(),
                    sdp,
                });
            }
            Err(e) => {
                self.fail_peer(remote, format!("creating offer failed: {e}"))
                    .await
            }
        }
    }

    /// Creates the link for `remote`, replacing any previous one.
    async fn open_peer(
        &mut self,
        remote: &ParticipantId,
        initiator: bool,
    ) -> Result<(), MediaError> {
        if let Some(previous) = self.peers.remove(remote) {
            info!(remote = %remote, "Replacing existing peer connection");
            close_link(remote, previous.link).await;
            self.emit(CallEvent::PeerClosed {
                participant: remote.clone(),
            });
        }

        self.next_generation += 1;
        let generation = self.next_generation;
        let events = LinkEventSender::new(remote.clone(), generation, self.link_tx.clone());
        let link = self
            .transport
            .create_peer_connection(remote, &self.settings.ice_servers, events)
            .await?;

        debug!(remote = %remote, initiator, generation, "Peer connection created");
        self.peers
            .insert(remote.clone(), PeerEntry::new(link, generation, initiator));
        Ok(())
    }

    async fn attach_tracks(&mut self, remote: &ParticipantId) -> Result<(), MediaError> {
        let Some(peer) = self.peers.get(remote) else {
            return Ok(());
        };
        if peer.tracks_attached {
            return Ok(());
        }

        let link = peer.link.clone();
        for track in self.local.tracks().iter().filter(|t| !t.is_stopped()) {
            link.add_track(track.clone()).await?;
            if !track.is_enabled() {
                link.set_track_enabled(track.kind, false).await?;
            }
        }

        if let Some(peer) = self.peers.get_mut(remote) {
            peer.tracks_attached = true;
        }
        Ok(())
    }

    async fn flush_candidates(&mut self, remote: &ParticipantId) {
        let Some(peer) = self.peers.get_mut(remote) else {
            return;
        };
        let pending = std::mem::take(&mut peer.pending_candidates);
        if pending.is_empty() {
            return;
        }

        debug!(remote = %remote, count = pending.len(), "Applying buffered candidates");
        let link = peer.link.clone();
        for candidate in pending {
            if let Err(e) = link.add_ice_candidate(candidate).await {
                warn!(remote = %remote, "Failed to apply buffered candidate: {}", e);
            }
        }
    }

    async fn close_peer(&mut self, remote: &ParticipantId) {
        if let Some(peer) = self.peers.remove(remote) {
            close_link(remote, peer.link).await;
            info!(remote = %remote, "Peer connection closed");
            self.emit(CallEvent::PeerClosed {
                participant: remote.clone(),
            });
        }
    }

    async fn fail_peer(&mut self, remote: &ParticipantId, reason: String) {
        if let Some(peer) = self.peers.remove(remote) {
            close_link(remote, peer.link).await;
        }
        self.report_failure(remote, reason);
    }

    fn report_failure(&self, remote: &ParticipantId, reason: String) {
        warn!(remote = %remote, "Peer failed: {}", reason);
        self.emit(CallEvent::PeerFailed {
            participant: remote.clone(),
            reason,
        });
    }

    async fn reset_peers(&mut self) {
        let remotes = self.peers();
        for remote in remotes {
            self.close_peer(&remote).await;
        }
    }

    fn link(&self, remote: &ParticipantId) -> Option<Arc<dyn PeerLink>> {
        self.peers.get(remote).map(|p| p.link.clone())
    }

    fn emit(&self, event: CallEvent) {
        let _ = self.events.send(event);
    }
}

async fn close_link(remote: &ParticipantId, link: Arc<dyn PeerLink>) {
    if let Err(e) = link.close().await {
        debug!(remote = %remote, "Error closing link: {}", e);
    }
}
