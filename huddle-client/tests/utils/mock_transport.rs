use async_trait::async_trait;
use huddle_client::{
    LinkEvent, LinkEventSender, LocalTrack, MediaError, MediaTransport, PeerLink, SdpKind,
    TrackKind,
};
use huddle_core::{IceCandidate, IceServerConfig, ParticipantId};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One call made on a [`MockLink`], in order.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkCall {
    CreateOffer { ice_restart: bool },
    CreateAnswer,
    SetRemote(SdpKind, String),
    AddCandidate(String),
    AddTrack(TrackKind),
    RemoveTrack(TrackKind),
    SetTrackEnabled(TrackKind, bool),
    Close,
}

/// Scripted peer link that records every call.
pub struct MockLink {
    pub remote: ParticipantId,
    events: LinkEventSender,
    calls: Mutex<Vec<LinkCall>>,
    offers: AtomicUsize,
    closed: AtomicBool,
}

impl MockLink {
    pub fn calls(&self) -> Vec<LinkCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Candidates handed to the media stack, in order.
    pub fn applied_candidates(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                LinkCall::AddCandidate(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    pub fn position(&self, pred: impl Fn(&LinkCall) -> bool) -> Option<usize> {
        self.calls().iter().position(pred)
    }

    /// Simulates the media stack reporting something for this link.
    pub fn emit(&self, event: LinkEvent) -> bool {
        self.events.emit(event)
    }

    fn record(&self, call: LinkCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl PeerLink for MockLink {
    async fn create_offer(&self, ice_restart: bool) -> Result<String, MediaError> {
        self.record(LinkCall::CreateOffer { ice_restart });
        let n = self.offers.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("offer-to-{}-{}", self.remote, n))
    }

    async fn create_answer(&self) -> Result<String, MediaError> {
        self.record(LinkCall::CreateAnswer);
        Ok(format!("answer-to-{}", self.remote))
    }

    async fn set_remote_description(&self, kind: SdpKind, sdp: String) -> Result<(), MediaError> {
        self.record(LinkCall::SetRemote(kind, sdp));
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), MediaError> {
        self.record(LinkCall::AddCandidate(candidate.candidate));
        Ok(())
    }

    async fn add_track(&self, track: LocalTrack) -> Result<(), MediaError> {
        self.record(LinkCall::AddTrack(track.kind));
        Ok(())
    }

    async fn remove_track(&self, kind: TrackKind) -> Result<(), MediaError> {
        self.record(LinkCall::RemoveTrack(kind));
        Ok(())
    }

    async fn set_track_enabled(&self, kind: TrackKind, enabled: bool) -> Result<(), MediaError> {
        self.record(LinkCall::SetTrackEnabled(kind, enabled));
        Ok(())
    }

    async fn close(&self) -> Result<(), MediaError> {
        self.record(LinkCall::Close);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Transport handing out [`MockLink`]s and remembering all of them.
#[derive(Default)]
pub struct MockTransport {
    links: Mutex<Vec<Arc<MockLink>>>,
    fail_create: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn links_for(&self, remote: &str) -> Vec<Arc<MockLink>> {
        self.links
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.remote.as_str() == remote)
            .cloned()
            .collect()
    }

    pub fn latest(&self, remote: &str) -> Option<Arc<MockLink>> {
        self.links_for(remote).pop()
    }

    pub fn link_count(&self) -> usize {
        self.links.lock().unwrap().len()
    }
}

#[async_trait]
impl MediaTransport for MockTransport {
    async fn create_peer_connection(
        &self,
        remote: &ParticipantId,
        _ice_servers: &[IceServerConfig],
        events: LinkEventSender,
    ) -> Result<Arc<dyn PeerLink>, MediaError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(MediaError::Transport(anyhow::anyhow!("no media stack")));
        }
        let link = Arc::new(MockLink {
            remote: remote.clone(),
            events,
            calls: Mutex::new(Vec::new()),
            offers: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        });
        self.links.lock().unwrap().push(link.clone());
        Ok(link)
    }
}
