use crate::error::MediaError;
use crate::media::{
    LinkEvent, LinkEventSender, LinkState, LocalTrack, MediaTransport, PeerLink, RemoteTrackInfo,
    SdpKind, TrackKind,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use huddle_core::{IceCandidate, IceServerConfig, ParticipantId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8, MediaEngine};
use webrtc::api::setting_engine::SettingEngine;
use webrtc::api::{API, APIBuilder};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::media::Sample;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::offer_answer_options::RTCOfferOptions;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

type RemoteTracks = DashMap<(ParticipantId, String), Arc<TrackRemote>>;

/// [`MediaTransport`] on top of webrtc-rs.
///
/// Each [`LocalTrack`] maps to one `TrackLocalStaticSample` shared by every
/// peer connection, so the capture pipeline writes a sample once through
/// [`WebRtcTransport::write_sample`] and all peers receive it.
#[derive(Clone)]
pub struct WebRtcTransport {
    inner: Arc<TransportInner>,
}

struct TransportInner {
    api: API,
    local_tracks: DashMap<String, Arc<TrackLocalStaticSample>>,
    remote_tracks: Arc<RemoteTracks>,
}

impl WebRtcTransport {
    pub fn new() -> Result<Self> {
        Self::with_settings(SettingEngine::default())
    }

    /// Transport with custom ICE/network settings, e.g. a fixed UDP port
    /// range or loopback candidates.
    pub fn with_settings(settings: SettingEngine) -> Result<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .context("Failed to register default codecs")?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .context("Failed to register interceptors")?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .with_setting_engine(settings)
            .build();

        Ok(Self {
            inner: Arc::new(TransportInner {
                api,
                local_tracks: DashMap::new(),
                remote_tracks: Arc::new(DashMap::new()),
            }),
        })
    }

    /// Feeds one encoded media sample into a local track.
    pub async fn write_sample(
        &self,
        track_id: &str,
        data: Bytes,
        duration: Duration,
    ) -> Result<()> {
        let track = self
            .inner
            .local_tracks
            .get(track_id)
            .map(|t| t.value().clone())
            .with_context(|| format!("Unknown local track {track_id}"))?;

        track
            .write_sample(&Sample {
                data,
                duration,
                ..Default::default()
            })
            .await
            .context("Failed to write sample")?;
        Ok(())
    }

    /// Inbound track from `participant`, for the renderer.
    pub fn remote_track(
        &self,
        participant: &ParticipantId,
        track_id: &str,
    ) -> Option<Arc<TrackRemote>> {
        self.inner
            .remote_tracks
            .get(&(participant.clone(), track_id.to_owned()))
            .map(|t| t.value().clone())
    }

    fn sample_track(&self, track: &LocalTrack) -> Arc<TrackLocalStaticSample> {
        self.inner
            .local_tracks
            .entry(track.id.clone())
            .or_insert_with(|| {
                let capability = match track.kind {
                    TrackKind::Audio => RTCRtpCodecCapability {
                        mime_type: MIME_TYPE_OPUS.to_owned(),
                        clock_rate: 48000,
                        channels: 2,
                        sdp_fmtp_line: String::new(),
                        rtcp_feedback: vec![],
                    },
                    TrackKind::Video => RTCRtpCodecCapability {
                        mime_type: MIME_TYPE_VP8.to_owned(),
                        clock_rate: 90000,
                        channels: 0,
                        sdp_fmtp_line: String::new(),
                        rtcp_feedback: vec![],
                    },
                };
                Arc::new(TrackLocalStaticSample::new(
                    capability,
                    track.id.clone(),
                    track.stream_id.clone(),
                ))
            })
            .clone()
    }

    async fn open(
        &self,
        remote: &ParticipantId,
        ice_servers: &[IceServerConfig],
        events: LinkEventSender,
    ) -> Result<Arc<WebRtcLink>> {
        let config = RTCConfiguration {
            ice_servers: ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let pc = Arc::new(
            self.inner
                .api
                .new_peer_connection(config)
                .await
                .context("Failed to create peer connection")?,
        );

        let state_events = events.clone();
        pc.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
            let events = state_events.clone();
            Box::pin(async move {
                debug!(remote = %events.remote(), "Peer connection state: {:?}", s);
                let state = match s {
                    RTCPeerConnectionState::Connected => LinkState::Connected,
                    RTCPeerConnectionState::Disconnected => LinkState::Disconnected,
                    RTCPeerConnectionState::Failed => LinkState::Failed,
                    RTCPeerConnectionState::Closed => LinkState::Closed,
                    _ => LinkState::Connecting,
                };
                events.emit(LinkEvent::StateChanged(state));
            })
        }));

        let ice_events = events.clone();
        pc.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let events = ice_events.clone();
            Box::pin(async move {
                let Some(candidate) = c else { return };
                match candidate.to_json() {
                    Ok(init) => {
                        events.emit(LinkEvent::LocalCandidate(IceCandidate {
                            candidate: init.candidate,
                            sdp_m_line_index: init.sdp_mline_index,
                            sdp_mid: init.sdp_mid,
                        }));
                    }
                    Err(e) => warn!("Failed to serialize local candidate: {}", e),
                }
            })
        }));

        let track_events = events.clone();
        let remote_tracks = self.inner.remote_tracks.clone();
        pc.on_track(Box::new(move |track: Arc<TrackRemote>, _receiver, _transceiver| {
            let events = track_events.clone();
            let remote_tracks = remote_tracks.clone();
            Box::pin(async move {
                let kind = match track.kind() {
                    RTPCodecType::Audio => TrackKind::Audio,
                    RTPCodecType::Video => TrackKind::Video,
                    _ => return,
                };
                let info = RemoteTrackInfo {
                    id: track.id(),
                    kind,
                    stream_id: track.stream_id(),
                };
                info!(
                    remote = %events.remote(),
                    track = %info.id,
                    "Remote {} track received", kind
                );
                remote_tracks.insert((events.remote().clone(), info.id.clone()), track);
                events.emit(LinkEvent::RemoteTrack(info));
            })
        }));

        Ok(Arc::new(WebRtcLink {
            remote: remote.clone(),
            pc,
            senders: Mutex::new(HashMap::new()),
            remote_tracks: self.inner.remote_tracks.clone(),
        }))
    }
}

#[async_trait]
impl MediaTransport for WebRtcTransport {
    async fn create_peer_connection(
        &self,
        remote: &ParticipantId,
        ice_servers: &[IceServerConfig],
        events: LinkEventSender,
    ) -> Result<Arc<dyn PeerLink>, MediaError> {
        let link = self.open(remote, ice_servers, events).await?;
        Ok(Arc::new(BoundLink {
            transport: self.clone(),
            link,
        }))
    }
}

struct OutboundSender {
    sender: Arc<RTCRtpSender>,
    track: Arc<TrackLocalStaticSample>,
}

struct WebRtcLink {
    remote: ParticipantId,
    pc: Arc<RTCPeerConnection>,
    senders: Mutex<HashMap<TrackKind, OutboundSender>>,
    remote_tracks: Arc<RemoteTracks>,
}

impl WebRtcLink {
    async fn offer(&self, ice_restart: bool) -> Result<String> {
        let options = ice_restart.then(|| RTCOfferOptions {
            ice_restart: true,
            ..Default::default()
        });
        let offer = self.pc.create_offer(options).await?;
        self.pc.set_local_description(offer.clone()).await?;
        Ok(offer.sdp)
    }

    async fn answer(&self) -> Result<String> {
        let answer = self.pc.create_answer(None).await?;
        self.pc.set_local_description(answer.clone()).await?;
        Ok(answer.sdp)
    }

    async fn apply_remote(&self, kind: SdpKind, sdp: String) -> Result<()> {
        let desc = match kind {
            SdpKind::Offer => RTCSessionDescription::offer(sdp)?,
            SdpKind::Answer => RTCSessionDescription::answer(sdp)?,
        };
        self.pc
            .set_remote_description(desc)
            .await
            .context("Failed to set remote description")?;
        Ok(())
    }

    async fn apply_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.pc
            .add_ice_candidate(RTCIceCandidateInit {
                candidate: candidate.candidate,
                sdp_mid: candidate.sdp_mid,
                sdp_mline_index: candidate.sdp_m_line_index,
                username_fragment: None,
            })
            .await
            .context("Failed to add ICE candidate")?;
        Ok(())
    }

    async fn attach(&self, track: Arc<TrackLocalStaticSample>, kind: TrackKind) -> Result<()> {
        let mut senders = self.senders.lock().await;
        if senders.contains_key(&kind) {
            return Ok(());
        }
        let sender = self
            .pc
            .add_track(track.clone() as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .with_context(|| format!("Failed to add {kind} track"))?;

        // Drain RTCP so the interceptors keep running.
        let rtcp_sender = sender.clone();
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            while rtcp_sender.read(&mut buf).await.is_ok() {}
        });

        senders.insert(kind, OutboundSender { sender, track });
        Ok(())
    }

    async fn detach(&self, kind: TrackKind) -> Result<()> {
        if let Some(outbound) = self.senders.lock().await.remove(&kind) {
            self.pc.remove_track(&outbound.sender).await?;
        }
        Ok(())
    }

    async fn toggle(&self, kind: TrackKind, enabled: bool) -> Result<bool> {
        let senders = self.senders.lock().await;
        let Some(outbound) = senders.get(&kind) else {
            return Ok(false);
        };
        let track = enabled.then(|| outbound.track.clone() as Arc<dyn TrackLocal + Send + Sync>);
        outbound.sender.replace_track(track).await?;
        Ok(true)
    }

    async fn shutdown(&self) -> Result<()> {
        self.senders.lock().await.clear();
        self.remote_tracks.retain(|(participant, _), _| participant != &self.remote);
        self.pc.close().await?;
        Ok(())
    }
}

/// A link paired with the transport owning the shared local tracks.
struct BoundLink {
    transport: WebRtcTransport,
    link: Arc<WebRtcLink>,
}

#[async_trait]
impl PeerLink for BoundLink {
    async fn create_offer(&self, ice_restart: bool) -> Result<String, MediaError> {
        Ok(self.link.offer(ice_restart).await?)
    }

    async fn create_answer(&self) -> Result<String, MediaError> {
        Ok(self.link.answer().await?)
    }

    async fn set_remote_description(&self, kind: SdpKind, sdp: String) -> Result<(), MediaError> {
        Ok(self.link.apply_remote(kind, sdp).await?)
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), MediaError> {
        Ok(self.link.apply_candidate(candidate).await?)
    }

    async fn add_track(&self, track: LocalTrack) -> Result<(), MediaError> {
        let sample_track = self.transport.sample_track(&track);
        Ok(self.link.attach(sample_track, track.kind).await?)
    }

    async fn remove_track(&self, kind: TrackKind) -> Result<(), MediaError> {
        Ok(self.link.detach(kind).await?)
    }

    async fn set_track_enabled(&self, kind: TrackKind, enabled: bool) -> Result<(), MediaError> {
        if self.link.toggle(kind, enabled).await? {
            Ok(())
        } else {
            Err(MediaError::NoTrack(kind))
        }
    }

    async fn close(&self) -> Result<(), MediaError> {
        Ok(self.link.shutdown().await?)
    }
}
