use crate::error::ClientError;
use huddle_core::{CallId, DEFAULT_STUN_URLS, IceServerConfig, ParticipantId, RoomId};
use std::time::Duration;
use url::Url;

/// Capped exponential backoff for relay reconnects.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Retries after an unexpected drop before giving up for good.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let millis = self.initial_backoff.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = millis.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }

    pub fn is_exhausted(&self, attempt: u32) -> bool {
        attempt > self.max_attempts
    }
}

/// Everything a client needs to join one call.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint of the relay, e.g. `ws://localhost:3000/ws`.
    pub relay_url: String,
    pub room_id: RoomId,
    pub participant_id: ParticipantId,
    pub display_name: String,
    /// Key of the durable call record. Defaults to the room id.
    pub call_id: Option<CallId>,
    /// Used until the relay announces its own list in `welcome`.
    pub ice_servers: Vec<IceServerConfig>,
    pub reconnect: ReconnectPolicy,
    pub negotiation_timeout: Duration,
    /// Upper bound on the best-effort goodbye sent when hanging up.
    pub leave_timeout: Duration,
    pub broadcast_media_state: bool,
}

impl ClientConfig {
    pub fn new(
        relay_url: impl Into<String>,
        room_id: impl Into<RoomId>,
        participant_id: impl Into<ParticipantId>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            relay_url: relay_url.into(),
            room_id: room_id.into(),
            participant_id: participant_id.into(),
            display_name: display_name.into(),
            call_id: None,
            ice_servers: DEFAULT_STUN_URLS
                .iter()
                .map(|url| IceServerConfig::stun(*url))
                .collect(),
            reconnect: ReconnectPolicy::default(),
            negotiation_timeout: Duration::from_secs(15),
            leave_timeout: Duration::from_secs(2),
            broadcast_media_state: true,
        }
    }

    pub fn with_call_id(mut self, call_id: impl Into<CallId>) -> Self {
        self.call_id = Some(call_id.into());
        self
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn with_negotiation_timeout(mut self, timeout: Duration) -> Self {
        self.negotiation_timeout = timeout;
        self
    }

    pub fn with_ice_servers(mut self, ice_servers: Vec<IceServerConfig>) -> Self {
        self.ice_servers = ice_servers;
        self
    }

    pub fn call_id(&self) -> CallId {
        self.call_id
            .clone()
            .unwrap_or_else(|| CallId::from(&self.room_id))
    }

    /// Relay URL with the connection-time parameters appended.
    pub fn connect_url(&self) -> Result<Url, ClientError> {
        let mut url = Url::parse(&self.relay_url)?;
        url.query_pairs_mut()
            .append_pair("roomId", self.room_id.as_str())
            .append_pair("participantId", self.participant_id.as_str())
            .append_pair("displayName", &self.display_name);
        Ok(url)
    }
}
