use huddle_core::IceServerConfig;
use std::net::SocketAddr;
use std::time::Duration;

/// A session is never reaped before this many heartbeat intervals of silence.
pub const MIN_MISSED_HEARTBEATS: u32 = 2;

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Period of the liveness tick (ping + reap).
    pub heartbeat_interval: Duration,
    /// Intervals of silence tolerated before a session is considered stale.
    pub missed_heartbeats: u32,
    /// Capacity of each room actor's command queue.
    pub room_queue_capacity: usize,
    /// ICE servers announced to clients in `welcome`.
    pub ice_servers: Vec<IceServerConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            heartbeat_interval: Duration::from_secs(15),
            missed_heartbeats: MIN_MISSED_HEARTBEATS,
            room_queue_capacity: 100,
            ice_servers: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    pub fn with_heartbeat(mut self, interval: Duration, missed: u32) -> Self {
        self.heartbeat_interval = interval;
        self.missed_heartbeats = missed;
        self
    }

    pub fn with_ice_servers(mut self, ice_servers: Vec<IceServerConfig>) -> Self {
        self.ice_servers = ice_servers;
        self
    }

    /// Silence after which a session gets reaped.
    pub fn stale_after(&self) -> Duration {
        self.heartbeat_interval * self.missed_heartbeats.max(MIN_MISSED_HEARTBEATS)
    }
}
