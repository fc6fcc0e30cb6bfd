use crate::room::RoomManager;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Periodically asks every room to ping its sessions and reap the silent ones.
pub struct LivenessSupervisor {
    rooms: RoomManager,
    interval: Duration,
}

impl LivenessSupervisor {
    pub fn new(rooms: RoomManager, interval: Duration) -> Self {
        Self { rooms, interval }
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(interval = ?self.interval, "Liveness supervisor started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    debug!(rooms = self.rooms.room_count(), "Heartbeat tick");
                    self.rooms.heartbeat_all().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Liveness supervisor stopped");
    }
}
