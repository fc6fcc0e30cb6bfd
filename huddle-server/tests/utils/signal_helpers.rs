use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use huddle_core::{ClientSignal, ParticipantId, RoomId, ServerSignal};
use huddle_server::{Session, SignalingService};

use super::mock_output::MockSessionOutput;

/// Timeout for signal exchange operations (ms).
pub const SIGNAL_TIMEOUT_MS: u64 = 2000;

/// Window during which a peer must stay silent in negative checks (ms).
pub const SILENCE_WINDOW_MS: u64 = 200;

/// A session admitted through the service with a capturing output.
pub struct TestPeer {
    pub session: Session,
    pub output: MockSessionOutput,
    pub rx: mpsc::UnboundedReceiver<ServerSignal>,
}

impl TestPeer {
    pub fn id(&self) -> ParticipantId {
        self.session.participant_id.clone()
    }

    pub async fn send(&self, service: &SignalingService, signal: ClientSignal) {
        service.handle_signal(&self.session, signal).await;
    }

    /// Next envelope that is not a liveness ping.
    pub async fn next(&mut self) -> Result<ServerSignal> {
        wait_for(&mut self.rx, |s| !matches!(s, ServerSignal::Ping)).await
    }
}

/// Admit `participant` into `room` and wait for its `welcome`.
pub async fn join(service: &SignalingService, room: &str, participant: &str) -> Result<TestPeer> {
    let (output, rx) = MockSessionOutput::new();
    let session = service
        .connect(
            RoomId::from(room),
            ParticipantId::from(participant),
            participant.to_uppercase(),
            Arc::new(output.clone()),
        )
        .await
        .context("Failed to connect")?;

    let mut peer = TestPeer {
        session,
        output,
        rx,
    };
    wait_for(&mut peer.rx, |s| matches!(s, ServerSignal::Welcome { .. }))
        .await
        .context("No welcome received")?;
    Ok(peer)
}

/// Wait for the first signal matching `pred`, skipping the others.
pub async fn wait_for<F>(
    rx: &mut mpsc::UnboundedReceiver<ServerSignal>,
    pred: F,
) -> Result<ServerSignal>
where
    F: Fn(&ServerSignal) -> bool,
{
    let deadline = Duration::from_millis(SIGNAL_TIMEOUT_MS);
    tokio::time::timeout(deadline, async {
        loop {
            match rx.recv().await {
                Some(signal) if pred(&signal) => return Ok(signal),
                Some(_) => continue,
                None => anyhow::bail!("Signal channel closed"),
            }
        }
    })
    .await
    .context("Timeout waiting for signal")?
}

/// True if nothing but pings arrives within the silence window.
pub async fn stays_silent(rx: &mut mpsc::UnboundedReceiver<ServerSignal>) -> bool {
    let window = Duration::from_millis(SILENCE_WINDOW_MS);
    tokio::time::timeout(window, async {
        loop {
            match rx.recv().await {
                Some(ServerSignal::Ping) => continue,
                other => return other,
            }
        }
    })
    .await
    .is_err()
}

/// Poll `cond` until it holds or the signal timeout elapses.
pub async fn wait_until<F>(cond: F) -> bool
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_millis(SIGNAL_TIMEOUT_MS);
    loop {
        if cond() {
            return true;
        }
        if tokio::time::Instant::now() > deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub fn ids(participants: &[huddle_core::ParticipantInfo]) -> Vec<String> {
    participants.iter().map(|p| p.user_id.to_string()).collect()
}
