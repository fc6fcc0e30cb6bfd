use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::media::{LocalStream, MediaTransport, PeerLinkEvent};
use crate::media_control::{MediaControl, MediaState};
use crate::orchestrator::{CallEvent, EndReason, OrchestratorSettings, PeerOrchestrator};
use crate::relay::{RelayClient, RelayEvent, RelayState};
use crate::signal_sink::SignalSink;
use crate::sync::{CallStore, MembershipSynchronizer};
use huddle_core::{CallId, ClientSignal, ParticipantId, ParticipantInfo, ServerSignal};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

enum SessionCommand {
    SetMuted(bool),
    SetCameraEnabled(bool),
    ToggleMute,
    ToggleCamera,
    HangUp(oneshot::Sender<()>),
}

/// Caller-side handle of a running [`CallSession`].
///
/// Dropping every handle hangs up.
#[derive(Clone)]
pub struct CallHandle {
    call_id: CallId,
    participant_id: ParticipantId,
    commands: mpsc::UnboundedSender<SessionCommand>,
    media_state: watch::Receiver<MediaState>,
}

impl CallHandle {
    pub fn call_id(&self) -> &CallId {
        &self.call_id
    }

    pub fn participant_id(&self) -> &ParticipantId {
        &self.participant_id
    }

    pub fn is_active(&self) -> bool {
        !self.commands.is_closed()
    }

    pub fn media_state(&self) -> MediaState {
        *self.media_state.borrow()
    }

    pub fn watch_media_state(&self) -> watch::Receiver<MediaState> {
        self.media_state.clone()
    }

    pub fn set_muted(&self, muted: bool) -> Result<(), ClientError> {
        self.command(SessionCommand::SetMuted(muted))
    }

    pub fn set_camera_enabled(&self, enabled: bool) -> Result<(), ClientError> {
        self.command(SessionCommand::SetCameraEnabled(enabled))
    }

    pub fn toggle_mute(&self) -> Result<(), ClientError> {
        self.command(SessionCommand::ToggleMute)
    }

    pub fn toggle_camera(&self) -> Result<(), ClientError> {
        self.command(SessionCommand::ToggleCamera)
    }

    /// Leaves the call. Local media stops before anything goes over the
    /// network; calling it again after the call ended returns immediately.
    pub async fn hang_up(&self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.commands.send(SessionCommand::HangUp(reply_tx)).is_err() {
            return;
        }
        let _ = reply_rx.await;
    }

    fn command(&self, command: SessionCommand) -> Result<(), ClientError> {
        self.commands
            .send(command)
            .map_err(|_| ClientError::SessionEnded)
    }
}

/// Context object for one call: owns the relay link, the peer mesh, the
/// durable-record sync and the media toggles, and runs them on one task.
pub struct CallSession {
    config: ClientConfig,
    call_id: CallId,
    orchestrator: PeerOrchestrator,
    link_events: mpsc::UnboundedReceiver<PeerLinkEvent>,
    synchronizer: MembershipSynchronizer,
    media: MediaControl,
    relay: Option<RelayClient>,
    relay_events: mpsc::UnboundedReceiver<RelayEvent>,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    events: mpsc::UnboundedSender<CallEvent>,
    joined: bool,
    ended: bool,
}

impl CallSession {
    /// Connects to the relay and returns once the relay welcomed us.
    ///
    /// Fails if `local` has no live track, or if the relay cannot be reached
    /// within the reconnect policy.
    pub async fn start(
        config: ClientConfig,
        local: LocalStream,
        transport: Arc<dyn MediaTransport>,
        store: Arc<dyn CallStore>,
    ) -> Result<(CallHandle, mpsc::UnboundedReceiver<CallEvent>), ClientError> {
        if !local.is_usable() {
            return Err(ClientError::NoLocalMedia);
        }

        let (relay, relay_events) = RelayClient::spawn(&config)?;
        let signals: Arc<dyn SignalSink> = Arc::new(relay.sender());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        let media = MediaControl::new(
            MediaState::from_stream(&local),
            signals.clone(),
            config.broadcast_media_state,
        );
        let (orchestrator, link_events) = PeerOrchestrator::new(
            config.participant_id.clone(),
            local,
            transport,
            signals,
            events_tx.clone(),
            OrchestratorSettings::from(&config),
        );

        let handle = CallHandle {
            call_id: config.call_id(),
            participant_id: config.participant_id.clone(),
            commands: commands_tx,
            media_state: media.subscribe(),
        };

        let mut session = Self {
            call_id: config.call_id(),
            config,
            orchestrator,
            link_events,
            synchronizer: MembershipSynchronizer::new(store),
            media,
            relay: Some(relay),
            relay_events,
            commands: commands_rx,
            events: events_tx,
            joined: false,
            ended: false,
        };

        session.await_welcome().await?;
        tokio::spawn(session.run());
        Ok((handle, events_rx))
    }

    async fn await_welcome(&mut self) -> Result<(), ClientError> {
        loop {
            match self.relay_events.recv().await {
                Some(RelayEvent::Signal(signal)) => {
                    let welcomed = matches!(signal, ServerSignal::Welcome { .. });
                    self.on_relay_signal(signal).await;
                    if welcomed {
                        return Ok(());
                    }
                }
                Some(RelayEvent::State(state)) => {
                    self.emit(CallEvent::RelayStateChanged(state.clone()));
                    let error = match state {
                        RelayState::Disconnected => ClientError::RelayExhausted {
                            attempts: self.config.reconnect.max_attempts,
                        },
                        RelayState::Closed { reason, .. } => ClientError::RelayRejected(reason),
                        _ => continue,
                    };
                    self.finish(EndReason::RelayLost).await;
                    return Err(error);
                }
                None => {
                    self.finish(EndReason::RelayLost).await;
                    return Err(ClientError::RelayExhausted {
                        attempts: self.config.reconnect.max_attempts,
                    });
                }
            }
        }
    }

    async fn run(mut self) {
        info!(
            call = %self.call_id,
            participant = %self.config.participant_id,
            "Call session started"
        );

        loop {
            let deadline = self.orchestrator.next_deadline();

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(SessionCommand::HangUp(reply)) => {
                        self.finish(EndReason::HungUp).await;
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.on_command(command).await,
                    None => {
                        self.finish(EndReason::HungUp).await;
                        break;
                    }
                },

                event = self.relay_events.recv() => match event {
                    Some(RelayEvent::Signal(signal)) => self.on_relay_signal(signal).await,
                    Some(RelayEvent::State(state)) => {
                        if self.on_relay_state(state).await {
                            break;
                        }
                    }
                    None => {
                        self.finish(EndReason::RelayLost).await;
                        break;
                    }
                },

                Some(event) = self.link_events.recv() => {
                    self.orchestrator.on_link_event(event).await;
                }

                _ = sleep_until_deadline(deadline) => {
                    self.orchestrator.expire_negotiations(Instant::now()).await;
                }
            }
        }

        info!(call = %self.call_id, "Call session finished");
    }

    async fn on_command(&mut self, command: SessionCommand) {
        let applied = match command {
            SessionCommand::SetMuted(muted) => {
                self.media.set_muted(&mut self.orchestrator, muted).await
            }
            SessionCommand::SetCameraEnabled(enabled) => {
                self.media
                    .set_camera_enabled(&mut self.orchestrator, enabled)
                    .await
            }
            SessionCommand::ToggleMute => self.media.toggle_mute(&mut self.orchestrator).await,
            SessionCommand::ToggleCamera => self.media.toggle_camera(&mut self.orchestrator).await,
            SessionCommand::HangUp(_) => true,
        };
        if !applied {
            debug!(call = %self.call_id, "Media command ignored, track not captured");
        }
    }

    async fn on_relay_signal(&mut self, signal: ServerSignal) {
        match signal {
            ServerSignal::Welcome {
                ref room_id,
                ref participant_id,
                ref participants,
                ..
            } => {
                let first = !self.joined;
                self.joined = true;
                let room_id = room_id.clone();
                let participant_id = participant_id.clone();
                let participants = participants.clone();

                self.orchestrator.handle(signal).await;
                if first {
                    self.emit(CallEvent::Joined {
                        room_id,
                        participant_id: participant_id.clone(),
                        participants: participants.clone(),
                    });
                }
                self.emit(CallEvent::ParticipantsChanged {
                    participants: participants.clone(),
                });

                if let Err(e) = self
                    .synchronizer
                    .on_join(&self.call_id, &self.config.room_id, &participant_id)
                    .await
                {
                    warn!(call = %self.call_id, "Failed to record join: {}", e);
                }
                self.reconcile(&participants).await;
                self.media.announce();
            }

            ServerSignal::ParticipantJoined {
                ref participants, ..
            }
            | ServerSignal::ParticipantLeft {
                ref participants, ..
            } => {
                let participants = participants.clone();
                self.orchestrator.handle(signal).await;
                self.emit(CallEvent::ParticipantsChanged {
                    participants: participants.clone(),
                });
                self.reconcile(&participants).await;
            }

            other => self.orchestrator.handle(other).await,
        }
    }

    /// Returns `true` once the session is over.
    async fn on_relay_state(&mut self, state: RelayState) -> bool {
        self.emit(CallEvent::RelayStateChanged(state.clone()));

        match state {
            RelayState::Disconnected => {
                self.finish(EndReason::RelayLost).await;
                true
            }
            RelayState::Closed { .. } => {
                self.finish(EndReason::Replaced).await;
                true
            }
            RelayState::Connected => {
                debug!(call = %self.call_id, "Relay connected, waiting for welcome");
                false
            }
            _ => false,
        }
    }

    async fn reconcile(&self, participants: &[ParticipantInfo]) {
        let live: BTreeSet<ParticipantId> =
            participants.iter().map(|p| p.user_id.clone()).collect();
        if let Err(e) = self
            .synchronizer
            .reconcile(&self.call_id, &self.config.room_id, &live)
            .await
        {
            warn!(call = %self.call_id, "Failed to reconcile call record: {}", e);
        }
    }

    /// Single exit path. Local media goes first, the network goodbye is
    /// best-effort and bounded by the leave timeout.
    async fn finish(&mut self, reason: EndReason) {
        if self.ended {
            return;
        }
        self.ended = true;

        let peers = self.orchestrator.teardown().await;

        if let Some(relay) = self.relay.take() {
            if reason == EndReason::HungUp {
                for peer in peers {
                    relay.send(ClientSignal::CallEnded {
                        target_user_id: peer,
                    });
                }
                relay.send(ClientSignal::Leave);
            }
            relay.close(self.config.leave_timeout).await;
        }

        // A replacing session of the same participant keeps the record entry.
        if reason != EndReason::Replaced {
            if let Err(e) = self
                .synchronizer
                .on_leave(&self.call_id, &self.config.participant_id)
                .await
            {
                warn!(call = %self.call_id, "Failed to record leave: {}", e);
            }
        }

        info!(call = %self.call_id, ?reason, "Call ended");
        self.emit(CallEvent::Ended { reason });
    }

    fn emit(&self, event: CallEvent) {
        let _ = self.events.send(event);
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
