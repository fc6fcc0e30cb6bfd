use crate::config::{ClientConfig, ReconnectPolicy};
use crate::error::ClientError;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use huddle_core::{ClientSignal, ServerSignal};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};
use url::Url;

/// Close code the relay uses when a newer connection of the same
/// participant took over.
pub const REPLACED_CLOSE_CODE: u16 = 4001;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Connectivity of the relay link as reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayState {
    Connecting,
    Connected,
    Reconnecting { attempt: u32, delay: Duration },
    /// The relay closed the session on purpose. Terminal.
    Closed { code: u16, reason: String },
    /// Reconnect attempts exhausted. Terminal.
    Disconnected,
}

impl RelayState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed { .. } | Self::Disconnected)
    }
}

#[derive(Debug, Clone)]
pub enum RelayEvent {
    State(RelayState),
    Signal(ServerSignal),
}

/// Persistent connection to the relay with automatic reconnects.
///
/// `ping` from the relay is answered here and never surfaces as an event.
pub struct RelayClient {
    outbound: mpsc::UnboundedSender<ClientSignal>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RelayClient {
    pub fn spawn(
        config: &ClientConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<RelayEvent>), ClientError> {
        let url = config.connect_url()?;
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let worker = RelayWorker {
            url,
            policy: config.reconnect.clone(),
            outbound: outbound_rx,
            events: events_tx,
            shutdown: shutdown_rx,
        };
        let task = tokio::spawn(worker.run());

        Ok((
            Self {
                outbound: outbound_tx,
                shutdown: shutdown_tx,
                task,
            },
            events_rx,
        ))
    }

    /// Cloneable handle for queuing envelopes.
    pub fn sender(&self) -> mpsc::UnboundedSender<ClientSignal> {
        self.outbound.clone()
    }

    pub fn send(&self, signal: ClientSignal) -> bool {
        self.outbound.send(signal).is_ok()
    }

    /// Flushes what is already queued and closes the socket, giving up
    /// after `timeout`.
    pub async fn close(self, timeout: Duration) {
        let _ = self.shutdown.send(true);
        let mut task = self.task;
        if tokio::time::timeout(timeout, &mut task).await.is_err() {
            warn!("Relay did not close in {:?}, dropping connection", timeout);
            task.abort();
        }
    }
}

enum SocketExit {
    Shutdown,
    Dropped,
    Rejected { code: u16, reason: String },
}

struct RelayWorker {
    url: Url,
    policy: ReconnectPolicy,
    outbound: mpsc::UnboundedReceiver<ClientSignal>,
    events: mpsc::UnboundedSender<RelayEvent>,
    shutdown: watch::Receiver<bool>,
}

impl RelayWorker {
    async fn run(mut self) {
        let mut attempt: u32 = 0;
        self.emit(RelayState::Connecting);

        loop {
            let connected = tokio::select! {
                result = connect_async(self.url.as_str()) => result,
                _ = self.shutdown.changed() => return,
            };

            match connected {
                Ok((socket, _)) => {
                    info!(url = %self.url, "Connected to relay");
                    attempt = 0;
                    self.emit(RelayState::Connected);

                    match self.pump(socket).await {
                        SocketExit::Shutdown => {
                            debug!("Relay connection closed locally");
                            return;
                        }
                        SocketExit::Rejected { code, reason } => {
                            warn!(code, %reason, "Relay closed the session");
                            self.emit(RelayState::Closed { code, reason });
                            return;
                        }
                        SocketExit::Dropped => warn!("Relay connection dropped"),
                    }
                }
                Err(e) => warn!(url = %self.url, "Relay connection failed: {}", e),
            }

            attempt += 1;
            if self.policy.is_exhausted(attempt) {
                error!(attempts = self.policy.max_attempts, "Giving up on relay");
                self.emit(RelayState::Disconnected);
                return;
            }

            let delay = self.policy.delay_for(attempt);
            info!(attempt, ?delay, "Reconnecting to relay");
            self.emit(RelayState::Reconnecting { attempt, delay });

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown.changed() => return,
            }
        }
    }

    /// Peer-targeted envelopes queued before the new session's first frame
    /// belong to the previous session and are dropped; room-wide ones are
    /// still delivered.
    async fn pump(&mut self, socket: WsStream) -> SocketExit {
        let (mut sink, mut stream) = socket.split();
        let mut fresh = false;

        while let Ok(signal) = self.outbound.try_recv() {
            if !self.forward(&mut sink, signal, fresh).await {
                return SocketExit::Dropped;
            }
        }

        loop {
            tokio::select! {
                incoming = stream.next() => match incoming {
                    Some(Ok(Message::Text(text))) => match ServerSignal::decode(text.as_str()) {
                        Ok(ServerSignal::Ping) => {
                            if !send_signal(&mut sink, &ClientSignal::Pong).await {
                                return SocketExit::Dropped;
                            }
                        }
                        Ok(signal) => {
                            fresh = true;
                            let _ = self.events.send(RelayEvent::Signal(signal));
                        }
                        Err(e) => warn!("Invalid envelope from relay: {}", e),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        return match frame {
                            Some(frame) if u16::from(frame.code) == REPLACED_CLOSE_CODE => {
                                SocketExit::Rejected {
                                    code: REPLACED_CLOSE_CODE,
                                    reason: frame.reason.as_str().to_owned(),
                                }
                            }
                            _ => SocketExit::Dropped,
                        };
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Relay socket error: {}", e);
                        return SocketExit::Dropped;
                    }
                    None => return SocketExit::Dropped,
                },

                outgoing = self.outbound.recv() => match outgoing {
                    Some(signal) => {
                        if !self.forward(&mut sink, signal, fresh).await {
                            return SocketExit::Dropped;
                        }
                    }
                    None => {
                        let _ = sink.close().await;
                        return SocketExit::Shutdown;
                    }
                },

                _ = self.shutdown.changed() => {
                    while let Ok(signal) = self.outbound.try_recv() {
                        if !self.forward(&mut sink, signal, fresh).await {
                            break;
                        }
                    }
                    let _ = sink.close().await;
                    return SocketExit::Shutdown;
                }
            }
        }
    }

    async fn forward(&self, sink: &mut WsSink, signal: ClientSignal, fresh: bool) -> bool {
        if let Some(target) = signal.target().filter(|_| !fresh) {
            debug!(remote = %target, "Dropping envelope queued for the previous session");
            return true;
        }
        send_signal(sink, &signal).await
    }

    fn emit(&self, state: RelayState) {
        let _ = self.events.send(RelayEvent::State(state));
    }
}

/// Returns `false` when the socket is gone.
async fn send_signal(sink: &mut WsSink, signal: &ClientSignal) -> bool {
    match signal.encode() {
        Ok(json) => sink.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            error!("Failed to serialize signal: {}", e);
            true
        }
    }
}
