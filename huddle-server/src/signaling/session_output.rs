use huddle_core::ServerSignal;
use tokio::sync::mpsc;

/// Why the relay closed a session from its side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The same participant connected again; the newer connection wins.
    Duplicate,
    /// No traffic within the liveness window.
    Timeout,
    /// The participant sent `leave`.
    Left,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Duplicate => "duplicate",
            Self::Timeout => "timeout",
            Self::Left => "left",
        }
    }

    /// WebSocket close code sent with the close frame.
    pub fn code(&self) -> u16 {
        match self {
            Self::Duplicate => 4001,
            Self::Timeout => 4002,
            Self::Left => 1000,
        }
    }
}

/// Write side of a live session, owned by the room that registered it.
///
/// Implementations must not block: rooms call these while processing a
/// command and never wait on the network.
pub trait SessionOutput: Send + Sync {
    /// Queue an envelope. Returns `false` when the transport is already gone.
    fn send(&self, signal: ServerSignal) -> bool;

    /// Ask the transport to close with the given reason.
    fn close(&self, reason: CloseReason);

    fn is_open(&self) -> bool;
}

/// Frames queued for a WebSocket writer task.
#[derive(Debug)]
pub enum Outbound {
    Signal(ServerSignal),
    Close(CloseReason),
}

/// [`SessionOutput`] backed by the unbounded queue drained by a socket writer.
pub struct WsSessionOutput {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl WsSessionOutput {
    pub fn new(tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self { tx }
    }
}

impl SessionOutput for WsSessionOutput {
    fn send(&self, signal: ServerSignal) -> bool {
        self.tx.send(Outbound::Signal(signal)).is_ok()
    }

    fn close(&self, reason: CloseReason) {
        let _ = self.tx.send(Outbound::Close(reason));
    }

    fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}
