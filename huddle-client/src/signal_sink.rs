use huddle_core::ClientSignal;
use tokio::sync::mpsc;

/// Outbound half of the relay connection as seen by call logic.
///
/// Sending never blocks; delivery is best-effort.
pub trait SignalSink: Send + Sync {
    /// Returns `false` once the relay connection is gone for good.
    fn send(&self, signal: ClientSignal) -> bool;
}

impl SignalSink for mpsc::UnboundedSender<ClientSignal> {
    fn send(&self, signal: ClientSignal) -> bool {
        mpsc::UnboundedSender::send(self, signal).is_ok()
    }
}
