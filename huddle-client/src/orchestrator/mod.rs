mod call_event;
mod peer;
mod peer_orchestrator;

pub use call_event::*;
pub use peer::*;
pub use peer_orchestrator::*;
