mod call;
mod participant;
mod room;
mod signaling;
mod status;

pub use call::{ActiveCallRecord, CallId};
pub use participant::{ParticipantId, ParticipantInfo};
pub use room::{RoomId, SessionId};
pub use signaling::{ClientSignal, IceCandidate, IceServerConfig, ServerSignal, StatusUpdates};
pub use status::{RelayStatus, RoomSnapshot};
