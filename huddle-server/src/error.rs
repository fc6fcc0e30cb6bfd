use huddle_core::RoomId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("room {0} is not accepting commands")]
    Unavailable(RoomId),
}
