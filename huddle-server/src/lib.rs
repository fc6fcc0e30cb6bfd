pub mod app;
pub mod config;
pub mod error;
pub mod liveness;
pub mod room;
pub mod signaling;
pub mod status;

pub use app::{router, serve, serve_service, serve_with_listener};
pub use config::ServerConfig;
pub use error::RoomError;
pub use liveness::LivenessSupervisor;
pub use room::*;
pub use signaling::*;
