mod session_output;
mod signaling_service;
mod ws_handler;

pub use session_output::*;
pub use signaling_service::*;
pub use ws_handler::*;
