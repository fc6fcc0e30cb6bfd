pub mod config;
pub mod error;
pub mod media;
pub mod media_control;
pub mod orchestrator;
pub mod relay;
pub mod session;
pub mod signal_sink;
pub mod sync;

pub use config::{ClientConfig, ReconnectPolicy};
pub use error::{ClientError, MediaError, StoreError};
pub use media::*;
pub use media_control::{MediaControl, MediaState};
pub use orchestrator::*;
pub use relay::*;
pub use session::{CallHandle, CallSession};
pub use signal_sink::SignalSink;
pub use sync::*;
