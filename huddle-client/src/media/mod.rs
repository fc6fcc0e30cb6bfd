mod link;
mod stream;
mod webrtc_transport;

pub use link::*;
pub use stream::*;
pub use webrtc_transport::*;
