pub mod error;
pub mod model;

pub use error::EnvelopeError;
pub use model::*;

/// Public STUN servers used when neither the caller nor the relay provides any.
pub const DEFAULT_STUN_URLS: [&str; 2] = [
    "stun:stun.l.google.com:19302",
    "stun:stun1.l.google.com:19302",
];
