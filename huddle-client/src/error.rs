use thiserror::Error;

/// Failures reported by the media-transport collaborator.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("peer connection is closed")]
    Closed,

    #[error("no local {0} track")]
    NoTrack(crate::media::TrackKind),

    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("call store unavailable: {0}")]
    Unavailable(String),
}

/// Caller-visible failure of a call as a whole.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no usable local media stream")]
    NoLocalMedia,

    #[error("invalid relay url: {0}")]
    InvalidRelayUrl(#[from] url::ParseError),

    #[error("relay unreachable after {attempts} reconnect attempts")]
    RelayExhausted { attempts: u32 },

    #[error("relay closed the session: {0}")]
    RelayRejected(String),

    #[error("call session already ended")]
    SessionEnded,

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
