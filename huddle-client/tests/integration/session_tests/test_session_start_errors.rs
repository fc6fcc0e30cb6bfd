use std::sync::Arc;

use huddle_client::{
    CallSession, CallStore, ClientConfig, ClientError, LocalStream, MediaTransport,
    MemoryCallStore, ReconnectPolicy,
};
use tokio::net::TcpListener;

use crate::integration::init_tracing;
use crate::utils::MockTransport;

async fn start(
    config: ClientConfig,
    local: LocalStream,
    store: Arc<MemoryCallStore>,
) -> Result<(), ClientError> {
    CallSession::start(
        config,
        local,
        MockTransport::new() as Arc<dyn MediaTransport>,
        store as Arc<dyn CallStore>,
    )
    .await
    .map(|_| ())
}

#[tokio::test]
async fn test_no_local_media_refused() {
    init_tracing();

    let store = Arc::new(MemoryCallStore::new());
    let config = ClientConfig::new("ws://127.0.0.1:9/ws", "room", "alice", "Alice");

    let result = start(config.clone(), LocalStream::new(), store.clone()).await;
    assert!(matches!(result, Err(ClientError::NoLocalMedia)));

    let stopped = LocalStream::audio_video("alice");
    stopped.stop();
    let result = start(config, stopped, store.clone()).await;
    assert!(matches!(result, Err(ClientError::NoLocalMedia)));

    assert!(store.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_relay_fails_start() {
    init_tracing();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let store = Arc::new(MemoryCallStore::new());
    let config = ClientConfig::new(format!("ws://{addr}/ws"), "room", "alice", "Alice")
        .with_reconnect(ReconnectPolicy {
            max_attempts: 2,
            ..ReconnectPolicy::default()
        });

    let result = start(config, LocalStream::audio_video("alice"), store.clone()).await;
    assert!(matches!(result, Err(ClientError::RelayExhausted { attempts: 2 })));
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_malformed_relay_url() {
    init_tracing();

    let store = Arc::new(MemoryCallStore::new());
    let config = ClientConfig::new("::nope::", "room", "alice", "Alice");
    let result = start(config, LocalStream::audio_video("alice"), store).await;
    assert!(matches!(result, Err(ClientError::InvalidRelayUrl(_))));
}
