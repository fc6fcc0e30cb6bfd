use std::sync::Arc;

use huddle_client::{LocalStream, LocalTrack, MediaControl, MediaState, SignalSink, TrackKind};
use huddle_core::ClientSignal;
use serde_json::json;
use tokio::sync::mpsc;

use crate::integration::init_tracing;
use crate::utils::{Harness, LinkCall, existing, joined, offer, welcome};

fn media_control(
    harness: &Harness,
    broadcast: bool,
) -> (MediaControl, mpsc::UnboundedReceiver<ClientSignal>) {
    let (tx, rx) = mpsc::unbounded_channel::<ClientSignal>();
    let control = MediaControl::new(
        MediaState::from_stream(&harness.local),
        Arc::new(tx) as Arc<dyn SignalSink>,
        broadcast,
    );
    (control, rx)
}

fn updates(rx: &mut mpsc::UnboundedReceiver<ClientSignal>) -> Vec<serde_json::Value> {
    let mut out = Vec::new();
    while let Ok(signal) = rx.try_recv() {
        if let ClientSignal::ParticipantUpdate { updates } = signal {
            out.push(serde_json::Value::Object(updates));
        }
    }
    out
}

async fn two_peer_mesh() -> Harness {
    let mut alice = Harness::new("alice");
    alice.orchestrator.handle(welcome("alice", &["alice", "carol"])).await;
    alice.orchestrator.handle(existing(&["carol"])).await;
    alice.orchestrator.handle(offer("carol", "offer-sdp")).await;
    alice
        .orchestrator
        .handle(joined("bob", &["alice", "bob", "carol"]))
        .await;
    alice
}

#[tokio::test]
async fn test_mute_reaches_every_peer_and_room() {
    init_tracing();

    let mut alice = two_peer_mesh().await;
    let (control, mut rx) = media_control(&alice, true);
    let mut state = control.subscribe();
    assert_eq!(control.state(), MediaState::default());

    assert!(control.set_muted(&mut alice.orchestrator, true).await);

    assert!(state.has_changed().unwrap());
    assert_eq!(
        *state.borrow_and_update(),
        MediaState {
            muted: true,
            camera_off: false
        }
    );
    assert!(!alice.local.is_enabled(TrackKind::Audio));
    assert!(alice.local.is_enabled(TrackKind::Video));
    for id in ["bob", "carol"] {
        let link = alice.transport.latest(id).expect("No link");
        assert!(link.calls().contains(&LinkCall::SetTrackEnabled(TrackKind::Audio, false)));
    }
    assert_eq!(updates(&mut rx), vec![json!({"muted": true, "videoOff": false})]);

    // Same value again changes nothing and announces nothing.
    control.set_muted(&mut alice.orchestrator, true).await;
    assert!(!state.has_changed().unwrap());
    assert!(updates(&mut rx).is_empty());

    control.toggle_mute(&mut alice.orchestrator).await;
    assert!(!control.state().muted);
    assert!(alice.local.is_enabled(TrackKind::Audio));
    assert_eq!(updates(&mut rx), vec![json!({"muted": false, "videoOff": false})]);
}

#[tokio::test]
async fn test_camera_toggle() {
    init_tracing();

    let mut alice = two_peer_mesh().await;
    let (control, mut rx) = media_control(&alice, true);

    control.toggle_camera(&mut alice.orchestrator).await;
    assert!(control.state().camera_off);
    assert!(!alice.local.is_enabled(TrackKind::Video));
    let link = alice.transport.latest("bob").expect("No link");
    assert!(link.calls().contains(&LinkCall::SetTrackEnabled(TrackKind::Video, false)));
    assert_eq!(updates(&mut rx), vec![json!({"muted": false, "videoOff": true})]);

    control.set_camera_enabled(&mut alice.orchestrator, true).await;
    assert!(!control.state().camera_off);
    assert!(link.calls().contains(&LinkCall::SetTrackEnabled(TrackKind::Video, true)));
}

#[tokio::test]
async fn test_broadcast_can_be_disabled() {
    init_tracing();

    let mut alice = two_peer_mesh().await;
    let (control, mut rx) = media_control(&alice, false);

    control.set_muted(&mut alice.orchestrator, true).await;
    control.announce();

    assert!(control.state().muted);
    assert!(updates(&mut rx).is_empty());
}

#[tokio::test]
async fn test_camera_toggle_without_video_track() {
    init_tracing();

    let stream = LocalStream::new().with_track(LocalTrack::new("mic", TrackKind::Audio, "alice"));
    let mut alice = Harness::with_stream("alice", stream);
    alice.orchestrator.handle(welcome("alice", &["alice"])).await;
    alice.orchestrator.handle(joined("bob", &["alice", "bob"])).await;

    let (control, mut rx) = media_control(&alice, true);
    let mut state = control.subscribe();
    let before = control.state();
    assert!(before.camera_off);

    assert!(!control.set_camera_enabled(&mut alice.orchestrator, true).await);
    assert!(!control.toggle_camera(&mut alice.orchestrator).await);

    assert_eq!(control.state(), before);
    assert!(!state.has_changed().unwrap());
    assert!(updates(&mut rx).is_empty());
    let link = alice.transport.latest("bob").expect("No link");
    assert!(
        !link
            .calls()
            .iter()
            .any(|c| matches!(c, LinkCall::SetTrackEnabled(TrackKind::Video, _)))
    );

    // Audio still works on the same stream.
    assert!(control.toggle_mute(&mut alice.orchestrator).await);
    assert_eq!(updates(&mut rx), vec![json!({"muted": true, "videoOff": true})]);
}
