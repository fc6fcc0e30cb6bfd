use huddle_core::{ClientSignal, IceCandidate, ServerSignal};

use crate::integration::{create_test_service, init_tracing};
use crate::utils::{join, stays_silent};

#[tokio::test]
async fn test_ice_candidate_exchange() {
    init_tracing();

    let service = create_test_service();
    let mut alice = join(&service, "room", "alice").await.expect("alice join");
    let mut bob = join(&service, "room", "bob").await.expect("bob join");
    let _ = alice.next().await.expect("alice sees bob");
    let _ = bob.next().await.expect("bob existing-participants");

    let candidate = IceCandidate {
        candidate: "candidate:1 1 udp 2130706431 10.0.0.2 54321 typ host".into(),
        sdp_m_line_index: Some(0),
        sdp_mid: Some("0".into()),
    };
    bob.send(
        &service,
        ClientSignal::IceCandidate {
            target_user_id: "alice".into(),
            candidate: candidate.clone(),
        },
    )
    .await;

    assert_eq!(
        alice.next().await.expect("ice-candidate"),
        ServerSignal::IceCandidate {
            from_user_id: "bob".into(),
            candidate,
        }
    );
}

#[tokio::test]
async fn test_malformed_envelope_dropped_session_kept() {
    init_tracing();

    let service = create_test_service();
    let mut alice = join(&service, "room", "alice").await.expect("alice join");
    let mut bob = join(&service, "room", "bob").await.expect("bob join");
    let _ = alice.next().await.expect("alice sees bob");
    let _ = bob.next().await.expect("bob existing-participants");

    service.handle(&bob.session, "{not json").await;
    service
        .handle(
            &bob.session,
            r#"{"type":"ice-candidate","targetUserId":"alice","candidate":{"sdpMid":"0"}}"#,
        )
        .await;
    service.handle(&bob.session, r#"{"type":"teleport"}"#).await;

    assert!(stays_silent(&mut alice.rx).await);

    service
        .handle(
            &bob.session,
            r#"{"type":"ice-candidate","targetUserId":"alice",
                "candidate":{"candidate":"candidate:x","sdpMLineIndex":0,"sdpMid":"0"}}"#,
        )
        .await;
    let forwarded = alice.next().await.expect("valid candidate forwarded");
    assert!(matches!(forwarded, ServerSignal::IceCandidate { .. }));

    service.handle(&bob.session, r#"{"type":"ping"}"#).await;
    assert_eq!(bob.next().await.expect("pong"), ServerSignal::Pong);
}
