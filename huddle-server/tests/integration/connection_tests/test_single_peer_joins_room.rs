use std::sync::Arc;

use huddle_core::{IceServerConfig, ParticipantId, RoomId, ServerSignal};
use huddle_server::{ServerConfig, SignalingService};

use crate::integration::{create_test_service, init_tracing};
use crate::utils::{MockSessionOutput, ids, join, stays_silent, wait_for};

#[tokio::test]
async fn test_single_peer_joins_room() {
    init_tracing();

    let service = create_test_service();
    let (output, mut rx) = MockSessionOutput::new();

    let session = service
        .connect(
            RoomId::from("standup"),
            ParticipantId::from("alice"),
            "Alice".to_string(),
            Arc::new(output.clone()),
        )
        .await
        .expect("Failed to connect");

    let welcome = wait_for(&mut rx, |s| matches!(s, ServerSignal::Welcome { .. }))
        .await
        .expect("No welcome");
    let ServerSignal::Welcome {
        room_id,
        participant_id,
        participants,
        ..
    } = welcome
    else {
        unreachable!();
    };
    assert_eq!(room_id, session.room_id);
    assert_eq!(participant_id, ParticipantId::from("alice"));
    assert_eq!(ids(&participants), vec!["alice"]);
    assert_eq!(participants[0].user_name, "Alice");

    // Alone in the room: no existing-participants follows.
    assert!(stays_silent(&mut rx).await);

    let snapshot = service
        .directory()
        .room(&RoomId::from("standup"))
        .expect("Room not published");
    assert_eq!(ids(&snapshot.participants), vec!["alice"]);
    assert_eq!(service.status().connection_count, 1);
}

#[tokio::test]
async fn test_welcome_announces_configured_ice_servers() {
    init_tracing();

    let service = SignalingService::new(
        ServerConfig::default()
            .with_ice_servers(vec![IceServerConfig::stun("stun:stun.example.org:3478")]),
    );
    let (output, mut rx) = MockSessionOutput::new();
    service
        .connect("r1".into(), "alice".into(), "alice".into(), Arc::new(output))
        .await
        .expect("Failed to connect");

    let Ok(ServerSignal::Welcome { ice_servers, .. }) =
        wait_for(&mut rx, |s| matches!(s, ServerSignal::Welcome { .. })).await
    else {
        panic!("expected welcome");
    };
    assert_eq!(ice_servers.len(), 1);
    assert_eq!(ice_servers[0].urls, vec!["stun:stun.example.org:3478"]);

    let _ = join(&service, "r2", "bob").await.expect("Join failed");
    assert_eq!(service.status().room_count, 2);
}
