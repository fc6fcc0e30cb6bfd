use huddle_core::RoomId;

use crate::integration::{create_test_service, init_tracing};
use crate::utils::{join, wait_until};

#[tokio::test]
async fn test_empty_room_discarded() {
    init_tracing();

    let service = create_test_service();
    let room = RoomId::from("ephemeral");

    let alice = join(&service, "ephemeral", "alice").await.expect("alice join");
    assert!(service.rooms().contains_room(&room));

    service.disconnect(&alice.session).await;

    let rooms = service.rooms().clone();
    assert!(wait_until(|| !rooms.contains_room(&room)).await, "room still registered");
    assert!(service.directory().room(&room).is_none());
    assert_eq!(service.status().room_count, 0);

    // The same id starts a brand new room.
    let _bob = join(&service, "ephemeral", "bob").await.expect("bob join");
    let snapshot = service.directory().room(&room).expect("room recreated");
    assert_eq!(snapshot.participants.len(), 1);
    assert_eq!(snapshot.participants[0].user_id.as_str(), "bob");
}
