use huddle_client::{CallEvent, LinkEvent, LinkState, PeerState};
use huddle_core::ParticipantId;

use crate::integration::init_tracing;
use crate::utils::{
    Harness, LinkCall, answer, answers_in, existing, joined, offer, offers_in, welcome,
};

async fn connected_mesh() -> Harness {
    let mut alice = Harness::new("alice");
    alice.orchestrator.handle(welcome("alice", &["alice"])).await;
    for (id, members) in [("bob", vec!["alice", "bob"]), ("carol", vec!["alice", "bob", "carol"])] {
        alice.orchestrator.handle(joined(id, &members)).await;
        alice.orchestrator.handle(answer(id, "answer-sdp")).await;
        let link = alice.transport.latest(id).expect("No link");
        link.emit(LinkEvent::StateChanged(LinkState::Connected));
    }
    alice.pump_link_events().await;
    alice.sent();
    alice.events();
    alice
}

#[tokio::test]
async fn test_initiator_restarts_once_then_fails() {
    init_tracing();

    let mut alice = connected_mesh().await;
    let bob = ParticipantId::from("bob");
    let carol = ParticipantId::from("carol");
    let bob_link = alice.transport.latest("bob").expect("No link to bob");

    bob_link.emit(LinkEvent::StateChanged(LinkState::Failed));
    alice.pump_link_events().await;

    let offers = offers_in(&alice.sent());
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0].0, "bob");
    assert!(bob_link.calls().contains(&LinkCall::CreateOffer { ice_restart: true }));
    assert_eq!(alice.orchestrator.peer_state(&bob), Some(PeerState::HaveLocalOffer));
    assert!(alice.events().is_empty(), "A restart is not a failure");

    bob_link.emit(LinkEvent::StateChanged(LinkState::Failed));
    alice.pump_link_events().await;

    let events = alice.events();
    assert!(matches!(
        events.as_slice(),
        [CallEvent::PeerFailed { participant, .. }] if *participant == bob
    ));
    assert!(bob_link.is_closed());
    assert_eq!(alice.orchestrator.peer_state(&bob), None);

    // Carol is untouched.
    assert_eq!(alice.orchestrator.peer_state(&carol), Some(PeerState::Connected));
    let carol_link = alice.transport.latest("carol").expect("No link to carol");
    assert!(!carol_link.is_closed());
}

#[tokio::test]
async fn test_recovery_rearms_restart() {
    init_tracing();

    let mut alice = connected_mesh().await;
    let bob = ParticipantId::from("bob");
    let bob_link = alice.transport.latest("bob").expect("No link to bob");

    bob_link.emit(LinkEvent::StateChanged(LinkState::Failed));
    alice.pump_link_events().await;
    alice.orchestrator.handle(answer("bob", "restart-answer")).await;
    bob_link.emit(LinkEvent::StateChanged(LinkState::Connected));
    alice.pump_link_events().await;
    assert_eq!(alice.orchestrator.peer_state(&bob), Some(PeerState::Connected));

    // After recovering, the next failure restarts again instead of giving up.
    alice.sent();
    bob_link.emit(LinkEvent::StateChanged(LinkState::Failed));
    alice.pump_link_events().await;
    assert_eq!(offers_in(&alice.sent()).len(), 1);
    assert_eq!(alice.orchestrator.peer_state(&bob), Some(PeerState::HaveLocalOffer));
}

#[tokio::test]
async fn test_responder_answers_restart_offer() {
    init_tracing();

    let mut bob = Harness::new("bob");
    let alice = ParticipantId::from("alice");
    bob.orchestrator.handle(welcome("bob", &["alice", "bob"])).await;
    bob.orchestrator.handle(existing(&["alice"])).await;
    bob.orchestrator.handle(offer("alice", "offer-1")).await;
    let link = bob.transport.latest("alice").expect("No link to alice");
    link.emit(LinkEvent::StateChanged(LinkState::Connected));
    bob.pump_link_events().await;
    bob.sent();

    link.emit(LinkEvent::StateChanged(LinkState::Failed));
    bob.pump_link_events().await;

    assert!(offers_in(&bob.sent()).is_empty(), "Responder never offers");
    assert_eq!(bob.orchestrator.peer_state(&alice), Some(PeerState::Failed));
    assert!(bob.orchestrator.next_deadline().is_some());

    bob.orchestrator.handle(offer("alice", "offer-2")).await;
    assert_eq!(answers_in(&bob.sent()).len(), 1);
    assert_eq!(bob.orchestrator.peer_state(&alice), Some(PeerState::Stable));
    assert!(bob.orchestrator.next_deadline().is_none());
    assert_eq!(bob.transport.link_count(), 1, "Restart reuses the link");
}
