use std::time::Duration;

use huddle_client::CallEvent;
use huddle_core::ParticipantId;
use tokio::time::Instant;

use crate::integration::init_tracing;
use crate::utils::{Harness, NEGOTIATION_TIMEOUT, answer, joined, welcome};

#[tokio::test(start_paused = true)]
async fn test_unanswered_offer_times_out() {
    init_tracing();

    let mut alice = Harness::new("alice");
    let bob = ParticipantId::from("bob");
    let carol = ParticipantId::from("carol");
    alice.orchestrator.handle(welcome("alice", &["alice"])).await;
    alice
        .orchestrator
        .handle(joined("bob", &["alice", "bob"]))
        .await;
    tokio::time::advance(Duration::from_secs(5)).await;
    alice
        .orchestrator
        .handle(joined("carol", &["alice", "bob", "carol"]))
        .await;
    alice.orchestrator.handle(answer("carol", "answer-sdp")).await;
    alice.events();

    let deadline = alice.orchestrator.next_deadline().expect("No deadline armed");

    // Nothing expires early.
    alice.orchestrator.expire_negotiations(Instant::now()).await;
    assert!(alice.events().is_empty());

    tokio::time::advance(NEGOTIATION_TIMEOUT).await;
    assert!(Instant::now() >= deadline);
    alice.orchestrator.expire_negotiations(Instant::now()).await;

    let events = alice.events();
    assert!(matches!(
        events.as_slice(),
        [CallEvent::PeerFailed { participant, reason }]
            if *participant == bob && reason.contains("timed out")
    ));
    assert_eq!(alice.orchestrator.peers(), vec![carol]);
    assert!(alice.orchestrator.next_deadline().is_none());
    assert!(alice.transport.latest("bob").expect("No link").is_closed());
}
