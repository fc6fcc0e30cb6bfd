use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use huddle_core::{RelayStatus, RoomSnapshot};
use tower::ServiceExt;

use crate::integration::{create_test_service, init_tracing};
use crate::utils::join;

async fn get(service: &huddle_server::SignalingService, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = huddle_server::router(service.clone())
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn test_status_reports_rooms_and_connections() {
    init_tracing();

    let service = create_test_service();
    let _a = join(&service, "alpha", "alice").await.expect("join");
    let _b = join(&service, "alpha", "bob").await.expect("join");
    let _c = join(&service, "beta", "carol").await.expect("join");

    let (status, body) = get(&service, "/status").await;
    assert_eq!(status, StatusCode::OK);
    let report: RelayStatus = serde_json::from_slice(&body).unwrap();
    assert_eq!(report.room_count, 2);
    assert_eq!(report.connection_count, 3);
    assert_eq!(report.rooms[0].room_id.as_str(), "alpha");
    assert_eq!(report.rooms[1].participants[0].user_id.as_str(), "carol");

    let (status, body) = get(&service, "/rooms").await;
    assert_eq!(status, StatusCode::OK);
    let rooms: Vec<RoomSnapshot> = serde_json::from_slice(&body).unwrap();
    assert_eq!(rooms.len(), 2);
}

#[tokio::test]
async fn test_health_and_missing_ws_params() {
    init_tracing();

    let service = create_test_service();
    let (status, body) = get(&service, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"ok");

    let (status, body) = get(&service, "/status").await;
    assert_eq!(status, StatusCode::OK);
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["roomCount"], 0);
    assert!(value["timestamp"].is_string());
}
