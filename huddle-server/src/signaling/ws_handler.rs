use crate::signaling::{Outbound, SignalingService, WsSessionOutput};
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use huddle_core::{ParticipantId, RoomId};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Connection-time parameters of `GET /ws`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    pub room_id: Option<String>,
    pub participant_id: Option<String>,
    pub display_name: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(service): State<SignalingService>,
) -> Response {
    let (Some(room_id), Some(participant_id)) = (
        non_empty(params.room_id),
        non_empty(params.participant_id),
    ) else {
        return (
            StatusCode::BAD_REQUEST,
            "roomId and participantId are required",
        )
            .into_response();
    };
    let display_name = non_empty(params.display_name).unwrap_or_else(|| participant_id.clone());

    ws.on_upgrade(move |socket| {
        handle_socket(
            socket,
            RoomId::from(room_id),
            ParticipantId::from(participant_id),
            display_name,
            service,
        )
    })
}

async fn handle_socket(
    socket: WebSocket,
    room_id: RoomId,
    participant_id: ParticipantId,
    display_name: String,
    service: SignalingService,
) {
    info!(room = %room_id, participant = %participant_id, "New WebSocket connection");

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let output = Arc::new(WsSessionOutput::new(tx));
    let session = match service
        .connect(room_id, participant_id, display_name, output)
        .await
    {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to admit session: {}", e);
            return;
        }
    };

    let mut send_task = tokio::spawn(async move {
        while let Some(out) = rx.recv().await {
            match out {
                Outbound::Signal(signal) => match signal.encode() {
                    Ok(json) => {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => error!("Failed to serialize signal message: {}", e),
                },
                Outbound::Close(reason) => {
                    let frame = CloseFrame {
                        code: reason.code(),
                        reason: reason.as_str().into(),
                    };
                    let _ = sender.send(Message::Close(Some(frame))).await;
                    break;
                }
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let service = service.clone();
        let session = session.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => service.handle(&session, text.as_str()).await,
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    service.disconnect(&session).await;
    info!(
        room = %session.room_id,
        participant = %session.participant_id,
        "WebSocket disconnected"
    );
}
