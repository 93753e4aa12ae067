//! HTTP and WebSocket endpoint handlers.
//!
//! Every request is validated here before the relay core runs: bad JSON,
//! unknown rooms, and empty display names never reach a room.

use std::sync::{Arc, Mutex};

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use roomcast_protocol::{DisplayName, RoomId};
use roomcast_session::PendingSession;
use roomcast_transport::WebSocketChannel;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::RoomcastError;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateRoomRequest {
    room_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateRoomResponse {
    status: bool,
    room_id: RoomId,
    room_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RoomQuery {
    room_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubscribeQuery {
    room_id: Option<String>,
    display_name: Option<String>,
}

/// An unparseable room ID can only name a room that does not exist.
fn parse_room_id(raw: Option<&str>) -> Option<RoomId> {
    raw.and_then(|id| id.parse().ok())
}

fn room_not_found() -> Response {
    (StatusCode::NOT_FOUND, "Room not found").into_response()
}

/// `OPTIONS` on any route.
pub(crate) async fn preflight() -> StatusCode {
    StatusCode::OK
}

/// `POST /createRoom`
pub(crate) async fn create_room(
    State(state): State<AppState>,
    body: Result<Json<CreateRoomRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            tracing::debug!(error = %rejection.body_text(), "bad createRoom body");
            return (StatusCode::BAD_REQUEST, rejection.body_text()).into_response();
        }
    };

    let room_id = state.relay.create_room(request.room_name.clone());
    (
        StatusCode::CREATED,
        Json(CreateRoomResponse {
            status: true,
            room_id,
            room_name: request.room_name,
        }),
    )
        .into_response()
}

/// `GET /roomHealthCheck?roomId=`
pub(crate) async fn room_health_check(
    State(state): State<AppState>,
    Query(query): Query<RoomQuery>,
) -> Response {
    match parse_room_id(query.room_id.as_deref()) {
        Some(room_id) if state.relay.room_exists(&room_id) => {
            (StatusCode::OK, "Room exists").into_response()
        }
        _ => room_not_found(),
    }
}

/// `GET /subscribe?roomId=&displayName=`
///
/// Validates the request, then upgrades to a WebSocket and runs a session
/// until the peer leaves or the server shuts down.
pub(crate) async fn subscribe(
    State(state): State<AppState>,
    Query(query): Query<SubscribeQuery>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let display_name = query.display_name.unwrap_or_default();
    // The name is checked before the room, whatever the room ID looks like.
    if let Err(e) = DisplayName::new(display_name.as_str()) {
        let e = RoomcastError::from(e);
        return (e.status_code(), e.to_string()).into_response();
    }
    let Some(room_id) = parse_room_id(query.room_id.as_deref()) else {
        return room_not_found();
    };

    let pending = match state.relay.prepare_join(room_id, &display_name) {
        Ok(pending) => pending,
        Err(e) => {
            tracing::debug!(%room_id, error = %e, "subscribe rejected");
            return (e.status_code(), e.to_string()).into_response();
        }
    };

    let ws = match upgrade {
        Ok(ws) => ws,
        Err(rejection) => {
            pending.abort(rejection.body_text());
            return rejection.into_response();
        }
    };

    // Exactly one of the two callbacks runs.
    let slot = Arc::new(Mutex::new(Some(pending)));
    let failed_slot = Arc::clone(&slot);
    let cancel = state.shutdown.child_token();

    ws.on_failed_upgrade(move |error| {
        if let Some(pending) = take(&failed_slot) {
            pending.abort(error);
        }
    })
    .on_upgrade(move |socket| async move {
        if let Some(pending) = take(&slot) {
            run_session(pending, socket, cancel).await;
        }
    })
}

fn take(slot: &Mutex<Option<PendingSession>>) -> Option<PendingSession> {
    slot.lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .take()
}

async fn run_session(pending: PendingSession, socket: WebSocket, cancel: CancellationToken) {
    match pending.activate(WebSocketChannel::new(socket)).await {
        Ok(session) => {
            session.run(cancel).await;
        }
        Err(e) => tracing::debug!(error = %e, "session not started"),
    }
}
