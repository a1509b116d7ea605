//! Discovery HTTP surface: health, room listing, CORS.
//!
//! These routes are for lobby browsers and load balancers, not game
//! clients; the game itself speaks only the websocket. Every response
//! carries permissive CORS headers so browser lobbies on any origin can
//! poll them.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use rampart_room::ResultSink;

use crate::AppState;

pub(crate) async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "timestamp": unix_millis() }))
}

/// Rooms a new player can actually enter: still waiting, exactly one
/// seated client.
pub(crate) async fn list_rooms<S: ResultSink>(
    State(state): State<AppState<S>>,
) -> impl IntoResponse {
    let listings = state.rooms.lock().await.listings().await;
    let rooms: Vec<_> = listings
        .into_iter()
        .filter(|l| l.status.is_joinable() && l.player_count == 1)
        .map(|l| {
            json!({
                "roomId": l.room_id,
                "hostName": l.host_name,
                "hostDeckPreview": l.host_deck_preview,
                "createdAt": l.created_at,
            })
        })
        .collect();
    Json(json!({ "rooms": rooms }))
}

pub(crate) async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}

/// Answers preflights with an empty 200 and stamps CORS headers on
/// everything else.
pub(crate) async fn cors(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::OK.into_response();
        apply_cors(response.headers_mut());
        return response;
    }
    let mut response = next.run(request).await;
    apply_cors(response.headers_mut());
    response
}

fn apply_cors(headers: &mut HeaderMap) {
    headers.insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("Content-Type"),
    );
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
