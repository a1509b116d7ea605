//! Transport and discovery layer for the Rampart battle server.
//!
//! One axum listener serves both surfaces: `GET /ws` upgrades into the
//! game websocket, while `/health` and `/rooms` form the discovery
//! surface an external lobby polls. Game state never lives here: every
//! session is a thin pump between one socket and one room actor.

mod error;
mod http;
mod ws;

use std::sync::Arc;

use axum::routing::get;
use axum::{middleware, Router};
use tokio::sync::Mutex;

use rampart_core::{BattleConfig, Catalog};
use rampart_protocol::JsonCodec;
use rampart_room::{ResultSink, RoomManager};

pub use error::ServerError;

/// Port used when the `PORT` environment variable is unset.
pub const DEFAULT_PORT: u16 = 2567;

/// Shared state handed to every request handler.
pub struct AppState<S: ResultSink> {
    pub rooms: Arc<Mutex<RoomManager<S>>>,
    pub codec: JsonCodec,
}

impl<S: ResultSink> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            rooms: Arc::clone(&self.rooms),
            codec: self.codec,
        }
    }
}

impl<S: ResultSink> AppState<S> {
    pub fn new(catalog: Arc<Catalog>, config: BattleConfig, sink: S) -> Self {
        Self {
            rooms: Arc::new(Mutex::new(RoomManager::new(catalog, config, sink))),
            codec: JsonCodec,
        }
    }
}

/// Builds the full application router: game websocket, discovery routes,
/// JSON 404 fallback, permissive CORS on everything.
pub fn router<S: ResultSink>(state: AppState<S>) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler::<S>))
        .route("/health", get(http::health))
        .route("/rooms", get(http::list_rooms::<S>))
        .fallback(http::not_found)
        .layer(middleware::from_fn(http::cors))
        .with_state(state)
}
