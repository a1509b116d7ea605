//! Per-connection websocket handler.
//!
//! Each upgraded socket gets its own task and an opaque session id. The
//! flow mirrors a handshake-first protocol:
//!
//! 1. the first event must be `join` (with the player's options),
//! 2. the session is seated via the room manager,
//! 3. a pump loop shuttles inbound events to the room and outbound
//!    broadcasts to the socket,
//! 4. socket closure, clean or not, becomes a `leave`, which forfeits a
//!    running match.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use tokio::sync::mpsc;
use tokio::time::Duration;

use rampart_protocol::{ClientMessage, Codec, JoinOptions, ProtocolError, ServerMessage, SessionId};
use rampart_room::ResultSink;

use crate::{AppState, ServerError};

/// How long a fresh connection may idle before sending `join`.
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) async fn ws_handler<S: ResultSink>(
    ws: WebSocketUpgrade,
    State(state): State<AppState<S>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket<S: ResultSink>(socket: WebSocket, state: AppState<S>) {
    let session_id = new_session_id();
    tracing::debug!(%session_id, "client connected");

    if let Err(error) = drive_session(socket, &state, &session_id).await {
        tracing::debug!(%session_id, %error, "session ended with error");
    }

    // Transport-signaled departure: frees the seat and forfeits a match
    // in countdown or play.
    let mut rooms = state.rooms.lock().await;
    if rooms.session_room(&session_id).is_some() {
        if let Err(error) = rooms.leave(&session_id).await {
            tracing::debug!(%session_id, %error, "leave after disconnect failed");
        }
    }
    tracing::info!(%session_id, "client disconnected");
}

async fn drive_session<S: ResultSink>(
    socket: WebSocket,
    state: &AppState<S>,
    session_id: &SessionId,
) -> Result<(), ServerError> {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let options = match wait_for_join(state, &mut ws_rx).await? {
        Some(options) => options,
        None => return Err(ServerError::ClosedBeforeJoin),
    };

    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    let room_id = {
        let mut rooms = state.rooms.lock().await;
        rooms
            .join_or_create(session_id.clone(), options, out_tx)
            .await?
    };
    tracing::info!(%session_id, %room_id, "session seated");

    loop {
        tokio::select! {
            outbound = out_rx.recv() => match outbound {
                Some(msg) => send_message(state, &mut ws_tx, &msg).await?,
                // The room disposed itself; nothing more will arrive.
                None => break,
            },
            inbound = ws_rx.next() => match inbound {
                Some(Ok(frame)) => {
                    let Some(payload) = frame_payload(&frame) else {
                        if matches!(frame, Message::Close(_)) {
                            break;
                        }
                        continue;
                    };
                    match state.codec.decode::<ClientMessage>(payload) {
                        Ok(msg) => {
                            let rooms = state.rooms.lock().await;
                            if let Err(error) = rooms.route_message(session_id, msg).await {
                                tracing::debug!(%session_id, %error, "message routing failed");
                            }
                        }
                        // Garbage frames are logged and skipped; the
                        // session survives.
                        Err(error) => {
                            tracing::debug!(%session_id, %error, "undecodable frame skipped");
                        }
                    }
                }
                None => break,
                Some(Err(error)) => return Err(ServerError::Socket(error)),
            },
        }
    }
    Ok(())
}

/// Waits for the connect-time `join` event. Returns `None` on a clean
/// close before joining.
async fn wait_for_join<S: ResultSink>(
    state: &AppState<S>,
    ws_rx: &mut SplitStream<WebSocket>,
) -> Result<Option<JoinOptions>, ServerError> {
    loop {
        let frame = match tokio::time::timeout(JOIN_TIMEOUT, ws_rx.next()).await {
            Ok(frame) => frame,
            Err(_) => {
                return Err(ProtocolError::InvalidMessage("join timed out".into()).into());
            }
        };
        match frame {
            Some(Ok(frame)) => {
                let Some(payload) = frame_payload(&frame) else {
                    if matches!(frame, Message::Close(_)) {
                        return Ok(None);
                    }
                    continue;
                };
                let msg: ClientMessage = state.codec.decode(payload)?;
                match msg {
                    ClientMessage::Join { options } => return Ok(Some(options)),
                    _ => {
                        return Err(ProtocolError::InvalidMessage(
                            "first event must be join".into(),
                        )
                        .into());
                    }
                }
            }
            None => return Ok(None),
            Some(Err(error)) => return Err(ServerError::Socket(error)),
        }
    }
}

/// Game payload of a frame, if it carries one. Text and binary frames are
/// both accepted; control frames return `None`.
fn frame_payload(frame: &Message) -> Option<&[u8]> {
    match frame {
        Message::Text(text) => Some(text.as_bytes()),
        Message::Binary(data) => Some(data),
        _ => None,
    }
}

async fn send_message<S: ResultSink>(
    state: &AppState<S>,
    ws_tx: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<(), ServerError> {
    let bytes = state.codec.encode(msg)?;
    ws_tx
        .send(Message::Binary(bytes.into()))
        .await
        .map_err(ServerError::Socket)
}

/// Opaque per-connection id: 16 hex chars of randomness.
fn new_session_id() -> SessionId {
    let mut rng = rand::rng();
    let bytes: [u8; 8] = rng.random();
    SessionId(bytes.iter().map(|b| format!("{b:02x}")).collect())
}
