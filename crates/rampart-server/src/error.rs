//! Unified error type for the server layer.

/// Everything that can end a client session or fail a request.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Encoding or decoding a wire message failed.
    #[error(transparent)]
    Protocol(#[from] rampart_protocol::ProtocolError),

    /// A room operation failed (full, gone, not a member).
    #[error(transparent)]
    Room(#[from] rampart_room::RoomError),

    /// The underlying websocket errored.
    #[error("websocket error: {0}")]
    Socket(#[from] axum::Error),

    /// The client went away before sending `join`.
    #[error("client closed before joining")]
    ClosedBeforeJoin,
}
