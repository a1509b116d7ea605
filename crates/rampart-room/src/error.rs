//! Error types for the room layer.

use rampart_protocol::{RoomId, SessionId};

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// Both player slots are taken.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The session is already in a room.
    #[error("session {0} is already in a room")]
    AlreadyInRoom(SessionId),

    /// The session is not in this room.
    #[error("session {0} is not in this room")]
    NotInRoom(SessionId),

    /// The room is in a phase that does not allow the operation, e.g.
    /// joining after the countdown locked it.
    #[error("invalid room state for this operation: {0}")]
    InvalidState(String),

    /// The room's command channel is closed or full.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),
}
