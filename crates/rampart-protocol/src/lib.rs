//! Wire protocol for the Rampart battle server.
//!
//! This crate defines the language clients and server speak:
//!
//! - **Types**: [`ClientMessage`], [`ServerMessage`], and the view structs
//!   define the JSON event shapes that travel on the wire.
//! - **Codec**: the [`Codec`] trait and [`JsonCodec`] convert those
//!   messages to and from bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! The protocol layer knows nothing about connections, rooms, or the
//! simulation; it only defines shapes and (de)serialization.

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    ClientMessage, ErrorCode, JoinOptions, Phase, PlayerSyncView, PlayerView, RoomId,
    RoomStateView, ServerMessage, SessionId, Side, UnitState, UnitView, WinReason,
};
