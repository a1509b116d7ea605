//! Room orchestration for the Rampart battle server.
//!
//! Each room is a single-threaded logical actor owning one battle: all
//! command handling, timers, simulation ticks, and broadcasts for a room
//! execute strictly serialized on its own Tokio task, while independent
//! rooms run in parallel. The [`RoomManager`] creates rooms, seats
//! sessions, and exposes discovery metadata; the [`ResultSink`] trait is
//! the seam to the external persistence layer.

#![allow(async_fn_in_trait)]

mod error;
mod manager;
mod room;
mod sink;

pub use error::RoomError;
pub use manager::RoomManager;
pub use room::{ClientSender, RoomHandle, RoomListing};
pub use sink::{LoggingSink, ResultSink, SinkError};
