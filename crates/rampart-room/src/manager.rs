//! Room manager: creates, tracks, and routes sessions to battle rooms.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rampart_core::{BattleConfig, Catalog};
use rampart_protocol::{ClientMessage, JoinOptions, RoomId, RoomStateView, SessionId};

use crate::room::{spawn_room, ClientSender, RoomHandle, RoomListing};
use crate::{ResultSink, RoomError};

/// Counter for generating unique room IDs.
static NEXT_ROOM_ID: AtomicU64 = AtomicU64::new(1);

/// Default command channel size for room actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Tracks all active battle rooms and which session is in which room.
///
/// Entry point for room operations from the connection layer. Rooms that
/// have disposed themselves (everyone left) are pruned lazily on the next
/// mutating call.
pub struct RoomManager<S: ResultSink> {
    rooms: HashMap<RoomId, RoomHandle>,
    /// A session is in at most one room at a time.
    session_rooms: HashMap<SessionId, RoomId>,
    config: BattleConfig,
    catalog: Arc<Catalog>,
    sink: Arc<S>,
}

impl<S: ResultSink> RoomManager<S> {
    pub fn new(catalog: Arc<Catalog>, config: BattleConfig, sink: S) -> Self {
        Self {
            rooms: HashMap::new(),
            session_rooms: HashMap::new(),
            config,
            catalog,
            sink: Arc::new(sink),
        }
    }

    /// Creates a new empty room and returns its ID.
    pub fn create_room(&mut self) -> RoomId {
        let room_id = RoomId(NEXT_ROOM_ID.fetch_add(1, Ordering::Relaxed));
        let handle = spawn_room(
            room_id,
            self.config.clone(),
            Arc::clone(&self.catalog),
            Arc::clone(&self.sink),
            DEFAULT_CHANNEL_SIZE,
        );
        self.rooms.insert(room_id, handle);
        tracing::info!(%room_id, "room created");
        room_id
    }

    /// Seats a session in a waiting room, creating one if none has space.
    pub async fn join_or_create(
        &mut self,
        session_id: SessionId,
        options: JoinOptions,
        sender: ClientSender,
    ) -> Result<RoomId, RoomError> {
        self.prune_closed();

        if self.session_rooms.contains_key(&session_id) {
            return Err(RoomError::AlreadyInRoom(session_id));
        }

        // Scan for a joinable room. A room can lock between the listing
        // and the join (its other seat filled), so failures keep scanning.
        let handles: Vec<RoomHandle> = self.rooms.values().cloned().collect();
        for handle in handles {
            let Ok(listing) = handle.listing().await else {
                continue;
            };
            if !listing.status.is_joinable() || listing.player_count >= 2 {
                continue;
            }
            if handle
                .join(session_id.clone(), options.clone(), sender.clone())
                .await
                .is_ok()
            {
                self.session_rooms.insert(session_id, handle.room_id());
                return Ok(handle.room_id());
            }
        }

        // No joinable room: create one.
        let room_id = self.create_room();
        let handle = self
            .rooms
            .get(&room_id)
            .expect("room inserted above")
            .clone();
        handle.join(session_id.clone(), options, sender).await?;
        self.session_rooms.insert(session_id, room_id);
        Ok(room_id)
    }

    /// Removes a session from its room. Mid-match departures forfeit.
    pub async fn leave(&mut self, session_id: &SessionId) -> Result<(), RoomError> {
        let room_id = self
            .session_rooms
            .remove(session_id)
            .ok_or_else(|| RoomError::NotInRoom(session_id.clone()))?;

        if let Some(handle) = self.rooms.get(&room_id) {
            handle.leave(session_id.clone()).await?;
        }
        self.prune_closed();
        Ok(())
    }

    /// Routes a game message from a session to its room.
    pub async fn route_message(
        &self,
        session_id: &SessionId,
        msg: ClientMessage,
    ) -> Result<(), RoomError> {
        let room_id = self
            .session_rooms
            .get(session_id)
            .ok_or_else(|| RoomError::NotInRoom(session_id.clone()))?;
        let handle = self
            .rooms
            .get(room_id)
            .ok_or(RoomError::NotFound(*room_id))?;
        handle.send_message(session_id.clone(), msg).await
    }

    /// Discovery metadata for every live room. Rooms that fail to answer
    /// (mid-shutdown) are skipped.
    pub async fn listings(&self) -> Vec<RoomListing> {
        let mut listings = Vec::with_capacity(self.rooms.len());
        for handle in self.rooms.values() {
            if let Ok(listing) = handle.listing().await {
                listings.push(listing);
            }
        }
        listings
    }

    /// The replicated state object of one room.
    pub async fn room_state(&self, room_id: RoomId) -> Result<RoomStateView, RoomError> {
        let handle = self
            .rooms
            .get(&room_id)
            .ok_or(RoomError::NotFound(room_id))?;
        handle.state().await
    }

    /// Asks every room to shut down (graceful drain).
    pub async fn shutdown_all(&mut self) {
        for handle in self.rooms.values() {
            let _ = handle.shutdown().await;
        }
        self.rooms.clear();
        self.session_rooms.clear();
    }

    /// The room a session is currently in, if any.
    pub fn session_room(&self, session_id: &SessionId) -> Option<RoomId> {
        self.session_rooms.get(session_id).copied()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Drops handles to rooms whose actors have already stopped.
    fn prune_closed(&mut self) {
        self.rooms.retain(|room_id, handle| {
            let open = !handle.is_closed();
            if !open {
                tracing::debug!(%room_id, "pruning disposed room");
            }
            open
        });
        let live: std::collections::HashSet<RoomId> = self.rooms.keys().copied().collect();
        self.session_rooms.retain(|_, room_id| live.contains(room_id));
    }
}
