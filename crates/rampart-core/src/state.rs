//! Battle state: players, phase, and the client-visible views.
//!
//! A [`Battle`] owns everything inside one match. The room layer drives it
//! (joins, readiness, phase entries, ticks) and reads views back out; no
//! other component mutates battle state.

use std::collections::HashMap;
use std::sync::Arc;

use rampart_protocol::{
    Phase, PlayerSyncView, PlayerView, RoomStateView, SessionId, Side, UnitView, WinReason,
};

use crate::arena::{Unit, UnitArena, UnitId};
use crate::catalog::Catalog;
use crate::cost::{INITIAL_COST, MAX_LEVELS};
use crate::error::JoinError;

/// Per-match tunables.
#[derive(Debug, Clone)]
pub struct BattleConfig {
    /// Lane length in pixels.
    pub stage_length: f64,
    /// Starting castle hit points per player.
    pub castle_hp: i32,
    /// Maximum deck size kept at join.
    pub max_deck_size: usize,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            stage_length: 1_200.0,
            castle_hp: 5_000,
            max_deck_size: 7,
        }
    }
}

/// One seated player's state for the duration of a match.
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub session_id: SessionId,
    /// Identity in the external account system; empty for guests.
    pub external_player_id: String,
    pub display_name: String,
    pub side: Side,
    /// Fractional cost reserve. Compare via `cost_floor`.
    pub cost: f64,
    pub max_cost: u32,
    pub cost_level: u8,
    pub castle_hp: i32,
    pub max_castle_hp: i32,
    pub ready: bool,
    pub deck: Vec<String>,
    /// Remaining re-summon delay per unit id, in milliseconds. Absent
    /// entries mean ready to summon.
    pub spawn_cooldowns: HashMap<String, f64>,
    pub kills: u32,
}

impl PlayerState {
    pub fn new(
        session_id: SessionId,
        external_player_id: String,
        display_name: String,
        side: Side,
        castle_hp: i32,
        deck: Vec<String>,
    ) -> Self {
        Self {
            session_id,
            external_player_id,
            display_name,
            side,
            cost: INITIAL_COST as f64,
            max_cost: MAX_LEVELS[0],
            cost_level: 1,
            castle_hp,
            max_castle_hp: castle_hp,
            ready: false,
            deck,
            spawn_cooldowns: HashMap::new(),
            kills: 0,
        }
    }

    /// Remaining spawn cooldown for `unit_id`, if any is still running.
    pub fn spawn_cooldown_remaining(&self, unit_id: &str) -> Option<f64> {
        self.spawn_cooldowns
            .get(unit_id)
            .copied()
            .filter(|ms| *ms > 0.0)
    }

    /// Starts (or restarts) the re-summon delay for `unit_id`.
    pub fn set_spawn_cooldown(&mut self, unit_id: &str, ms: f64) {
        self.spawn_cooldowns.insert(unit_id.to_string(), ms);
    }

    /// Counts `dt_ms` off every running cooldown, dropping the expired.
    pub fn decay_spawn_cooldowns(&mut self, dt_ms: f64) {
        self.spawn_cooldowns.retain(|_, remaining| {
            *remaining = (*remaining - dt_ms).max(0.0);
            *remaining > 0.0
        });
    }
}

/// The authoritative state of one castle-rush match.
#[derive(Debug, Clone)]
pub struct Battle {
    pub(crate) config: BattleConfig,
    pub(crate) catalog: Arc<Catalog>,
    pub(crate) phase: Phase,
    pub(crate) game_time_ms: f64,
    /// Join order determines sides: index 0 is player1.
    pub(crate) players: Vec<PlayerState>,
    pub(crate) units: UnitArena,
    pub(crate) winner: Option<SessionId>,
    pub(crate) win_reason: Option<WinReason>,
}

impl Battle {
    pub fn new(config: BattleConfig, catalog: Arc<Catalog>) -> Self {
        Self {
            config,
            catalog,
            phase: Phase::Waiting,
            game_time_ms: 0.0,
            players: Vec::with_capacity(2),
            units: UnitArena::new(),
            winner: None,
            win_reason: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn game_time_ms(&self) -> f64 {
        self.game_time_ms
    }

    pub fn stage_length(&self) -> f64 {
        self.config.stage_length
    }

    pub fn winner(&self) -> Option<&SessionId> {
        self.winner.as_ref()
    }

    pub fn win_reason(&self) -> Option<WinReason> {
        self.win_reason
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= 2
    }

    pub fn players(&self) -> &[PlayerState] {
        &self.players
    }

    pub fn player(&self, session: &SessionId) -> Option<&PlayerState> {
        self.players.iter().find(|p| &p.session_id == session)
    }

    pub fn player_mut(&mut self, session: &SessionId) -> Option<&mut PlayerState> {
        self.players.iter_mut().find(|p| &p.session_id == session)
    }

    pub fn player_by_side(&self, side: Side) -> Option<&PlayerState> {
        self.players.iter().find(|p| p.side == side)
    }

    pub(crate) fn player_by_side_mut(&mut self, side: Side) -> Option<&mut PlayerState> {
        self.players.iter_mut().find(|p| p.side == side)
    }

    /// Seats a player. The first joiner becomes player1, the second
    /// player2; the deck is filtered against the catalog and capped.
    pub fn add_player(
        &mut self,
        session_id: SessionId,
        external_player_id: Option<String>,
        display_name: Option<String>,
        deck: Option<Vec<String>>,
    ) -> Result<Side, JoinError> {
        if self.phase != Phase::Waiting {
            return Err(JoinError::AlreadyStarted);
        }
        if self.is_full() {
            return Err(JoinError::Full);
        }
        if self.player(&session_id).is_some() {
            return Err(JoinError::AlreadyJoined(session_id));
        }

        // First joiner takes player1. Taking the first free side (rather
        // than counting seats) keeps sides distinct when a waiting player
        // leaves and someone else fills the seat.
        let side = if self.player_by_side(Side::Player1).is_none() {
            Side::Player1
        } else {
            Side::Player2
        };
        let mut deck: Vec<String> = deck
            .unwrap_or_default()
            .into_iter()
            .filter(|id| self.catalog.is_valid(id))
            .collect();
        deck.truncate(self.config.max_deck_size);

        let display_name =
            display_name.unwrap_or_else(|| format!("Player {}", self.players.len() + 1));
        self.players.push(PlayerState::new(
            session_id,
            external_player_id.unwrap_or_default(),
            display_name,
            side,
            self.config.castle_hp,
            deck,
        ));
        Ok(side)
    }

    /// Unseats a player, returning their final state.
    pub fn remove_player(&mut self, session: &SessionId) -> Option<PlayerState> {
        let index = self.players.iter().position(|p| &p.session_id == session)?;
        Some(self.players.remove(index))
    }

    /// Marks a player ready. Idempotent; returns `false` for unknown
    /// sessions.
    pub fn set_ready(&mut self, session: &SessionId) -> bool {
        match self.player_mut(session) {
            Some(p) => {
                p.ready = true;
                true
            }
            None => false,
        }
    }

    /// Both seats taken and both players ready.
    pub fn all_ready(&self) -> bool {
        self.is_full() && self.players.iter().all(|p| p.ready)
    }

    /// Locks the room for the pre-match countdown.
    pub fn begin_countdown(&mut self) {
        debug_assert!(self.phase == Phase::Waiting);
        self.phase = Phase::Countdown;
    }

    /// Starts play. The tick pump may now advance the simulation.
    pub fn begin(&mut self) {
        debug_assert!(self.phase == Phase::Countdown);
        self.phase = Phase::Playing;
    }

    /// Adjudicates a mid-match disconnect: the leaver loses immediately.
    pub fn forfeit(&mut self, leaver: &SessionId) {
        if self.phase == Phase::Finished {
            return;
        }
        let winner = self
            .players
            .iter()
            .find(|p| &p.session_id != leaver)
            .map(|p| p.session_id.clone());
        self.phase = Phase::Finished;
        self.winner = winner;
        self.win_reason = Some(WinReason::OpponentDisconnected);
        tracing::info!(leaver = %leaver, "match forfeited by disconnect");
    }

    // -- Views -------------------------------------------------------------

    pub fn player_view(&self, player: &PlayerState) -> PlayerView {
        PlayerView {
            session_id: player.session_id.clone(),
            external_player_id: player.external_player_id.clone(),
            display_name: player.display_name.clone(),
            side: player.side,
            cost: player.cost_floor(),
            max_cost: player.max_cost,
            cost_level: player.cost_level,
            castle_hp: player.castle_hp,
            max_castle_hp: player.max_castle_hp,
            ready: player.ready,
            deck: player.deck.clone(),
        }
    }

    pub fn player_views(&self) -> Vec<PlayerView> {
        self.players.iter().map(|p| self.player_view(p)).collect()
    }

    pub fn player_sync_views(&self) -> Vec<PlayerSyncView> {
        self.players
            .iter()
            .map(|p| PlayerSyncView {
                session_id: p.session_id.clone(),
                cost: p.cost_floor(),
                max_cost: p.max_cost,
                cost_level: p.cost_level,
                castle_hp: p.castle_hp,
                max_castle_hp: p.max_castle_hp,
            })
            .collect()
    }

    pub fn unit_view(&self, id: UnitId) -> Option<UnitView> {
        self.units.get(id).map(|u| view_of(id, u))
    }

    pub fn unit_views(&self) -> Vec<UnitView> {
        self.units.iter().map(|(id, u)| view_of(id, u)).collect()
    }

    /// The full replicated state object. `countdown` is owned by the room
    /// orchestrator and folded in here.
    pub fn state_view(&self, countdown: u32) -> RoomStateView {
        RoomStateView {
            phase: self.phase,
            game_time: self.game_time_ms as u64,
            countdown,
            stage_length: self.config.stage_length,
            players: self.player_views(),
            units: self.unit_views(),
            winner_id: self.winner.clone(),
            win_reason: self.win_reason,
        }
    }
}

fn view_of(id: UnitId, unit: &Unit) -> UnitView {
    UnitView {
        instance_id: id.wire_id(),
        definition_id: unit.definition_id.clone(),
        side: unit.side,
        x: unit.x,
        hp: unit.hp,
        max_hp: unit.max_hp,
        state: unit.state,
        state_timer: unit.state_timer_ms as u32,
        target_id: unit.target.map(|t| t.wire_id()),
    }
}
