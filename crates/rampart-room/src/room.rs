//! Room actor: an isolated Tokio task that owns one battle.
//!
//! Each room runs in its own task and communicates with the outside world
//! through an mpsc channel, so every mutation of room state (commands,
//! countdown ticks, simulation ticks, broadcasts) is strictly serialized.
//! The actor's event loop is a `tokio::select!` over the command channel
//! and two optional timers (the 1 Hz countdown and the 20 Hz tick pump)
//! that pend forever while inactive.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rampart_core::{
    Battle, BattleConfig, Catalog, JoinError, MatchRecord, PlayerState, SummonError, UpgradeError,
    TICK_INTERVAL_MS,
};
use rampart_protocol::{
    ClientMessage, ErrorCode, JoinOptions, Phase, RoomId, RoomStateView, ServerMessage, SessionId,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, Instant, Interval, MissedTickBehavior};

use crate::{ResultSink, RoomError};

/// Seconds counted down between both-ready and play.
const COUNTDOWN_SECONDS: u32 = 3;

/// Channel sender delivering outbound messages to one client.
pub type ClientSender = mpsc::UnboundedSender<ServerMessage>;

/// Discovery metadata for one room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomListing {
    pub room_id: RoomId,
    pub status: Phase,
    /// Display name of the first joiner.
    pub host_name: String,
    /// Leading half of the host's deck, rounded up. The rest stays secret
    /// until the match starts.
    pub host_deck_preview: Vec<String>,
    pub player_count: usize,
    /// Unix milliseconds of room creation.
    pub created_at: u64,
}

/// Commands sent to a room actor through its channel.
pub(crate) enum RoomCommand {
    Join {
        session_id: SessionId,
        options: JoinOptions,
        sender: ClientSender,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    /// A game message from a seated client.
    Message {
        session_id: SessionId,
        msg: ClientMessage,
    },
    /// Transport-signaled departure (disconnect or explicit leave).
    Leave {
        session_id: SessionId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    GetListing {
        reply: oneshot::Sender<RoomListing>,
    },
    GetState {
        reply: oneshot::Sender<RoomStateView>,
    },
    Shutdown,
}

/// What woke the actor: the §5 ordering guarantee falls out of handling
/// exactly one of these at a time.
enum RoomEvent {
    Command(Option<RoomCommand>),
    CountdownTick,
    BattleTick,
}

/// Handle to a running room actor. Cheap to clone.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// `true` once the actor has stopped and dropped its receiver.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Seats a player in the room.
    pub async fn join(
        &self,
        session_id: SessionId,
        options: JoinOptions,
        sender: ClientSender,
    ) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Join {
                session_id,
                options,
                sender,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?
    }

    /// Removes a player (disconnects forfeit running matches).
    pub async fn leave(&self, session_id: SessionId) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Leave {
                session_id,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?
    }

    /// Delivers a game message (fire-and-forget).
    pub async fn send_message(
        &self,
        session_id: SessionId,
        msg: ClientMessage,
    ) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Message { session_id, msg })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    /// Fetches the current discovery metadata.
    pub async fn listing(&self) -> Result<RoomListing, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::GetListing { reply: reply_tx })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    /// Fetches the full replicated state object.
    pub async fn state(&self) -> Result<RoomStateView, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::GetState { reply: reply_tx })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    /// Tells the room to shut down.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct BattleRoom<S: ResultSink> {
    room_id: RoomId,
    battle: Battle,
    /// Seconds remaining in the pre-match countdown.
    countdown: u32,
    senders: HashMap<SessionId, ClientSender>,
    receiver: mpsc::Receiver<RoomCommand>,
    /// 1 Hz while counting down, otherwise inactive.
    countdown_timer: Option<Interval>,
    /// 20 Hz while playing, otherwise inactive.
    tick_timer: Option<Interval>,
    /// Wall-clock of the last simulation tick; Δt is measured, not assumed.
    last_tick: Instant,
    created_at: u64,
    sink: Arc<S>,
    disposed: bool,
}

impl<S: ResultSink> BattleRoom<S> {
    async fn run(mut self) {
        tracing::info!(room_id = %self.room_id, "battle room started");

        loop {
            let event = {
                let receiver = &mut self.receiver;
                let countdown_timer = &mut self.countdown_timer;
                let tick_timer = &mut self.tick_timer;
                tokio::select! {
                    cmd = receiver.recv() => RoomEvent::Command(cmd),
                    _ = tick_when(countdown_timer) => RoomEvent::CountdownTick,
                    _ = tick_when(tick_timer) => RoomEvent::BattleTick,
                }
            };

            match event {
                RoomEvent::Command(Some(cmd)) => self.handle_command(cmd),
                RoomEvent::Command(None) => break,
                RoomEvent::CountdownTick => self.on_countdown_tick(),
                RoomEvent::BattleTick => self.on_battle_tick(),
            }

            if self.disposed {
                break;
            }
        }

        tracing::info!(room_id = %self.room_id, "battle room stopped");
    }

    fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join {
                session_id,
                options,
                sender,
                reply,
            } => {
                let result = self.handle_join(session_id, options, sender);
                let _ = reply.send(result);
            }
            RoomCommand::Message { session_id, msg } => {
                self.handle_message(session_id, msg);
            }
            RoomCommand::Leave { session_id, reply } => {
                let result = self.handle_leave(&session_id);
                let _ = reply.send(result);
            }
            RoomCommand::GetListing { reply } => {
                let _ = reply.send(self.listing());
            }
            RoomCommand::GetState { reply } => {
                let _ = reply.send(self.battle.state_view(self.countdown));
            }
            RoomCommand::Shutdown => {
                self.disposed = true;
            }
        }
    }

    fn handle_join(
        &mut self,
        session_id: SessionId,
        options: JoinOptions,
        sender: ClientSender,
    ) -> Result<(), RoomError> {
        let side = self
            .battle
            .add_player(
                session_id.clone(),
                options.external_player_id,
                options.display_name,
                options.deck,
            )
            .map_err(|e| match e {
                JoinError::Full => RoomError::RoomFull(self.room_id),
                JoinError::AlreadyStarted => {
                    RoomError::InvalidState("match already started".into())
                }
                JoinError::AlreadyJoined(id) => RoomError::AlreadyInRoom(id),
            })?;

        self.senders.insert(session_id.clone(), sender);
        tracing::info!(
            room_id = %self.room_id,
            %session_id,
            %side,
            players = self.battle.player_count(),
            "player joined"
        );

        if let Some(player) = self.battle.player(&session_id) {
            let view = self.battle.player_view(player);
            self.broadcast(ServerMessage::PlayerJoined { player: view });
        }
        self.broadcast(ServerMessage::AllPlayers {
            players: self.battle.player_views(),
        });
        Ok(())
    }

    fn handle_message(&mut self, session_id: SessionId, msg: ClientMessage) {
        if !self.senders.contains_key(&session_id) {
            tracing::warn!(
                room_id = %self.room_id,
                %session_id,
                "message from non-member, ignoring"
            );
            return;
        }

        match msg {
            ClientMessage::Join { .. } => {
                tracing::debug!(%session_id, "duplicate join ignored");
            }
            ClientMessage::Ready => self.handle_ready(&session_id),
            ClientMessage::Summon { unit_id } => self.handle_summon(&session_id, &unit_id),
            ClientMessage::UpgradeCost => self.handle_upgrade(&session_id),
        }
    }

    fn handle_ready(&mut self, session_id: &SessionId) {
        if self.battle.phase() != Phase::Waiting {
            return;
        }
        self.battle.set_ready(session_id);
        self.broadcast(ServerMessage::AllPlayers {
            players: self.battle.player_views(),
        });
        if self.battle.all_ready() {
            self.start_countdown();
        }
    }

    fn handle_summon(&mut self, session_id: &SessionId, unit_id: &str) {
        match self.battle.summon(session_id, unit_id) {
            Ok(unit) => {
                if let Some(view) = self.battle.unit_view(unit) {
                    self.broadcast(ServerMessage::UnitSpawned { unit: view });
                }
            }
            Err(error) => {
                let code = summon_error_code(&error);
                self.send_error(session_id, code, error.to_string());
            }
        }
    }

    fn handle_upgrade(&mut self, session_id: &SessionId) {
        if let Err(error) = self.battle.upgrade_cost(session_id) {
            let code = upgrade_error_code(&error);
            self.send_error(session_id, code, error.to_string());
        }
    }

    fn handle_leave(&mut self, session_id: &SessionId) -> Result<(), RoomError> {
        if !self.senders.contains_key(session_id) {
            return Err(RoomError::NotInRoom(session_id.clone()));
        }

        // A departure during countdown or play is an immediate loss for
        // the leaver; the record is built while they are still seated.
        if self.battle.phase().forfeits_on_leave() {
            self.battle.forfeit(session_id);
            self.finish_match();
        }

        self.senders.remove(session_id);
        self.battle.remove_player(session_id);
        tracing::info!(
            room_id = %self.room_id,
            %session_id,
            players = self.battle.player_count(),
            "player left"
        );

        if self.senders.is_empty() {
            self.disposed = true;
        }
        Ok(())
    }

    // -- Phase machine -----------------------------------------------------

    fn start_countdown(&mut self) {
        self.battle.begin_countdown();
        self.countdown = COUNTDOWN_SECONDS;

        let mut timer = tokio::time::interval_at(
            Instant::now() + Duration::from_secs(1),
            Duration::from_secs(1),
        );
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.countdown_timer = Some(timer);

        tracing::info!(room_id = %self.room_id, "countdown started");
        self.broadcast(ServerMessage::PhaseChange {
            phase: Phase::Countdown,
            countdown: Some(self.countdown),
            winner_id: None,
            win_reason: None,
        });
        self.broadcast(ServerMessage::CountdownUpdate {
            countdown: self.countdown,
        });
    }

    fn on_countdown_tick(&mut self) {
        self.countdown = self.countdown.saturating_sub(1);
        if self.countdown > 0 {
            self.broadcast(ServerMessage::CountdownUpdate {
                countdown: self.countdown,
            });
        } else {
            // The countdown timer terminates itself on reaching zero.
            self.countdown_timer = None;
            self.start_playing();
        }
    }

    fn start_playing(&mut self) {
        self.battle.begin();

        let period = Duration::from_millis(TICK_INTERVAL_MS);
        let mut timer = tokio::time::interval_at(Instant::now() + period, period);
        // Skip missed ticks and resume from now; Δt measurement makes the
        // simulation integrate the gap correctly.
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.tick_timer = Some(timer);
        self.last_tick = Instant::now();

        tracing::info!(room_id = %self.room_id, "match started");
        self.broadcast(ServerMessage::PhaseChange {
            phase: Phase::Playing,
            countdown: None,
            winner_id: None,
            win_reason: None,
        });
    }

    fn on_battle_tick(&mut self) {
        let now = Instant::now();
        let dt_ms = now.duration_since(self.last_tick).as_secs_f64() * 1000.0;
        self.last_tick = now;

        self.battle.tick(dt_ms);

        // All mutations land before any broadcast for the tick.
        self.broadcast(ServerMessage::UnitsSync {
            units: self.battle.unit_views(),
        });
        self.broadcast(ServerMessage::PlayersSync {
            players: self.battle.player_sync_views(),
        });

        if self.battle.phase() == Phase::Finished {
            self.finish_match();
        }
    }

    /// Stops the pumps, announces the result, and hands the record to the
    /// sink on a detached task so persistence never blocks the room.
    fn finish_match(&mut self) {
        self.tick_timer = None;
        self.countdown_timer = None;

        let record = MatchRecord::from_battle(&self.battle);
        let winner_id = self.battle.winner().cloned();
        let win_reason = self.battle.win_reason();
        tracing::info!(
            room_id = %self.room_id,
            winner = winner_id.as_ref().map(|s| s.0.as_str()).unwrap_or(""),
            reason = win_reason.map(|r| r.to_string()).unwrap_or_default(),
            "match finished"
        );

        self.broadcast(ServerMessage::PhaseChange {
            phase: Phase::Finished,
            countdown: None,
            winner_id,
            win_reason,
        });

        if let Some(record) = record {
            let sink = Arc::clone(&self.sink);
            let room_id = self.room_id;
            tokio::spawn(async move {
                if let Err(error) = sink.persist(record).await {
                    tracing::warn!(%room_id, %error, "failed to persist match result");
                }
            });
        }
    }

    // -- Fan-out -----------------------------------------------------------

    fn broadcast(&self, msg: ServerMessage) {
        for sender in self.senders.values() {
            let _ = sender.send(msg.clone());
        }
    }

    /// Errors go only to the offending client, never broadcast.
    fn send_error(&self, session_id: &SessionId, code: ErrorCode, message: String) {
        tracing::debug!(room_id = %self.room_id, %session_id, ?code, %message, "command rejected");
        if let Some(sender) = self.senders.get(session_id) {
            let _ = sender.send(ServerMessage::Error { code, message });
        }
    }

    fn listing(&self) -> RoomListing {
        let host = self.battle.players().first();
        RoomListing {
            room_id: self.room_id,
            status: self.battle.phase(),
            host_name: host.map(|p| p.display_name.clone()).unwrap_or_default(),
            host_deck_preview: host.map(deck_preview).unwrap_or_default(),
            player_count: self.battle.player_count(),
            created_at: self.created_at,
        }
    }
}

/// The listed half of the host's deck, rounded up.
fn deck_preview(player: &PlayerState) -> Vec<String> {
    let keep = player.deck.len().div_ceil(2);
    player.deck[..keep].to_vec()
}

/// Resolves when the interval fires; pends forever while inactive.
async fn tick_when(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn summon_error_code(error: &SummonError) -> ErrorCode {
    match error {
        SummonError::NotPlaying => ErrorCode::GameNotPlaying,
        SummonError::UnknownUnit(_) => ErrorCode::InvalidUnit,
        SummonError::NotInDeck(_) => ErrorCode::UnitNotInDeck,
        SummonError::OnCooldown { .. } => ErrorCode::Cooldown,
        SummonError::InsufficientCost { .. } => ErrorCode::InsufficientCost,
        SummonError::SpawnFailed(_) => ErrorCode::SpawnFailed,
    }
}

fn upgrade_error_code(error: &UpgradeError) -> ErrorCode {
    match error {
        UpgradeError::NotPlaying => ErrorCode::GameNotPlaying,
        UpgradeError::NotSeated
        | UpgradeError::MaxLevel
        | UpgradeError::InsufficientCost { .. } => ErrorCode::CannotUpgrade,
    }
}

/// Spawns a new room actor task and returns a handle to it.
pub(crate) fn spawn_room<S: ResultSink>(
    room_id: RoomId,
    config: BattleConfig,
    catalog: Arc<Catalog>,
    sink: Arc<S>,
    channel_size: usize,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(channel_size);

    let actor = BattleRoom {
        room_id,
        battle: Battle::new(config, catalog),
        countdown: 0,
        senders: HashMap::new(),
        receiver: rx,
        countdown_timer: None,
        tick_timer: None,
        last_tick: Instant::now(),
        created_at: unix_millis(),
        sink,
        disposed: false,
    };

    tokio::spawn(actor.run());

    RoomHandle {
        room_id,
        sender: tx,
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
