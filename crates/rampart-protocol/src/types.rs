//! Wire types for the Rampart battle protocol.
//!
//! Everything in this module travels between client and server as JSON.
//! The shapes are load-bearing: clients are pure renderers driven by these
//! messages, so the serde attributes below define the public contract.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Opaque per-connection identifier assigned by the transport layer.
///
/// `#[serde(transparent)]` keeps it a plain JSON string on the wire, so
/// `SessionId("ab12".into())` serializes as `"ab12"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for a battle room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Lane sides and lifecycle phases
// ---------------------------------------------------------------------------

/// A player's allegiance and direction of travel on the lane.
///
/// The first session to join a room is `Player1` (castle on the left,
/// units move toward +x); the second is `Player2` (mirror image).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Player1,
    Player2,
}

impl Side {
    /// The opposing side.
    pub fn opponent(self) -> Side {
        match self {
            Side::Player1 => Side::Player2,
            Side::Player2 => Side::Player1,
        }
    }

    /// Direction of travel along the lane: +1 for player1, -1 for player2.
    pub fn direction(self) -> f64 {
        match self {
            Side::Player1 => 1.0,
            Side::Player2 => -1.0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Player1 => write!(f, "player1"),
            Side::Player2 => write!(f, "player2"),
        }
    }
}

/// Room lifecycle phase. Strictly forward-moving:
///
/// ```text
/// waiting → countdown → playing → finished
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Waiting,
    Countdown,
    Playing,
    Finished,
}

impl Phase {
    /// Returns `true` if the room is still accepting joins.
    pub fn is_joinable(self) -> bool {
        matches!(self, Phase::Waiting)
    }

    /// Returns `true` if a disconnect in this phase forfeits the match.
    pub fn forfeits_on_leave(self) -> bool {
        matches!(self, Phase::Countdown | Phase::Playing)
    }

    /// Returns `true` if transitioning to `target` moves forward.
    pub fn can_transition_to(self, target: Phase) -> bool {
        let rank = |p: Phase| match p {
            Phase::Waiting => 0,
            Phase::Countdown => 1,
            Phase::Playing => 2,
            Phase::Finished => 3,
        };
        rank(target) > rank(self)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Waiting => write!(f, "waiting"),
            Phase::Countdown => write!(f, "countdown"),
            Phase::Playing => write!(f, "playing"),
            Phase::Finished => write!(f, "finished"),
        }
    }
}

/// Combat state machine for a live unit, as rendered by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitState {
    Spawn,
    Walk,
    AttackWindup,
    AttackCooldown,
    Hitstun,
    Die,
}

/// Why a finished match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinReason {
    CastleDestroyed,
    OpponentDisconnected,
}

impl fmt::Display for WinReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WinReason::CastleDestroyed => write!(f, "castle_destroyed"),
            WinReason::OpponentDisconnected => write!(f, "opponent_disconnected"),
        }
    }
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Options carried by the connect-time `join` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JoinOptions {
    /// Identity in the external account system; may be absent for guests.
    pub external_player_id: Option<String>,
    /// Name shown to the opponent and in room listings.
    pub display_name: Option<String>,
    /// Requested deck of unit ids. Unknown ids are dropped server-side and
    /// the deck is capped at the room's maximum.
    pub deck: Option<Vec<String>>,
}

/// Messages a client may send.
///
/// Internally tagged: `{"type": "summon", "unitId": "archer"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Must be the first message on a fresh connection.
    Join {
        #[serde(default)]
        options: JoinOptions,
    },
    /// Declare readiness. Idempotent.
    Ready,
    /// Spend cost to place a unit on the lane.
    #[serde(rename_all = "camelCase")]
    Summon { unit_id: String },
    /// Spend cost to raise the cost-reserve cap.
    UpgradeCost,
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Error codes sent to an offending client. Never broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    GameNotPlaying,
    InvalidUnit,
    UnitNotInDeck,
    Cooldown,
    InsufficientCost,
    SpawnFailed,
    CannotUpgrade,
}

/// Full per-player view, sent on join and in `all_players` snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub session_id: SessionId,
    pub external_player_id: String,
    pub display_name: String,
    pub side: Side,
    pub cost: u32,
    pub max_cost: u32,
    pub cost_level: u8,
    pub castle_hp: i32,
    pub max_castle_hp: i32,
    pub ready: bool,
    pub deck: Vec<String>,
}

/// The per-tick subset of player state that actually changes during play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSyncView {
    pub session_id: SessionId,
    pub cost: u32,
    pub max_cost: u32,
    pub cost_level: u8,
    pub castle_hp: i32,
    pub max_castle_hp: i32,
}

/// A live unit as rendered by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitView {
    pub instance_id: String,
    pub definition_id: String,
    pub side: Side,
    pub x: f64,
    pub hp: i32,
    pub max_hp: i32,
    pub state: UnitState,
    pub state_timer: u32,
    pub target_id: Option<String>,
}

/// The replicated room state object: the full client-visible snapshot.
///
/// `units_sync`/`players_sync` carry the per-tick diffs of this; the whole
/// object is available on request for debugging and tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStateView {
    pub phase: Phase,
    pub game_time: u64,
    pub countdown: u32,
    pub stage_length: f64,
    pub players: Vec<PlayerView>,
    pub units: Vec<UnitView>,
    pub winner_id: Option<SessionId>,
    pub win_reason: Option<WinReason>,
}

/// Messages the server sends. Broadcasts unless noted otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A player entered the room.
    PlayerJoined {
        #[serde(flatten)]
        player: PlayerView,
    },
    /// Snapshot of every player in the room, in join order.
    AllPlayers { players: Vec<PlayerView> },
    /// A summon was accepted and the unit placed on the lane.
    UnitSpawned {
        #[serde(flatten)]
        unit: UnitView,
    },
    /// Full snapshot of live units, sent every tick while playing.
    UnitsSync { units: Vec<UnitView> },
    /// Per-player resource and castle state, sent every tick while playing.
    PlayersSync { players: Vec<PlayerSyncView> },
    /// The room entered a new phase.
    #[serde(rename_all = "camelCase")]
    PhaseChange {
        phase: Phase,
        #[serde(skip_serializing_if = "Option::is_none")]
        countdown: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        winner_id: Option<SessionId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        win_reason: Option<WinReason>,
    },
    /// One second elapsed during the pre-match countdown.
    CountdownUpdate { countdown: u32 },
    /// A rejected command. Sent only to the offending client.
    Error { code: ErrorCode, message: String },
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The wire shapes below are relied on by client renderers; these tests
    //! pin the exact JSON produced by the serde attributes.

    use super::*;

    #[test]
    fn test_session_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&SessionId::from("ab12cd34")).unwrap();
        assert_eq!(json, "\"ab12cd34\"");
    }

    #[test]
    fn test_room_id_display() {
        assert_eq!(RoomId(3).to_string(), "R-3");
    }

    #[test]
    fn test_side_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Side::Player1).unwrap(), "\"player1\"");
        assert_eq!(serde_json::to_string(&Side::Player2).unwrap(), "\"player2\"");
    }

    #[test]
    fn test_side_opponent_and_direction() {
        assert_eq!(Side::Player1.opponent(), Side::Player2);
        assert_eq!(Side::Player2.opponent(), Side::Player1);
        assert_eq!(Side::Player1.direction(), 1.0);
        assert_eq!(Side::Player2.direction(), -1.0);
    }

    #[test]
    fn test_phase_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Phase::Waiting).unwrap(), "\"waiting\"");
        assert_eq!(serde_json::to_string(&Phase::Finished).unwrap(), "\"finished\"");
    }

    #[test]
    fn test_phase_only_moves_forward() {
        assert!(Phase::Waiting.can_transition_to(Phase::Countdown));
        assert!(Phase::Waiting.can_transition_to(Phase::Finished));
        assert!(Phase::Countdown.can_transition_to(Phase::Playing));
        assert!(!Phase::Playing.can_transition_to(Phase::Waiting));
        assert!(!Phase::Finished.can_transition_to(Phase::Playing));
    }

    #[test]
    fn test_unit_state_wire_names() {
        assert_eq!(serde_json::to_string(&UnitState::Spawn).unwrap(), "\"spawn\"");
        assert_eq!(
            serde_json::to_string(&UnitState::AttackWindup).unwrap(),
            "\"attack_windup\""
        );
        assert_eq!(serde_json::to_string(&UnitState::Die).unwrap(), "\"die\"");
    }

    #[test]
    fn test_win_reason_wire_names() {
        assert_eq!(
            serde_json::to_string(&WinReason::CastleDestroyed).unwrap(),
            "\"castle_destroyed\""
        );
        assert_eq!(
            serde_json::to_string(&WinReason::OpponentDisconnected).unwrap(),
            "\"opponent_disconnected\""
        );
    }

    #[test]
    fn test_error_code_screaming_snake_case() {
        assert_eq!(
            serde_json::to_string(&ErrorCode::GameNotPlaying).unwrap(),
            "\"GAME_NOT_PLAYING\""
        );
        assert_eq!(
            serde_json::to_string(&ErrorCode::UnitNotInDeck).unwrap(),
            "\"UNIT_NOT_IN_DECK\""
        );
        assert_eq!(
            serde_json::to_string(&ErrorCode::InsufficientCost).unwrap(),
            "\"INSUFFICIENT_COST\""
        );
    }

    #[test]
    fn test_client_summon_json_format() {
        let msg = ClientMessage::Summon {
            unit_id: "archer".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "summon");
        assert_eq!(json["unitId"], "archer");
    }

    #[test]
    fn test_client_join_defaults_missing_options() {
        // A bare `{"type": "join"}` must parse with empty options.
        let msg: ClientMessage = serde_json::from_str(r#"{"type": "join"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Join {
                options: JoinOptions::default()
            }
        );
    }

    #[test]
    fn test_client_join_with_options_round_trip() {
        let msg = ClientMessage::Join {
            options: JoinOptions {
                external_player_id: Some("acct-9".into()),
                display_name: Some("Kael".into()),
                deck: Some(vec!["archer".into(), "recruit".into()]),
            },
        };
        let bytes = serde_json::to_vec(&msg).unwrap();
        let decoded: ClientMessage = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_client_upgrade_cost_tag() {
        let json = serde_json::to_string(&ClientMessage::UpgradeCost).unwrap();
        assert_eq!(json, r#"{"type":"upgrade_cost"}"#);
    }

    #[test]
    fn test_player_joined_flattens_view() {
        let msg = ServerMessage::PlayerJoined {
            player: PlayerView {
                session_id: SessionId::from("s1"),
                external_player_id: String::new(),
                display_name: "Kael".into(),
                side: Side::Player1,
                cost: 200,
                max_cost: 1000,
                cost_level: 1,
                castle_hp: 5000,
                max_castle_hp: 5000,
                ready: false,
                deck: vec!["archer".into()],
            },
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "player_joined");
        // View fields sit at the top level, not nested under "player".
        assert_eq!(json["sessionId"], "s1");
        assert_eq!(json["castleHp"], 5000);
        assert_eq!(json["side"], "player1");
        assert!(json.get("player").is_none());
    }

    #[test]
    fn test_unit_spawned_json_format() {
        let msg = ServerMessage::UnitSpawned {
            unit: UnitView {
                instance_id: "u0-1".into(),
                definition_id: "recruit".into(),
                side: Side::Player2,
                x: 1070.0,
                hp: 320,
                max_hp: 320,
                state: UnitState::Spawn,
                state_timer: 0,
                target_id: None,
            },
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "unit_spawned");
        assert_eq!(json["instanceId"], "u0-1");
        assert_eq!(json["state"], "spawn");
        assert!(json["targetId"].is_null());
    }

    #[test]
    fn test_phase_change_omits_absent_context() {
        let msg = ServerMessage::PhaseChange {
            phase: Phase::Playing,
            countdown: None,
            winner_id: None,
            win_reason: None,
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "phase_change");
        assert_eq!(json["phase"], "playing");
        assert!(json.get("winnerId").is_none());
        assert!(json.get("winReason").is_none());
    }

    #[test]
    fn test_phase_change_finished_carries_winner() {
        let msg = ServerMessage::PhaseChange {
            phase: Phase::Finished,
            countdown: None,
            winner_id: Some(SessionId::from("s2")),
            win_reason: Some(WinReason::OpponentDisconnected),
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["winnerId"], "s2");
        assert_eq!(json["winReason"], "opponent_disconnected");
    }

    #[test]
    fn test_error_message_json_format() {
        let msg = ServerMessage::Error {
            code: ErrorCode::Cooldown,
            message: "archer is still on cooldown".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["code"], "COOLDOWN");
    }

    #[test]
    fn test_server_message_round_trip() {
        let msg = ServerMessage::PlayersSync {
            players: vec![PlayerSyncView {
                session_id: SessionId::from("s1"),
                cost: 740,
                max_cost: 2500,
                cost_level: 2,
                castle_hp: 4100,
                max_castle_hp: 5000,
            }],
        };
        let bytes = serde_json::to_vec(&msg).unwrap();
        let decoded: ServerMessage = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_decode_garbage_returns_error() {
        let garbage = b"not json at all";
        let result: Result<ClientMessage, _> = serde_json::from_slice(garbage);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_unknown_event_type_returns_error() {
        let unknown = r#"{"type": "teleport", "x": 400}"#;
        let result: Result<ClientMessage, _> = serde_json::from_str(unknown);
        assert!(result.is_err());
    }
}
