//! Error types for the battle core.

use rampart_protocol::SessionId;

/// Errors loading unit master data.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The roster file is not valid JSON or has the wrong shape.
    #[error("failed to parse unit roster: {0}")]
    Parse(#[from] serde_json::Error),

    /// Two definitions share an id.
    #[error("duplicate unit id in roster: {0}")]
    DuplicateId(String),
}

/// Why a player could not join a battle.
#[derive(Debug, thiserror::Error)]
pub enum JoinError {
    /// Both lane sides are taken.
    #[error("battle already has two players")]
    Full,

    /// The battle has left the waiting phase.
    #[error("battle already started")]
    AlreadyStarted,

    /// The session is already seated in this battle.
    #[error("session {0} already joined")]
    AlreadyJoined(SessionId),
}

/// Why a summon command was rejected. Each variant maps to exactly one
/// wire error code.
#[derive(Debug, thiserror::Error)]
pub enum SummonError {
    #[error("battle is not in the playing phase")]
    NotPlaying,

    #[error("unknown unit id: {0}")]
    UnknownUnit(String),

    #[error("unit {0} is not in your deck")]
    NotInDeck(String),

    #[error("unit {unit_id} is on cooldown for another {remaining_ms}ms")]
    OnCooldown { unit_id: String, remaining_ms: u32 },

    #[error("insufficient cost: need {required}, have {available}")]
    InsufficientCost { required: u32, available: u32 },

    #[error("spawn failed: {0}")]
    SpawnFailed(String),
}

/// Why a cost upgrade was rejected.
#[derive(Debug, thiserror::Error)]
pub enum UpgradeError {
    #[error("battle is not in the playing phase")]
    NotPlaying,

    #[error("session is not seated in this battle")]
    NotSeated,

    #[error("cost level is already at maximum")]
    MaxLevel,

    #[error("insufficient cost: need {required}, have {available}")]
    InsufficientCost { required: u32, available: u32 },
}
