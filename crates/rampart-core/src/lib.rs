//! Deterministic battle core for the Rampart server.
//!
//! Everything in this crate is synchronous and side-effect free: a
//! [`Battle`] advances only when the room orchestrator feeds it commands
//! and Δt ticks, so the same sequence of inputs always reproduces the same
//! match. The crate covers:
//!
//! - the read-only unit [`Catalog`] (embedded roster),
//! - the regenerating cost resource and its tiered upgrades,
//! - the lane combat simulator (state machine, targeting, collision,
//!   damage, knockback, castle damage, win detection),
//! - the [`MatchRecord`] handed to the persistence sink.
//!
//! The room layer above holds exactly one mutable borrow of a battle per
//! tick; the catalog is shared read-only process-wide.

mod arena;
mod catalog;
mod combat;
mod cost;
mod error;
mod result;
mod state;

pub use arena::{Unit, UnitArena, UnitId, UnitStats};
pub use catalog::{Catalog, Rarity, UnitDefinition};
pub use combat::{
    edge_distance, BASE_UNIT_WIDTH, CASTLE_OFFSET, DEATH_LINGER_MS, HITSTUN_MS,
    KNOCKBACK_HP_FRACTION, SAME_SIDE_GAP, SPAWN_INSET, SPAWN_TO_WALK_MS, TARGET_SEARCH_SLACK,
    TICK_INTERVAL_MS, TICK_RATE,
};
pub use cost::{INITIAL_COST, MAX_COST_LEVEL, MAX_LEVELS, REGEN_RATES, UPGRADE_COSTS};
pub use error::{CatalogError, JoinError, SummonError, UpgradeError};
pub use result::MatchRecord;
pub use state::{Battle, BattleConfig, PlayerState};
