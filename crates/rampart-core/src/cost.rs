//! The regenerating cost resource and its tiered upgrades.
//!
//! All balance numbers live in the tables below, indexed by
//! `cost_level - 1`. The reserve is fractional internally (regen is
//! Δt-driven), but every affordability comparison floors first so a
//! player is never rounded into insufficient funds.

use rampart_protocol::{Phase, SessionId};

use crate::error::UpgradeError;
use crate::state::{Battle, PlayerState};

/// Reserve cap per cost level.
pub const MAX_LEVELS: [u32; 8] = [1_000, 2_500, 4_500, 7_000, 10_000, 15_000, 25_000, 99_999];

/// Price of upgrading *from* each level. No upgrade from level 8.
pub const UPGRADE_COSTS: [u32; 7] = [500, 1_200, 2_500, 4_500, 8_000, 12_000, 20_000];

/// Regeneration in cost per second, per level.
pub const REGEN_RATES: [u32; 8] = [100, 150, 250, 400, 600, 900, 1_500, 2_500];

/// Reserve granted on joining a battle.
pub const INITIAL_COST: u32 = 200;

/// Highest reachable cost level.
pub const MAX_COST_LEVEL: u8 = 8;

impl PlayerState {
    /// Regenerates the reserve for `dt_ms` elapsed milliseconds, capped at
    /// the current maximum. A zero delta is a no-op.
    pub fn regen_cost(&mut self, dt_ms: f64) {
        let rate = REGEN_RATES[(self.cost_level - 1) as usize] as f64;
        self.cost = (self.cost + rate * dt_ms / 1000.0).min(self.max_cost as f64);
    }

    /// The reserve as clients see it: floored to whole cost.
    pub fn cost_floor(&self) -> u32 {
        self.cost as u32
    }

    /// Whether the floored reserve covers `amount`.
    pub fn can_afford(&self, amount: u32) -> bool {
        self.cost_floor() >= amount
    }

    /// Deducts `amount` if affordable. Returns `false` (and changes
    /// nothing) otherwise.
    pub fn spend(&mut self, amount: u32) -> bool {
        if !self.can_afford(amount) {
            return false;
        }
        self.cost -= amount as f64;
        true
    }

    /// Returns a previously spent amount, capped at the reserve maximum.
    pub fn refund(&mut self, amount: u32) {
        self.cost = (self.cost + amount as f64).min(self.max_cost as f64);
    }

    /// Whether the next cost-level upgrade is available and affordable.
    pub fn can_upgrade(&self) -> bool {
        self.cost_level < MAX_COST_LEVEL
            && self.can_afford(UPGRADE_COSTS[(self.cost_level - 1) as usize])
    }

    /// Pays for and applies the next cost-level upgrade. Returns `false`
    /// (and changes nothing) if unavailable or unaffordable.
    pub fn upgrade(&mut self) -> bool {
        if !self.can_upgrade() {
            return false;
        }
        let price = UPGRADE_COSTS[(self.cost_level - 1) as usize];
        self.cost -= price as f64;
        self.cost_level += 1;
        self.max_cost = MAX_LEVELS[(self.cost_level - 1) as usize];
        true
    }
}

impl Battle {
    /// Pays for and applies the sender's next cost-level upgrade.
    pub fn upgrade_cost(&mut self, session: &SessionId) -> Result<(), UpgradeError> {
        if self.phase != Phase::Playing {
            return Err(UpgradeError::NotPlaying);
        }
        let player = self.player_mut(session).ok_or(UpgradeError::NotSeated)?;
        if player.cost_level >= MAX_COST_LEVEL {
            return Err(UpgradeError::MaxLevel);
        }
        let price = UPGRADE_COSTS[(player.cost_level - 1) as usize];
        if !player.can_afford(price) {
            return Err(UpgradeError::InsufficientCost {
                required: price,
                available: player.cost_floor(),
            });
        }
        player.upgrade();
        Ok(())
    }
}
