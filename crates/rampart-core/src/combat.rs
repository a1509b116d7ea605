//! The fixed-step combat simulator.
//!
//! Units live on a one-dimensional lane. Each tick advances every unit's
//! state machine, resolves damage and knockback, separates same-side
//! crowds, reassigns targets, sweeps expired corpses, and checks the
//! castles. The tick is Δt-driven and touches nothing outside the
//! [`Battle`], so jitter in the pump integrates correctly and the whole
//! simulation is deterministic for a given command/Δt sequence.
//!
//! Geometry is edge-based: distances are measured between unit bounding
//! extents, not centers. All pairwise scans are O(n²) over per-room
//! populations in the tens, which profiles far below the tick budget.

use rampart_protocol::{Phase, SessionId, Side, UnitState, WinReason};

use crate::arena::{Unit, UnitId};
use crate::catalog::UnitDefinition;
use crate::error::SummonError;
use crate::state::Battle;

/// Simulation rate of the tick pump.
pub const TICK_RATE: u32 = 20;

/// Nominal tick period in milliseconds.
pub const TICK_INTERVAL_MS: u64 = 1_000 / TICK_RATE as u64;

/// Castle distance from each lane end.
pub const CASTLE_OFFSET: f64 = 80.0;

/// Lane footprint of a scale-1.0 unit.
pub const BASE_UNIT_WIDTH: f64 = 60.0;

/// Minimum gap maintained between same-side units.
pub const SAME_SIDE_GAP: f64 = 30.0;

/// Units spawn this far inward of their own castle.
pub const SPAWN_INSET: f64 = 50.0;

/// Time from spawn until a unit starts walking.
pub const SPAWN_TO_WALK_MS: f64 = 300.0;

/// Duration of knockback hitstun.
pub const HITSTUN_MS: f64 = 200.0;

/// How long a dead unit lingers before removal.
pub const DEATH_LINGER_MS: f64 = 500.0;

/// Cumulative damage fraction of max hp that triggers knockback.
pub const KNOCKBACK_HP_FRACTION: f64 = 0.15;

/// Extra reach beyond attack range when hunting for a target.
pub const TARGET_SEARCH_SLACK: f64 = 20.0;

/// Shortest gap between the bounding extents of two units on the lane.
/// Negative when they overlap.
pub fn edge_distance(ax: f64, a_width: f64, bx: f64, b_width: f64) -> f64 {
    let ha = a_width / 2.0;
    let hb = b_width / 2.0;
    if ax < bx {
        (bx - hb) - (ax + ha)
    } else {
        (ax - ha) - (bx + hb)
    }
}

impl Battle {
    /// X coordinate of a side's castle.
    pub fn castle_x(&self, side: Side) -> f64 {
        match side {
            Side::Player1 => CASTLE_OFFSET,
            Side::Player2 => self.config.stage_length - CASTLE_OFFSET,
        }
    }

    /// Validates and executes a summon: spends the cost, places the unit,
    /// and starts the per-unit spawn cooldown.
    pub fn summon(&mut self, session: &SessionId, unit_id: &str) -> Result<UnitId, SummonError> {
        if self.phase != Phase::Playing {
            return Err(SummonError::NotPlaying);
        }
        let def = self
            .catalog
            .lookup(unit_id)
            .ok_or_else(|| SummonError::UnknownUnit(unit_id.to_string()))?
            .clone();

        let side = {
            let player = self
                .player(session)
                .ok_or_else(|| SummonError::SpawnFailed("summoner is not seated".into()))?;
            if !player.deck.iter().any(|d| d == unit_id) {
                return Err(SummonError::NotInDeck(unit_id.to_string()));
            }
            if let Some(remaining) = player.spawn_cooldown_remaining(unit_id) {
                return Err(SummonError::OnCooldown {
                    unit_id: unit_id.to_string(),
                    remaining_ms: remaining.ceil() as u32,
                });
            }
            if !player.can_afford(def.cost) {
                return Err(SummonError::InsufficientCost {
                    required: def.cost,
                    available: player.cost_floor(),
                });
            }
            player.side
        };

        // Validation passed: the spend and placement below cannot fail, so
        // an accepted summon is atomic and a rejected one is a no-op.
        let cooldown = def.spawn_cooldown() as f64;
        let player = self.player_mut(session).ok_or_else(|| {
            SummonError::SpawnFailed("summoner left mid-command".into())
        })?;
        player.spend(def.cost);
        player.set_spawn_cooldown(unit_id, cooldown);

        let id = self.place_unit(side, &def);
        tracing::debug!(unit = %id, definition = unit_id, %side, "unit summoned");
        Ok(id)
    }

    fn place_unit(&mut self, side: Side, def: &UnitDefinition) -> UnitId {
        let x = self.castle_x(side) + SPAWN_INSET * side.direction();
        self.units.insert(Unit::spawn(def, side, x))
    }

    /// Advances the simulation by `dt_ms` elapsed milliseconds.
    ///
    /// The in-tick order is fixed: resource regen, cooldown decay, unit
    /// state updates, same-side collision resolution, targeting, corpse
    /// cleanup, win check. Callers broadcast after the whole tick.
    pub fn tick(&mut self, dt_ms: f64) {
        if self.phase != Phase::Playing {
            return;
        }
        self.game_time_ms += dt_ms;
        for player in &mut self.players {
            player.regen_cost(dt_ms);
            player.decay_spawn_cooldowns(dt_ms);
        }
        self.step_units(dt_ms);
        self.resolve_same_side_collisions();
        self.assign_targets();
        self.remove_expired_corpses();
        self.check_castles();
    }

    // -- Unit state machine ------------------------------------------------

    fn step_units(&mut self, dt_ms: f64) {
        for id in self.units.ids() {
            let state = {
                let Some(unit) = self.units.get_mut(id) else {
                    continue;
                };
                unit.state_timer_ms += dt_ms;
                unit.state
            };
            match state {
                // Corpses only age toward cleanup.
                UnitState::Die => {}
                UnitState::Spawn => {
                    if let Some(unit) = self.units.get_mut(id) {
                        if unit.state_timer_ms >= SPAWN_TO_WALK_MS {
                            unit.enter(UnitState::Walk);
                        }
                    }
                }
                UnitState::Walk => self.step_walk(id, dt_ms),
                UnitState::AttackWindup => self.step_windup(id),
                UnitState::AttackCooldown => self.step_cooldown(id),
                UnitState::Hitstun => {
                    if let Some(unit) = self.units.get_mut(id) {
                        if unit.state_timer_ms >= HITSTUN_MS {
                            unit.enter(UnitState::Walk);
                        }
                    }
                }
            }
        }
    }

    fn step_walk(&mut self, id: UnitId, dt_ms: f64) {
        let Some(unit) = self.units.get(id) else {
            return;
        };
        let side = unit.side;
        let target = unit.target;

        if let Some(target_id) = target {
            if self.unit_alive(target_id) && self.in_attack_range(id, target_id) {
                if let Some(unit) = self.units.get_mut(id) {
                    unit.enter(UnitState::AttackWindup);
                }
                return;
            }
        }
        if self.in_castle_range(id) {
            if let Some(unit) = self.units.get_mut(id) {
                unit.enter(UnitState::AttackWindup);
            }
            return;
        }
        if self.blocked_by_enemy(id) {
            // Held in place; attack transitions re-evaluate next tick.
            return;
        }

        let stage_length = self.config.stage_length;
        if let Some(unit) = self.units.get_mut(id) {
            unit.x += unit.stats.speed * dt_ms / 1000.0 * side.direction();
            match side {
                Side::Player1 => unit.x = unit.x.min(stage_length - SAME_SIDE_GAP),
                Side::Player2 => unit.x = unit.x.max(CASTLE_OFFSET),
            }
        }
    }

    fn step_windup(&mut self, id: UnitId) {
        let Some(unit) = self.units.get(id) else {
            return;
        };
        if unit.state_timer_ms < unit.stats.attack_windup_ms {
            return;
        }
        self.resolve_attack(id);
        if let Some(unit) = self.units.get_mut(id) {
            unit.enter(UnitState::AttackCooldown);
        }
    }

    fn step_cooldown(&mut self, id: UnitId) {
        let Some(unit) = self.units.get(id) else {
            return;
        };
        if unit.state_timer_ms < unit.stats.attack_cooldown_ms {
            return;
        }
        if let Some(target_id) = unit.target {
            if self.unit_alive(target_id) && self.in_attack_range(id, target_id) {
                if let Some(unit) = self.units.get_mut(id) {
                    unit.enter(UnitState::AttackWindup);
                }
                return;
            }
        }
        if self.in_castle_range(id) {
            if let Some(unit) = self.units.get_mut(id) {
                unit.enter(UnitState::AttackWindup);
            }
            return;
        }
        if let Some(unit) = self.units.get_mut(id) {
            unit.target = None;
            unit.enter(UnitState::Walk);
        }
    }

    // -- Damage ------------------------------------------------------------

    /// Lands a completed windup. The swing is committed: a live target is
    /// hit regardless of current range; a lost target downgrades the swing
    /// to castle damage only if the attacker stands in castle range.
    fn resolve_attack(&mut self, attacker: UnitId) {
        let Some(unit) = self.units.get(attacker) else {
            return;
        };
        let side = unit.side;
        let damage = unit.stats.attack_damage;
        let knockback = unit.stats.knockback;
        let target = unit.target;

        if let Some(target_id) = target {
            if self.unit_alive(target_id) {
                self.apply_unit_damage(side, target_id, damage, knockback);
                return;
            }
        }
        if self.in_castle_range(attacker) {
            let enemy = side.opponent();
            if let Some(player) = self.player_by_side_mut(enemy) {
                player.castle_hp = (player.castle_hp - damage).max(0);
                tracing::trace!(%side, castle_hp = player.castle_hp, "castle damaged");
            }
        }
    }

    fn apply_unit_damage(&mut self, attacker_side: Side, target: UnitId, damage: i32, knockback: f64) {
        let stage_length = self.config.stage_length;
        let killed = {
            let Some(unit) = self.units.get_mut(target) else {
                return;
            };
            unit.hp -= damage;
            unit.damage_accumulated += damage;
            if unit.hp <= 0 {
                unit.hp = 0;
                unit.enter(UnitState::Die);
                true
            } else {
                false
            }
        };

        if killed {
            if let Some(player) = self.player_by_side_mut(attacker_side) {
                player.kills += 1;
            }
            return;
        }

        // Survivors eat knockback once accumulated damage crosses the
        // threshold; bosses never flinch.
        if let Some(unit) = self.units.get_mut(target) {
            let threshold = unit.max_hp as f64 * KNOCKBACK_HP_FRACTION;
            if !unit.stats.is_boss && unit.damage_accumulated as f64 >= threshold {
                unit.damage_accumulated = 0;
                unit.x -= knockback * unit.side.direction();
                unit.x = unit.x.clamp(CASTLE_OFFSET, stage_length - SAME_SIDE_GAP);
                unit.enter(UnitState::Hitstun);
            }
        }
    }

    // -- Spatial queries ---------------------------------------------------

    fn unit_alive(&self, id: UnitId) -> bool {
        self.units.get(id).is_some_and(|u| u.is_alive())
    }

    fn in_attack_range(&self, attacker: UnitId, target: UnitId) -> bool {
        let (Some(a), Some(t)) = (self.units.get(attacker), self.units.get(target)) else {
            return false;
        };
        edge_distance(a.x, a.width, t.x, t.width) <= a.stats.attack_range
    }

    /// Whether the unit's leading edge reaches the enemy castle.
    fn in_castle_range(&self, id: UnitId) -> bool {
        let Some(unit) = self.units.get(id) else {
            return false;
        };
        let enemy_castle = self.castle_x(unit.side.opponent());
        let half = unit.width / 2.0;
        let gap = match unit.side {
            Side::Player1 => enemy_castle - (unit.x + half),
            Side::Player2 => (unit.x - half) - enemy_castle,
        };
        gap <= unit.stats.attack_range
    }

    /// A walker is held when an enemy stands close enough directly ahead.
    fn blocked_by_enemy(&self, id: UnitId) -> bool {
        let Some(unit) = self.units.get(id) else {
            return false;
        };
        self.units.iter().any(|(_, other)| {
            if other.side == unit.side || !other.is_alive() {
                return false;
            }
            let in_front = match unit.side {
                Side::Player1 => other.x > unit.x,
                Side::Player2 => other.x < unit.x,
            };
            in_front
                && edge_distance(unit.x, unit.width, other.x, other.width)
                    < (unit.width + other.width) / 2.0 * 0.5 + SAME_SIDE_GAP
        })
    }

    // -- Crowd separation --------------------------------------------------

    fn resolve_same_side_collisions(&mut self) {
        let stage_length = self.config.stage_length;
        for side in [Side::Player1, Side::Player2] {
            let ids: Vec<UnitId> = self
                .units
                .iter()
                .filter(|(_, u)| u.side == side && u.is_alive())
                .map(|(id, _)| id)
                .collect();

            for i in 0..ids.len() {
                for j in (i + 1)..ids.len() {
                    self.separate_pair(ids[i], ids[j], side, stage_length);
                }
            }
        }
    }

    fn separate_pair(&mut self, a: UnitId, b: UnitId, side: Side, stage_length: f64) {
        let (Some(ua), Some(ub)) = (self.units.get(a), self.units.get(b)) else {
            return;
        };
        let distance = (ua.x - ub.x).abs();
        let min_distance = (ua.width + ub.width) / 2.0 * 0.6 + SAME_SIDE_GAP;
        // Perfectly coincident units have no separating axis; stagger from
        // movement resolves them on a later tick.
        if distance >= min_distance || distance <= 0.0 {
            return;
        }

        // Half the overlap, halved again between the two units.
        let push = (min_distance - distance) / 4.0;
        let (rear, front) = if ua.x <= ub.x { (a, b) } else { (b, a) };

        let (lo, hi) = match side {
            Side::Player1 => (CASTLE_OFFSET + SAME_SIDE_GAP, stage_length - SAME_SIDE_GAP),
            Side::Player2 => (
                CASTLE_OFFSET,
                stage_length - CASTLE_OFFSET - SAME_SIDE_GAP,
            ),
        };
        if let Some(unit) = self.units.get_mut(rear) {
            unit.x = (unit.x - push).clamp(lo, hi);
        }
        if let Some(unit) = self.units.get_mut(front) {
            unit.x = (unit.x + push).clamp(lo, hi);
        }
    }

    // -- Targeting ---------------------------------------------------------

    /// Keeps live in-range targets; otherwise rescans for the nearest
    /// enemy ahead, falling back to the nearest in any direction.
    fn assign_targets(&mut self) {
        for id in self.units.ids() {
            let Some(unit) = self.units.get(id) else {
                continue;
            };
            // A windup is committed: the swing may not be redirected.
            if !unit.is_alive() || unit.state == UnitState::AttackWindup {
                continue;
            }
            if let Some(target_id) = unit.target {
                if self.unit_alive(target_id) && self.in_attack_range(id, target_id) {
                    continue;
                }
            }
            let fresh = self.find_target(id);
            if let Some(unit) = self.units.get_mut(id) {
                unit.target = fresh;
            }
        }
    }

    fn find_target(&self, id: UnitId) -> Option<UnitId> {
        let unit = self.units.get(id)?;
        let reach = unit.stats.attack_range + TARGET_SEARCH_SLACK;
        let mut nearest_front: Option<(f64, UnitId)> = None;
        let mut nearest_any: Option<(f64, UnitId)> = None;

        for (other_id, other) in self.units.iter() {
            if other.side == unit.side || !other.is_alive() {
                continue;
            }
            let distance = edge_distance(unit.x, unit.width, other.x, other.width);
            if distance > reach {
                continue;
            }
            let in_front = match unit.side {
                Side::Player1 => other.x > unit.x,
                Side::Player2 => other.x < unit.x,
            };
            // Strict comparison keeps the first candidate on ties, so slot
            // order breaks ties deterministically.
            if in_front && nearest_front.is_none_or(|(best, _)| distance < best) {
                nearest_front = Some((distance, other_id));
            }
            if nearest_any.is_none_or(|(best, _)| distance < best) {
                nearest_any = Some((distance, other_id));
            }
        }
        nearest_front.or(nearest_any).map(|(_, id)| id)
    }

    // -- End of tick -------------------------------------------------------

    fn remove_expired_corpses(&mut self) {
        self.units
            .retain(|_, unit| !(unit.state == UnitState::Die && unit.state_timer_ms >= DEATH_LINGER_MS));
    }

    fn check_castles(&mut self) {
        if self.phase != Phase::Playing {
            return;
        }
        // Player1's castle is adjudicated first if both fall together.
        let Some(loser_side) = [Side::Player1, Side::Player2].into_iter().find(|side| {
            self.player_by_side(*side)
                .is_some_and(|p| p.castle_hp <= 0)
        }) else {
            return;
        };
        let winner = self
            .player_by_side(loser_side.opponent())
            .map(|p| p.session_id.clone());
        self.phase = Phase::Finished;
        self.winner = winner;
        self.win_reason = Some(WinReason::CastleDestroyed);
        tracing::info!(loser = %loser_side, "castle destroyed, match over");
    }
}

// =========================================================================
// Tests
// =========================================================================
