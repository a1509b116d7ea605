//! Generational arena for live units.
//!
//! Units are stored in contiguous slots and addressed by
//! `{index, generation}` pairs, so a stale `target` reference to a removed
//! unit can never alias a newly spawned one: the slot's generation has
//! moved on and the lookup misses. Iteration is in slot order, which keeps
//! the simulation deterministic. String ids exist only at the wire
//! boundary.

use rampart_protocol::{Side, UnitState};

use crate::catalog::UnitDefinition;

/// Handle to a unit slot. Cheap to copy, safe to keep across removals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnitId {
    index: u32,
    generation: u32,
}

impl UnitId {
    /// The id clients see, e.g. `"u3-2"`.
    pub fn wire_id(&self) -> String {
        format!("u{}-{}", self.index, self.generation)
    }
}

impl std::fmt::Display for UnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "u{}-{}", self.index, self.generation)
    }
}

/// Combat numbers copied from the catalog at spawn time, so a tick is a
/// pure function of battle state and Δt with no catalog access.
#[derive(Debug, Clone, Copy)]
pub struct UnitStats {
    pub speed: f64,
    pub attack_damage: i32,
    pub attack_range: f64,
    pub attack_cooldown_ms: f64,
    pub attack_windup_ms: f64,
    pub knockback: f64,
    pub is_boss: bool,
}

/// A live entity on the lane.
#[derive(Debug, Clone)]
pub struct Unit {
    pub definition_id: String,
    pub side: Side,
    /// Center position along the lane, in pixels.
    pub x: f64,
    pub hp: i32,
    pub max_hp: i32,
    pub state: UnitState,
    /// Milliseconds since entering the current state.
    pub state_timer_ms: f64,
    pub target: Option<UnitId>,
    /// Damage taken since the last knockback, for the threshold check.
    pub damage_accumulated: i32,
    pub width: f64,
    pub stats: UnitStats,
}

impl Unit {
    /// Creates a freshly spawned unit at `x` from its catalog definition.
    pub fn spawn(def: &UnitDefinition, side: Side, x: f64) -> Self {
        Self {
            definition_id: def.id.clone(),
            side,
            x,
            hp: def.max_hp,
            max_hp: def.max_hp,
            state: UnitState::Spawn,
            state_timer_ms: 0.0,
            target: None,
            damage_accumulated: 0,
            width: def.width(),
            stats: UnitStats {
                speed: def.speed,
                attack_damage: def.attack_damage,
                attack_range: def.attack_range,
                attack_cooldown_ms: def.attack_cooldown_ms as f64,
                attack_windup_ms: def.attack_windup_ms as f64,
                knockback: def.knockback,
                is_boss: def.is_boss,
            },
        }
    }

    /// Returns `true` unless the unit is in its death linger.
    pub fn is_alive(&self) -> bool {
        self.state != UnitState::Die
    }

    /// Transitions to `next` and resets the state timer.
    pub(crate) fn enter(&mut self, next: UnitState) {
        self.state = next;
        self.state_timer_ms = 0.0;
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    unit: Option<Unit>,
}

/// Slot-ordered storage for the units of one battle.
#[derive(Debug, Clone, Default)]
pub struct UnitArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl UnitArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a unit, reusing the lowest free slot if one exists.
    pub fn insert(&mut self, unit: Unit) -> UnitId {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation += 1;
            slot.unit = Some(unit);
            UnitId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 1,
                unit: Some(unit),
            });
            UnitId {
                index,
                generation: 1,
            }
        }
    }

    pub fn get(&self, id: UnitId) -> Option<&Unit> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.unit.as_ref()
    }

    pub fn get_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.unit.as_mut()
    }

    /// Removes a unit, returning it. The slot's generation is bumped on
    /// the next insert, so the old id dangles harmlessly.
    pub fn remove(&mut self, id: UnitId) -> Option<Unit> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let unit = slot.unit.take()?;
        self.free.push(id.index);
        self.len -= 1;
        Some(unit)
    }

    pub fn contains(&self, id: UnitId) -> bool {
        self.get(id).is_some()
    }

    /// Current ids in slot order. Collected up front so callers can
    /// mutate the arena while walking the tick's unit set.
    pub fn ids(&self) -> Vec<UnitId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.unit.is_some())
            .map(|(i, s)| UnitId {
                index: i as u32,
                generation: s.generation,
            })
            .collect()
    }

    /// Iterates occupied slots in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (UnitId, &Unit)> {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            s.unit.as_ref().map(|u| {
                (
                    UnitId {
                        index: i as u32,
                        generation: s.generation,
                    },
                    u,
                )
            })
        })
    }

    /// Removes every unit for which `keep` returns `false`.
    pub fn retain(&mut self, mut keep: impl FnMut(UnitId, &Unit) -> bool) {
        for index in 0..self.slots.len() {
            let slot = &mut self.slots[index];
            let id = UnitId {
                index: index as u32,
                generation: slot.generation,
            };
            if let Some(unit) = &slot.unit {
                if !keep(id, unit) {
                    slot.unit = None;
                    self.free.push(index as u32);
                    self.len -= 1;
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Rarity;

    fn test_unit(side: Side, x: f64) -> Unit {
        let def = UnitDefinition {
            id: "dummy".into(),
            rarity: Rarity::N,
            cost: 100,
            max_hp: 100,
            speed: 100.0,
            attack_damage: 10,
            attack_range: 50.0,
            attack_cooldown_ms: 500,
            attack_windup_ms: 100,
            spawn_cooldown_ms: None,
            knockback: 0.0,
            is_boss: false,
            scale: 1.0,
        };
        Unit::spawn(&def, side, x)
    }

    #[test]
    fn test_insert_and_get() {
        let mut arena = UnitArena::new();
        let id = arena.insert(test_unit(Side::Player1, 130.0));
        assert_eq!(arena.len(), 1);
        let unit = arena.get(id).unwrap();
        assert_eq!(unit.x, 130.0);
        assert_eq!(unit.state, UnitState::Spawn);
        assert_eq!(unit.hp, unit.max_hp);
    }

    #[test]
    fn test_removed_id_dangles_safely() {
        let mut arena = UnitArena::new();
        let id = arena.insert(test_unit(Side::Player1, 130.0));
        arena.remove(id).unwrap();
        assert!(arena.get(id).is_none());
        assert!(!arena.contains(id));
        assert_eq!(arena.len(), 0);
    }

    #[test]
    fn test_slot_reuse_bumps_generation() {
        let mut arena = UnitArena::new();
        let first = arena.insert(test_unit(Side::Player1, 130.0));
        arena.remove(first);
        let second = arena.insert(test_unit(Side::Player2, 1070.0));

        // Same slot, different generation: the stale id must not resolve
        // to the new occupant.
        assert_ne!(first, second);
        assert!(arena.get(first).is_none());
        assert_eq!(arena.get(second).unwrap().side, Side::Player2);
        assert_ne!(first.wire_id(), second.wire_id());
    }

    #[test]
    fn test_ids_are_slot_ordered() {
        let mut arena = UnitArena::new();
        let a = arena.insert(test_unit(Side::Player1, 1.0));
        let b = arena.insert(test_unit(Side::Player1, 2.0));
        let c = arena.insert(test_unit(Side::Player2, 3.0));
        assert_eq!(arena.ids(), vec![a, b, c]);

        arena.remove(b);
        assert_eq!(arena.ids(), vec![a, c]);
    }

    #[test]
    fn test_retain_removes_and_frees() {
        let mut arena = UnitArena::new();
        let a = arena.insert(test_unit(Side::Player1, 1.0));
        let b = arena.insert(test_unit(Side::Player2, 2.0));
        arena.retain(|_, u| u.side == Side::Player1);
        assert!(arena.contains(a));
        assert!(!arena.contains(b));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_wire_id_format() {
        let mut arena = UnitArena::new();
        let id = arena.insert(test_unit(Side::Player1, 1.0));
        assert_eq!(id.wire_id(), "u0-1");
        assert_eq!(id.to_string(), "u0-1");
    }
}
