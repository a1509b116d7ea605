//! Read-only unit master data.
//!
//! Definitions are data-driven: the roster ships as an embedded JSON file
//! and is parsed once at process start. Rooms share the resulting
//! [`Catalog`] behind an `Arc`; nothing mutates it after load.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::combat::BASE_UNIT_WIDTH;
use crate::error::CatalogError;

/// The embedded production roster.
const EMBEDDED_ROSTER: &str = include_str!("data/units.json");

/// Unit rarity tier. Drives the default per-unit spawn cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Rarity {
    N,
    R,
    Sr,
    Ssr,
    Ur,
}

impl Rarity {
    /// Spawn cooldown used when a definition does not override it.
    pub fn default_spawn_cooldown_ms(self) -> u32 {
        match self {
            Rarity::N => 2_000,
            Rarity::R => 4_000,
            Rarity::Sr => 6_000,
            Rarity::Ssr => 8_000,
            Rarity::Ur => 10_000,
        }
    }
}

/// Immutable catalog entry describing one summonable unit type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitDefinition {
    pub id: String,
    pub rarity: Rarity,
    /// Cost-resource price of one summon.
    pub cost: u32,
    pub max_hp: i32,
    /// Walk speed in pixels per second.
    pub speed: f64,
    pub attack_damage: i32,
    /// Edge-to-edge reach in pixels.
    pub attack_range: f64,
    pub attack_cooldown_ms: u32,
    pub attack_windup_ms: u32,
    /// Per-player re-summon delay. Falls back to the rarity default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spawn_cooldown_ms: Option<u32>,
    /// Pixels of displacement inflicted on knocked-back victims.
    pub knockback: f64,
    /// Bosses are immune to knockback.
    #[serde(default)]
    pub is_boss: bool,
    /// Width multiplier on the lane.
    #[serde(default = "default_scale")]
    pub scale: f64,
}

fn default_scale() -> f64 {
    1.0
}

impl UnitDefinition {
    /// Footprint of the unit on the lane, in pixels.
    pub fn width(&self) -> f64 {
        BASE_UNIT_WIDTH * self.scale
    }

    /// The effective spawn cooldown, resolving the rarity fallback.
    pub fn spawn_cooldown(&self) -> u32 {
        self.spawn_cooldown_ms
            .unwrap_or_else(|| self.rarity.default_spawn_cooldown_ms())
    }
}

/// Lookup table of unit definitions by id.
#[derive(Debug, Clone)]
pub struct Catalog {
    units: HashMap<String, UnitDefinition>,
}

impl Catalog {
    /// Loads the embedded production roster.
    ///
    /// # Errors
    /// Returns [`CatalogError`] if the embedded data is malformed. This is
    /// a build defect, surfaced at startup rather than mid-match.
    pub fn embedded() -> Result<Self, CatalogError> {
        Self::from_json(EMBEDDED_ROSTER)
    }

    /// Parses a catalog from a JSON array of definitions.
    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let defs: Vec<UnitDefinition> = serde_json::from_str(raw)?;
        Self::from_definitions(defs)
    }

    /// Builds a catalog from in-memory definitions. Duplicate ids are an
    /// error: silently shadowing a unit would corrupt match balance.
    pub fn from_definitions(
        defs: impl IntoIterator<Item = UnitDefinition>,
    ) -> Result<Self, CatalogError> {
        let mut units = HashMap::new();
        for def in defs {
            let id = def.id.clone();
            if units.insert(id.clone(), def).is_some() {
                return Err(CatalogError::DuplicateId(id));
            }
        }
        Ok(Self { units })
    }

    /// Looks up a definition by id.
    pub fn lookup(&self, id: &str) -> Option<&UnitDefinition> {
        self.units.get(id)
    }

    /// Returns `true` if the id names a known unit.
    pub fn is_valid(&self, id: &str) -> bool {
        self.units.contains_key(id)
    }

    /// Number of unit types in the catalog.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns `true` if the catalog holds no definitions.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_def(id: &str, rarity: Rarity) -> UnitDefinition {
        UnitDefinition {
            id: id.into(),
            rarity,
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
        }
    }

    #[test]
    fn test_embedded_roster_loads() {
        let catalog = Catalog::embedded().expect("embedded roster must parse");
        assert!(!catalog.is_empty());
        assert!(catalog.is_valid("recruit"));
        assert!(catalog.is_valid("war_golem"));
        assert!(!catalog.is_valid("ghost"));
    }

    #[test]
    fn test_embedded_roster_covers_all_rarities() {
        let catalog = Catalog::embedded().unwrap();
        for rarity in [Rarity::N, Rarity::R, Rarity::Sr, Rarity::Ssr, Rarity::Ur] {
            assert!(
                ["recruit", "archer", "berserker", "paladin", "valkyrie"]
                    .iter()
                    .any(|id| catalog.lookup(id).map(|d| d.rarity) == Some(rarity)),
                "missing rarity {rarity:?}"
            );
        }
    }

    #[test]
    fn test_rarity_default_spawn_cooldowns() {
        assert_eq!(Rarity::N.default_spawn_cooldown_ms(), 2_000);
        assert_eq!(Rarity::R.default_spawn_cooldown_ms(), 4_000);
        assert_eq!(Rarity::Sr.default_spawn_cooldown_ms(), 6_000);
        assert_eq!(Rarity::Ssr.default_spawn_cooldown_ms(), 8_000);
        assert_eq!(Rarity::Ur.default_spawn_cooldown_ms(), 10_000);
    }

    #[test]
    fn test_spawn_cooldown_override_beats_rarity_default() {
        let catalog = Catalog::embedded().unwrap();
        // berserker overrides its SR default of 6000.
        assert_eq!(catalog.lookup("berserker").unwrap().spawn_cooldown(), 5_000);
        assert_eq!(catalog.lookup("archer").unwrap().spawn_cooldown(), 4_000);
    }

    #[test]
    fn test_width_scales_from_base() {
        let mut def = minimal_def("wide", Rarity::N);
        assert_eq!(def.width(), 60.0);
        def.scale = 1.5;
        assert_eq!(def.width(), 90.0);
    }

    #[test]
    fn test_scale_defaults_to_one_when_missing() {
        let raw = r#"[{
            "id": "plain", "rarity": "N", "cost": 1, "max_hp": 1,
            "speed": 1, "attack_damage": 1, "attack_range": 1,
            "attack_cooldown_ms": 1, "attack_windup_ms": 1, "knockback": 0
        }]"#;
        let catalog = Catalog::from_json(raw).unwrap();
        let def = catalog.lookup("plain").unwrap();
        assert_eq!(def.scale, 1.0);
        assert!(!def.is_boss);
        assert_eq!(def.spawn_cooldown_ms, None);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let defs = vec![minimal_def("twin", Rarity::N), minimal_def("twin", Rarity::R)];
        let result = Catalog::from_definitions(defs);
        assert!(matches!(result, Err(CatalogError::DuplicateId(id)) if id == "twin"));
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(Catalog::from_json("not json").is_err());
    }
}
