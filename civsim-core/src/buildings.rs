//! Building definitions and bitmask storage.
//!
//! Buildings are city improvements. Each city can have at most one of each
//! building type, stored as a bitmask via [`BuildingSet`]; the definitions
//! themselves live in the [`Ruleset`](crate::ruleset::Ruleset).

use crate::state::{CivName, Yields};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Index of a building definition in the ruleset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BuildingId(pub u8);

impl BuildingId {
    #[inline]
    pub fn as_mask(self) -> u128 {
        1u128 << self.0
    }
}

impl std::fmt::Display for BuildingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Bitmask storage for the buildings of a city.
///
/// Zero-allocation, O(1) operations. Supports up to 128 building types.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct BuildingSet(pub u128);

impl BuildingSet {
    /// Check if a building is present.
    #[inline]
    pub fn contains(&self, id: BuildingId) -> bool {
        self.0 & id.as_mask() != 0
    }

    /// Add a building to the set.
    #[inline]
    pub fn insert(&mut self, id: BuildingId) {
        self.0 |= id.as_mask();
    }

    /// Remove a building from the set.
    #[inline]
    pub fn remove(&mut self, id: BuildingId) {
        self.0 &= !id.as_mask();
    }

    /// Count of buildings in the set.
    #[inline]
    pub fn count(&self) -> u32 {
        self.0.count_ones()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Iterate over building IDs in the set, lowest first.
    pub fn iter(&self) -> impl Iterator<Item = BuildingId> + '_ {
        (0..128u8)
            .filter(move |&i| self.0 & (1u128 << i) != 0)
            .map(BuildingId)
    }
}

impl FromIterator<BuildingId> for BuildingSet {
    fn from_iter<T: IntoIterator<Item = BuildingId>>(iter: T) -> Self {
        let mut set = BuildingSet::default();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

/// Static building definition.
///
/// Immutable after loading and shared across all cities.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BuildingDef {
    pub id: BuildingId,
    pub name: String,

    pub is_wonder: bool,
    pub is_national_wonder: bool,

    // Civilization-specific replacements
    /// Civilization this building is exclusive to.
    pub unique_to: Option<CivName>,
    /// Name of the generic building this one replaces.
    pub replaces: Option<String>,

    // Capture behaviour
    /// Palace-like marker of the capital.
    pub indicates_capital: bool,
    /// Follows the capital when it relocates.
    pub moves_to_new_capital: bool,
    pub not_destroyed_when_captured: bool,
    pub destroyed_when_captured: bool,
    pub doubles_gold_from_capture: bool,
    /// Empire-wide cap on copies of this building.
    pub max_number_buildable: Option<u32>,

    // Effects
    /// Specialist slots granted, keyed by specialist name.
    pub specialist_slots: BTreeMap<String, u32>,
    /// Added to the city's max health.
    pub city_health: i32,
    pub yields: Yields,
    /// Percent of the growth threshold kept after growing.
    pub food_carry_over_percent: u32,
    /// Percent change to culture cost of new tiles (e.g. -25).
    pub border_growth_percent: i32,
    pub nullifies_growth: bool,
}

impl BuildingDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}
