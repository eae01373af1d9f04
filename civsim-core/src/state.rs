use crate::bounded::{new_health, Health};
use crate::buildings::{BuildingId, BuildingSet};
use crate::config::GameRules;
use crate::diplomacy::{DiplomacyManager, Proximity};
use crate::error::CityError;
use crate::history::{GameEvent, TileHistory};
use crate::notifications::{Notification, NotificationCategory};
use crate::ruleset::Ruleset;
pub use hex_grid::HexCoord;
pub use im::{OrdMap, OrdSet, Vector};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::{Add, AddAssign};

pub type CivName = String;
pub type CityId = u32;
pub type UnitId = u32;
pub type Turn = u32;

/// Construction a city falls back to when nothing else is chosen.
pub const FALLBACK_CONSTRUCTION: &str = "Gold";

/// Per-turn output of a tile, specialist, building or whole city.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Yields {
    pub food: f32,
    pub production: f32,
    pub gold: f32,
    pub culture: f32,
    pub science: f32,
}

impl Yields {
    pub const fn new(food: f32, production: f32, gold: f32) -> Self {
        Self {
            food,
            production,
            gold,
            culture: 0.0,
            science: 0.0,
        }
    }

    pub fn with_culture(mut self, culture: f32) -> Self {
        self.culture = culture;
        self
    }

    pub fn with_science(mut self, science: f32) -> Self {
        self.science = science;
        self
    }

    pub fn total(&self) -> f32 {
        self.food + self.production + self.gold + self.culture + self.science
    }
}

impl Add for Yields {
    type Output = Yields;

    fn add(self, rhs: Yields) -> Yields {
        Yields {
            food: self.food + rhs.food,
            production: self.production + rhs.production,
            gold: self.gold + rhs.gold,
            culture: self.culture + rhs.culture,
            science: self.science + rhs.science,
        }
    }
}

impl AddAssign for Yields {
    fn add_assign(&mut self, rhs: Yields) {
        *self = *self + rhs;
    }
}

/// Cached output of a city after consumption.
pub type CityStats = Yields;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileState {
    pub position: HexCoord,
    /// Non-owning back-reference. The city's `tiles` set is authoritative.
    pub owning_city: Option<CityId>,
    pub is_water: bool,
    pub yields: Yields,
    pub improvement: Option<String>,
    pub resource: Option<String>,
    pub has_road: bool,
    pub is_blockaded: bool,
    /// Produces its yield without a worker; never auto-assigned.
    pub provides_yield_without_population: bool,
}

impl TileState {
    pub fn land(position: HexCoord, yields: Yields) -> Self {
        Self {
            position,
            yields,
            ..Default::default()
        }
    }
}

/// Timed city status flags. Values are remaining turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CityFlag {
    WeLoveTheKing,
    ResourceDemand,
    Resistance,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CityFocus {
    #[default]
    NoFocus,
    Food,
    Production,
    Gold,
    Science,
    Culture,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationState {
    pub population: u32,
    pub food_stored: i32,
    /// Specialist name -> assigned count.
    pub specialist_allocations: BTreeMap<String, u32>,
}

impl PopulationState {
    pub fn specialist_count(&self) -> u32 {
        self.specialist_allocations.values().sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionState {
    pub culture_stored: i32,
    /// Tiles acquired through culture.
    pub culture_level: u32,
    /// Tiles acquired with gold.
    pub tiles_bought: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstructionState {
    pub current: Option<String>,
    pub current_is_user_set: bool,
    pub queue: Vec<String>,
    /// Production invested per construction name.
    pub in_progress: BTreeMap<String, i32>,
}

impl ConstructionState {
    /// Pick the next queued item, or the fallback.
    pub fn choose_next(&mut self) {
        self.current = if self.queue.is_empty() {
            Some(FALLBACK_CONSTRUCTION.to_string())
        } else {
            Some(self.queue.remove(0))
        };
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spy {
    pub name: String,
    pub owner: CivName,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub id: CityId,
    pub name: String,
    pub civ: CivName,
    pub founding_civ: Option<CivName>,
    pub previous_owner: Option<CivName>,
    pub turn_acquired: Turn,
    pub location: HexCoord,

    pub tiles: OrdSet<HexCoord>,
    pub worked_tiles: OrdSet<HexCoord>,
    pub locked_tiles: OrdSet<HexCoord>,

    pub population: PopulationState,
    pub expansion: ExpansionState,
    pub buildings: BuildingSet,
    pub construction: ConstructionState,
    pub flags: BTreeMap<CityFlag, u32>,
    pub health: Health,

    pub is_puppet: bool,
    pub is_being_razed: bool,
    pub has_just_been_conquered: bool,
    pub is_original_capital: bool,
    pub manual_specialists: bool,
    pub avoid_growth: bool,
    pub focus: CityFocus,
    pub should_reassign_population: bool,
    pub connected_to_capital: bool,

    pub spies: Vec<Spy>,
    /// Civilizations whose pantheon is followed here.
    pub pantheons: BTreeSet<CivName>,
    pub stats: CityStats,
}

impl City {
    pub fn new(id: CityId, name: &str, civ: &str, location: HexCoord, max_health: i32) -> Self {
        Self {
            id,
            name: name.to_string(),
            civ: civ.to_string(),
            founding_civ: Some(civ.to_string()),
            previous_owner: None,
            turn_acquired: 0,
            location,
            tiles: OrdSet::new(),
            worked_tiles: OrdSet::new(),
            locked_tiles: OrdSet::new(),
            population: PopulationState {
                population: 1,
                ..Default::default()
            },
            expansion: ExpansionState::default(),
            buildings: BuildingSet::default(),
            construction: ConstructionState::default(),
            flags: BTreeMap::new(),
            health: new_health(max_health),
            is_puppet: false,
            is_being_razed: false,
            has_just_been_conquered: false,
            is_original_capital: false,
            manual_specialists: false,
            avoid_growth: false,
            focus: CityFocus::NoFocus,
            should_reassign_population: false,
            connected_to_capital: false,
            spies: Vec::new(),
            pantheons: BTreeSet::new(),
            stats: CityStats::default(),
        }
    }

    pub fn is_in_resistance(&self) -> bool {
        self.flags.contains_key(&CityFlag::Resistance)
    }

    pub fn set_flag(&mut self, flag: CityFlag, turns: u32) {
        self.flags.insert(flag, turns);
    }

    pub fn remove_flag(&mut self, flag: CityFlag) {
        self.flags.remove(&flag);
    }

    /// Population not assigned to a worked tile or a specialist slot.
    /// Negative when the city is overworked.
    pub fn free_population(&self) -> i32 {
        self.population.population as i32
            - self.worked_tiles.len() as i32
            - self.population.specialist_count() as i32
    }

    pub fn is_capital(&self, ruleset: &Ruleset) -> bool {
        self.buildings
            .iter()
            .any(|id| ruleset.building(id).is_some_and(|b| b.indicates_capital))
    }

    pub fn has_building_where(&self, ruleset: &Ruleset, pred: impl Fn(&crate::buildings::BuildingDef) -> bool) -> bool {
        self.buildings
            .iter()
            .any(|id| ruleset.building(id).is_some_and(&pred))
    }
}

/// Empire-wide abilities relevant to city transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CivUnique {
    MayNotAnnexCities,
    TripleGoldFromEncampmentsAndCities,
}

/// Effects fired when a civilization loses a city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TriggeredEffect {
    GainGold(i32),
    Notification(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Civilization {
    pub name: CivName,
    pub is_city_state: bool,
    pub is_human: bool,
    pub gold: i32,
    /// Replaced wholesale on every add/remove, never edited in place.
    pub cities: Vector<CityId>,
    pub known_civs: OrdSet<CivName>,
    pub diplomacy: BTreeMap<CivName, DiplomacyManager>,
    pub uniques: BTreeSet<CivUnique>,
    /// Buildings granted to every city of this civilization.
    pub free_buildings: BTreeSet<BuildingId>,
    /// Buildings this civilization provided for free, per city.
    pub free_buildings_by_city: BTreeMap<CityId, BTreeSet<BuildingId>>,
    pub triggers_on_losing_city: Vec<TriggeredEffect>,
    pub pantheon: Option<String>,
    pub proximity: BTreeMap<CivName, Proximity>,
    /// Cache of every tile owned by any of this civilization's cities.
    pub owned_tiles: OrdSet<HexCoord>,
    pub notifications: Vector<Notification>,
}

impl Civilization {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn is_major(&self) -> bool {
        !self.is_city_state
    }

    pub fn knows(&self, other: &str) -> bool {
        self.known_civs.contains(other)
    }

    pub fn has_unique(&self, unique: CivUnique) -> bool {
        self.uniques.contains(&unique)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    Military,
    Civilian,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub owner: CivName,
    pub position: HexCoord,
    pub kind: UnitKind,
    pub can_build_improvements: bool,
    pub is_sleeping: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldState {
    pub turn: Turn,
    pub rules: GameRules,
    pub ruleset: Ruleset,
    #[serde(with = "tile_map")]
    pub tiles: OrdMap<HexCoord, TileState>,
    pub cities: OrdMap<CityId, City>,
    pub civilizations: OrdMap<CivName, Civilization>,
    pub units: OrdMap<UnitId, Unit>,
    pub next_city_id: CityId,
    pub next_unit_id: UnitId,
    pub tile_history: TileHistory,
    pub events: Vector<GameEvent>,
}

impl WorldState {
    pub fn city(&self, id: CityId) -> Result<&City, CityError> {
        self.cities.get(&id).ok_or(CityError::UnknownCity(id))
    }

    pub fn city_mut(&mut self, id: CityId) -> Result<&mut City, CityError> {
        self.cities.get_mut(&id).ok_or(CityError::UnknownCity(id))
    }

    pub fn civ(&self, name: &str) -> Result<&Civilization, CityError> {
        self.civilizations
            .get(name)
            .ok_or_else(|| CityError::UnknownCiv(name.to_string()))
    }

    pub fn civ_mut(&mut self, name: &str) -> Result<&mut Civilization, CityError> {
        self.civilizations
            .get_mut(name)
            .ok_or_else(|| CityError::UnknownCiv(name.to_string()))
    }

    pub fn tile(&self, position: HexCoord) -> Result<&TileState, CityError> {
        self.tiles
            .get(&position)
            .ok_or(CityError::UnknownTile(position))
    }

    pub fn tile_mut(&mut self, position: HexCoord) -> Result<&mut TileState, CityError> {
        self.tiles
            .get_mut(&position)
            .ok_or(CityError::UnknownTile(position))
    }

    /// Civilization owning the tile through one of its cities.
    pub fn tile_owner_civ(&self, position: HexCoord) -> Option<&str> {
        let city = self.tiles.get(&position)?.owning_city?;
        self.cities.get(&city).map(|c| c.civ.as_str())
    }

    pub fn is_city_center(&self, position: HexCoord) -> bool {
        self.tiles
            .get(&position)
            .and_then(|t| t.owning_city)
            .and_then(|id| self.cities.get(&id))
            .is_some_and(|c| c.location == position)
    }

    /// City currently working the tile, if any.
    pub fn working_city(&self, position: HexCoord) -> Option<CityId> {
        self.cities
            .values()
            .find(|c| c.worked_tiles.contains(&position))
            .map(|c| c.id)
    }

    pub fn capital_of(&self, civ: &str) -> Option<CityId> {
        let civ = self.civilizations.get(civ)?;
        civ.cities.iter().copied().find(|id| {
            self.cities
                .get(id)
                .is_some_and(|c| c.is_capital(&self.ruleset))
        })
    }

    pub fn civ_population(&self, civ: &str) -> u32 {
        self.civilizations
            .get(civ)
            .map(|c| {
                c.cities
                    .iter()
                    .filter_map(|id| self.cities.get(id))
                    .map(|city| city.population.population)
                    .sum()
            })
            .unwrap_or(0)
    }

    /// A civilization with neither cities nor military units is out of the game.
    pub fn is_defeated(&self, civ: &str) -> bool {
        let no_cities = self
            .civilizations
            .get(civ)
            .map_or(true, |c| c.cities.is_empty());
        no_cities
            && !self
                .units
                .values()
                .any(|u| u.owner == civ && u.kind == UnitKind::Military)
    }

    pub fn is_at_war(&self, a: &str, b: &str) -> bool {
        crate::diplomacy::is_at_war(self, a, b)
    }

    pub fn allocate_city_id(&mut self) -> CityId {
        let id = self.next_city_id;
        self.next_city_id += 1;
        id
    }

    pub fn allocate_unit_id(&mut self) -> UnitId {
        let id = self.next_unit_id;
        self.next_unit_id += 1;
        id
    }

    pub fn push_event(&mut self, event: GameEvent) {
        self.events.push_back(event);
    }

    /// Fire-and-forget notification; unknown civilizations are ignored.
    pub fn notify(
        &mut self,
        civ: &str,
        message: impl Into<String>,
        location: Option<HexCoord>,
        category: NotificationCategory,
    ) {
        let turn = self.turn;
        if let Some(c) = self.civilizations.get_mut(civ) {
            c.notifications.push_back(Notification {
                turn,
                message: message.into(),
                location,
                category,
            });
        }
    }

    /// Compute a deterministic checksum of the world state.
    ///
    /// Covers the turn, city ownership and population, civilization
    /// membership and treasury, and every tile's owner. Identical states
    /// produce identical checksums.
    pub fn checksum(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();

        self.turn.hash(&mut hasher);

        // Ordered maps iterate in key order, so no sorting is needed.
        for (name, civ) in &self.civilizations {
            name.hash(&mut hasher);
            civ.gold.hash(&mut hasher);
            for id in &civ.cities {
                id.hash(&mut hasher);
            }
            for known in &civ.known_civs {
                known.hash(&mut hasher);
            }
        }

        for (id, city) in &self.cities {
            id.hash(&mut hasher);
            city.civ.hash(&mut hasher);
            city.location.hash(&mut hasher);
            city.population.population.hash(&mut hasher);
            city.population.food_stored.hash(&mut hasher);
            city.population.specialist_allocations.hash(&mut hasher);
            city.expansion.culture_stored.hash(&mut hasher);
            city.expansion.culture_level.hash(&mut hasher);
            city.buildings.hash(&mut hasher);
            city.flags.hash(&mut hasher);
            city.health.hash(&mut hasher);
            city.is_puppet.hash(&mut hasher);
            city.is_being_razed.hash(&mut hasher);
            for tile in &city.tiles {
                tile.hash(&mut hasher);
            }
            for tile in &city.worked_tiles {
                tile.hash(&mut hasher);
            }
        }

        for (pos, tile) in &self.tiles {
            pos.hash(&mut hasher);
            tile.owning_city.hash(&mut hasher);
        }

        for (id, unit) in &self.units {
            id.hash(&mut hasher);
            unit.owner.hash(&mut hasher);
            unit.position.hash(&mut hasher);
        }

        hasher.finish()
    }
}

/// Run `f` against a scratch copy of the world and commit only on success.
///
/// Clones are cheap: every collection in [`WorldState`] shares structure.
pub fn with_rollback<T>(
    state: &mut WorldState,
    f: impl FnOnce(&mut WorldState) -> Result<T, CityError>,
) -> Result<T, CityError> {
    let mut scratch = state.clone();
    let out = f(&mut scratch)?;
    *state = scratch;
    Ok(out)
}

/// Tiles serialize as a list; JSON object keys must be strings.
mod tile_map {
    use super::{HexCoord, OrdMap, TileState};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        tiles: &OrdMap<HexCoord, TileState>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(tiles.values())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<OrdMap<HexCoord, TileState>, D::Error> {
        let tiles = Vec::<TileState>::deserialize(deserializer)?;
        Ok(tiles.into_iter().map(|t| (t.position, t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::WorldStateBuilder;

    #[test]
    fn test_checksum_determinism() {
        let state = WorldStateBuilder::new()
            .with_map(3)
            .with_civ("Rome")
            .with_city("Rome", "Roma", HexCoord::ORIGIN, 3)
            .build();

        assert_eq!(
            state.checksum(),
            state.checksum(),
            "Identical states must produce identical checksums"
        );
    }

    #[test]
    fn test_checksum_sensitivity() {
        let base = WorldStateBuilder::new()
            .with_map(3)
            .with_civ("Rome")
            .with_city("Rome", "Roma", HexCoord::ORIGIN, 3);
        let state1 = base.clone().build();
        let mut state2 = base.build();
        state2.turn += 1;

        assert_ne!(state1.checksum(), state2.checksum());
    }

    #[test]
    fn test_free_population_counts_specialists() {
        let mut city = City::new(0, "Roma", "Rome", HexCoord::ORIGIN, 200);
        city.population.population = 4;
        city.worked_tiles.insert(HexCoord::new(1, 0));
        city.population
            .specialist_allocations
            .insert("Scientist".to_string(), 2);
        assert_eq!(city.free_population(), 1);

        city.population.population = 2;
        assert_eq!(city.free_population(), -1);
    }

    #[test]
    fn test_with_rollback_discards_failed_changes() {
        let mut state = WorldStateBuilder::new().with_civ("Rome").build();
        let result: Result<(), CityError> = with_rollback(&mut state, |w| {
            w.civ_mut("Rome")?.gold = 999;
            Err(CityError::UnknownCity(42))
        });
        assert_eq!(result, Err(CityError::UnknownCity(42)));
        assert_eq!(state.civ("Rome").unwrap().gold, 0);

        with_rollback(&mut state, |w| {
            w.civ_mut("Rome")?.gold = 50;
            Ok(())
        })
        .unwrap();
        assert_eq!(state.civ("Rome").unwrap().gold, 50);
    }

    #[test]
    fn test_world_round_trips_through_json() {
        let mut state = WorldStateBuilder::new()
            .with_map(2)
            .with_civ("Rome")
            .with_city("Rome", "Roma", HexCoord::ORIGIN, 3)
            .build();
        let city = state.city_mut(0).unwrap();
        city.set_flag(CityFlag::Resistance, 3);
        city.is_puppet = true;

        let json = serde_json::to_string(&state).unwrap();
        let restored: WorldState = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.checksum(), state.checksum());
        assert_eq!(restored.city(0).unwrap(), state.city(0).unwrap());
        assert_eq!(restored.tiles.len(), state.tiles.len());
    }
}
