//! Fluent construction of small worlds for tests and demos.

use crate::buildings::BuildingDef;
use crate::config::GameRules;
use crate::diplomacy::{self, DiplomaticStatus};
use crate::ranking::YieldRanker;
use crate::state::{
    City, Civilization, HexCoord, TileState, Unit, UnitKind, WorldState, Yields,
};
use crate::systems::population;

/// Every builder world registers this building as the capital marker.
pub const PALACE: &str = "Palace";

#[derive(Clone)]
pub struct WorldStateBuilder {
    state: WorldState,
    assign_population: bool,
}

impl WorldStateBuilder {
    pub fn new() -> Self {
        let mut state = WorldState::default();
        state.ruleset.add_building(BuildingDef {
            indicates_capital: true,
            not_destroyed_when_captured: true,
            ..BuildingDef::new(PALACE)
        });
        Self {
            state,
            assign_population: false,
        }
    }

    pub fn turn(mut self, turn: u32) -> Self {
        self.state.turn = turn;
        self
    }

    /// Replace the game rules. Call before founding cities; city health
    /// is taken from the rules in force.
    pub fn with_rules(mut self, rules: GameRules) -> Self {
        self.state.rules = rules;
        self
    }

    /// Hexagonal land map of the given radius around the origin.
    pub fn with_map(mut self, radius: u32) -> Self {
        for pos in HexCoord::ORIGIN.tiles_in_distance(radius) {
            self.state
                .tiles
                .insert(pos, TileState::land(pos, Yields::new(2.0, 1.0, 0.0)));
        }
        self
    }

    pub fn with_tile_yields(mut self, pos: HexCoord, yields: Yields) -> Self {
        if let Some(tile) = self.state.tiles.get_mut(&pos) {
            tile.yields = yields;
        }
        self
    }

    pub fn with_tile(mut self, tile: TileState) -> Self {
        self.state.tiles.insert(tile.position, tile);
        self
    }

    pub fn with_civ(mut self, name: &str) -> Self {
        self.state
            .civilizations
            .insert(name.to_string(), Civilization::new(name));
        self
    }

    pub fn with_city_state(mut self, name: &str) -> Self {
        self.state.civilizations.insert(
            name.to_string(),
            Civilization {
                is_city_state: true,
                ..Civilization::new(name)
            },
        );
        self
    }

    pub fn human(mut self, civ: &str) -> Self {
        if let Some(c) = self.state.civilizations.get_mut(civ) {
            c.is_human = true;
        }
        self
    }

    pub fn with_gold(mut self, civ: &str, gold: i32) -> Self {
        if let Some(c) = self.state.civilizations.get_mut(civ) {
            c.gold = gold;
        }
        self
    }

    pub fn with_building_def(mut self, def: BuildingDef) -> Self {
        self.state.ruleset.add_building(def);
        self
    }

    pub fn with_specialist(mut self, name: &str, yields: Yields) -> Self {
        self.state.ruleset.add_specialist(name, yields);
        self
    }

    /// Found a city owning its center and every unowned neighbour.
    ///
    /// A civilization's first city receives the palace.
    pub fn with_city(mut self, civ: &str, name: &str, location: HexCoord, population: u32) -> Self {
        let id = self.state.allocate_city_id();
        let mut city = City::new(id, name, civ, location, self.state.rules.base_city_health);
        city.population.population = population.max(1);

        let first_city = self
            .state
            .civilizations
            .get(civ)
            .is_some_and(|c| c.cities.is_empty());
        if first_city {
            if let Some(palace) = self.state.ruleset.capital_indicator() {
                city.buildings.insert(palace.id);
            }
            city.is_original_capital = true;
        }

        let mut claimed = vec![location];
        claimed.extend(location.neighbors());
        for pos in claimed {
            let Some(tile) = self.state.tiles.get_mut(&pos) else {
                continue;
            };
            if tile.owning_city.is_some() && pos != location {
                continue;
            }
            tile.owning_city = Some(id);
            city.tiles.insert(pos);
        }

        if let Some(c) = self.state.civilizations.get_mut(civ) {
            c.cities.push_back(id);
            for pos in &city.tiles {
                c.owned_tiles.insert(*pos);
            }
        }
        self.state.cities.insert(id, city);
        self
    }

    /// Add a building by name to the most recently founded city with `city_name`.
    pub fn with_city_building(mut self, city_name: &str, building: &str) -> Self {
        let Some(id) = self.state.ruleset.building_by_name(building).map(|b| b.id) else {
            return self;
        };
        let target = self
            .state
            .cities
            .values()
            .filter(|c| c.name == city_name)
            .last()
            .map(|c| c.id);
        if let Some(city) = target.and_then(|c| self.state.cities.get_mut(&c)) {
            city.buildings.insert(id);
        }
        self
    }

    pub fn with_unit(mut self, owner: &str, position: HexCoord, kind: UnitKind) -> Self {
        let id = self.state.allocate_unit_id();
        self.state.units.insert(
            id,
            Unit {
                id,
                owner: owner.to_string(),
                position,
                kind,
                can_build_improvements: false,
                is_sleeping: false,
            },
        );
        self
    }

    pub fn knowing(mut self, a: &str, b: &str) -> Self {
        diplomacy::make_civilizations_meet(&mut self.state, a, b)
            .expect("knowing() needs both civilizations added first");
        self
    }

    pub fn at_war(mut self, a: &str, b: &str) -> Self {
        diplomacy::make_civilizations_meet(&mut self.state, a, b)
            .expect("at_war() needs both civilizations added first");
        for (us, them) in [(a, b), (b, a)] {
            if let Some(manager) = self
                .state
                .civilizations
                .get_mut(us)
                .and_then(|c| c.diplomacy.get_mut(them))
            {
                manager.status = DiplomaticStatus::War;
            }
        }
        self
    }

    /// Auto-assign every city's population on build.
    pub fn assign_population(mut self) -> Self {
        self.assign_population = true;
        self
    }

    pub fn build(mut self) -> WorldState {
        if self.assign_population {
            let ranker = YieldRanker::default();
            let ids: Vec<_> = self.state.cities.keys().copied().collect();
            for id in ids {
                population::auto_assign(&mut self.state, id, &ranker)
                    .expect("Failed to assign population");
            }
        }
        self.state
    }
}

impl Default for WorldStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
