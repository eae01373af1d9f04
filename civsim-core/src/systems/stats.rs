//! Per-city yield totals.

use crate::error::CityError;
use crate::state::{CityId, CityStats, WorldState, Yields};

/// Food eaten by each citizen per turn.
pub const FOOD_PER_CITIZEN: f32 = 2.0;

/// Output of a city this turn: center tile, worked tiles, worker-free
/// tiles, specialists and buildings, minus food eaten.
///
/// A city in resistance yields nothing at all; it neither grows nor starves.
pub fn compute_stats(state: &WorldState, city: CityId) -> Result<CityStats, CityError> {
    let city = state.city(city)?;
    let mut total = Yields::default();

    if let Some(center) = state.tiles.get(&city.location) {
        total += center.yields;
    }
    for pos in &city.worked_tiles {
        if let Some(tile) = state.tiles.get(pos) {
            total += tile.yields;
        }
    }
    for pos in &city.tiles {
        if let Some(tile) = state.tiles.get(pos) {
            if tile.provides_yield_without_population && *pos != city.location {
                total += tile.yields;
            }
        }
    }
    for (name, count) in &city.population.specialist_allocations {
        if let Some(yields) = state.ruleset.specialists.get(name) {
            for _ in 0..*count {
                total += *yields;
            }
        }
    }
    for id in city.buildings.iter() {
        if let Some(def) = state.ruleset.building(id) {
            total += def.yields;
        }
    }

    if city.is_in_resistance() {
        return Ok(Yields::default());
    }
    total.food -= FOOD_PER_CITIZEN * city.population.population as f32;
    Ok(total)
}

pub fn update_stats(state: &mut WorldState, city: CityId) -> Result<(), CityError> {
    let stats = compute_stats(state, city)?;
    state.city_mut(city)?.stats = stats;
    Ok(())
}

/// Max health: base plus building bonuses.
pub fn max_health(state: &WorldState, city: CityId) -> Result<i32, CityError> {
    let city = state.city(city)?;
    let bonus: i32 = city
        .buildings
        .iter()
        .filter_map(|id| state.ruleset.building(id))
        .map(|b| b.city_health)
        .sum();
    Ok(state.rules.base_city_health + bonus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buildings::BuildingDef;
    use crate::state::{CityFlag, HexCoord};
    use crate::testing::WorldStateBuilder;

    #[test]
    fn test_stats_sum_center_worked_and_buildings() {
        let mut state = WorldStateBuilder::new()
            .with_map(2)
            .with_civ("Rome")
            .with_building_def(BuildingDef {
                yields: Yields::new(0.0, 0.0, 3.0),
                city_health: 50,
                ..BuildingDef::new("Market")
            })
            .with_city("Rome", "Roma", HexCoord::ORIGIN, 2)
            .with_city_building("Roma", "Market")
            .build();
        let city = state.city_mut(0).unwrap();
        city.worked_tiles.insert(HexCoord::new(1, 0));
        city.worked_tiles.insert(HexCoord::new(0, 1));

        let stats = compute_stats(&state, 0).unwrap();
        // Three tiles of 2 food / 1 production, minus 4 food eaten.
        assert_eq!(stats.food, 2.0);
        assert_eq!(stats.production, 3.0);
        assert_eq!(stats.gold, 3.0);
        assert_eq!(max_health(&state, 0).unwrap(), 250);
    }

    #[test]
    fn test_specialists_yield() {
        let mut state = WorldStateBuilder::new()
            .with_map(1)
            .with_civ("Rome")
            .with_specialist("Scientist", Yields::default().with_science(3.0))
            .with_city("Rome", "Roma", HexCoord::ORIGIN, 2)
            .build();
        state
            .city_mut(0)
            .unwrap()
            .population
            .specialist_allocations
            .insert("Scientist".to_string(), 2);

        assert_eq!(compute_stats(&state, 0).unwrap().science, 6.0);
    }

    #[test]
    fn test_resistance_zeroes_everything() {
        let mut state = WorldStateBuilder::new()
            .with_map(1)
            .with_civ("Rome")
            .with_city("Rome", "Roma", HexCoord::ORIGIN, 3)
            .build();
        state.city_mut(0).unwrap().set_flag(CityFlag::Resistance, 3);

        let stats = compute_stats(&state, 0).unwrap();
        assert_eq!(stats, Yields::default());
    }
}
