//! End-of-turn processing for every city.

use crate::error::CityError;
use crate::history::{GameEvent, SpyFleeReason};
use crate::notifications::NotificationCategory;
use crate::ranking::CityRanker;
use crate::state::{CityFlag, CityId, HexCoord, Vector, WorldState};
use crate::systems::{expansion, ownership, population, stats, transfer};

/// Improvement left on the tile of a destroyed city.
pub const CITY_RUINS: &str = "City ruins";

/// Run one turn for every city in ascending id order.
#[tracing::instrument(skip_all, name = "city_turns")]
pub fn run_city_turns(state: &mut WorldState, ranker: &dyn CityRanker) -> Result<(), CityError> {
    let ids: Vec<CityId> = state.cities.keys().copied().collect();
    for id in ids {
        if !state.cities.contains_key(&id) {
            continue;
        }
        city_turn(state, id, ranker)?;
    }
    Ok(())
}

fn city_turn(state: &mut WorldState, city_id: CityId, ranker: &dyn CityRanker) -> Result<(), CityError> {
    tick_flags(state, city_id)?;

    if state.city(city_id)?.should_reassign_population {
        population::reassign_population(state, city_id, false, ranker)?;
    }

    if state.city(city_id)?.is_being_razed {
        if state.city(city_id)?.population.population <= 1 {
            return destroy_city(state, city_id, ranker);
        }
        population::add_population(state, city_id, -1, ranker)?;
        return stats::update_stats(state, city_id);
    }

    stats::update_stats(state, city_id)?;
    let yields = state.city(city_id)?.stats;
    population::next_turn(state, city_id, yields.food as i32, ranker)?;
    expansion::next_turn(state, city_id, yields.culture, ranker)?;
    stats::update_stats(state, city_id)
}

/// Count every timed flag down by one turn, dropping expired ones.
fn tick_flags(state: &mut WorldState, city_id: CityId) -> Result<(), CityError> {
    let city = state.city_mut(city_id)?;
    let mut expired: Vec<CityFlag> = Vec::new();
    for (flag, turns) in city.flags.iter_mut() {
        *turns = turns.saturating_sub(1);
        if *turns == 0 {
            expired.push(*flag);
        }
    }
    for flag in expired {
        city.remove_flag(flag);
        if flag == CityFlag::Resistance {
            log::info!("Resistance in {} has ended", city.name);
        }
    }
    Ok(())
}

/// Raze the city to the ground.
pub fn destroy_city(state: &mut WorldState, city_id: CityId, ranker: &dyn CityRanker) -> Result<(), CityError> {
    let (civ, name, location) = {
        let city = state.city(city_id)?;
        (city.civ.clone(), city.name.clone(), city.location)
    };

    transfer::remove_spies(state, city_id, SpyFleeReason::CityDestroyed)?;

    let tiles: Vec<HexCoord> = state.city(city_id)?.tiles.iter().copied().collect();
    for pos in tiles {
        ownership::relinquish_ownership(state, pos, ranker)?;
    }

    if state.city(city_id)?.is_capital(&state.ruleset) {
        transfer::move_capital_to_next_largest(state, &civ, Some(city_id), ranker)?;
    }

    let remaining: Vector<CityId> = state
        .civ(&civ)?
        .cities
        .iter()
        .copied()
        .filter(|id| *id != city_id)
        .collect();
    state.civ_mut(&civ)?.cities = remaining;
    state.cities.remove(&city_id);
    state.civ_mut(&civ)?.free_buildings_by_city.remove(&city_id);
    state.tile_mut(location)?.improvement = Some(CITY_RUINS.to_string());
    ownership::update_owned_tiles(state, &civ)?;

    log::info!("{} of {} has been destroyed", name, civ);
    state.notify(
        &civ,
        format!("{} has been razed to the ground!", name),
        Some(location),
        NotificationCategory::Cities,
    );
    let turn = state.turn;
    state.push_event(GameEvent::CityDestroyed {
        turn,
        city: city_id,
        city_name: name,
        civ: civ.clone(),
    });

    transfer::destroy_if_defeated(state, &civ)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buildings::BuildingDef;
    use crate::ranking::YieldRanker;
    use crate::state::Yields;
    use crate::testing::WorldStateBuilder;

    fn world() -> WorldState {
        WorldStateBuilder::new()
            .with_map(6)
            .with_civ("Rome")
            .with_city("Rome", "Roma", HexCoord::ORIGIN, 2)
            .with_city("Rome", "Antium", HexCoord::new(4, 0), 3)
            .assign_population()
            .build()
    }

    #[test]
    fn test_flags_count_down_and_expire() {
        let mut state = world();
        let city = state.city_mut(1).unwrap();
        city.set_flag(CityFlag::Resistance, 2);
        city.set_flag(CityFlag::WeLoveTheKing, 1);

        run_city_turns(&mut state, &YieldRanker::default()).unwrap();

        let antium = state.city(1).unwrap();
        assert_eq!(antium.flags.get(&CityFlag::Resistance), Some(&1));
        assert!(!antium.flags.contains_key(&CityFlag::WeLoveTheKing));

        run_city_turns(&mut state, &YieldRanker::default()).unwrap();
        assert!(!state.city(1).unwrap().is_in_resistance());
    }

    #[test]
    fn test_deferred_reassignment_applied() {
        let mut state = world();
        let city = state.city_mut(1).unwrap();
        city.worked_tiles = Default::default();
        city.should_reassign_population = true;

        run_city_turns(&mut state, &YieldRanker::default()).unwrap();

        let antium = state.city(1).unwrap();
        assert!(!antium.should_reassign_population);
        assert_eq!(antium.free_population(), 0);
    }

    #[test]
    fn test_razing_shrinks_then_destroys() {
        let mut state = world();
        state.city_mut(1).unwrap().is_being_razed = true;
        let ranker = YieldRanker::default();

        run_city_turns(&mut state, &ranker).unwrap();
        assert_eq!(state.city(1).unwrap().population.population, 2);
        run_city_turns(&mut state, &ranker).unwrap();
        assert_eq!(state.city(1).unwrap().population.population, 1);
        run_city_turns(&mut state, &ranker).unwrap();

        assert!(state.city(1).is_err());
        assert_eq!(state.civ("Rome").unwrap().cities.len(), 1);
        let ruins = state.tile(HexCoord::new(4, 0)).unwrap();
        assert_eq!(ruins.owning_city, None);
        assert_eq!(ruins.improvement.as_deref(), Some(CITY_RUINS));
        assert!(!state.civ("Rome").unwrap().owned_tiles.contains(&HexCoord::new(4, 0)));
    }

    #[test]
    fn test_destroying_capital_relocates_it() {
        let mut state = world();
        destroy_city(&mut state, 0, &YieldRanker::default()).unwrap();
        assert_eq!(state.capital_of("Rome"), Some(1));
    }

    #[test]
    fn test_destroying_last_city_destroys_civ() {
        let mut state = WorldStateBuilder::new()
            .with_map(3)
            .with_civ("Rome")
            .with_city("Rome", "Roma", HexCoord::ORIGIN, 1)
            .build();
        destroy_city(&mut state, 0, &YieldRanker::default()).unwrap();
        assert!(state.is_defeated("Rome"));
        assert!(state
            .events
            .iter()
            .any(|e| matches!(e, GameEvent::CivilizationDestroyed { .. })));
    }

    #[test]
    fn test_growth_and_culture_each_turn() {
        let mut state = WorldStateBuilder::new()
            .with_map(6)
            .with_civ("Rome")
            .with_building_def(BuildingDef {
                yields: Yields::default().with_culture(10.0),
                ..BuildingDef::new("Monument")
            })
            .with_city("Rome", "Roma", HexCoord::ORIGIN, 1)
            .with_city_building("Roma", "Monument")
            .assign_population()
            .build();

        run_city_turns(&mut state, &YieldRanker::default()).unwrap();

        let roma = state.city(0).unwrap();
        // Center 2 food + one worked tile 2 food - 2 eaten.
        assert_eq!(roma.population.food_stored, 2);
        assert_eq!(roma.tiles.len(), 8);
        assert_eq!(roma.expansion.culture_stored, 0);
    }
}
