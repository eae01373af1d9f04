//! Population growth and worker allocation.
//!
//! Free population (population minus worked tiles minus specialists) is
//! handed out greedily by [`auto_assign`]; overworked cities shed their
//! worst assignments in [`unassign_extra`].

use crate::error::CityError;
use crate::history::GameEvent;
use crate::notifications::NotificationCategory;
use crate::ranking::CityRanker;
use crate::state::{CityId, HexCoord, WorldState, Yields};
use crate::systems::stats;
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Score bonus that keeps player-locked tiles from being dropped first.
const LOCKED_TILE_BONUS: f32 = 10.0;

/// Upper bound on the share of the growth threshold kept after growing.
const MAX_FOOD_CARRY_OVER_PERCENT: u32 = 95;

pub fn free_population(state: &WorldState, city: CityId) -> Result<i32, CityError> {
    Ok(state.city(city)?.free_population())
}

/// Food needed for the next citizen.
pub fn food_to_next_population(state: &WorldState, city: CityId) -> Result<i32, CityError> {
    let city = state.city(city)?;
    let civ = state.civ(&city.civ)?;
    let grown = city.population.population.saturating_sub(1) as f64;

    let mut required = 15.0 + 6.0 * grown + grown.powf(1.8).floor();
    required *= state.rules.speed.growth_modifier as f64;
    if civ.is_city_state {
        required *= 1.5;
    }
    if !civ.is_human {
        required *= state.rules.difficulty.ai_city_growth_modifier as f64;
    }
    Ok(required as i32)
}

/// Specialist slots granted by the city's buildings.
pub fn max_specialists(state: &WorldState, city: CityId) -> Result<BTreeMap<String, u32>, CityError> {
    let city = state.city(city)?;
    let mut slots = BTreeMap::new();
    for id in city.buildings.iter() {
        let Some(def) = state.ruleset.building(id) else {
            continue;
        };
        for (name, count) in &def.specialist_slots {
            *slots.entry(name.clone()).or_insert(0) += count;
        }
    }
    Ok(slots)
}

/// Whether the tile already yields without a new worker: it is a city
/// center, is being worked, or needs no worker at all.
pub fn provides_yield(state: &WorldState, position: HexCoord) -> bool {
    state.is_city_center(position)
        || state.working_city(position).is_some()
        || state
            .tiles
            .get(&position)
            .is_some_and(|t| t.provides_yield_without_population)
}

/// Tiles in work range owned by the city's civilization.
pub fn workable_tiles(state: &WorldState, city: CityId) -> Result<Vec<HexCoord>, CityError> {
    let city = state.city(city)?;
    Ok(city
        .location
        .tiles_in_distance(state.rules.city_work_range)
        .into_iter()
        .filter(|pos| state.tile_owner_civ(*pos) == Some(city.civ.as_str()))
        .collect())
}

/// Specialist output as defined by the ruleset.
fn specialist_yields(state: &WorldState, specialist: &str) -> Yields {
    state
        .ruleset
        .specialists
        .get(specialist)
        .copied()
        .unwrap_or_default()
}

/// Assign every free citizen to the best tile or specialist slot.
///
/// Equal tile scores resolve to the lowest (longitude, latitude) so the
/// same tile is picked turn after turn. A specialist beats a tile on a tie.
#[tracing::instrument(skip_all, name = "auto_assign")]
pub fn auto_assign(state: &mut WorldState, city_id: CityId, ranker: &dyn CityRanker) -> Result<(), CityError> {
    stats::update_stats(state, city_id)?;
    if state.city(city_id)?.free_population() <= 0 {
        return Ok(());
    }

    let candidates: Vec<HexCoord> = workable_tiles(state, city_id)?
        .into_iter()
        .filter(|pos| state.tiles.get(pos).is_some_and(|t| !t.is_blockaded))
        .collect();
    let max_slots = max_specialists(state, city_id)?;

    while state.city(city_id)?.free_population() > 0 {
        let city = state.city(city_id)?;

        // Scores may depend on the current assignment; rank afresh each pass.
        let mut scores: FxHashMap<HexCoord, f32> = FxHashMap::default();
        for &pos in &candidates {
            if !provides_yield(state, pos) {
                scores.insert(pos, ranker.rank_tile_for_work(state.tile(pos)?, city));
            }
        }

        let mut best_tile: Option<(HexCoord, f32)> = None;
        for &pos in &candidates {
            let Some(&score) = scores.get(&pos) else {
                continue;
            };
            let better = match best_tile {
                None => true,
                Some((best, best_score)) => match score.partial_cmp(&best_score) {
                    Some(Ordering::Greater) => true,
                    Some(Ordering::Equal) => {
                        (pos.longitude(), pos.latitude()) < (best.longitude(), best.latitude())
                    }
                    _ => false,
                },
            };
            if better {
                best_tile = Some((pos, score));
            }
        }

        let mut best_specialist: Option<(String, f32)> = None;
        if !city.manual_specialists {
            for (name, max) in &max_slots {
                let assigned = city
                    .population
                    .specialist_allocations
                    .get(name)
                    .copied()
                    .unwrap_or(0);
                if assigned >= *max {
                    continue;
                }
                let score = ranker.rank_specialist(name, &specialist_yields(state, name), city);
                if best_specialist.as_ref().map_or(true, |(_, best)| score > *best) {
                    best_specialist = Some((name.clone(), score));
                }
            }
        }

        let city = state.city_mut(city_id)?;
        match (best_tile, best_specialist) {
            (Some((pos, tile_score)), Some((_, specialist_score))) if tile_score > specialist_score => {
                city.worked_tiles.insert(pos);
            }
            (Some((pos, _)), None) => {
                city.worked_tiles.insert(pos);
            }
            (_, Some((name, _))) => {
                *city.population.specialist_allocations.entry(name).or_insert(0) += 1;
            }
            (None, None) => break,
        }
    }

    log::debug!(
        "City {} assigned: {} tiles, {} specialists",
        city_id,
        state.city(city_id)?.worked_tiles.len(),
        state.city(city_id)?.population.specialist_count()
    );
    stats::update_stats(state, city_id)
}

pub fn stop_working_tile(state: &mut WorldState, city: CityId, position: HexCoord) -> Result<(), CityError> {
    let city = state.city_mut(city)?;
    city.worked_tiles.remove(&position);
    city.locked_tiles.remove(&position);
    Ok(())
}

/// Drop assignments that are no longer legal, then shed the worst
/// assignments until the city is no longer overworked.
pub fn unassign_extra(state: &mut WorldState, city_id: CityId, ranker: &dyn CityRanker) -> Result<(), CityError> {
    let city = state.city(city_id)?;
    let work_range = state.rules.city_work_range;
    let illegal: Vec<HexCoord> = city
        .worked_tiles
        .iter()
        .copied()
        .filter(|pos| {
            state.tile_owner_civ(*pos) != Some(city.civ.as_str())
                || state
                    .cities
                    .values()
                    .any(|other| other.id != city_id && other.worked_tiles.contains(pos))
                || pos.distance_to(city.location) > work_range
        })
        .collect();
    for pos in illegal {
        stop_working_tile(state, city_id, pos)?;
    }

    let max_slots = max_specialists(state, city_id)?;
    let city = state.city_mut(city_id)?;
    city.population.specialist_allocations.retain(|name, count| {
        *count = (*count).min(max_slots.get(name).copied().unwrap_or(0));
        *count > 0
    });

    while state.city(city_id)?.free_population() < 0 {
        let city = state.city(city_id)?;

        let mut worst_tile: Option<(HexCoord, f32, f32)> = None;
        for &pos in &city.worked_tiles {
            let score = ranker.rank_tile_for_work(state.tile(pos)?, city);
            let keep_value = if city.locked_tiles.contains(&pos) {
                score + LOCKED_TILE_BONUS
            } else {
                score
            };
            if worst_tile.map_or(true, |(_, _, worst)| keep_value < worst) {
                worst_tile = Some((pos, score, keep_value));
            }
        }

        let mut worst_specialist: Option<(String, f32)> = None;
        if !city.manual_specialists {
            for name in city.population.specialist_allocations.keys() {
                let score = ranker.rank_specialist(name, &specialist_yields(state, name), city);
                if worst_specialist.as_ref().map_or(true, |(_, worst)| score < *worst) {
                    worst_specialist = Some((name.clone(), score));
                }
            }
        }

        match (worst_tile, worst_specialist) {
            (Some((pos, tile_score, _)), Some((_, specialist_score))) if tile_score < specialist_score => {
                stop_working_tile(state, city_id, pos)?;
            }
            (_, Some((name, _))) => remove_specialist(state, city_id, &name)?,
            (Some((pos, _, _)), None) => stop_working_tile(state, city_id, pos)?,
            (None, None) => {
                // Manual specialists outnumber the population.
                let worst = city
                    .population
                    .specialist_allocations
                    .keys()
                    .map(|name| (name, ranker.rank_specialist(name, &specialist_yields(state, name), city)))
                    .min_by(|a, b| a.1.total_cmp(&b.1))
                    .map(|(name, _)| name.clone());
                let Some(name) = worst else {
                    break;
                };
                log::debug!("City {} dropping manual specialist {}", city_id, name);
                remove_specialist(state, city_id, &name)?;
            }
        }
    }
    Ok(())
}

fn remove_specialist(state: &mut WorldState, city: CityId, name: &str) -> Result<(), CityError> {
    let allocations = &mut state.city_mut(city)?.population.specialist_allocations;
    if let Some(count) = allocations.get_mut(name) {
        *count = count.saturating_sub(1);
        if *count == 0 {
            allocations.remove(name);
        }
    }
    Ok(())
}

/// Change population by `delta`, never dropping below one citizen.
pub fn add_population(
    state: &mut WorldState,
    city_id: CityId,
    delta: i32,
    ranker: &dyn CityRanker,
) -> Result<(), CityError> {
    let city = state.city_mut(city_id)?;
    let current = city.population.population as i32;
    city.population.population = (current + delta).max(1) as u32;

    if city.free_population() < 0 {
        unassign_extra(state, city_id, ranker)?;
        stats::update_stats(state, city_id)
    } else {
        auto_assign(state, city_id, ranker)
    }
}

pub fn set_population(
    state: &mut WorldState,
    city_id: CityId,
    population: u32,
    ranker: &dyn CityRanker,
) -> Result<(), CityError> {
    let current = state.city(city_id)?.population.population as i32;
    add_population(state, city_id, population as i32 - current, ranker)
}

/// Clear automatic assignments and redo them. Locked tiles survive unless
/// `reset_locked` is set.
pub fn reassign_population(
    state: &mut WorldState,
    city_id: CityId,
    reset_locked: bool,
    ranker: &dyn CityRanker,
) -> Result<(), CityError> {
    let workable = workable_tiles(state, city_id)?;
    let city = state.city_mut(city_id)?;
    if reset_locked {
        city.locked_tiles = Default::default();
        city.worked_tiles = Default::default();
    } else {
        let kept: crate::state::OrdSet<HexCoord> = city
            .locked_tiles
            .iter()
            .copied()
            .filter(|pos| workable.contains(pos))
            .collect();
        city.locked_tiles = kept.clone();
        city.worked_tiles = kept;
    }
    if !city.manual_specialists {
        city.population.specialist_allocations.clear();
    }
    city.should_reassign_population = false;

    if state.city(city_id)?.free_population() < 0 {
        unassign_extra(state, city_id, ranker)?;
    }
    auto_assign(state, city_id, ranker)
}

pub fn reassign_all_population(
    state: &mut WorldState,
    city_id: CityId,
    ranker: &dyn CityRanker,
) -> Result<(), CityError> {
    state.city_mut(city_id)?.manual_specialists = false;
    reassign_population(state, city_id, true, ranker)
}

/// Add a turn's food and grow or starve accordingly.
#[tracing::instrument(skip_all, name = "population_next_turn")]
pub fn next_turn(
    state: &mut WorldState,
    city_id: CityId,
    food: i32,
    ranker: &dyn CityRanker,
) -> Result<(), CityError> {
    let turn = state.turn;
    let (civ, name, location) = {
        let city = state.city(city_id)?;
        (city.civ.clone(), city.name.clone(), city.location)
    };

    state.city_mut(city_id)?.population.food_stored += food;
    if food < 0 {
        state.notify(&civ, format!("{} is starving!", name), Some(location), NotificationCategory::Cities);
    }
    if state.city(city_id)?.population.food_stored < 0 {
        if state.city(city_id)?.population.population > 1 {
            add_population(state, city_id, -1, ranker)?;
            let population = state.city(city_id)?.population.population;
            log::info!("{} starved down to {} population", name, population);
            state.push_event(GameEvent::Starvation {
                turn,
                city: city_id,
                population,
            });
        }
        state.city_mut(city_id)?.population.food_stored = 0;
    }

    let needed = food_to_next_population(state, city_id)?;
    if state.city(city_id)?.population.food_stored < needed {
        return Ok(());
    }

    let city = state.city(city_id)?;
    if city.has_building_where(&state.ruleset, |b| b.nullifies_growth) {
        return Ok(());
    }
    if city.avoid_growth {
        state.city_mut(city_id)?.population.food_stored = needed;
        return Ok(());
    }

    let carry_over_percent = city
        .buildings
        .iter()
        .filter_map(|id| state.ruleset.building(id))
        .map(|b| b.food_carry_over_percent)
        .sum::<u32>()
        .min(MAX_FOOD_CARRY_OVER_PERCENT);

    let city = state.city_mut(city_id)?;
    city.population.food_stored -= needed;
    city.population.food_stored += (needed as i64 * carry_over_percent as i64 / 100) as i32;
    add_population(state, city_id, 1, ranker)?;
    state.city_mut(city_id)?.should_reassign_population = true;

    let population = state.city(city_id)?.population.population;
    log::info!("{} grew to {} population", name, population);
    state.notify(&civ, format!("{} has grown!", name), Some(location), NotificationCategory::Cities);
    state.push_event(GameEvent::PopulationGrew {
        turn,
        city: city_id,
        population,
    });
    Ok(())
}
