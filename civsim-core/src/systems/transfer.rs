//! Moving a city from one civilization to another.
//!
//! [`move_to_civ`] runs as a single transaction: it works on a scratch copy
//! of the world and commits only if every step succeeds.

use crate::buildings::BuildingId;
use crate::diplomacy;
use crate::error::CityError;
use crate::history::{GameEvent, OwnershipChange, SpyFleeReason, TileHistoryRecord};
use crate::notifications::NotificationCategory;
use crate::ranking::CityRanker;
use crate::state::{with_rollback, CityFlag, CityId, CivUnique, HexCoord, UnitId, UnitKind, Vector, WorldState};
use crate::systems::{conquest, ownership, population, stats};
use std::cmp::Reverse;

/// Farthest a road search wanders before giving up.
const MAX_ROAD_SEARCH_STEPS: u32 = 64;

/// Hand `city_id` to `new_civ`, all or nothing.
#[tracing::instrument(skip_all, name = "move_to_civ")]
pub fn move_to_civ(
    state: &mut WorldState,
    city_id: CityId,
    new_civ: &str,
    ranker: &dyn CityRanker,
) -> Result<(), CityError> {
    with_rollback(state, |w| apply_move_to_civ(w, city_id, new_civ, ranker))
}

fn apply_move_to_civ(
    state: &mut WorldState,
    city_id: CityId,
    new_civ: &str,
    ranker: &dyn CityRanker,
) -> Result<(), CityError> {
    let old_civ = state.city(city_id)?.civ.clone();
    state.civ(new_civ)?;
    if old_civ == new_civ {
        return Err(CityError::CityNotCapturable {
            city: city_id,
            civ: old_civ,
        });
    }

    if state.city(city_id)?.is_capital(&state.ruleset) {
        move_capital_to_next_largest(state, &old_civ, Some(city_id), ranker)?;
    }

    // Membership lists are replaced, never edited in place.
    let remaining: Vector<CityId> = state
        .civ(&old_civ)?
        .cities
        .iter()
        .copied()
        .filter(|id| *id != city_id)
        .collect();
    state.civ_mut(&old_civ)?.cities = remaining;
    let mut gained = state.civ(new_civ)?.cities.clone();
    gained.push_back(city_id);
    state.civ_mut(new_civ)?.cities = gained;

    let turn = state.turn;
    let city = state.city_mut(city_id)?;
    city.civ = new_civ.to_string();
    city.has_just_been_conquered = false;
    city.turn_acquired = turn;
    city.previous_owner = Some(old_civ.clone());

    release_foreign_work(state, city_id, &old_civ, ranker)?;

    state.city_mut(city_id)?.remove_flag(CityFlag::WeLoveTheKing);

    remove_lost_buildings(state, city_id, &old_civ, new_civ)?;
    remove_spies(state, city_id, SpyFleeReason::Other)?;

    if state.civ(new_civ)?.cities.len() == 1 {
        move_capital_to(state, new_civ, Some(city_id), None)?;
    }

    try_add_free_buildings(state, city_id)?;
    state.city_mut(city_id)?.is_being_razed = false;

    swap_equivalent_buildings(state, city_id, new_civ)?;

    if state.rules.religion_enabled {
        state
            .city_mut(city_id)?
            .pantheons
            .retain(|founder| founder == new_civ);
    }

    if state.civ(new_civ)?.has_unique(CivUnique::MayNotAnnexCities) {
        let city = state.city_mut(city_id)?;
        city.is_puppet = true;
        city.construction.current_is_user_set = false;
        city.construction.in_progress.clear();
    }

    update_road_connection(state, city_id)?;
    stats::update_stats(state, city_id)?;

    diplomacy::update_proximity(state, &old_civ, new_civ)?;

    let tiles: Vec<HexCoord> = state.city(city_id)?.tiles.iter().copied().collect();
    for position in tiles {
        state.tile_history.record(TileHistoryRecord {
            turn,
            position,
            owner_civ: Some(new_civ.to_string()),
            owning_city: Some(city_id),
            kind: OwnershipChange::TakeOwnership,
        });
    }

    ownership::update_owned_tiles(state, &old_civ)?;
    ownership::update_owned_tiles(state, new_civ)?;

    log::info!(
        "{} passed from {} to {}",
        state.city(city_id)?.name,
        old_civ,
        new_civ
    );
    Ok(())
}

/// Stop working tiles across the new border, on both sides.
fn release_foreign_work(
    state: &mut WorldState,
    city_id: CityId,
    old_civ: &str,
    ranker: &dyn CityRanker,
) -> Result<(), CityError> {
    let new_civ = state.city(city_id)?.civ.clone();
    let stranded: Vec<HexCoord> = state
        .city(city_id)?
        .worked_tiles
        .iter()
        .copied()
        .filter(|pos| state.tile_owner_civ(*pos) != Some(new_civ.as_str()))
        .collect();
    for pos in &stranded {
        population::stop_working_tile(state, city_id, *pos)?;
    }
    population::auto_assign(state, city_id, ranker)?;

    let our_tiles: Vec<HexCoord> = state.city(city_id)?.tiles.iter().copied().collect();
    let siblings: Vec<CityId> = state.civ(old_civ)?.cities.iter().copied().collect();
    for sibling in siblings {
        let lost: Vec<HexCoord> = our_tiles
            .iter()
            .copied()
            .filter(|pos| state.cities.get(&sibling).is_some_and(|c| c.worked_tiles.contains(pos)))
            .collect();
        if lost.is_empty() {
            continue;
        }
        for pos in lost {
            population::stop_working_tile(state, sibling, pos)?;
        }
        population::auto_assign(state, sibling, ranker)?;
    }
    Ok(())
}

/// Drop buildings the city may not keep under its new owner: gifts from
/// the old owner, national wonders and buildings over the new owner's cap.
fn remove_lost_buildings(
    state: &mut WorldState,
    city_id: CityId,
    old_civ: &str,
    new_civ: &str,
) -> Result<(), CityError> {
    let gifted = state
        .civ_mut(old_civ)?
        .free_buildings_by_city
        .remove(&city_id)
        .unwrap_or_default();

    let mut removed: Vec<BuildingId> = Vec::new();
    let city = state.city(city_id)?;
    for id in city.buildings.iter() {
        if gifted.contains(&id) {
            removed.push(id);
            continue;
        }
        let Some(def) = state.ruleset.building(id) else {
            continue;
        };
        if def.is_national_wonder && !def.not_destroyed_when_captured {
            removed.push(id);
            continue;
        }
        if let Some(cap) = def.max_number_buildable {
            let elsewhere = state
                .civ(new_civ)?
                .cities
                .iter()
                .filter(|other| **other != city_id)
                .filter_map(|other| state.cities.get(other))
                .filter(|other| other.buildings.contains(id))
                .count() as u32;
            if elsewhere >= cap {
                removed.push(id);
            }
        }
    }

    let city = state.city_mut(city_id)?;
    for id in removed {
        city.buildings.remove(id);
    }
    Ok(())
}

/// Replace every building with the version the owner builds.
fn swap_equivalent_buildings(state: &mut WorldState, city_id: CityId, civ: &str) -> Result<(), CityError> {
    let built: Vec<BuildingId> = state.city(city_id)?.buildings.iter().collect();
    for id in built {
        let equivalent = state.ruleset.equivalent_building(civ, id)?;
        if equivalent != id {
            let city = state.city_mut(city_id)?;
            city.buildings.remove(id);
            city.buildings.insert(equivalent);
        }
    }
    Ok(())
}

/// Grant the owner's empire-wide free buildings this city lacks.
pub fn try_add_free_buildings(state: &mut WorldState, city_id: CityId) -> Result<(), CityError> {
    let civ = state.city(city_id)?.civ.clone();
    let free: Vec<BuildingId> = state.civ(&civ)?.free_buildings.iter().copied().collect();
    for id in free {
        let id = state.ruleset.equivalent_building(&civ, id)?;
        if state.city(city_id)?.buildings.contains(id) {
            continue;
        }
        state.city_mut(city_id)?.buildings.insert(id);
        state
            .civ_mut(&civ)?
            .free_buildings_by_city
            .entry(city_id)
            .or_default()
            .insert(id);
    }
    Ok(())
}

/// Expel every spy from the city.
pub fn remove_spies(state: &mut WorldState, city_id: CityId, reason: SpyFleeReason) -> Result<(), CityError> {
    let city = state.city_mut(city_id)?;
    let spies = std::mem::take(&mut city.spies);
    let (name, location) = (city.name.clone(), city.location);
    let turn = state.turn;
    for spy in spies {
        state.notify(
            &spy.owner,
            format!("{} has fled {}", spy.name, name),
            Some(location),
            NotificationCategory::General,
        );
        state.push_event(GameEvent::SpyRemoved {
            turn,
            city: city_id,
            owner: spy.owner,
            reason,
        });
    }
    Ok(())
}

/// Make `new` the capital of `civ`, taking the title from `old`.
pub fn move_capital_to(
    state: &mut WorldState,
    civ: &str,
    new: Option<CityId>,
    old: Option<CityId>,
) -> Result<(), CityError> {
    if let Some(new) = new {
        if let Some(indicator) = state.ruleset.capital_indicator_for(civ)? {
            state.city_mut(new)?.buildings.insert(indicator);
        }
        state.city_mut(new)?.is_being_razed = false;

        if let Some(old) = old {
            let moving: Vec<BuildingId> = state
                .city(old)?
                .buildings
                .iter()
                .filter(|id| state.ruleset.building(*id).is_some_and(|b| b.moves_to_new_capital))
                .collect();
            for id in moving {
                state.city_mut(old)?.buildings.remove(id);
                state.city_mut(new)?.buildings.insert(id);
            }
        }
    }

    if let Some(old) = old {
        let markers: Vec<BuildingId> = state
            .city(old)?
            .buildings
            .iter()
            .filter(|id| state.ruleset.building(*id).is_some_and(|b| b.indicates_capital))
            .collect();
        let city = state.city_mut(old)?;
        for id in markers {
            city.buildings.remove(id);
        }
    }

    let turn = state.turn;
    state.push_event(GameEvent::CapitalMoved {
        turn,
        civ: civ.to_string(),
        city: new,
    });
    Ok(())
}

/// Move the capital to the most populous other city, annexing a puppet if
/// nothing else is left.
pub fn move_capital_to_next_largest(
    state: &mut WorldState,
    civ: &str,
    old: Option<CityId>,
    ranker: &dyn CityRanker,
) -> Result<(), CityError> {
    let candidates: Vec<CityId> = state
        .civ(civ)?
        .cities
        .iter()
        .copied()
        .filter(|id| Some(*id) != old)
        .filter(|id| state.cities.get(id).is_some_and(|c| !c.is_capital(&state.ruleset)))
        .collect();
    if candidates.is_empty() {
        return move_capital_to(state, civ, None, old);
    }

    let free_cities = candidates
        .iter()
        .copied()
        .filter(|id| state.cities.get(id).is_some_and(|c| !c.is_puppet));
    let new_capital = match largest_city(state, free_cities) {
        Some(id) => id,
        None => {
            let Some(puppet) = largest_city(state, candidates.iter().copied()) else {
                return move_capital_to(state, civ, None, old);
            };
            conquest::annex_city(state, puppet)?;
            puppet
        }
    };

    log::info!("{} moves its capital to {}", civ, state.city(new_capital)?.name);
    move_capital_to(state, civ, Some(new_capital), old)
}

/// Most populous of `ids`; the first one wins a tie.
fn largest_city(state: &WorldState, ids: impl Iterator<Item = CityId>) -> Option<CityId> {
    ids.filter_map(|id| state.cities.get(&id))
        .min_by_key(|c| Reverse(c.population.population))
        .map(|c| c.id)
}

/// Whether a road (or city centers of the same civ) links the city to its
/// civilization's capital.
pub fn update_road_connection(state: &mut WorldState, city_id: CityId) -> Result<(), CityError> {
    let city = state.city(city_id)?;
    let civ = city.civ.clone();
    let start = city.location;
    let connected = match state.capital_of(&civ) {
        None => false,
        Some(capital) if capital == city_id => true,
        Some(capital) => {
            let goal = state.city(capital)?.location;
            hex_grid::find_path(start, goal, MAX_ROAD_SEARCH_STEPS, |pos| {
                let on_road = pos == goal || state.tiles.get(&pos).is_some_and(|t| t.has_road);
                on_road && state.tile_owner_civ(pos).map_or(true, |owner| owner == civ)
            })
            .is_some()
        }
    };
    state.city_mut(city_id)?.connected_to_capital = connected;
    Ok(())
}

/// Remove a civilization that lost its last city and its army.
pub fn destroy_if_defeated(state: &mut WorldState, civ: &str) -> Result<bool, CityError> {
    if !state.civ(civ)?.cities.is_empty() || !state.is_defeated(civ) {
        return Ok(false);
    }

    let message = if state.civ(civ)?.is_major() {
        format!("The civilization of {} has been destroyed!", civ)
    } else {
        format!("The City-State of {} has been destroyed!", civ)
    };
    let observers: Vec<String> = state
        .civilizations
        .keys()
        .filter(|name| name.as_str() != civ && !state.is_defeated(name))
        .cloned()
        .collect();
    for observer in observers {
        state.notify(&observer, message.clone(), None, NotificationCategory::War);
    }

    let leftovers: Vec<UnitId> = state
        .units
        .values()
        .filter(|u| u.owner == civ && u.kind == UnitKind::Civilian)
        .map(|u| u.id)
        .collect();
    for id in leftovers {
        state.units.remove(&id);
    }

    log::info!("{}", message);
    let turn = state.turn;
    state.push_event(GameEvent::CivilizationDestroyed {
        turn,
        civ: civ.to_string(),
    });
    Ok(true)
}

/// Peaceful handover (trade or treaty).
pub fn transfer_city(
    state: &mut WorldState,
    city_id: CityId,
    to: &str,
    ranker: &dyn CityRanker,
) -> Result<(), CityError> {
    with_rollback(state, |w| {
        let from = w.city(city_id)?.civ.clone();
        let name = w.city(city_id)?.name.clone();
        let location = w.city(city_id)?.location;

        move_to_civ(w, city_id, to, ranker)?;
        population::reassign_population(w, city_id, false, ranker)?;
        destroy_if_defeated(w, &from)?;

        w.notify(
            to,
            format!("{} has joined our civilization", name),
            Some(location),
            NotificationCategory::Cities,
        );
        w.notify(
            &from,
            format!("{} now belongs to {}", name, to),
            Some(location),
            NotificationCategory::Cities,
        );
        let turn = w.turn;
        w.push_event(GameEvent::CityTransferred {
            turn,
            city: city_id,
            from,
            to: to.to_string(),
        });
        Ok(())
    })
}
