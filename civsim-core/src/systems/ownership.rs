//! Tile ownership ledger.
//!
//! A city's `tiles` set is the owning relation; `TileState::owning_city` is
//! the lookup index. Both sides change together here and nowhere else.

use crate::error::CityError;
use crate::history::{OwnershipChange, TileHistoryRecord};
use crate::ranking::CityRanker;
use crate::state::{CityId, HexCoord, UnitId, WorldState};
use crate::systems::{population, stats};

/// Remove `position` from whichever city owns it.
///
/// Unowned tiles are left alone. Sibling cities working the tile stop
/// working it and reassign their population.
pub fn relinquish_ownership(
    state: &mut WorldState,
    position: HexCoord,
    ranker: &dyn CityRanker,
) -> Result<(), CityError> {
    let Some(owner_id) = state.tile(position)?.owning_city else {
        return Ok(());
    };
    let civ = state.city(owner_id)?.civ.clone();

    state.city_mut(owner_id)?.tiles.remove(&position);
    state.tile_mut(position)?.owning_city = None;

    let siblings: Vec<CityId> = state.civ(&civ)?.cities.iter().copied().collect();
    for sibling in siblings {
        if state.city(sibling)?.worked_tiles.contains(&position) {
            population::stop_working_tile(state, sibling, position)?;
            population::auto_assign(state, sibling, ranker)?;
        }
    }

    update_owned_tiles(state, &civ)?;
    stats::update_stats(state, owner_id)?;

    let turn = state.turn;
    state.tile_history.record(TileHistoryRecord {
        turn,
        position,
        owner_civ: Some(civ),
        owning_city: Some(owner_id),
        kind: OwnershipChange::Relinquish,
    });
    Ok(())
}

/// Give `position` to `city`, taking it from its current owner if needed.
///
/// City centers never change hands this way.
pub fn take_ownership(
    state: &mut WorldState,
    city: CityId,
    position: HexCoord,
    ranker: &dyn CityRanker,
) -> Result<(), CityError> {
    if state.is_city_center(position) {
        return Err(CityError::TileIsCityCenter(position));
    }
    claim_tile(state, city, position, ranker)
}

/// Ownership transfer without the city-center precondition. Used when a
/// city (re)claims its own center.
pub(crate) fn claim_tile(
    state: &mut WorldState,
    city: CityId,
    position: HexCoord,
    ranker: &dyn CityRanker,
) -> Result<(), CityError> {
    let civ = state.city(city)?.civ.clone();
    match state.tile(position)?.owning_city {
        Some(owner) if owner == city => return Ok(()),
        Some(_) => relinquish_ownership(state, position, ranker)?,
        None => {}
    }

    state.city_mut(city)?.tiles.insert(position);
    state.tile_mut(position)?.owning_city = Some(city);
    population::auto_assign(state, city, ranker)?;
    update_owned_tiles(state, &civ)?;
    stats::update_stats(state, city)?;

    let units_here: Vec<UnitId> = state
        .units
        .values()
        .filter(|u| u.position == position)
        .map(|u| u.id)
        .collect();
    for id in units_here {
        let Some(unit) = state.units.get(&id) else {
            continue;
        };
        if !can_pass_through(state, &unit.owner, position) {
            teleport_to_closest_legal_tile(state, id)?;
        } else if unit.owner == civ && unit.is_sleeping && unit.can_build_improvements {
            if let Some(unit) = state.units.get_mut(&id) {
                unit.is_sleeping = false;
            }
        }
    }

    let turn = state.turn;
    state.tile_history.record(TileHistoryRecord {
        turn,
        position,
        owner_civ: Some(civ),
        owning_city: Some(city),
        kind: OwnershipChange::TakeOwnership,
    });
    Ok(())
}

/// Whether units of `civ` may stand on `position`.
pub fn can_pass_through(state: &WorldState, civ: &str, position: HexCoord) -> bool {
    let Some(owner) = state.tile_owner_civ(position) else {
        return true;
    };
    if owner == civ || state.is_at_war(owner, civ) {
        return true;
    }
    let Some(owner_civ) = state.civilizations.get(owner) else {
        return true;
    };
    owner_civ.is_city_state
        || owner_civ
            .diplomacy
            .get(civ)
            .is_some_and(|d| d.open_borders)
}

/// Move a unit to the nearest land tile it may occupy. A unit with nowhere
/// to go is disbanded.
pub fn teleport_to_closest_legal_tile(state: &mut WorldState, unit: UnitId) -> Result<(), CityError> {
    relocate_unit(state, unit, true)
}

/// Like [`teleport_to_closest_legal_tile`], but never onto the tile the
/// unit is standing on.
pub fn teleport_off_tile(state: &mut WorldState, unit: UnitId) -> Result<(), CityError> {
    relocate_unit(state, unit, false)
}

fn relocate_unit(state: &mut WorldState, unit: UnitId, may_stay: bool) -> Result<(), CityError> {
    let Some(current) = state.units.get(&unit) else {
        return Ok(());
    };
    let owner = current.owner.clone();
    let origin = current.position;
    let radius = state.rules.unit_displacement_radius;

    let target = hex_grid::closest_matching(origin, radius, |pos| {
        (may_stay || pos != origin)
            && state.tiles.get(&pos).is_some_and(|t| !t.is_water)
            && can_pass_through(state, &owner, pos)
    });

    match target {
        Some(pos) => {
            if let Some(u) = state.units.get_mut(&unit) {
                u.position = pos;
            }
            log::debug!("Unit {} of {} displaced from {} to {}", unit, owner, origin, pos);
        }
        None => {
            state.units.remove(&unit);
            log::info!("Unit {} of {} disbanded: no legal tile near {}", unit, owner, origin);
        }
    }
    Ok(())
}

/// Teleport every unit on `tiles` that may no longer stand there.
pub fn displace_illegal_units(state: &mut WorldState, tiles: &[HexCoord]) -> Result<(), CityError> {
    let stranded: Vec<UnitId> = state
        .units
        .values()
        .filter(|u| tiles.contains(&u.position) && !can_pass_through(state, &u.owner, u.position))
        .map(|u| u.id)
        .collect();
    for id in stranded {
        teleport_to_closest_legal_tile(state, id)?;
    }
    Ok(())
}

/// Rebuild the civilization's owned-tile cache from its cities.
pub fn update_owned_tiles(state: &mut WorldState, civ: &str) -> Result<(), CityError> {
    let mut owned = crate::state::OrdSet::new();
    for id in state.civ(civ)?.cities.iter() {
        if let Some(city) = state.cities.get(id) {
            for pos in &city.tiles {
                owned.insert(*pos);
            }
        }
    }
    state.civ_mut(civ)?.owned_tiles = owned;
    Ok(())
}
