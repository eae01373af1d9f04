//! Border growth through culture and tile purchase with gold.
//!
//! ## Costs
//! - **Culture**: `6 * (level + 1.4813)^1.3`, scaled by game speed,
//!   x1.5 for city-states and by building border-growth percentages.
//! - **Gold**: `50 * (distance - 1) + 5 * tiles_bought`, scaled by game speed.
//!
//! Culture claims one tile per turn at most. Ties between equally ranked
//! candidates go to the first tile in ring enumeration order.

use crate::error::CityError;
use crate::history::GameEvent;
use crate::notifications::NotificationCategory;
use crate::ranking::CityRanker;
use crate::state::{CityId, HexCoord, WorldState};
use crate::systems::ownership::{self, claim_tile, relinquish_ownership, take_ownership};
use crate::systems::stats;

/// Culture cost exponent base offset.
const CULTURE_LEVEL_OFFSET: f64 = 1.4813;
const CULTURE_EXPONENT: f64 = 1.3;
const CULTURE_BASE: f64 = 6.0;

/// Gold per ring of distance beyond the first.
const GOLD_COST_PER_DISTANCE: f64 = 50.0;
/// Surcharge per tile already bought.
const GOLD_COST_PER_TILE_BOUGHT: f64 = 5.0;

/// Culture needed for the city's next tile.
pub fn culture_to_next_tile(state: &WorldState, city: CityId) -> Result<i32, CityError> {
    let city = state.city(city)?;
    let civ = state.civ(&city.civ)?;

    let level = city.expansion.culture_level as f64;
    let mut cost = CULTURE_BASE * (level + CULTURE_LEVEL_OFFSET).powf(CULTURE_EXPONENT);
    cost *= state.rules.speed.culture_cost_modifier as f64;
    if civ.is_city_state {
        cost *= 1.5;
    }

    let border_percent: i32 = city
        .buildings
        .iter()
        .filter_map(|id| state.ruleset.building(id))
        .map(|b| b.border_growth_percent)
        .sum();
    cost *= (100 + border_percent).max(0) as f64 / 100.0;

    Ok(cost.round() as i32)
}

/// Unowned map tiles within work range, in ring order.
pub fn choosable_tiles(state: &WorldState, city: CityId) -> Result<Vec<HexCoord>, CityError> {
    let location = state.city(city)?.location;
    Ok(location
        .tiles_in_distance(state.rules.city_work_range)
        .into_iter()
        .filter(|pos| state.tiles.get(pos).is_some_and(|t| t.owning_city.is_none()))
        .collect())
}

/// Lowest-ranked choosable tile; the first one wins a tie.
pub fn choose_new_tile(
    state: &WorldState,
    city_id: CityId,
    ranker: &dyn CityRanker,
) -> Result<Option<HexCoord>, CityError> {
    let city = state.city(city_id)?;
    let mut best: Option<(HexCoord, f32)> = None;
    for pos in choosable_tiles(state, city_id)? {
        let tile = state.tile(pos)?;
        let rank = ranker.rank_tile_for_expansion(tile, city);
        if best.map_or(true, |(_, best_rank)| rank < best_rank) {
            best = Some((pos, rank));
        }
    }
    Ok(best.map(|(pos, _)| pos))
}

/// Spend stored culture on the best candidate tile.
///
/// Returns `None` and keeps the culture when nothing is left to claim.
pub fn add_new_tile_with_culture(
    state: &mut WorldState,
    city_id: CityId,
    ranker: &dyn CityRanker,
) -> Result<Option<HexCoord>, CityError> {
    let Some(tile) = choose_new_tile(state, city_id, ranker)? else {
        return Ok(None);
    };
    let cost = culture_to_next_tile(state, city_id)?;

    let city = state.city_mut(city_id)?;
    city.expansion.culture_stored -= cost;
    city.expansion.culture_level += 1;
    let (civ, name) = (city.civ.clone(), city.name.clone());

    take_ownership(state, city_id, tile, ranker)?;

    log::info!("{} expanded its borders to {} for {} culture", name, tile, cost);
    state.notify(
        &civ,
        format!("{} has expanded its borders!", name),
        Some(tile),
        NotificationCategory::Cities,
    );
    let turn = state.turn;
    state.push_event(GameEvent::BorderExpanded {
        turn,
        city: city_id,
        tile,
        culture_cost: cost,
    });
    Ok(Some(tile))
}

/// Bank a turn's culture and claim a tile once the threshold is met.
#[tracing::instrument(skip_all, name = "expansion_next_turn")]
pub fn next_turn(
    state: &mut WorldState,
    city_id: CityId,
    culture: f32,
    ranker: &dyn CityRanker,
) -> Result<Option<HexCoord>, CityError> {
    state.city_mut(city_id)?.expansion.culture_stored += culture as i32;
    let stored = state.city(city_id)?.expansion.culture_stored;
    if stored >= culture_to_next_tile(state, city_id)? {
        add_new_tile_with_culture(state, city_id, ranker)
    } else {
        Ok(None)
    }
}

/// Drop all territory and claim the center plus its free neighbours.
pub fn reset(state: &mut WorldState, city_id: CityId, ranker: &dyn CityRanker) -> Result<(), CityError> {
    let owned: Vec<HexCoord> = state.city(city_id)?.tiles.iter().copied().collect();
    for pos in owned {
        relinquish_ownership(state, pos, ranker)?;
    }

    let location = state.city(city_id)?.location;
    claim_tile(state, city_id, location, ranker)?;
    for pos in location.neighbors() {
        let free = state.tiles.get(&pos).is_some_and(|t| t.owning_city.is_none());
        if free {
            take_ownership(state, city_id, pos, ranker)?;
        }
    }

    let city = state.city_mut(city_id)?;
    city.expansion.culture_level = 0;
    city.expansion.tiles_bought = 0;
    Ok(())
}

/// Gold price of `tile` for `city`.
pub fn gold_cost_of_tile(state: &WorldState, city: CityId, tile: HexCoord) -> Result<i32, CityError> {
    let city = state.city(city)?;
    let distance = city.location.distance_to(tile) as f64;
    let cost = GOLD_COST_PER_DISTANCE * (distance - 1.0)
        + GOLD_COST_PER_TILE_BOUGHT * city.expansion.tiles_bought as f64;
    Ok((cost * state.rules.speed.gold_cost_modifier as f64).round() as i32)
}

fn borders_city(state: &WorldState, city: CityId, tile: HexCoord) -> bool {
    tile.neighbors()
        .iter()
        .any(|n| state.tiles.get(n).is_some_and(|t| t.owning_city == Some(city)))
}

pub fn can_buy_tile(state: &WorldState, city_id: CityId, tile: HexCoord) -> Result<bool, CityError> {
    let city = state.city(city_id)?;
    if city.is_puppet || city.is_being_razed || city.is_in_resistance() {
        return Ok(false);
    }
    if state.tile(tile)?.owning_city.is_some() {
        return Ok(false);
    }
    if city.location.distance_to(tile) > state.rules.city_expand_range {
        return Ok(false);
    }
    Ok(borders_city(state, city_id, tile))
}

/// Purchase `tile` with the owning civilization's gold.
pub fn buy_tile(
    state: &mut WorldState,
    city_id: CityId,
    tile: HexCoord,
    ranker: &dyn CityRanker,
) -> Result<(), CityError> {
    state.tile(tile)?;
    if !borders_city(state, city_id, tile) {
        return Err(CityError::TileNotContiguous { city: city_id, tile });
    }
    if !can_buy_tile(state, city_id, tile)? {
        return Err(CityError::TileNotPurchasable { city: city_id, tile });
    }

    let cost = gold_cost_of_tile(state, city_id, tile)?;
    let civ = state.city(city_id)?.civ.clone();
    let available = state.civ(&civ)?.gold;
    if available < cost {
        return Err(CityError::InsufficientGold {
            required: cost,
            available,
        });
    }

    state.civ_mut(&civ)?.gold -= cost;
    state.city_mut(city_id)?.expansion.tiles_bought += 1;
    take_ownership(state, city_id, tile, ranker)?;
    state.city_mut(city_id)?.should_reassign_population = true;
    ownership::update_owned_tiles(state, &civ)?;
    stats::update_stats(state, city_id)?;

    log::info!("{} bought {} for city {} at {} gold", civ, tile, city_id, cost);
    let turn = state.turn;
    state.push_event(GameEvent::TilePurchased {
        turn,
        city: city_id,
        tile,
        gold_cost: cost,
    });
    Ok(())
}
