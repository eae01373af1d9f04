//! Pairwise relations between civilizations.
//!
//! Each civilization keeps one [`DiplomacyManager`] per civilization it
//! knows. Status is kept symmetric; opinion modifiers are one-sided (how
//! the owner of the manager feels about the other civilization).

use crate::error::CityError;
use crate::state::{CivName, WorldState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiplomaticStatus {
    #[default]
    Peace,
    War,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DiplomaticModifier {
    CapturedOurCities,
    SharedEnemy,
    WarMongerer,
    LiberatedCity,
}

/// How close two civilizations' cities are to each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Proximity {
    #[default]
    None,
    Neighbors,
    Close,
    Far,
    Distant,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiplomacyManager {
    pub status: DiplomaticStatus,
    pub modifiers: BTreeMap<DiplomaticModifier, f32>,
    /// City-state influence toward the other civilization.
    pub influence: f32,
    pub open_borders: bool,
}

impl DiplomacyManager {
    pub fn add_modifier(&mut self, modifier: DiplomaticModifier, amount: f32) {
        *self.modifiers.entry(modifier).or_insert(0.0) += amount;
    }

    pub fn modifier(&self, modifier: DiplomaticModifier) -> f32 {
        self.modifiers.get(&modifier).copied().unwrap_or(0.0)
    }

    pub fn opinion(&self) -> f32 {
        self.modifiers.values().sum()
    }
}

/// Establish contact in both directions. No-op if they already know each other.
pub fn make_civilizations_meet(state: &mut WorldState, a: &str, b: &str) -> Result<(), CityError> {
    if a == b {
        return Ok(());
    }
    // Validate both before touching either side.
    state.civ(a)?;
    state.civ(b)?;
    for (us, them) in [(a, b), (b, a)] {
        let civ = state.civ_mut(us)?;
        civ.known_civs.insert(them.to_string());
        civ.diplomacy.entry(them.to_string()).or_default();
    }
    log::debug!("{} and {} have met", a, b);
    Ok(())
}

/// `of`'s view of `toward`, meeting first if needed.
pub fn manager_or_meet<'a>(
    state: &'a mut WorldState,
    of: &str,
    toward: &str,
) -> Result<&'a mut DiplomacyManager, CityError> {
    if !state.civ(of)?.knows(toward) {
        make_civilizations_meet(state, of, toward)?;
    }
    let civ = state.civ_mut(of)?;
    Ok(civ.diplomacy.entry(toward.to_string()).or_default())
}

pub fn add_modifier(
    state: &mut WorldState,
    of: &str,
    toward: &str,
    modifier: DiplomaticModifier,
    amount: f32,
) -> Result<(), CityError> {
    manager_or_meet(state, of, toward)?.add_modifier(modifier, amount);
    Ok(())
}

pub fn is_at_war(state: &WorldState, a: &str, b: &str) -> bool {
    state
        .civilizations
        .get(a)
        .and_then(|c| c.diplomacy.get(b))
        .is_some_and(|d| d.status == DiplomaticStatus::War)
}

fn set_status(state: &mut WorldState, a: &str, b: &str, status: DiplomaticStatus) -> Result<(), CityError> {
    manager_or_meet(state, a, b)?.status = status;
    manager_or_meet(state, b, a)?.status = status;
    Ok(())
}

pub fn declare_war(state: &mut WorldState, a: &str, b: &str) -> Result<(), CityError> {
    set_status(state, a, b, DiplomaticStatus::War)?;
    log::info!("{} declared war on {}", a, b);
    Ok(())
}

pub fn make_peace(state: &mut WorldState, a: &str, b: &str) -> Result<(), CityError> {
    set_status(state, a, b, DiplomaticStatus::Peace)?;
    log::info!("{} and {} made peace", a, b);
    Ok(())
}

/// Civilizations `civ` is at war with.
pub fn enemies_of(state: &WorldState, civ: &str) -> Vec<CivName> {
    state
        .civilizations
        .get(civ)
        .map(|c| {
            c.diplomacy
                .iter()
                .filter(|(_, d)| d.status == DiplomaticStatus::War)
                .map(|(name, _)| name.clone())
                .collect()
        })
        .unwrap_or_default()
}

/// Recompute proximity between two civilizations and store it on both.
pub fn update_proximity(state: &mut WorldState, a: &str, b: &str) -> Result<Proximity, CityError> {
    let proximity = compute_proximity(state, a, b)?;
    if a != b {
        state.civ_mut(a)?.proximity.insert(b.to_string(), proximity);
        state.civ_mut(b)?.proximity.insert(a.to_string(), proximity);
    }
    Ok(proximity)
}

fn compute_proximity(state: &WorldState, a: &str, b: &str) -> Result<Proximity, CityError> {
    if a == b {
        return Ok(Proximity::None);
    }
    let ours: Vec<_> = state
        .civ(a)?
        .cities
        .iter()
        .filter_map(|id| state.cities.get(id))
        .map(|c| c.location)
        .collect();
    let theirs: Vec<_> = state
        .civ(b)?
        .cities
        .iter()
        .filter_map(|id| state.cities.get(id))
        .map(|c| c.location)
        .collect();
    if ours.is_empty() || theirs.is_empty() {
        return Ok(Proximity::None);
    }

    let mut min_distance = u32::MAX;
    let mut total = 0u32;
    let mut connections = 0u32;
    for our in &ours {
        for their in &theirs {
            let d = our.distance_to(*their);
            total += d;
            connections += 1;
            min_distance = min_distance.min(d);
        }
    }

    if min_distance <= 7 {
        return Ok(Proximity::Neighbors);
    }

    let average = total / connections;
    let map_factor = map_radius(state) * 3 / 2;
    let close = (map_factor * 25 / 100).clamp(10, 20);
    let far = (map_factor * 45 / 100).clamp(20, 50);

    Ok(if min_distance <= 11 && average <= close {
        Proximity::Close
    } else if average <= far {
        Proximity::Far
    } else {
        Proximity::Distant
    })
}

fn map_radius(state: &WorldState) -> u32 {
    state
        .tiles
        .keys()
        .map(|p| p.distance_to(crate::state::HexCoord::ORIGIN))
        .max()
        .unwrap_or(0)
}
