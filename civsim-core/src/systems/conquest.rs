//! Capturing cities: puppet, annex and liberate.
//!
//! All three outcomes share [`CityConquest::conquer`]: plunder, building
//! destruction, the ownership transfer, population loss and resistance.
//! Randomness comes from a [`TileRandom`] seeded with the city's location,
//! so a replay of the same world plunders the same gold and burns the same
//! buildings.
//!
//! ## Repercussions
//! - **Conquest**: `10 + round(100 * pop / victim_pop)` against the conqueror,
//!   a tenth of that from every major civilization the conqueror knows.
//! - **Liberation**: `10 + round(100 * pop / (founder_pop + pop))` in favour
//!   of the liberator, a tenth of that from third parties.

use crate::buildings::BuildingId;
use crate::diplomacy::{self, DiplomaticModifier};
use crate::error::CityError;
use crate::history::{GameEvent, SpyFleeReason};
use crate::notifications::NotificationCategory;
use crate::ranking::CityRanker;
use crate::rng::TileRandom;
use crate::state::{with_rollback, CityFlag, CityFocus, CityId, CivName, CivUnique, TriggeredEffect, UnitId, WorldState};
use crate::systems::{ownership, population, stats, transfer};
use crate::trade::{TradeLogic, TradeOffer};
use serde::{Deserialize, Serialize};

/// Base plunder before population and randomness.
const BASE_PLUNDER: i32 = 20;
const PLUNDER_PER_CITIZEN: i32 = 10;
/// Exclusive bound of the random plunder bonus.
const PLUNDER_RANDOM_RANGE: u32 = 40;
/// Turns of ownership after which plunder is no longer reduced.
const PLUNDER_FULL_AFTER_TURNS: i64 = 50;

/// What the conqueror does with a captured city.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConquestOutcome {
    Puppet,
    /// Puppet, then annex immediately.
    Annex,
    /// Return the city to its founder.
    Liberate,
}

/// Result of the shared capture step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureSummary {
    pub gold_plundered: i32,
    pub buildings_destroyed: u32,
}

/// Capture of one city. Owns the city's position-seeded random source.
pub struct CityConquest<'r> {
    city: CityId,
    rng: TileRandom,
    ranker: &'r dyn CityRanker,
}

impl<'r> CityConquest<'r> {
    pub fn new(state: &WorldState, city: CityId, ranker: &'r dyn CityRanker) -> Result<Self, CityError> {
        let location = state.city(city)?.location;
        Ok(Self {
            city,
            rng: TileRandom::for_tile(location),
            ranker,
        })
    }

    /// Gold `conqueror` receives for taking the city. Draws from the city's
    /// random source.
    pub fn gold_for_capturing_city(&mut self, state: &WorldState, conqueror: &str) -> Result<i32, CityError> {
        let city = state.city(self.city)?;
        let base = BASE_PLUNDER
            + PLUNDER_PER_CITIZEN * city.population.population as i32
            + self.rng.next_below(PLUNDER_RANDOM_RANGE) as i32;

        let held = (state.turn as i64 - city.turn_acquired as i64).clamp(0, PLUNDER_FULL_AFTER_TURNS);
        let turn_modifier = held as f32 / PLUNDER_FULL_AFTER_TURNS as f32;
        let city_modifier = if city.has_building_where(&state.ruleset, |b| b.doubles_gold_from_capture) {
            2.0
        } else {
            1.0
        };
        let civ_modifier = if state
            .civ(conqueror)?
            .has_unique(CivUnique::TripleGoldFromEncampmentsAndCities)
        {
            3.0
        } else {
            1.0
        };

        Ok((base as f32 * turn_modifier * city_modifier * civ_modifier) as i32)
    }

    /// Burn buildings on capture. Wonders and capture-proof buildings stay,
    /// marked buildings always go, the rest roll against the destruction chance.
    pub fn destroy_buildings_on_capture(&mut self, state: &mut WorldState) -> Result<u32, CityError> {
        let chance = state.rules.building_destruction_chance;
        let built: Vec<BuildingId> = state.city(self.city)?.buildings.iter().collect();
        let mut destroyed = Vec::new();
        for id in built {
            let Some(def) = state.ruleset.building(id) else {
                continue;
            };
            if def.is_wonder || def.not_destroyed_when_captured || def.indicates_capital {
                continue;
            }
            if def.destroyed_when_captured || self.rng.chance(chance) {
                destroyed.push(id);
            }
        }

        let city = state.city_mut(self.city)?;
        for id in &destroyed {
            city.buildings.remove(*id);
        }
        Ok(destroyed.len() as u32)
    }

    /// Shared capture step: `conqueror` takes the city from `conquered` and
    /// hands it to `receiver`.
    ///
    /// A receiver retaking its own former city while that city still resists
    /// ends the resistance outright. Whether resistance should instead be
    /// reset for the returning owner is an open product question.
    #[tracing::instrument(skip_all, name = "conquer")]
    pub fn conquer(
        &mut self,
        state: &mut WorldState,
        conqueror: &str,
        conquered: &str,
        receiver: &str,
    ) -> Result<CaptureSummary, CityError> {
        let city_id = self.city;
        let (name, location) = {
            let city = state.city(city_id)?;
            (city.name.clone(), city.location)
        };

        transfer::remove_spies(state, city_id, SpyFleeReason::CityCaptured)?;

        let gold = self.gold_for_capturing_city(state, conqueror)?;
        state.civ_mut(conqueror)?.gold += gold;
        state.notify(
            conqueror,
            format!("Received {} Gold for capturing {}", gold, name),
            Some(location),
            NotificationCategory::War,
        );

        let reconquered_in_resistance = {
            let city = state.city(city_id)?;
            city.previous_owner.as_deref() == Some(receiver) && city.is_in_resistance()
        };

        let buildings_destroyed = self.destroy_buildings_on_capture(state)?;

        transfer::move_to_civ(state, city_id, receiver, self.ranker)?;
        transfer::destroy_if_defeated(state, conquered)?;

        let max_health = stats::max_health(state, city_id)?;
        let city = state.city_mut(city_id)?;
        city.health.set_max(max_health);
        city.health.set(max_health / 2);
        city.avoid_growth = false;
        city.focus = CityFocus::NoFocus;

        let population = city.population.population as i32;
        if population > 1 {
            population::add_population(state, city_id, -1 - population / 4, self.ranker)?;
        }
        population::reassign_all_population(state, city_id, self.ranker)?;

        let liberated = state.city(city_id)?.founding_civ.as_deref() == Some(receiver);
        let city = state.city_mut(city_id)?;
        if reconquered_in_resistance || liberated {
            if reconquered_in_resistance {
                log::debug!("{} retook {} during resistance, ending it", receiver, name);
            }
            city.remove_flag(CityFlag::Resistance);
        } else {
            let turns = city.population.population;
            city.set_flag(CityFlag::Resistance, turns);
        }

        fire_losing_city_triggers(state, conquered, &name)?;
        stats::update_stats(state, city_id)?;

        log::info!(
            "{} captured {} from {} for {}, {} gold plundered, {} buildings destroyed",
            conqueror,
            name,
            conquered,
            receiver,
            gold,
            buildings_destroyed
        );
        let turn = state.turn;
        state.push_event(GameEvent::CityConquered {
            turn,
            city: city_id,
            city_name: name,
            from: conquered.to_string(),
            to: receiver.to_string(),
            conqueror: conqueror.to_string(),
            gold_plundered: gold,
            buildings_destroyed,
        });

        Ok(CaptureSummary {
            gold_plundered: gold,
            buildings_destroyed,
        })
    }

    /// Keep the city as a puppet of `conqueror`.
    pub fn puppet(&mut self, state: &mut WorldState, conqueror: &str) -> Result<CaptureSummary, CityError> {
        let city_id = self.city;
        let old_civ = state.city(city_id)?.civ.clone();

        // Judged against the pre-capture owner.
        repercussions_for_conquering(state, city_id, &old_civ, conqueror)?;
        let summary = self.conquer(state, conqueror, &old_civ, conqueror)?;

        let city = state.city_mut(city_id)?;
        city.is_puppet = true;
        city.construction.current_is_user_set = false;
        city.construction.in_progress.clear();
        city.construction.queue.clear();
        city.construction.choose_next();
        stats::update_stats(state, city_id)?;

        let turn = state.turn;
        state.push_event(GameEvent::CityPuppeted {
            turn,
            city: city_id,
            civ: conqueror.to_string(),
        });
        Ok(summary)
    }

    /// Return the city to the civilization that founded it.
    pub fn liberate(&mut self, state: &mut WorldState, conqueror: &str) -> Result<CaptureSummary, CityError> {
        let city_id = self.city;
        let Some(founder) = state.city(city_id)?.founding_civ.clone() else {
            log::warn!(
                "City {} has no founding civilization; puppeting and annexing instead",
                city_id
            );
            let summary = self.puppet(state, conqueror)?;
            annex_city(state, city_id)?;
            return Ok(summary);
        };
        state.civ(&founder)?;

        if state.is_defeated(&founder) {
            for enemy in diplomacy::enemies_of(state, &founder) {
                diplomacy::make_peace(state, &founder, &enemy)?;
            }
        }

        let old_civ = state.city(city_id)?.civ.clone();
        repercussions_for_liberating(state, city_id, &old_civ, conqueror)?;
        let summary = self.conquer(state, conqueror, &old_civ, &founder)?;

        let resurrected = state.civ(&founder)?.cities.len() == 1;
        if resurrected {
            if let Some(indicator) = state.ruleset.capital_indicator_for(&founder)? {
                state.city_mut(city_id)?.buildings.insert(indicator);
            }
            announce_liberation(state, conqueror, &founder)?;
        }

        state.city_mut(city_id)?.is_puppet = false;
        stats::update_stats(state, city_id)?;
        clear_liberated_territory(state, city_id)?;

        let turn = state.turn;
        state.push_event(GameEvent::CityLiberated {
            turn,
            city: city_id,
            liberator: conqueror.to_string(),
            founder,
            resurrected,
        });
        Ok(summary)
    }
}

/// Bring a puppet under direct control.
pub fn annex_city(state: &mut WorldState, city_id: CityId) -> Result<(), CityError> {
    let city = state.city_mut(city_id)?;
    city.is_puppet = false;
    if !city.is_in_resistance() {
        city.should_reassign_population = true;
    }
    city.avoid_growth = false;
    city.focus = CityFocus::NoFocus;
    let civ = city.civ.clone();
    stats::update_stats(state, city_id)?;

    let turn = state.turn;
    state.push_event(GameEvent::CityAnnexed {
        turn,
        city: city_id,
        civ,
    });
    Ok(())
}

/// Apply `outcome` to a city `conqueror` has just taken. Nothing changes if
/// any step fails.
pub fn resolve_conquest(
    state: &mut WorldState,
    city_id: CityId,
    conqueror: &str,
    outcome: ConquestOutcome,
    ranker: &dyn CityRanker,
) -> Result<CaptureSummary, CityError> {
    let owner = state.city(city_id)?.civ.clone();
    state.civ(conqueror)?;
    if owner == conqueror {
        return Err(CityError::CityNotCapturable {
            city: city_id,
            civ: owner,
        });
    }

    with_rollback(state, |w| {
        let mut conquest = CityConquest::new(w, city_id, ranker)?;
        match outcome {
            ConquestOutcome::Puppet => conquest.puppet(w, conqueror),
            ConquestOutcome::Annex => {
                let summary = conquest.puppet(w, conqueror)?;
                annex_city(w, city_id)?;
                Ok(summary)
            }
            ConquestOutcome::Liberate => conquest.liberate(w, conqueror),
        }
    })
}

/// Opinion penalties for taking a city from `victim`.
pub fn repercussions_for_conquering(
    state: &mut WorldState,
    city_id: CityId,
    victim: &str,
    conqueror: &str,
) -> Result<(), CityError> {
    let population = state.city(city_id)?.population.population as f32;
    let victim_population = state.civ_population(victim).max(1) as f32;
    let aggro = 10.0 + (population * 100.0 / victim_population).round();

    diplomacy::add_modifier(state, victim, conqueror, DiplomaticModifier::CapturedOurCities, -aggro)?;

    let third_party_aggro = (aggro / 10.0).round();
    for observer in known_major_civs(state, conqueror)? {
        if observer == victim {
            continue;
        }
        if state.is_at_war(&observer, victim) {
            diplomacy::add_modifier(state, &observer, conqueror, DiplomaticModifier::SharedEnemy, third_party_aggro)?;
        } else {
            diplomacy::add_modifier(state, &observer, conqueror, DiplomaticModifier::WarMongerer, -third_party_aggro)?;
        }
    }
    Ok(())
}

/// Goodwill for handing a city back to its founder.
pub fn repercussions_for_liberating(
    state: &mut WorldState,
    city_id: CityId,
    conquered: &str,
    liberator: &str,
) -> Result<(), CityError> {
    let city = state.city(city_id)?;
    let founder = city.founding_civ.clone().ok_or(CityError::NoFoundingCiv(city_id))?;
    let population = city.population.population as f32;
    let founder_population = state.civ_population(&founder) as f32;
    let respect = 10.0 + (population * 100.0 / (founder_population + population)).round();

    if state.civ(&founder)?.is_major() {
        diplomacy::add_modifier(state, &founder, liberator, DiplomaticModifier::CapturedOurCities, respect)?;
        TradeLogic::new(&founder, liberator)
            .offer(TradeOffer::OpenBorders)
            .accept_trade(state)?;
    } else {
        let influence = state.rules.liberated_city_state_influence;
        diplomacy::manager_or_meet(state, &founder, liberator)?.influence = influence;
        if state.is_at_war(&founder, liberator) {
            TradeLogic::new(&founder, liberator)
                .offer(TradeOffer::PeaceTreaty)
                .request(TradeOffer::PeaceTreaty)
                .accept_trade(state)?;
        }
    }

    let third_party_respect = (respect / 10.0).round();
    for observer in known_major_civs(state, liberator)? {
        if observer == conquered {
            continue;
        }
        diplomacy::add_modifier(state, &observer, liberator, DiplomaticModifier::LiberatedCity, third_party_respect)?;
    }
    Ok(())
}

fn known_major_civs(state: &WorldState, civ: &str) -> Result<Vec<CivName>, CityError> {
    Ok(state
        .civ(civ)?
        .known_civs
        .iter()
        .filter(|name| state.civilizations.get(*name).is_some_and(|c| c.is_major()))
        .cloned()
        .collect())
}

fn fire_losing_city_triggers(state: &mut WorldState, civ: &str, city_name: &str) -> Result<(), CityError> {
    let triggers = state.civ(civ)?.triggers_on_losing_city.clone();
    for trigger in triggers {
        match trigger {
            TriggeredEffect::GainGold(amount) => state.civ_mut(civ)?.gold += amount,
            TriggeredEffect::Notification(message) => state.notify(
                civ,
                format!("{} ({})", message, city_name),
                None,
                NotificationCategory::War,
            ),
        }
    }
    Ok(())
}

/// Tell every other civilization about a resurrection, naming only the
/// parties it has met.
fn announce_liberation(state: &mut WorldState, liberator: &str, founder: &str) -> Result<(), CityError> {
    let observers: Vec<CivName> = state
        .civilizations
        .keys()
        .filter(|name| name.as_str() != liberator && name.as_str() != founder)
        .cloned()
        .collect();
    for observer in observers {
        let civ = state.civ(&observer)?;
        let message = match (civ.knows(liberator), civ.knows(founder)) {
            (true, true) => format!("{} has liberated {}", liberator, founder),
            (true, false) => format!("{} has liberated an unknown civilization", liberator),
            (false, true) => format!("An unknown civilization has liberated {}", founder),
            (false, false) => continue,
        };
        state.notify(&observer, message, None, NotificationCategory::Diplomacy);
    }
    Ok(())
}

/// Push foreign units out of the center, and off any tile they may no
/// longer stand on.
fn clear_liberated_territory(state: &mut WorldState, city_id: CityId) -> Result<(), CityError> {
    let city = state.city(city_id)?;
    let owner = city.civ.clone();
    let center = city.location;

    let in_center: Vec<UnitId> = state
        .units
        .values()
        .filter(|u| u.position == center && u.owner != owner)
        .map(|u| u.id)
        .collect();
    for id in in_center {
        ownership::teleport_off_tile(state, id)?;
    }

    let territory: Vec<_> = state.city(city_id)?.tiles.iter().copied().collect();
    ownership::displace_illegal_units(state, &territory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buildings::BuildingDef;
    use crate::ranking::YieldRanker;
    use crate::state::{HexCoord, Spy, UnitKind};
    use crate::testing::WorldStateBuilder;

    fn war() -> WorldStateBuilder {
        WorldStateBuilder::new()
            .with_map(8)
            .with_civ("Rome")
            .with_civ("Carthage")
            .at_war("Rome", "Carthage")
            .with_city("Rome", "Roma", HexCoord::new(0, 0), 4)
            .with_city("Carthage", "Carthago", HexCoord::new(-5, 0), 4)
            .with_city("Carthage", "Utica", HexCoord::new(4, 0), 6)
            .assign_population()
    }

    #[test]
    fn test_plunder_is_reproducible_per_tile() {
        let state = war().turn(60).build();
        let ranker = YieldRanker::default();

        let first = CityConquest::new(&state, 2, &ranker)
            .unwrap()
            .gold_for_capturing_city(&state, "Rome")
            .unwrap();
        let second = CityConquest::new(&state, 2, &ranker)
            .unwrap()
            .gold_for_capturing_city(&state, "Rome")
            .unwrap();
        assert_eq!(first, second);
        assert!((80..120).contains(&first), "plunder {}", first);
    }

    #[test]
    fn test_plunder_varies_with_position() {
        let ranker = YieldRanker::default();
        let plunder_at = |location: HexCoord| {
            let state = WorldStateBuilder::new()
                .with_map(8)
                .with_civ("Rome")
                .with_civ("Carthage")
                .with_city("Carthage", "Utica", location, 6)
                .turn(60)
                .build();
            CityConquest::new(&state, 0, &ranker)
                .unwrap()
                .gold_for_capturing_city(&state, "Rome")
                .unwrap()
        };
        let samples: Vec<i32> = (-3..=3).map(|x| plunder_at(HexCoord::new(x, 1))).collect();
        assert!(samples.iter().any(|g| *g != samples[0]), "{:?}", samples);
    }

    #[test]
    fn test_plunder_scales_with_ownership_time() {
        let mut state = war().turn(60).build();
        let ranker = YieldRanker::default();
        state.city_mut(2).unwrap().turn_acquired = 60;
        let fresh = CityConquest::new(&state, 2, &ranker)
            .unwrap()
            .gold_for_capturing_city(&state, "Rome")
            .unwrap();
        assert_eq!(fresh, 0);

        state.city_mut(2).unwrap().turn_acquired = 0;
        state
            .civ_mut("Rome")
            .unwrap()
            .uniques
            .insert(CivUnique::TripleGoldFromEncampmentsAndCities);
        let full = CityConquest::new(&state, 2, &ranker)
            .unwrap()
            .gold_for_capturing_city(&state, "Rome")
            .unwrap();
        assert!((240..360).contains(&full), "plunder {}", full);
    }

    #[test]
    fn test_building_destruction_rules() {
        let mut state = war()
            .with_building_def(BuildingDef {
                is_wonder: true,
                ..BuildingDef::new("Great Lighthouse")
            })
            .with_building_def(BuildingDef {
                destroyed_when_captured: true,
                ..BuildingDef::new("Barracks")
            })
            .with_building_def(BuildingDef {
                not_destroyed_when_captured: true,
                ..BuildingDef::new("Granary")
            })
            .with_city_building("Utica", "Great Lighthouse")
            .with_city_building("Utica", "Barracks")
            .with_city_building("Utica", "Granary")
            .build();
        let ranker = YieldRanker::default();
        let lighthouse = state.ruleset.id_of("Great Lighthouse").unwrap();
        let barracks = state.ruleset.id_of("Barracks").unwrap();
        let granary = state.ruleset.id_of("Granary").unwrap();

        let destroyed = CityConquest::new(&state, 2, &ranker)
            .unwrap()
            .destroy_buildings_on_capture(&mut state)
            .unwrap();

        assert_eq!(destroyed, 1);
        let utica = state.city(2).unwrap();
        assert!(utica.buildings.contains(lighthouse));
        assert!(utica.buildings.contains(granary));
        assert!(!utica.buildings.contains(barracks));
    }

    #[test]
    fn test_puppet_scenario() {
        let mut state = war().turn(30).build();
        state.city_mut(2).unwrap().construction.current = Some("Trireme".to_string());
        state.city_mut(2).unwrap().construction.current_is_user_set = true;
        let gold_before = state.civ("Rome").unwrap().gold;

        let summary = resolve_conquest(&mut state, 2, "Rome", ConquestOutcome::Puppet, &YieldRanker::default()).unwrap();

        let utica = state.city(2).unwrap();
        assert_eq!(utica.civ, "Rome");
        assert_eq!(utica.population.population, 4);
        assert_eq!(utica.flags.get(&CityFlag::Resistance), Some(&4));
        assert!(utica.is_puppet);
        assert!(!utica.construction.current_is_user_set);
        assert_eq!(utica.construction.current.as_deref(), Some("Gold"));
        assert_eq!(utica.health.get(), utica.health.max() / 2);
        assert!(state.civ("Rome").unwrap().cities.iter().any(|id| *id == 2));
        assert!(!state.civ("Carthage").unwrap().cities.iter().any(|id| *id == 2));
        assert_eq!(
            state.civ("Rome").unwrap().gold,
            gold_before + summary.gold_plundered
        );
        assert!(utica.free_population() == 0);
    }

    #[test]
    fn test_conquest_repercussions() {
        let mut state = WorldStateBuilder::new()
            .with_map(8)
            .with_civ("Rome")
            .with_civ("Carthage")
            .with_civ("Greece")
            .with_civ("Egypt")
            .with_city_state("Sidon")
            .at_war("Rome", "Carthage")
            .at_war("Greece", "Carthage")
            .knowing("Rome", "Greece")
            .knowing("Rome", "Egypt")
            .knowing("Rome", "Sidon")
            .with_city("Carthage", "Carthago", HexCoord::new(-5, 0), 4)
            .with_city("Carthage", "Utica", HexCoord::new(4, 0), 6)
            .build();

        repercussions_for_conquering(&mut state, 1, "Carthage", "Rome").unwrap();

        let manager = |of: &str| state.civ(of).unwrap().diplomacy[&"Rome".to_string()].clone();
        // 10 + round(100 * 6 / 10) = 70
        assert_eq!(manager("Carthage").modifier(DiplomaticModifier::CapturedOurCities), -70.0);
        // The victim is not also judged as a bystander.
        assert_eq!(manager("Carthage").modifier(DiplomaticModifier::WarMongerer), 0.0);
        assert_eq!(manager("Carthage").opinion(), -70.0);
        assert_eq!(manager("Greece").modifier(DiplomaticModifier::SharedEnemy), 7.0);
        assert_eq!(manager("Egypt").modifier(DiplomaticModifier::WarMongerer), -7.0);
        assert_eq!(manager("Sidon").opinion(), 0.0);
    }

    #[test]
    fn test_conquest_meets_unknown_victim() {
        let mut state = WorldStateBuilder::new()
            .with_map(8)
            .with_civ("Rome")
            .with_civ("Carthage")
            .with_city("Rome", "Roma", HexCoord::ORIGIN, 2)
            .with_city("Carthage", "Utica", HexCoord::new(4, 0), 2)
            .build();

        repercussions_for_conquering(&mut state, 1, "Carthage", "Rome").unwrap();

        assert!(state.civ("Rome").unwrap().knows("Carthage"));
        assert!(state.civ("Carthage").unwrap().knows("Rome"));
    }

    #[test]
    fn test_reconquest_in_resistance_clears_flag() {
        let mut state = war().build();
        let ranker = YieldRanker::default();
        resolve_conquest(&mut state, 2, "Rome", ConquestOutcome::Puppet, &ranker).unwrap();
        assert!(state.city(2).unwrap().is_in_resistance());

        resolve_conquest(&mut state, 2, "Carthage", ConquestOutcome::Annex, &ranker).unwrap();

        let utica = state.city(2).unwrap();
        assert_eq!(utica.civ, "Carthage");
        assert!(!utica.is_in_resistance());
        assert!(!utica.is_puppet);
    }

    #[test]
    fn test_annex_outcome() {
        let mut state = war().build();
        resolve_conquest(&mut state, 2, "Rome", ConquestOutcome::Annex, &YieldRanker::default()).unwrap();

        let utica = state.city(2).unwrap();
        assert!(!utica.is_puppet);
        assert!(utica.is_in_resistance());
        assert!(!utica.should_reassign_population);
        assert!(state
            .events
            .iter()
            .any(|e| matches!(e, GameEvent::CityAnnexed { city: 2, .. })));
    }

    #[test]
    fn test_capturing_own_city_rejected() {
        let mut state = war().build();
        let before = state.checksum();
        let result = resolve_conquest(&mut state, 0, "Rome", ConquestOutcome::Puppet, &YieldRanker::default());
        assert!(matches!(result, Err(CityError::CityNotCapturable { .. })));
        assert_eq!(state.checksum(), before);
    }

    #[test]
    fn test_spies_flee_captured_city() {
        let mut state = war().build();
        state.city_mut(2).unwrap().spies.push(Spy {
            name: "Hannibal's agent".to_string(),
            owner: "Rome".to_string(),
        });

        resolve_conquest(&mut state, 2, "Rome", ConquestOutcome::Puppet, &YieldRanker::default()).unwrap();

        assert!(state.city(2).unwrap().spies.is_empty());
        assert!(state.events.iter().any(|e| matches!(
            e,
            GameEvent::SpyRemoved {
                reason: SpyFleeReason::CityCaptured,
                ..
            }
        )));
    }

    #[test]
    fn test_losing_city_triggers_fire() {
        let mut state = war().build();
        state
            .civ_mut("Carthage")
            .unwrap()
            .triggers_on_losing_city
            .push(TriggeredEffect::GainGold(25));

        resolve_conquest(&mut state, 2, "Rome", ConquestOutcome::Puppet, &YieldRanker::default()).unwrap();
        assert_eq!(state.civ("Carthage").unwrap().gold, 25);
    }

    #[test]
    fn test_last_city_destroys_civ() {
        let mut state = WorldStateBuilder::new()
            .with_map(8)
            .with_civ("Rome")
            .with_civ("Carthage")
            .at_war("Rome", "Carthage")
            .with_city("Rome", "Roma", HexCoord::ORIGIN, 3)
            .with_city("Carthage", "Utica", HexCoord::new(4, 0), 3)
            .build();

        resolve_conquest(&mut state, 1, "Rome", ConquestOutcome::Annex, &YieldRanker::default()).unwrap();

        assert!(state.is_defeated("Carthage"));
        assert!(state
            .events
            .iter()
            .any(|e| matches!(e, GameEvent::CivilizationDestroyed { civ, .. } if civ == "Carthage")));
    }

    #[test]
    fn test_liberation_without_founder_falls_back_to_annex() {
        let mut state = war().build();
        state.city_mut(2).unwrap().founding_civ = None;

        resolve_conquest(&mut state, 2, "Rome", ConquestOutcome::Liberate, &YieldRanker::default()).unwrap();

        let utica = state.city(2).unwrap();
        assert_eq!(utica.civ, "Rome");
        assert!(!utica.is_puppet);
    }

    #[test]
    fn test_liberating_city_state() {
        let mut state = WorldStateBuilder::new()
            .with_map(8)
            .with_civ("Rome")
            .with_civ("Carthage")
            .with_city_state("Sidon")
            .at_war("Rome", "Carthage")
            .at_war("Rome", "Sidon")
            .with_city("Rome", "Roma", HexCoord::ORIGIN, 3)
            .with_city("Carthage", "Carthago", HexCoord::new(-5, 0), 3)
            .with_city("Sidon", "Sidon", HexCoord::new(0, 5), 2)
            .with_city("Sidon", "Tyre", HexCoord::new(5, 0), 2)
            .build();
        let ranker = YieldRanker::default();
        // Carthage took Tyre earlier.
        crate::systems::transfer::move_to_civ(&mut state, 3, "Carthage", &ranker).unwrap();

        resolve_conquest(&mut state, 3, "Rome", ConquestOutcome::Liberate, &ranker).unwrap();

        let tyre = state.city(3).unwrap();
        assert_eq!(tyre.civ, "Sidon");
        assert!(!tyre.is_in_resistance());
        assert!(!state.is_at_war("Rome", "Sidon"));
        let sidon_view = &state.civ("Sidon").unwrap().diplomacy[&"Rome".to_string()];
        assert_eq!(sidon_view.influence, 90.0);
    }

    #[test]
    fn test_liberating_major_grants_open_borders() {
        let mut state = WorldStateBuilder::new()
            .with_map(8)
            .with_civ("Rome")
            .with_civ("Carthage")
            .with_civ("Greece")
            .at_war("Rome", "Carthage")
            .knowing("Rome", "Greece")
            .with_city("Rome", "Roma", HexCoord::ORIGIN, 3)
            .with_city("Carthage", "Carthago", HexCoord::new(-5, 0), 3)
            .with_city("Greece", "Athens", HexCoord::new(0, 5), 3)
            .with_city("Greece", "Sparta", HexCoord::new(5, 0), 3)
            .build();
        let ranker = YieldRanker::default();
        crate::systems::transfer::move_to_civ(&mut state, 3, "Carthage", &ranker).unwrap();

        resolve_conquest(&mut state, 3, "Rome", ConquestOutcome::Liberate, &ranker).unwrap();

        let greek_view = &state.civ("Greece").unwrap().diplomacy[&"Rome".to_string()];
        assert!(greek_view.open_borders);
        // 10 + round(100 * 3 / 6) = 60, plus a tenth as a third party.
        assert_eq!(greek_view.modifier(DiplomaticModifier::CapturedOurCities), 60.0);
        assert_eq!(greek_view.modifier(DiplomaticModifier::LiberatedCity), 6.0);
        assert_eq!(state.city(3).unwrap().civ, "Greece");
    }

    #[test]
    fn test_liberation_moves_foreign_units_out_of_center() {
        let mut state = WorldStateBuilder::new()
            .with_map(8)
            .with_civ("Rome")
            .with_civ("Carthage")
            .with_civ("Greece")
            .at_war("Rome", "Carthage")
            .with_city("Rome", "Roma", HexCoord::ORIGIN, 3)
            .with_city("Greece", "Athens", HexCoord::new(0, 5), 3)
            .with_city("Greece", "Sparta", HexCoord::new(5, 0), 3)
            .with_unit("Rome", HexCoord::new(5, 0), UnitKind::Military)
            .build();
        let ranker = YieldRanker::default();
        crate::systems::transfer::move_to_civ(&mut state, 2, "Carthage", &ranker).unwrap();

        resolve_conquest(&mut state, 2, "Rome", ConquestOutcome::Liberate, &ranker).unwrap();

        let unit = &state.units[&0];
        assert_ne!(unit.position, HexCoord::new(5, 0));
    }
}
