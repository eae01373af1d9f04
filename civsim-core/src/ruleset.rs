//! Static game content: building and specialist definitions.

use crate::buildings::{BuildingDef, BuildingId};
use crate::error::CityError;
use crate::state::{Vector, Yields};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ruleset {
    /// Indexed by `BuildingId`.
    pub buildings: Vector<BuildingDef>,
    /// Per-specialist output, keyed by specialist name.
    pub specialists: BTreeMap<String, Yields>,
}

impl Ruleset {
    /// Register a building, assigning the next free id.
    pub fn add_building(&mut self, mut def: BuildingDef) -> BuildingId {
        let id = BuildingId(self.buildings.len() as u8);
        def.id = id;
        self.buildings.push_back(def);
        id
    }

    pub fn add_specialist(&mut self, name: &str, yields: Yields) {
        self.specialists.insert(name.to_string(), yields);
    }

    pub fn building(&self, id: BuildingId) -> Option<&BuildingDef> {
        self.buildings.get(id.0 as usize)
    }

    pub fn building_by_name(&self, name: &str) -> Option<&BuildingDef> {
        self.buildings.iter().find(|b| b.name == name)
    }

    pub fn id_of(&self, name: &str) -> Result<BuildingId, CityError> {
        self.building_by_name(name)
            .map(|b| b.id)
            .ok_or_else(|| CityError::UnknownBuilding(name.to_string()))
    }

    /// Generic capital marker (the civilization-specific one, if any, is
    /// resolved through [`Ruleset::equivalent_building`]).
    pub fn capital_indicator(&self) -> Option<&BuildingDef> {
        self.buildings
            .iter()
            .find(|b| b.indicates_capital && b.unique_to.is_none())
    }

    /// Capital marker as built by `civ`.
    pub fn capital_indicator_for(&self, civ: &str) -> Result<Option<BuildingId>, CityError> {
        match self.capital_indicator() {
            Some(def) => self.equivalent_building(civ, def.id).map(Some),
            None => Ok(None),
        }
    }

    /// The version of `id` that `civ` builds: its unique replacement if it
    /// has one, otherwise the generic building.
    pub fn equivalent_building(&self, civ: &str, id: BuildingId) -> Result<BuildingId, CityError> {
        let building = self
            .building(id)
            .ok_or_else(|| CityError::UnknownBuilding(id.to_string()))?;

        let generic = match &building.replaces {
            Some(name) => self
                .building_by_name(name)
                .ok_or_else(|| CityError::UnknownBuilding(name.clone()))?,
            None => building,
        };

        let unique = self.buildings.iter().find(|b| {
            b.unique_to.as_deref() == Some(civ) && b.replaces.as_deref() == Some(generic.name.as_str())
        });

        Ok(unique.map_or(generic.id, |b| b.id))
    }
}
