use anyhow::{bail, Context, Result};
use civsim_core::testing::WorldStateBuilder;
use civsim_core::{
    BuildingDef, CivName, GameRules, HexCoord, PlayerInputs, SimConfig, UnitKind, WorldState,
    Yields,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// A playable scenario: the starting world plus scripted commands.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub rules: GameRules,
    #[serde(default)]
    pub config: SimConfig,
    pub map_radius: u32,
    #[serde(default)]
    pub buildings: Vec<BuildingDef>,
    #[serde(default)]
    pub specialists: BTreeMap<String, Yields>,
    pub civilizations: Vec<ScenarioCiv>,
    pub cities: Vec<ScenarioCity>,
    #[serde(default)]
    pub units: Vec<ScenarioUnit>,
    #[serde(default)]
    pub contacts: Vec<(CivName, CivName)>,
    #[serde(default)]
    pub wars: Vec<(CivName, CivName)>,
    /// Default turn count when none is given on the command line.
    #[serde(default = "default_turns")]
    pub turns: u32,
    /// Turn number -> inputs issued before that turn resolves.
    #[serde(default)]
    pub script: BTreeMap<u32, Vec<PlayerInputs>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioCiv {
    pub name: CivName,
    #[serde(default)]
    pub city_state: bool,
    #[serde(default)]
    pub human: bool,
    #[serde(default)]
    pub gold: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioCity {
    pub civ: CivName,
    pub name: String,
    pub location: HexCoord,
    #[serde(default = "default_population")]
    pub population: u32,
    #[serde(default)]
    pub buildings: Vec<String>,
    /// Founder when different from the current owner.
    #[serde(default)]
    pub founded_by: Option<CivName>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioUnit {
    pub owner: CivName,
    pub position: HexCoord,
    pub kind: UnitKind,
}

fn default_turns() -> u32 {
    10
}

fn default_population() -> u32 {
    1
}

pub fn load_scenario(path: &Path) -> Result<Scenario> {
    log::info!("Loading scenario from {:?}", path);
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario {}", path.display()))?;
    let scenario: Scenario = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse scenario {}", path.display()))?;
    log::info!(
        "Loaded {} civilizations, {} cities, {} scripted turns",
        scenario.civilizations.len(),
        scenario.cities.len(),
        scenario.script.len()
    );
    Ok(scenario)
}

impl Scenario {
    /// Build the starting world, rejecting references to unknown civs or buildings.
    pub fn build_world(&self) -> Result<WorldState> {
        let known = |name: &str| self.civilizations.iter().any(|c| c.name == name);
        for city in &self.cities {
            if !known(city.civ.as_str()) {
                bail!("City {} belongs to unknown civilization {}", city.name, city.civ);
            }
            if let Some(founder) = city.founded_by.as_deref().filter(|f| !known(*f)) {
                bail!("City {} was founded by unknown civilization {}", city.name, founder);
            }
            for building in &city.buildings {
                let defined = building == civsim_core::testing::PALACE
                    || self.buildings.iter().any(|b| &b.name == building);
                if !defined {
                    bail!("City {} has undefined building {}", city.name, building);
                }
            }
        }
        for (a, b) in self.contacts.iter().chain(&self.wars) {
            if !known(a.as_str()) || !known(b.as_str()) {
                bail!("Diplomatic pair ({}, {}) names an unknown civilization", a, b);
            }
        }

        let mut builder = WorldStateBuilder::new()
            .with_rules(self.rules.clone())
            .with_map(self.map_radius);
        for def in &self.buildings {
            builder = builder.with_building_def(def.clone());
        }
        for (name, yields) in &self.specialists {
            builder = builder.with_specialist(name, *yields);
        }
        for civ in &self.civilizations {
            builder = if civ.city_state {
                builder.with_city_state(&civ.name)
            } else {
                builder.with_civ(&civ.name)
            };
            builder = builder.with_gold(&civ.name, civ.gold);
            if civ.human {
                builder = builder.human(&civ.name);
            }
        }
        for city in &self.cities {
            builder = builder.with_city(&city.civ, &city.name, city.location, city.population);
            for building in &city.buildings {
                builder = builder.with_city_building(&city.name, building);
            }
        }
        for unit in &self.units {
            builder = builder.with_unit(&unit.owner, unit.position, unit.kind);
        }
        for (a, b) in &self.contacts {
            builder = builder.knowing(a, b);
        }
        for (a, b) in &self.wars {
            builder = builder.at_war(a, b);
        }

        let mut state = builder.assign_population().build();
        for entry in &self.cities {
            let Some(founder) = &entry.founded_by else {
                continue;
            };
            let id = state
                .cities
                .values()
                .find(|c| c.name == entry.name && c.location == entry.location)
                .map(|c| c.id);
            if let Some(city) = id.and_then(|id| state.cities.get_mut(&id)) {
                city.founding_civ = Some(founder.clone());
                city.is_original_capital = false;
            }
        }
        Ok(state)
    }

    /// Commands scheduled for `turn`.
    pub fn inputs_for(&self, turn: u32) -> &[PlayerInputs] {
        self.script.get(&turn).map(Vec::as_slice).unwrap_or(&[])
    }
}
