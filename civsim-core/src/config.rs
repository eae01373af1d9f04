use serde::{Deserialize, Serialize};

/// Simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Compute checksum every N turns (0 = disabled).
    pub checksum_frequency: u32,
    /// Record game events into `WorldState::events`.
    pub record_events: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            checksum_frequency: 1,
            record_events: true,
        }
    }
}

/// Game speed multipliers applied to growth and border costs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameSpeed {
    pub name: String,
    /// Scales food needed to grow.
    pub growth_modifier: f32,
    /// Scales culture needed for the next tile.
    pub culture_cost_modifier: f32,
    /// Scales gold cost of buying tiles.
    pub gold_cost_modifier: f32,
}

impl GameSpeed {
    pub fn standard() -> Self {
        Self {
            name: "Standard".to_string(),
            growth_modifier: 1.0,
            culture_cost_modifier: 1.0,
            gold_cost_modifier: 1.0,
        }
    }

    pub fn quick() -> Self {
        Self {
            name: "Quick".to_string(),
            growth_modifier: 0.67,
            culture_cost_modifier: 0.67,
            gold_cost_modifier: 0.67,
        }
    }

    pub fn epic() -> Self {
        Self {
            name: "Epic".to_string(),
            growth_modifier: 1.5,
            culture_cost_modifier: 1.5,
            gold_cost_modifier: 1.5,
        }
    }
}

impl Default for GameSpeed {
    fn default() -> Self {
        Self::standard()
    }
}

/// Difficulty level. Only the AI growth modifier affects the city core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Difficulty {
    pub name: String,
    /// Multiplier on food-to-grow for AI-controlled civilizations.
    pub ai_city_growth_modifier: f32,
}

impl Default for Difficulty {
    fn default() -> Self {
        Self {
            name: "Prince".to_string(),
            ai_city_growth_modifier: 1.0,
        }
    }
}

/// Rules shared by every city in a game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GameRules {
    pub speed: GameSpeed,
    pub difficulty: Difficulty,
    /// Max distance from the center at which a city works tiles.
    pub city_work_range: u32,
    /// Max distance from the center at which a city claims tiles.
    pub city_expand_range: u32,
    /// Health of a city with no defensive buildings.
    pub base_city_health: i32,
    pub religion_enabled: bool,
    /// Influence a city-state holds toward whoever liberates one of its cities.
    pub liberated_city_state_influence: f32,
    /// Percent chance that an ordinary building is destroyed on capture.
    pub building_destruction_chance: u32,
    /// Search radius for relocating displaced units.
    pub unit_displacement_radius: u32,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            speed: GameSpeed::default(),
            difficulty: Difficulty::default(),
            city_work_range: 3,
            city_expand_range: 5,
            base_city_health: 200,
            religion_enabled: false,
            liberated_city_state_influence: 90.0,
            building_destruction_chance: 34,
            unit_displacement_radius: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SimConfig::default();
        assert_eq!(config.checksum_frequency, 1);
        assert!(config.record_events);
    }

    #[test]
    fn test_default_rules() {
        let rules = GameRules::default();
        assert_eq!(rules.city_work_range, 3);
        assert_eq!(rules.city_expand_range, 5);
        assert_eq!(rules.building_destruction_chance, 34);
    }

    #[test]
    fn test_partial_rules_fill_defaults() {
        let rules: GameRules = serde_json::from_str(r#"{"city_work_range": 2}"#).unwrap();
        assert_eq!(rules.city_work_range, 2);
        assert_eq!(rules.base_city_health, 200);
        assert_eq!(rules.speed, GameSpeed::standard());
    }
}
