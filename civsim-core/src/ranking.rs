//! Scoring strategies consumed by the population allocator and the border
//! expansion engine.
//!
//! Work and specialist scores are maximised; expansion scores are minimised.

use crate::state::{City, CityFocus, TileState, Yields};

pub trait CityRanker {
    /// Value of a yield bundle to `city`. Higher is better.
    fn rank_stats_for_work(&self, stats: &Yields, city: &City) -> f32;

    /// Value of working `tile`. Higher is better.
    fn rank_tile_for_work(&self, tile: &TileState, city: &City) -> f32 {
        self.rank_stats_for_work(&tile.yields, city)
    }

    /// Value of one more `specialist` producing `stats`. Higher is better.
    fn rank_specialist(&self, specialist: &str, stats: &Yields, city: &City) -> f32;

    /// Cost of claiming `tile` next. Lower is better.
    fn rank_tile_for_expansion(&self, tile: &TileState, city: &City) -> f32;
}

/// Weighted sum of yields, doubling whatever the city focuses on.
#[derive(Debug, Clone, PartialEq)]
pub struct YieldRanker {
    pub food: f32,
    pub production: f32,
    pub gold: f32,
    pub culture: f32,
    pub science: f32,
}

impl Default for YieldRanker {
    fn default() -> Self {
        Self {
            food: 1.0,
            production: 1.0,
            gold: 0.75,
            culture: 0.5,
            science: 0.75,
        }
    }
}

impl YieldRanker {
    fn weighted(&self, stats: &Yields, focus: CityFocus) -> f32 {
        let boost = |f: CityFocus| if focus == f { 2.0 } else { 1.0 };
        stats.food * self.food * boost(CityFocus::Food)
            + stats.production * self.production * boost(CityFocus::Production)
            + stats.gold * self.gold * boost(CityFocus::Gold)
            + stats.culture * self.culture * boost(CityFocus::Culture)
            + stats.science * self.science * boost(CityFocus::Science)
    }
}

impl CityRanker for YieldRanker {
    fn rank_stats_for_work(&self, stats: &Yields, city: &City) -> f32 {
        self.weighted(stats, city.focus)
    }

    fn rank_specialist(&self, _specialist: &str, stats: &Yields, city: &City) -> f32 {
        self.weighted(stats, city.focus)
    }

    fn rank_tile_for_expansion(&self, tile: &TileState, city: &City) -> f32 {
        let distance = city.location.distance_to(tile.position) as f32;
        let mut score = distance * 5.0 - self.weighted(&tile.yields, CityFocus::NoFocus);
        if tile.resource.is_some() {
            score -= 3.0;
        }
        if tile.is_water {
            score += 1.0;
        }
        score
    }
}
