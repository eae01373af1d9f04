//! City simulation systems.

pub mod city_turn;
pub mod conquest;
pub mod expansion;
pub mod ownership;
pub mod population;
pub mod stats;
pub mod transfer;

pub use city_turn::{destroy_city, run_city_turns};
pub use conquest::{annex_city, resolve_conquest, CaptureSummary, CityConquest, ConquestOutcome};
pub use expansion::{buy_tile, can_buy_tile, culture_to_next_tile, gold_cost_of_tile};
pub use ownership::{relinquish_ownership, take_ownership};
pub use population::{auto_assign, food_to_next_population, unassign_extra};
pub use stats::{compute_stats, update_stats};
pub use transfer::{move_capital_to, move_capital_to_next_largest, move_to_civ, transfer_city};
