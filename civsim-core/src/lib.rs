//! # Civsim Core
//!
//! Deterministic city simulation for a hex-based 4X strategy game: city
//! conquest (puppet, annex, liberate), peaceful transfer, citizen allocation,
//! border growth and the tile-ownership ledger.
//!
//! The core loop is a pure function: state → commands → state.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌─────────────┐
//! │ PlayerInputs │────▶│  step_turn   │────▶│ WorldState  │
//! │  (commands)  │     │  (pure fn)   │     │ (new state) │
//! └──────────────┘     └──────┬───────┘     └──────┬──────┘
//!                             │                    │
//!                      ┌──────▼───────┐     ┌──────▼──────┐
//!                      │  CityRanker  │     │  GameEvent  │
//!                      │ (heuristics) │     │  (JSONL)    │
//!                      └──────────────┘     └─────────────┘
//! ```
//!
//! ## Key Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`WorldState`] | Tiles, cities, civilizations, units and the event log |
//! | [`Command`] | Player actions (PuppetCity, BuyTile, TransferCity, ...) |
//! | [`step_turn`] | Pure function: `(state, inputs) -> state` |
//! | [`CityRanker`] | Scores tiles and specialists for allocation and expansion |
//! | [`CityError`] | Every way a city operation can be rejected |
//!
//! ## Atomicity
//!
//! All collections in [`WorldState`] are persistent (`im`), so cloning the
//! world is cheap. Multi-step operations such as [`systems::move_to_civ`] and
//! [`systems::resolve_conquest`] run on a scratch copy and commit only when
//! every step succeeds; see [`state::with_rollback`].

pub mod bounded;
pub mod buildings;
pub mod config;
pub mod diplomacy;
pub mod error;
pub mod history;
pub mod input;
pub mod notifications;
pub mod profiling;
pub mod ranking;
pub mod rng;
pub mod ruleset;
pub mod state;
pub mod step;
pub mod systems;
pub mod testing;
pub mod trade;

pub use bounded::{BoundedInt, Health};
pub use buildings::{BuildingDef, BuildingId, BuildingSet};
pub use config::{Difficulty, GameRules, GameSpeed, SimConfig};
pub use error::CityError;
pub use history::{EventLog, GameEvent, SpyFleeReason, TileHistory};
pub use input::{Command, PlayerInputs};
pub use notifications::{Notification, NotificationCategory};
pub use ranking::{CityRanker, YieldRanker};
pub use ruleset::Ruleset;
pub use state::{
    City, CityFlag, CityFocus, CityId, CivName, Civilization, HexCoord, TileState, Unit, UnitKind,
    WorldState, Yields,
};
pub use step::{step_turn, TurnResult};
pub use systems::ConquestOutcome;
