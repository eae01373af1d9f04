use crate::config::SimConfig;
use crate::error::CityError;
use crate::input::{Command, PlayerInputs};
use crate::profiling;
use crate::ranking::CityRanker;
use crate::state::{with_rollback, CityId, HexCoord, WorldState};
use crate::systems::{city_turn, conquest, expansion, population, stats, transfer};

/// Result of advancing the world by one turn.
#[derive(Debug, Clone)]
pub struct TurnResult {
    pub state: WorldState,
    /// Present on turns selected by [`SimConfig::checksum_frequency`].
    pub checksum: Option<u64>,
}

/// Advance the world by one turn.
///
/// Each command runs against a scratch copy of the world; a failing command
/// is logged and leaves no trace. City turns run after every command.
#[tracing::instrument(skip_all, name = "step_turn")]
pub fn step_turn(
    state: &WorldState,
    inputs: &[PlayerInputs],
    ranker: &dyn CityRanker,
    config: &SimConfig,
) -> TurnResult {
    let mut new_state = state.clone();
    let events_before = new_state.events.len();

    // 1. Player commands
    for player_input in inputs {
        for cmd in &player_input.commands {
            let civ = player_input.civ.as_str();
            if let Err(e) = with_rollback(&mut new_state, |w| execute_command(w, civ, cmd, ranker)) {
                log::warn!("Failed to execute command for {}: {}", player_input.civ, e);
            }
        }
    }

    // 2. City turns
    if let Err(e) = with_rollback(&mut new_state, |w| city_turn::run_city_turns(w, ranker)) {
        log::warn!("City turns failed on turn {}: {}", new_state.turn, e);
    }

    // 3. Advance the clock
    new_state.turn += 1;
    profiling::frame_mark_turn();

    if !config.record_events {
        new_state.events.truncate(events_before);
    }

    let checksum = (config.checksum_frequency > 0
        && new_state.turn % config.checksum_frequency == 0)
        .then(|| new_state.checksum());
    if let Some(sum) = checksum {
        log::debug!("Turn {} checksum {:016x}", new_state.turn, sum);
    }

    TurnResult {
        state: new_state,
        checksum,
    }
}

fn execute_command(
    state: &mut WorldState,
    civ: &str,
    cmd: &Command,
    ranker: &dyn CityRanker,
) -> Result<(), CityError> {
    state.civ(civ)?;
    match cmd {
        Command::PuppetCity { city } | Command::LiberateCity { city } | Command::AnnexCity { city } => {
            let owner = state.city(*city)?.civ.clone();
            if owner == civ {
                if matches!(cmd, Command::AnnexCity { .. }) && state.city(*city)?.is_puppet {
                    log::info!("{} annexes {}", civ, state.city(*city)?.name);
                    return conquest::annex_city(state, *city);
                }
                return Err(CityError::CityNotCapturable {
                    city: *city,
                    civ: owner,
                });
            }
            if !state.is_at_war(civ, &owner) {
                return Err(CityError::NotAtWar {
                    civ: civ.to_string(),
                    other: owner,
                });
            }
            if matches!(cmd, Command::LiberateCity { .. }) {
                let founder = state.city(*city)?.founding_civ.clone();
                if founder.as_deref().is_some_and(|f| f == owner || f == civ) {
                    return Err(CityError::CityNotCapturable {
                        city: *city,
                        civ: owner,
                    });
                }
            }
            let Some(outcome) = cmd.conquest_outcome() else {
                return Ok(());
            };
            conquest::resolve_conquest(state, *city, civ, outcome, ranker).map(|_| ())
        }
        Command::RazeCity { city } => {
            let target = owned_city(state, civ, *city)?;
            if state.city(target)?.is_original_capital {
                return Err(CityError::CannotRaze(target));
            }
            let city = state.city_mut(target)?;
            city.is_being_razed = true;
            log::info!("{} begins razing {}", civ, city.name);
            Ok(())
        }
        Command::BuyTile { city, tile } => {
            let target = owned_city(state, civ, *city)?;
            expansion::buy_tile(state, target, *tile, ranker)
        }
        Command::TransferCity { city, to } => {
            let target = owned_city(state, civ, *city)?;
            transfer::transfer_city(state, target, to, ranker)
        }
        Command::SetAvoidGrowth { city, avoid } => {
            let target = owned_city(state, civ, *city)?;
            state.city_mut(target)?.avoid_growth = *avoid;
            Ok(())
        }
        Command::SetFocus { city, focus } => {
            let target = owned_city(state, civ, *city)?;
            state.city_mut(target)?.focus = *focus;
            population::reassign_population(state, target, false, ranker)
        }
        Command::LockTile { city, tile } => {
            let target = owned_city(state, civ, *city)?;
            lock_tile(state, target, *tile, ranker)
        }
    }
}

/// The city, if `civ` controls it.
fn owned_city(state: &WorldState, civ: &str, city: CityId) -> Result<CityId, CityError> {
    if state.city(city)?.civ != civ {
        return Err(CityError::NotOwner {
            city,
            civ: civ.to_string(),
        });
    }
    Ok(city)
}

/// Pin a citizen to `tile`; surplus workers are released elsewhere.
fn lock_tile(
    state: &mut WorldState,
    city_id: CityId,
    tile: HexCoord,
    ranker: &dyn CityRanker,
) -> Result<(), CityError> {
    state.tile(tile)?;
    let workable = population::workable_tiles(state, city_id)?;
    let worked_elsewhere = state
        .working_city(tile)
        .is_some_and(|other| other != city_id);
    if !workable.contains(&tile) || worked_elsewhere || state.is_city_center(tile) {
        return Err(CityError::TileNotWorkable {
            city: city_id,
            tile,
        });
    }

    let city = state.city_mut(city_id)?;
    city.worked_tiles.insert(tile);
    city.locked_tiles.insert(tile);
    if state.city(city_id)?.free_population() < 0 {
        population::unassign_extra(state, city_id, ranker)?;
    }
    stats::update_stats(state, city_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::GameEvent;
    use crate::ranking::YieldRanker;
    use crate::state::CityFocus;
    use crate::testing::WorldStateBuilder;

    fn two_civs() -> WorldState {
        WorldStateBuilder::new()
            .with_map(8)
            .with_civ("Rome")
            .with_civ("Gaul")
            .with_gold("Rome", 500)
            .with_city("Rome", "Roma", HexCoord::ORIGIN, 3)
            .with_city("Rome", "Antium", HexCoord::new(4, 0), 2)
            .with_city("Gaul", "Lutetia", HexCoord::new(-4, 0), 4)
            .with_city("Gaul", "Alesia", HexCoord::new(0, 5), 6)
            .at_war("Rome", "Gaul")
            .assign_population()
            .build()
    }

    fn inputs(civ: &str, commands: Vec<Command>) -> Vec<PlayerInputs> {
        vec![PlayerInputs {
            civ: civ.to_string(),
            commands,
        }]
    }

    #[test]
    fn test_step_turn_advances_turn() {
        let state = two_civs();
        let result = step_turn(&state, &[], &YieldRanker::default(), &SimConfig::default());
        assert_eq!(result.state.turn, state.turn + 1);
        assert_eq!(result.checksum, Some(result.state.checksum()));
    }

    #[test]
    fn test_checksum_frequency() {
        let state = two_civs();
        let config = SimConfig {
            checksum_frequency: 2,
            ..SimConfig::default()
        };
        let ranker = YieldRanker::default();
        let first = step_turn(&state, &[], &ranker, &config);
        assert_eq!(first.checksum, None);
        let second = step_turn(&first.state, &[], &ranker, &config);
        assert!(second.checksum.is_some());
    }

    #[test]
    fn test_puppet_command() {
        let state = two_civs();
        let result = step_turn(
            &state,
            &inputs("Rome", vec![Command::PuppetCity { city: 3 }]),
            &YieldRanker::default(),
            &SimConfig::default(),
        );
        let alesia = result.state.city(3).unwrap();
        assert_eq!(alesia.civ, "Rome");
        assert!(alesia.is_puppet);
    }

    #[test]
    fn test_annex_own_puppet() {
        let state = two_civs();
        let ranker = YieldRanker::default();
        let config = SimConfig::default();
        let puppeted = step_turn(&state, &inputs("Rome", vec![Command::PuppetCity { city: 3 }]), &ranker, &config);
        let annexed = step_turn(
            &puppeted.state,
            &inputs("Rome", vec![Command::AnnexCity { city: 3 }]),
            &ranker,
            &config,
        );
        assert!(!annexed.state.city(3).unwrap().is_puppet);
        assert!(annexed
            .state
            .events
            .iter()
            .any(|e| matches!(e, GameEvent::CityAnnexed { city: 3, .. })));
    }

    #[test]
    fn test_capture_requires_war() {
        let state = WorldStateBuilder::new()
            .with_map(6)
            .with_civ("Rome")
            .with_civ("Gaul")
            .with_city("Rome", "Roma", HexCoord::ORIGIN, 2)
            .with_city("Gaul", "Lutetia", HexCoord::new(-4, 0), 2)
            .knowing("Rome", "Gaul")
            .build();
        let result = step_turn(
            &state,
            &inputs("Rome", vec![Command::PuppetCity { city: 1 }]),
            &YieldRanker::default(),
            &SimConfig::default(),
        );
        assert_eq!(result.state.city(1).unwrap().civ, "Gaul");
    }

    #[test]
    fn test_failed_command_rolls_back() {
        let state = two_civs();
        let gold = state.civ("Rome").unwrap().gold;
        // Not adjacent to any of Roma's tiles.
        let far = HexCoord::new(0, -4);
        let result = step_turn(
            &state,
            &inputs(
                "Rome",
                vec![
                    Command::BuyTile { city: 0, tile: far },
                    Command::SetAvoidGrowth { city: 0, avoid: true },
                ],
            ),
            &YieldRanker::default(),
            &SimConfig::default(),
        );
        assert_eq!(result.state.civ("Rome").unwrap().gold, gold);
        assert_eq!(result.state.tile(far).unwrap().owning_city, None);
        // Later commands still run.
        assert!(result.state.city(0).unwrap().avoid_growth);
    }

    #[test]
    fn test_commands_on_foreign_city_rejected() {
        let state = two_civs();
        let result = step_turn(
            &state,
            &inputs("Gaul", vec![Command::RazeCity { city: 1 }]),
            &YieldRanker::default(),
            &SimConfig::default(),
        );
        assert!(!result.state.city(1).unwrap().is_being_razed);
    }

    #[test]
    fn test_original_capital_cannot_be_razed() {
        let state = two_civs();
        let ranker = YieldRanker::default();
        let config = SimConfig::default();
        let result = step_turn(&state, &inputs("Rome", vec![Command::RazeCity { city: 0 }]), &ranker, &config);
        assert!(!result.state.city(0).unwrap().is_being_razed);

        let result = step_turn(&state, &inputs("Rome", vec![Command::RazeCity { city: 1 }]), &ranker, &config);
        let antium = result.state.city(1).unwrap();
        assert!(antium.is_being_razed);
        assert_eq!(antium.population.population, 1);
    }

    #[test]
    fn test_transfer_command() {
        let state = two_civs();
        let result = step_turn(
            &state,
            &inputs(
                "Rome",
                vec![Command::TransferCity {
                    city: 1,
                    to: "Gaul".to_string(),
                }],
            ),
            &YieldRanker::default(),
            &SimConfig::default(),
        );
        assert_eq!(result.state.city(1).unwrap().civ, "Gaul");
        assert!(result.state.civ("Gaul").unwrap().cities.contains(&1));
    }

    #[test]
    fn test_set_focus_and_lock_tile() {
        let state = two_civs();
        let tile = HexCoord::new(1, 1);
        let result = step_turn(
            &state,
            &inputs(
                "Rome",
                vec![
                    Command::SetFocus {
                        city: 0,
                        focus: CityFocus::Production,
                    },
                    Command::LockTile { city: 0, tile },
                ],
            ),
            &YieldRanker::default(),
            &SimConfig::default(),
        );
        let roma = result.state.city(0).unwrap();
        assert_eq!(roma.focus, CityFocus::Production);
        assert!(roma.locked_tiles.contains(&tile));
        assert!(roma.worked_tiles.contains(&tile));
        assert!(roma.free_population() >= 0);
    }

    #[test]
    fn test_events_discarded_when_disabled() {
        let state = two_civs();
        let config = SimConfig {
            record_events: false,
            ..SimConfig::default()
        };
        let result = step_turn(
            &state,
            &inputs("Rome", vec![Command::PuppetCity { city: 3 }]),
            &YieldRanker::default(),
            &config,
        );
        assert_eq!(result.state.events.len(), state.events.len());
        assert_eq!(result.state.city(3).unwrap().civ, "Rome");
    }

    #[test]
    fn test_determinism() {
        let state = two_civs();
        let commands = inputs(
            "Rome",
            vec![
                Command::PuppetCity { city: 3 },
                Command::BuyTile {
                    city: 0,
                    tile: HexCoord::new(2, 0),
                },
            ],
        );
        let ranker = YieldRanker::default();
        let config = SimConfig::default();

        let state_a = step_turn(&state, &commands, &ranker, &config).state;
        let state_b = step_turn(&state, &commands, &ranker, &config).state;

        let json_a = serde_json::to_string(&state_a).unwrap();
        let json_b = serde_json::to_string(&state_b).unwrap();

        assert_eq!(json_a, json_b);
        assert_eq!(state_a.checksum(), state_b.checksum());
    }
}
