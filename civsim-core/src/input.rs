use crate::state::{CityFocus, CityId, CivName, HexCoord};
use crate::systems::ConquestOutcome;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInputs {
    pub civ: CivName,
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Command {
    // Conquest
    PuppetCity {
        city: CityId,
    },
    /// Capture and annex at once, or annex one of our puppets.
    AnnexCity {
        city: CityId,
    },
    LiberateCity {
        city: CityId,
    },
    RazeCity {
        city: CityId,
    },

    // Territory
    BuyTile {
        city: CityId,
        tile: HexCoord,
    },
    /// Hand one of our cities to another civilization.
    TransferCity {
        city: CityId,
        to: CivName,
    },

    // City management
    SetAvoidGrowth {
        city: CityId,
        avoid: bool,
    },
    SetFocus {
        city: CityId,
        focus: CityFocus,
    },
    LockTile {
        city: CityId,
        tile: HexCoord,
    },
}

impl Command {
    /// Outcome applied when this command captures a foreign city.
    pub fn conquest_outcome(&self) -> Option<ConquestOutcome> {
        match self {
            Command::PuppetCity { .. } => Some(ConquestOutcome::Puppet),
            Command::AnnexCity { .. } => Some(ConquestOutcome::Annex),
            Command::LiberateCity { .. } => Some(ConquestOutcome::Liberate),
            _ => None,
        }
    }
}
