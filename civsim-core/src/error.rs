use crate::state::{CityId, CivName};
use hex_grid::HexCoord;
use thiserror::Error;

/// Failures raised by city operations.
///
/// Invariant violations abort the attempted operation only; callers decide
/// how to surface them. Idempotent no-ops never produce an error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CityError {
    #[error("Tile {0} is a city center and cannot change owner")]
    TileIsCityCenter(HexCoord),
    #[error("City {city} owns none of the tiles adjacent to {tile}")]
    TileNotContiguous { city: CityId, tile: HexCoord },
    #[error("City {city} cannot buy tile {tile}")]
    TileNotPurchasable { city: CityId, tile: HexCoord },
    #[error("Insufficient gold: required {required}, available {available}")]
    InsufficientGold { required: i32, available: i32 },
    #[error("Unknown city {0}")]
    UnknownCity(CityId),
    #[error("Unknown civilization {0}")]
    UnknownCiv(CivName),
    #[error("Unknown tile {0}")]
    UnknownTile(HexCoord),
    #[error("Unknown building {0}")]
    UnknownBuilding(String),
    #[error("City {0} has no founding civilization on record")]
    NoFoundingCiv(CityId),
    #[error("City {city} already belongs to {civ}")]
    CityNotCapturable { city: CityId, civ: CivName },
    #[error("City {city} is not controlled by {civ}")]
    NotOwner { city: CityId, civ: CivName },
    #[error("{civ} is not at war with {other}")]
    NotAtWar { civ: CivName, other: CivName },
    #[error("City {city} cannot work tile {tile}")]
    TileNotWorkable { city: CityId, tile: HexCoord },
    #[error("City {0} is an original capital and cannot be razed")]
    CannotRaze(CityId),
}
