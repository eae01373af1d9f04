//! Position-seeded randomness.
//!
//! A [`TileRandom`] is seeded only from a map position, so any two
//! simulations holding the same persisted state draw the same numbers.

use crate::state::HexCoord;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub struct TileRandom {
    rng: StdRng,
}

impl TileRandom {
    pub fn for_tile(position: HexCoord) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed_for(position)),
        }
    }

    /// Uniform integer in `[0, bound)`. Returns 0 for an empty range.
    pub fn next_below(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        self.rng.gen_range(0..bound)
    }

    /// True with probability `percent / 100`.
    pub fn chance(&mut self, percent: u32) -> bool {
        self.next_below(100) < percent
    }
}

fn seed_for(position: HexCoord) -> u64 {
    let packed = ((position.x as u32 as u64) << 32) | position.y as u32 as u64;
    // splitmix64 finalizer
    let mut z = packed.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
