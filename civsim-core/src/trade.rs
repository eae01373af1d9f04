//! Trade offers between two civilizations.
//!
//! The city core only ever builds one-sided or mirrored offers and accepts
//! them immediately. Negotiation and valuation live elsewhere.
//!
//! Offer semantics:
//! - **OpenBorders**: the offering civilization lets the other side's units
//!   pass through its territory.
//! - **PeaceTreaty**: ends any war between the two parties.

use crate::diplomacy;
use crate::error::CityError;
use crate::state::{CivName, WorldState};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeOffer {
    OpenBorders,
    PeaceTreaty,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub our_offers: Vec<TradeOffer>,
    pub their_offers: Vec<TradeOffer>,
}

/// A pending trade from `our_civ`'s point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeLogic {
    pub our_civ: CivName,
    pub their_civ: CivName,
    pub current_trade: Trade,
}

impl TradeLogic {
    pub fn new(our_civ: &str, their_civ: &str) -> Self {
        Self {
            our_civ: our_civ.to_string(),
            their_civ: their_civ.to_string(),
            current_trade: Trade::default(),
        }
    }

    pub fn offer(mut self, offer: TradeOffer) -> Self {
        self.current_trade.our_offers.push(offer);
        self
    }

    pub fn request(mut self, offer: TradeOffer) -> Self {
        self.current_trade.their_offers.push(offer);
        self
    }

    /// Apply both sides of the trade.
    pub fn accept_trade(&self, state: &mut WorldState) -> Result<(), CityError> {
        for offer in &self.current_trade.our_offers {
            apply_offer(state, &self.our_civ, &self.their_civ, *offer)?;
        }
        for offer in &self.current_trade.their_offers {
            apply_offer(state, &self.their_civ, &self.our_civ, *offer)?;
        }
        log::debug!(
            "Trade accepted between {} and {}: {:?}",
            self.our_civ,
            self.their_civ,
            self.current_trade
        );
        Ok(())
    }
}

fn apply_offer(state: &mut WorldState, from: &str, to: &str, offer: TradeOffer) -> Result<(), CityError> {
    match offer {
        TradeOffer::OpenBorders => {
            diplomacy::manager_or_meet(state, from, to)?.open_borders = true;
        }
        TradeOffer::PeaceTreaty => {
            if diplomacy::is_at_war(state, from, to) {
                diplomacy::make_peace(state, from, to)?;
            }
        }
    }
    Ok(())
}
