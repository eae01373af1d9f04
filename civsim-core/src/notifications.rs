use crate::state::{HexCoord, Turn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationCategory {
    General,
    Cities,
    Diplomacy,
    War,
}

/// Message delivered to a civilization. Delivery never fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub turn: Turn,
    pub message: String,
    pub location: Option<HexCoord>,
    pub category: NotificationCategory,
}
