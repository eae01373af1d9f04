//! Append-only records of what happened during a game.
//!
//! [`TileHistory`] keeps every ownership change per tile for replay and
//! audit. [`GameEvent`] captures notable city and civilization transitions
//! and serializes as one JSON object per line:
//!
//! ```json
//! {"type":"city_conquered","turn":42,"city":3,"from":"Rome","to":"Carthage",...}
//! ```

use crate::state::{CityId, CivName, HexCoord, Turn, Vector};
use serde::{Deserialize, Serialize};
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EventLogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnershipChange {
    TakeOwnership,
    Relinquish,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileHistoryRecord {
    pub turn: Turn,
    pub position: HexCoord,
    pub owner_civ: Option<CivName>,
    pub owning_city: Option<CityId>,
    pub kind: OwnershipChange,
}

/// Write-only sink of tile ownership changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TileHistory {
    records: Vector<TileHistoryRecord>,
}

impl TileHistory {
    pub fn record(&mut self, record: TileHistoryRecord) {
        self.records.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn for_tile(&self, position: HexCoord) -> impl Iterator<Item = &TileHistoryRecord> {
        self.records.iter().filter(move |r| r.position == position)
    }
}

/// Why a spy left a city.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpyFleeReason {
    CityCaptured,
    CityDestroyed,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    /// City taken by force; `to` is the receiving civilization.
    CityConquered {
        turn: Turn,
        city: CityId,
        city_name: String,
        from: CivName,
        to: CivName,
        conqueror: CivName,
        gold_plundered: i32,
        buildings_destroyed: u32,
    },
    /// City handed over without conquest (trade, peace deal).
    CityTransferred {
        turn: Turn,
        city: CityId,
        from: CivName,
        to: CivName,
    },
    CityPuppeted {
        turn: Turn,
        city: CityId,
        civ: CivName,
    },
    CityAnnexed {
        turn: Turn,
        city: CityId,
        civ: CivName,
    },
    CityLiberated {
        turn: Turn,
        city: CityId,
        liberator: CivName,
        founder: CivName,
        /// The founder had no other city left.
        resurrected: bool,
    },
    CityDestroyed {
        turn: Turn,
        city: CityId,
        city_name: String,
        civ: CivName,
    },
    CivilizationDestroyed {
        turn: Turn,
        civ: CivName,
    },
    CapitalMoved {
        turn: Turn,
        civ: CivName,
        city: Option<CityId>,
    },
    BorderExpanded {
        turn: Turn,
        city: CityId,
        tile: HexCoord,
        culture_cost: i32,
    },
    TilePurchased {
        turn: Turn,
        city: CityId,
        tile: HexCoord,
        gold_cost: i32,
    },
    PopulationGrew {
        turn: Turn,
        city: CityId,
        population: u32,
    },
    Starvation {
        turn: Turn,
        city: CityId,
        population: u32,
    },
    SpyRemoved {
        turn: Turn,
        city: CityId,
        owner: CivName,
        reason: SpyFleeReason,
    },
}

/// JSON-lines writer for [`GameEvent`]s.
pub struct EventLog {
    writer: Box<dyn Write + Send>,
}

impl EventLog {
    pub fn stdout() -> Self {
        Self::new(Box::new(BufWriter::new(std::io::stdout())))
    }

    pub fn file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(BufWriter::new(file))))
    }

    /// Accepts any `Write + Send` implementor.
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self { writer }
    }

    /// Write each event as one JSON line, then flush.
    pub fn write_jsonl<'a>(
        &mut self,
        events: impl IntoIterator<Item = &'a GameEvent>,
    ) -> Result<usize, EventLogError> {
        let mut written = 0;
        for event in events {
            serde_json::to_writer(&mut self.writer, event)?;
            self.writer.write_all(b"\n")?;
            written += 1;
        }
        self.writer.flush()?;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    struct OutputCapture(Arc<Mutex<Cursor<Vec<u8>>>>);

    impl Write for OutputCapture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_events_written_one_per_line() {
        let output = Arc::new(Mutex::new(Cursor::new(Vec::new())));
        let mut log = EventLog::new(Box::new(OutputCapture(output.clone())));

        let events = vec![
            GameEvent::CityAnnexed {
                turn: 3,
                city: 1,
                civ: "Rome".to_string(),
            },
            GameEvent::BorderExpanded {
                turn: 4,
                city: 1,
                tile: HexCoord::new(2, 0),
                culture_cost: 10,
            },
        ];
        assert_eq!(log.write_jsonl(&events).unwrap(), 2);

        let bytes = output.lock().unwrap().get_ref().clone();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(r#""type":"city_annexed""#));
        assert!(lines[1].contains(r#""type":"border_expanded""#));

        let parsed: GameEvent = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed, events[1]);
    }

    #[test]
    fn test_tile_history_filters_by_position() {
        let mut history = TileHistory::default();
        let a = HexCoord::new(1, 0);
        let b = HexCoord::new(0, 1);
        for (pos, kind) in [
            (a, OwnershipChange::TakeOwnership),
            (b, OwnershipChange::TakeOwnership),
            (a, OwnershipChange::Relinquish),
        ] {
            history.record(TileHistoryRecord {
                turn: 1,
                position: pos,
                owner_civ: None,
                owning_city: None,
                kind,
            });
        }

        assert_eq!(history.len(), 3);
        let kinds: Vec<_> = history.for_tile(a).map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![OwnershipChange::TakeOwnership, OwnershipChange::Relinquish]
        );
    }
}
