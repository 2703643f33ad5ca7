//! Blocking (temporary access restriction) model

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{Entity, EntityKind};

/// Reason a path is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockingType {
    /// Nesting birds
    Bird,
    /// Re-equipping in progress
    Build,
    /// Worn or unsafe hardware
    Old,
    /// Protected vegetation
    Plants,
    /// Rockfall or other danger
    Dangerous,
    /// Reason this client does not know yet
    #[serde(other)]
    Unknown,
}

/// Yearly day/month window, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockingRecurrence {
    pub from_day: u32,
    pub from_month: u32,
    pub to_day: u32,
    pub to_month: u32,
}

impl BlockingRecurrence {
    /// Whether `(month, day)` falls in the window. Windows whose end precedes
    /// their start wrap the year end (e.g. 1 Dec - 15 Feb).
    pub fn contains(&self, month: u32, day: u32) -> bool {
        let current = (month, day);
        let from = (self.from_month, self.from_day);
        let to = (self.to_month, self.to_day);
        if from <= to {
            from <= current && current <= to
        } else {
            current >= from || current <= to
        }
    }
}

/// A restriction attached to a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blocking {
    pub id: i64,
    /// Last update timestamp (Unix ms)
    pub timestamp: i64,
    pub path_id: i64,
    #[serde(rename = "type")]
    pub block_type: BlockingType,
    #[serde(default)]
    pub recurrence: Option<BlockingRecurrence>,
    /// Fixed end instant (Unix ms) for one-off blockings
    #[serde(default)]
    pub end_date: Option<i64>,
}

impl Blocking {
    /// Whether the blocking applies at `now`.
    ///
    /// A blocking with neither a recurrence nor an end date is permanent.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        if let Some(recurrence) = &self.recurrence {
            return recurrence.contains(now.month(), now.day());
        }
        self.end_date
            .map_or(true, |end_date| now.timestamp_millis() <= end_date)
    }
}

impl Entity for Blocking {
    const KIND: EntityKind = EntityKind::Blocking;

    fn id(&self) -> i64 {
        self.id
    }

    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn set_timestamp(&mut self, timestamp: i64) {
        self.timestamp = timestamp;
    }

    fn parent_id(&self) -> Option<i64> {
        Some(self.path_id)
    }

    fn sort_key(&self) -> String {
        format!("{:012}", self.id)
    }
}
