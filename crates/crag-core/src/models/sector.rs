//! Sector model

use serde::{Deserialize, Serialize};

use super::entity::{Entity, EntityKind};

/// Part of the day a sector receives sun.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SunTime {
    #[default]
    #[serde(rename = "none")]
    NoSun,
    #[serde(rename = "morning")]
    Morning,
    #[serde(rename = "afternoon")]
    Afternoon,
    #[serde(rename = "day")]
    AllDay,
    #[serde(rename = "latent")]
    Latent,
}

/// A wall or crag inside a zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sector {
    pub id: i64,
    /// Last update timestamp (Unix ms)
    pub timestamp: i64,
    pub zone_id: i64,
    pub display_name: String,
    pub image: String,
    #[serde(default)]
    pub kids_apt: bool,
    #[serde(default)]
    pub sun_time: SunTime,
    /// Approach walk in minutes
    #[serde(default)]
    pub walking_time: i64,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    /// GPX track file id
    #[serde(default)]
    pub gpx: Option<String>,
    /// Lexicographic ordering key assigned by editors
    #[serde(default)]
    pub weight: String,
}

impl Entity for Sector {
    const KIND: EntityKind = EntityKind::Sector;

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
        Some(self.zone_id)
    }

    fn sort_key(&self) -> String {
        self.weight.clone()
    }

    fn file_ids(&self) -> Vec<&str> {
        let mut ids = vec![self.image.as_str()];
        if let Some(gpx) = self.gpx.as_deref() {
            ids.push(gpx);
        }
        ids
    }
}
