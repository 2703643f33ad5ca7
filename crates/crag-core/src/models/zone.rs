//! Zone model

use serde::{Deserialize, Serialize};

use super::entity::{Entity, EntityKind};

/// Labeled marker shown on a zone map (parking, path start, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub label: String,
    #[serde(default)]
    pub icon: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

/// A zone inside an area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: i64,
    /// Last update timestamp (Unix ms)
    pub timestamp: i64,
    pub area_id: i64,
    pub display_name: String,
    pub web_url: String,
    pub image: String,
    /// KMZ track file id
    pub kmz: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub points: Vec<PointOfInterest>,
}

impl Entity for Zone {
    const KIND: EntityKind = EntityKind::Zone;

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
        Some(self.area_id)
    }

    fn sort_key(&self) -> String {
        self.display_name.to_lowercase()
    }

    fn file_ids(&self) -> Vec<&str> {
        vec![self.image.as_str(), self.kmz.as_str()]
    }
}
