//! Area model

use serde::{Deserialize, Serialize};

use super::entity::{Entity, EntityKind};

/// Top-level region of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    pub id: i64,
    /// Last update timestamp (Unix ms)
    pub timestamp: i64,
    pub display_name: String,
    pub web_url: String,
    /// Cover image file id
    pub image: String,
}

impl Entity for Area {
    const KIND: EntityKind = EntityKind::Area;

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
        None
    }

    fn sort_key(&self) -> String {
        self.display_name.to_lowercase()
    }

    fn file_ids(&self) -> Vec<&str> {
        vec![self.image.as_str()]
    }
}
