//! Path (climbing route) model

use serde::{Deserialize, Serialize};

use super::entity::{Entity, EntityKind};

/// One pitch of a multi-pitch route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pitch {
    pub grade: String,
    #[serde(default)]
    pub height: Option<i64>,
    #[serde(default)]
    pub ending: Option<String>,
}

/// Person credited with equipping a route, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Builder {
    pub name: String,
    #[serde(default)]
    pub date: Option<String>,
}

/// A climbing route inside a sector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path {
    pub id: i64,
    /// Last update timestamp (Unix ms)
    pub timestamp: i64,
    pub sector_id: i64,
    pub display_name: String,
    /// Number drawn on the sector sketch
    pub sketch_id: i64,
    pub grade: String,
    #[serde(default)]
    pub height: Option<i64>,
    #[serde(default)]
    pub pitches: Vec<Pitch>,

    #[serde(default)]
    pub string_count: i64,
    #[serde(default)]
    pub parabolt_count: i64,
    #[serde(default)]
    pub buril_count: i64,
    #[serde(default)]
    pub piton_count: i64,
    #[serde(default)]
    pub spit_count: i64,
    #[serde(default)]
    pub tensor_count: i64,

    #[serde(default)]
    pub lanyard_required: bool,
    #[serde(default)]
    pub crackers_required: bool,
    #[serde(default)]
    pub friends_required: bool,
    #[serde(default)]
    pub stripes_required: bool,
    #[serde(default)]
    pub pitons_required: bool,
    #[serde(default)]
    pub nuts_required: bool,

    #[serde(default)]
    pub builder: Option<Builder>,
    #[serde(default)]
    pub rebuilders: Vec<Builder>,
    /// Rich-text (HTML) description
    #[serde(default)]
    pub description: Option<String>,
}

impl Path {
    /// Total number of fixed anchors of any type.
    pub const fn hardware_count(&self) -> i64 {
        self.string_count
            + self.parabolt_count
            + self.buril_count
            + self.piton_count
            + self.spit_count
            + self.tensor_count
    }

    /// Whether the route needs any gear beyond quickdraws.
    pub const fn requires_gear(&self) -> bool {
        self.lanyard_required
            || self.crackers_required
            || self.friends_required
            || self.stripes_required
            || self.pitons_required
            || self.nuts_required
    }
}

impl Entity for Path {
    const KIND: EntityKind = EntityKind::Path;

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
        Some(self.sector_id)
    }

    fn sort_key(&self) -> String {
        format!("{:08}", self.sketch_id)
    }
}
