//! Wire shapes of the snapshot endpoints

use serde::{Deserialize, Serialize};

use crate::models::{Area, Blocking, Path, Sector, Zone};

/// `{ "data": ... }` wrapper used by every JSON endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

/// Full catalog tree as returned by `GET tree`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeSnapshot {
    #[serde(default)]
    pub areas: Vec<AreaNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaNode {
    #[serde(flatten)]
    pub area: Area,
    #[serde(default)]
    pub zones: Vec<ZoneNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneNode {
    #[serde(flatten)]
    pub zone: Zone,
    #[serde(default)]
    pub sectors: Vec<SectorNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorNode {
    #[serde(flatten)]
    pub sector: Sector,
    #[serde(default)]
    pub paths: Vec<Path>,
}

/// The tree split into one list per level, each in parent order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotLevels {
    pub areas: Vec<Area>,
    pub zones: Vec<Zone>,
    pub sectors: Vec<Sector>,
    pub paths: Vec<Path>,
}

impl TreeSnapshot {
    /// Flatten the tree level by level so parents always precede children.
    pub fn into_levels(self) -> SnapshotLevels {
        let mut levels = SnapshotLevels::default();
        let mut zone_nodes = Vec::new();
        for node in self.areas {
            levels.areas.push(node.area);
            zone_nodes.extend(node.zones);
        }

        let mut sector_nodes = Vec::new();
        for node in zone_nodes {
            levels.zones.push(node.zone);
            sector_nodes.extend(node.sectors);
        }

        for node in sector_nodes {
            levels.sectors.push(node.sector);
            levels.paths.extend(node.paths);
        }
        levels
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlocksPayload {
    #[serde(default)]
    pub blocks: Vec<Blocking>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LastUpdatePayload {
    #[serde(default)]
    pub last_update: Option<i64>,
}
