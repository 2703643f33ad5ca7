//! In-memory server used by engine tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use serde_json::json;

use crate::api::{AreaNode, RemoteApi, SectorNode, TreeSnapshot, ZoneNode};
use crate::error::{Error, Result};
use crate::models::{Area, Blocking, EntityKind, Path, PatchField, Sector, Zone};

pub type Patch = (EntityKind, i64, Vec<PatchField>);

#[derive(Debug, Default)]
pub struct FakeApi {
    credential: bool,
    tree: Mutex<TreeSnapshot>,
    blocks: Mutex<Vec<Blocking>>,
    last_update: Mutex<Option<i64>>,
    patches: Mutex<Vec<Patch>>,
    deletes: Mutex<Vec<(EntityKind, i64)>>,
    patch_failures: Mutex<HashMap<(EntityKind, i64), u16>>,
    delete_statuses: Mutex<HashMap<(EntityKind, i64), u16>>,
    touch_on_write: Mutex<Option<i64>>,
    tree_requests: AtomicUsize,
    last_update_requests: AtomicUsize,
}

impl FakeApi {
    pub fn with_credential() -> Self {
        Self {
            credential: true,
            ..Self::default()
        }
    }

    pub fn set_tree(&self, tree: TreeSnapshot) {
        *self.tree.lock().unwrap() = tree;
    }

    pub fn set_blocks(&self, blocks: Vec<Blocking>) {
        *self.blocks.lock().unwrap() = blocks;
    }

    pub fn set_last_update(&self, last_update: Option<i64>) {
        *self.last_update.lock().unwrap() = last_update;
    }

    /// Server last-update reported after every accepted patch or delete.
    pub fn touch_on_write(&self, last_update: Option<i64>) {
        *self.touch_on_write.lock().unwrap() = last_update;
    }

    fn record_write(&self) {
        if let Some(stamp) = *self.touch_on_write.lock().unwrap() {
            *self.last_update.lock().unwrap() = Some(stamp);
        }
    }

    pub fn fail_patch(&self, kind: EntityKind, id: i64, status: u16) {
        self.patch_failures.lock().unwrap().insert((kind, id), status);
    }

    pub fn delete_status(&self, kind: EntityKind, id: i64, status: u16) {
        self.delete_statuses.lock().unwrap().insert((kind, id), status);
    }

    pub fn patches(&self) -> Vec<Patch> {
        self.patches.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<(EntityKind, i64)> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn tree_requests(&self) -> usize {
        self.tree_requests.load(Ordering::SeqCst)
    }

    pub fn last_update_requests(&self) -> usize {
        self.last_update_requests.load(Ordering::SeqCst)
    }
}

impl RemoteApi for FakeApi {
    async fn tree(&self) -> Result<TreeSnapshot> {
        self.tree_requests.fetch_add(1, Ordering::SeqCst);
        Ok(self.tree.lock().unwrap().clone())
    }

    async fn blocks(&self) -> Result<Vec<Blocking>> {
        Ok(self.blocks.lock().unwrap().clone())
    }

    async fn last_update(&self) -> Result<Option<i64>> {
        self.last_update_requests.fetch_add(1, Ordering::SeqCst);
        Ok(*self.last_update.lock().unwrap())
    }

    fn has_credential(&self) -> bool {
        self.credential
    }

    async fn patch(&self, kind: EntityKind, id: i64, fields: &[PatchField]) -> Result<()> {
        if !self.credential {
            return Err(Error::MissingCredential);
        }
        if let Some(status) = self.patch_failures.lock().unwrap().get(&(kind, id)) {
            return Err(Error::request_failed(*status, "rejected"));
        }
        self.patches
            .lock()
            .unwrap()
            .push((kind, id, fields.to_vec()));
        self.record_write();
        Ok(())
    }

    async fn delete(&self, kind: EntityKind, id: i64) -> Result<()> {
        let status = self
            .delete_statuses
            .lock()
            .unwrap()
            .get(&(kind, id))
            .copied()
            .unwrap_or(200);
        if status != 200 && status != 410 {
            return Err(Error::request_failed(status, "refused"));
        }
        self.deletes.lock().unwrap().push((kind, id));
        self.record_write();
        Ok(())
    }
}

pub fn sample_path(id: i64, sector_id: i64, timestamp: i64) -> Path {
    serde_json::from_value(json!({
        "id": id,
        "timestamp": timestamp,
        "sector_id": sector_id,
        "display_name": format!("Path {id}"),
        "sketch_id": id,
        "grade": "6a",
    }))
    .unwrap()
}

pub fn sample_area(id: i64, timestamp: i64) -> Area {
    Area {
        id,
        timestamp,
        display_name: format!("Area {id}"),
        web_url: format!("https://example.com/areas/{id}"),
        image: format!("area-image-{id}"),
    }
}

pub fn sample_zone(id: i64, area_id: i64, timestamp: i64) -> Zone {
    serde_json::from_value(json!({
        "id": id,
        "timestamp": timestamp,
        "area_id": area_id,
        "display_name": format!("Zone {id}"),
        "web_url": "",
        "image": format!("zone-image-{id}"),
        "kmz": format!("zone-kmz-{id}"),
        "latitude": 38.7,
        "longitude": -0.47,
    }))
    .unwrap()
}

pub fn sample_sector(id: i64, zone_id: i64, timestamp: i64) -> Sector {
    serde_json::from_value(json!({
        "id": id,
        "timestamp": timestamp,
        "zone_id": zone_id,
        "display_name": format!("Sector {id}"),
        "image": format!("sector-image-{id}"),
        "sun_time": "afternoon",
        "weight": format!("{id:04}"),
    }))
    .unwrap()
}

pub fn sample_blocking(id: i64, path_id: i64, timestamp: i64) -> Blocking {
    serde_json::from_value(json!({
        "id": id,
        "timestamp": timestamp,
        "path_id": path_id,
        "type": "bird",
        "recurrence": {"from_day": 1, "from_month": 1, "to_day": 30, "to_month": 6},
    }))
    .unwrap()
}

/// One area, zone, sector and path, ids 1/10/100/1000, all at `timestamp`.
pub fn sample_tree(timestamp: i64) -> TreeSnapshot {
    TreeSnapshot {
        areas: vec![AreaNode {
            area: sample_area(1, timestamp),
            zones: vec![ZoneNode {
                zone: sample_zone(10, 1, timestamp),
                sectors: vec![SectorNode {
                    sector: sample_sector(100, 10, timestamp),
                    paths: vec![sample_path(1000, 100, timestamp)],
                }],
            }],
        }],
    }
}
