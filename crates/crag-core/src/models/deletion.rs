//! Tombstones for entities deleted locally

use serde::{Deserialize, Serialize};

use super::entity::EntityKind;

/// Queued remote deletion, cleared once the server confirms the entity is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalDeletion {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    #[serde(rename = "deleteId")]
    pub delete_id: i64,
}

impl LocalDeletion {
    pub const fn new(kind: EntityKind, delete_id: i64) -> Self {
        Self { kind, delete_id }
    }
}
