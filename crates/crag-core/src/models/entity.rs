//! Entity kinds and the behaviour shared by every synchronizable record

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::util::snake_to_camel;

/// Closed set of synchronizable record kinds.
///
/// Declaration order is parent-before-child; deletion runs in reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Area,
    Zone,
    Sector,
    Path,
    Blocking,
}

impl EntityKind {
    /// All kinds, parents first.
    pub const ALL: [Self; 5] = [
        Self::Area,
        Self::Zone,
        Self::Sector,
        Self::Path,
        Self::Blocking,
    ];

    /// All kinds, children first.
    pub const DELETION_ORDER: [Self; 5] = [
        Self::Blocking,
        Self::Path,
        Self::Sector,
        Self::Zone,
        Self::Area,
    ];

    /// Stable name used for REST endpoints and local storage.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Area => "area",
            Self::Zone => "zone",
            Self::Sector => "sector",
            Self::Path => "path",
            Self::Blocking => "block",
        }
    }

    pub const fn parent(self) -> Option<Self> {
        match self {
            Self::Area => None,
            Self::Zone => Some(Self::Area),
            Self::Sector => Some(Self::Zone),
            Self::Path => Some(Self::Sector),
            Self::Blocking => Some(Self::Path),
        }
    }

    pub const fn child(self) -> Option<Self> {
        match self {
            Self::Area => Some(Self::Zone),
            Self::Zone => Some(Self::Sector),
            Self::Sector => Some(Self::Path),
            Self::Path => Some(Self::Blocking),
            Self::Blocking => None,
        }
    }

    /// JSON key holding the parent id (`zone_id` for sectors, ...).
    pub const fn parent_key(self) -> Option<&'static str> {
        match self {
            Self::Area => None,
            Self::Zone => Some("area_id"),
            Self::Sector => Some("zone_id"),
            Self::Path => Some("sector_id"),
            Self::Blocking => Some("path_id"),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "area" | "areas" => Ok(Self::Area),
            "zone" | "zones" => Ok(Self::Zone),
            "sector" | "sectors" => Ok(Self::Sector),
            "path" | "paths" => Ok(Self::Path),
            "block" | "blocks" | "blocking" | "blockings" => Ok(Self::Blocking),
            other => Err(format!("unknown entity kind '{other}'")),
        }
    }
}

/// A record that can be stored locally and reconciled against the server.
pub trait Entity:
    Serialize + DeserializeOwned + Clone + fmt::Debug + PartialEq + Send + Sync + 'static
{
    const KIND: EntityKind;

    fn id(&self) -> i64;

    /// Last modification instant, epoch milliseconds.
    fn timestamp(&self) -> i64;

    fn set_timestamp(&mut self, timestamp: i64);

    fn parent_id(&self) -> Option<i64>;

    /// Key used to order siblings in listings.
    fn sort_key(&self) -> String;

    /// Synchronized file ids referenced by this record.
    fn file_ids(&self) -> Vec<&str> {
        Vec::new()
    }
}

/// A single changed property ready to be sent as a multipart form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchField {
    /// `camelCase` property name.
    pub name: String,
    /// Text rendering of the local value.
    pub value: String,
}

/// Properties of `local` that differ from `server`, excluding identifiers and
/// the timestamp.
///
/// Null local values are never sent, so clearing a field on the server is not
/// possible through a push.
pub fn changed_fields<E: Entity>(local: &E, server: &E) -> Result<Vec<PatchField>> {
    let Value::Object(local) = serde_json::to_value(local)? else {
        return Err(Error::InvalidInput(format!(
            "{} does not serialize to an object",
            E::KIND
        )));
    };
    let server = serde_json::to_value(server)?;
    let parent_key = E::KIND.parent_key();

    let mut fields = Vec::new();
    for (key, value) in local {
        if key == "id" || key == "timestamp" || Some(key.as_str()) == parent_key {
            continue;
        }
        if value.is_null() || server.get(&key) == Some(&value) {
            continue;
        }
        fields.push(PatchField {
            name: snake_to_camel(&key),
            value: form_value(value),
        });
    }
    Ok(fields)
}

fn form_value(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}
