//! Data models for the climbing catalog

mod area;
mod blocking;
mod deletion;
mod entity;
mod file_info;
mod path;
mod sector;
mod settings;
mod zone;

pub use area::Area;
pub use blocking::{Blocking, BlockingRecurrence, BlockingType};
pub use deletion::LocalDeletion;
pub use entity::{changed_fields, Entity, EntityKind, PatchField};
pub use file_info::{FileId, RemoteFileInfo};
pub use path::{Builder, Path, Pitch};
pub use sector::{Sector, SunTime};
pub use settings::SyncBookkeeping;
pub use zone::{PointOfInterest, Zone};
