//! Local copies of remote binaries (images, KMZ and GPX tracks).

mod cache;
mod manager;
mod synchronizer;

pub use cache::{CachedFile, FileCache, FileEvent, FileWatch, PartialWrite, Slot};
pub use manager::{FileManager, RefreshSummary};
pub use synchronizer::{SynchronizedFile, UpdateOutcome};
