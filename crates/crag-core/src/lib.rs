//! crag-core - Core library for Crag
//!
//! Offline-first climbing catalog: the models, the local libSQL store, the
//! content-addressed file cache and the two-way sync engine shared by every
//! Crag client.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod files;
pub mod models;
pub mod services;
pub mod state;
pub mod sync;
pub mod util;

pub use api::{ApiClient, RemoteApi};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use files::{FileCache, FileManager};
pub use models::{Entity, EntityKind, FileId};
pub use services::CatalogService;
pub use state::{SyncState, SyncStatus};
pub use sync::{SyncEngine, SyncOutcome, SyncProgress, SyncReport};
