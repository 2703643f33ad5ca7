//! Local database layer for the catalog

mod connection;
mod entity_repository;
mod migrations;
mod settings_repository;

pub use connection::Database;
pub use entity_repository::{EntityStore, LibSqlEntityRepository};
pub use settings_repository::{LibSqlSettingsRepository, SettingsRepository};
