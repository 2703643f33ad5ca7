//! Services shared by the CLI and the sync engine.

mod catalog;

pub use catalog::CatalogService;
