use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] crag_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Invalid file id: {0}")]
    InvalidFileId(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error(
        "No catalog server configured. Run `crag config init --api-url URL` or set CRAG_API_URL."
    )]
    ServerNotConfigured,
    #[error("Interrupted")]
    Interrupted,
}
