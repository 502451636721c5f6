//! The sessionkeep-cli crate implements the `sessions` operator tool as well as functionality for displaying information in a console UI.

/// The operations behind each `sessions` subcommand.
pub mod commands;
pub mod tracing;
/// Utilities for CLIs
pub mod util;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Failed to load configuration: {0}")]
    Config(#[from] sessionkeep_config::Error),
    #[error("Session store error")]
    Store(#[from] sessionkeep_db::Error),
    #[error("Could not encode session as JSON")]
    Json(#[from] serde_json::Error),
    #[error("Filesystem io error")]
    Io(#[from] std::io::Error),
    #[error("Other error")]
    Other(#[from] color_eyre::Report),
}
