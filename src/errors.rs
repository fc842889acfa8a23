// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! These are *process* errors (bad manifest, closed channels, IO). A resource
//! that fails to load is not an error here: it is reported through the item's
//! failure callback as an [`crate::engine::LoadFailure`].

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LazyloadError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Loader channel closed: {0}")]
    ChannelClosed(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, LazyloadError>;
