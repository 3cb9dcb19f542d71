//! Error types for Sangha

use thiserror::Error;

/// Sangha error type
///
/// Only setup and I/O can fail. Faults inside a simulation tick are handled
/// locally by the agent (blacklisting, staying in place) and never surface
/// here.
#[derive(Error, Debug)]
pub enum SanghaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Scenario error: {0}")]
    Scenario(String),
}

impl From<toml::de::Error> for SanghaError {
    fn from(e: toml::de::Error) -> Self {
        SanghaError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SanghaError>;
