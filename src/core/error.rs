//! Error types for the Vantage viewer core

use thiserror::Error;

/// Main error type for the viewer core
#[derive(Debug, Error)]
pub enum Error {
    #[error("world error: {0}")]
    World(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("asset error: {0}")]
    Asset(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
