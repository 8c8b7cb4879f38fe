//! Core types and utilities

pub mod types;
pub mod error;
pub mod logging;
pub mod config;
pub mod stats;

pub use types::*;
pub use error::Error;
