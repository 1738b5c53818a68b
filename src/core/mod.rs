//! Core module - shared infrastructure for the council
//!
//! This module contains foundational types, configuration, and error handling
//! used throughout the engine.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{CouncilError, Result};
pub use types::*;
