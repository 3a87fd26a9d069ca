//! Shared domain types for the SceneDeck project.

pub mod assets;
pub mod config;
pub mod messages;
pub mod scene;

mod errors;

pub use errors::{Result, SceneDeckError};
