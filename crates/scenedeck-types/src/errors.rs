use thiserror::Error;

pub type Result<T, E = SceneDeckError> = std::result::Result<T, E>;

/// Unified error type covering common failure scenarios across subsystems.
#[derive(Debug, Error)]
pub enum SceneDeckError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("channel error: {0}")]
    Channel(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("asset error: {0}")]
    Asset(String),
    #[error("panel error: {0}")]
    Panel(String),
    #[error("host error: {0}")]
    Host(String),
    #[error("operational error: {0}")]
    Ops(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
