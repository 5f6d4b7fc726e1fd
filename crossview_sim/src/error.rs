//! Error types for the simulation harness.

use crossview_core::TopologyError;
use crossview_env::EnvError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("Feed error: {0}")]
    Env(#[from] EnvError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}
