use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CCTrayError {
    #[error("Failed to access stage history at {}: {source}", .path.display())]
    History {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CCTrayError>;
