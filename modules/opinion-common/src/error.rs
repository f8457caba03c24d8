use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpinionError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Config file error in {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Labeling error: {0}")]
    Labeling(String),

    #[error("Run cancelled")]
    Cancelled,
}

impl OpinionError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        OpinionError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        OpinionError::Json {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, OpinionError>;
