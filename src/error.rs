// src/error.rs
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CleanupError>;

/// Errors that abort a whole cleanup run.
///
/// Per-context failures never end up here: they are turned into an
/// unreachable outcome inside the worker that produced them. The two
/// `Missing*` variants exist so the worker has something to log.
#[derive(Error, Debug)]
pub enum CleanupError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to serialize output: {0}")]
    Serialize(String),

    #[error("could not determine a kubeconfig path, use --kubeconfig")]
    KubeconfigPath,

    #[error("cluster {cluster:?} not found for context: {context}")]
    MissingCluster { context: String, cluster: String },

    #[error("authInfo {auth_info:?} not found for context: {context}")]
    MissingAuthInfo { context: String, auth_info: String },

    #[error("probe worker failed: {0}")]
    Worker(String),

    #[error("invalid option: {0}")]
    InvalidOption(String),
}

impl CleanupError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn yaml(path: impl Into<PathBuf>, source: serde_yaml::Error) -> Self {
        Self::Yaml {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for CleanupError {
    fn from(error: serde_json::Error) -> Self {
        CleanupError::Serialize(error.to_string())
    }
}

