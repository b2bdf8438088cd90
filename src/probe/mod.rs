// src/probe/mod.rs
mod credentials;
mod http;

use crate::kubeconfig::{AuthInfo, Cluster, Context};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use http::HttpProbe;

/// Everything a probe needs to know about a single context. The cluster and
/// user entries are guaranteed to exist; dangling references never get here.
#[derive(Debug, Clone, Copy)]
pub struct ProbeTarget<'a> {
    pub context_name: &'a str,
    pub context: &'a Context,
    pub cluster: &'a Cluster,
    pub auth_info: &'a AuthInfo,
    pub timeout: Duration,
}

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("invalid server url {url:?}: {reason}")]
    InvalidServer { url: String, reason: String },

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("credentials unavailable: {0}")]
    Credentials(String),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server returned {0}")]
    Status(reqwest::StatusCode),

    #[error("no response within {0:?}")]
    Timeout(Duration),
}

/// A single, non-retrying liveness check against the cluster behind a context.
/// Implementations must give up once `target.timeout` has passed.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn probe(&self, target: &ProbeTarget<'_>) -> Result<(), ProbeError>;
}
