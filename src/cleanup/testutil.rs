// src/cleanup/testutil.rs
use crate::kubeconfig::{AuthInfo, Cluster, Context, Kubeconfig};
use crate::probe::{ProbeError, ProbeTarget, ReachabilityProbe};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Builds a config from `(context, cluster, user)` triples, creating every
/// referenced cluster and user.
pub fn config_with(entries: &[(&str, &str, &str)]) -> Kubeconfig {
    let mut config = Kubeconfig::default();
    for (context, cluster, user) in entries {
        config.contexts.insert(
            context.to_string(),
            Context {
                cluster: cluster.to_string(),
                auth_info: user.to_string(),
                ..Context::default()
            },
        );
        config.clusters.insert(
            cluster.to_string(),
            Cluster {
                server: format!("https://{}.example.com:6443", cluster),
                ..Cluster::default()
            },
        );
        config
            .auth_infos
            .insert(user.to_string(), AuthInfo::default());
    }
    config
}

/// Answers from a fixed table and records what it was asked.
pub struct StaticProbe {
    default: bool,
    answers: HashMap<String, bool>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl StaticProbe {
    pub fn all(reachable: bool) -> Self {
        Self {
            default: reachable,
            answers: HashMap::new(),
            delay: None,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn with(mut self, context: &str, reachable: bool) -> Self {
        self.answers.insert(context.to_string(), reachable);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Probed context names, sorted.
    pub fn calls(&self) -> Vec<String> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort();
        calls
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReachabilityProbe for StaticProbe {
    async fn probe(&self, target: &ProbeTarget<'_>) -> Result<(), ProbeError> {
        self.calls
            .lock()
            .unwrap()
            .push(target.context_name.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let reachable = self
            .answers
            .get(target.context_name)
            .copied()
            .unwrap_or(self.default);
        if reachable {
            Ok(())
        } else {
            Err(ProbeError::Status(reqwest::StatusCode::SERVICE_UNAVAILABLE))
        }
    }
}
