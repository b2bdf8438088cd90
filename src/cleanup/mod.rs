// src/cleanup/mod.rs
mod partition;
mod scheduler;
#[cfg(test)]
pub(crate) mod testutil;
mod zombie;

pub use partition::Partition;
pub use scheduler::Scheduler;
pub use zombie::{apply_zombie_policy, find_zombies, ZombiePolicy};

use crate::config::IgnoreSet;
use crate::error::{CleanupError, Result};
use crate::kubeconfig::Kubeconfig;
use crate::probe::ReachabilityProbe;
use crate::types::Selection;
use std::sync::Arc;
use std::time::Duration;

pub const MAX_WORKERS: usize = 25;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(3);

/// Inputs of a cleanup run. Never modified once the run starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupOptions {
    pub timeout: Duration,
    pub cleanup_clusters: bool,
    pub cleanup_users: bool,
    pub max_workers: usize,
    pub progress_interval: Duration,
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            cleanup_clusters: false,
            cleanup_users: false,
            max_workers: MAX_WORKERS,
            progress_interval: PROGRESS_INTERVAL,
        }
    }
}

impl CleanupOptions {
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(CleanupError::InvalidOption(
                "timeout must be at least one second".to_string(),
            ));
        }
        if self.max_workers == 0 {
            return Err(CleanupError::InvalidOption(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.progress_interval.is_zero() {
            return Err(CleanupError::InvalidOption(
                "progress interval must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn zombie_policy(&self) -> ZombiePolicy {
        ZombiePolicy {
            cleanup_clusters: self.cleanup_clusters,
            cleanup_users: self.cleanup_users,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleanupResult {
    pub kept: Kubeconfig,
    pub removed: Kubeconfig,
}

impl CleanupResult {
    pub fn select(&self, selection: Selection) -> &Kubeconfig {
        match selection {
            Selection::Kept => &self.kept,
            Selection::Removed => &self.removed,
        }
    }
}

/// Probes every context of `raw` and splits the document into what stays
/// and what goes. Unreachable contexts never fail the run; only a broken
/// worker pool does.
pub async fn run_cleanup(
    raw: Arc<Kubeconfig>,
    ignore: Arc<IgnoreSet>,
    probe: Arc<dyn ReachabilityProbe>,
    options: &CleanupOptions,
) -> Result<CleanupResult> {
    options.validate()?;

    let scheduler = Scheduler::new(probe, options);
    let mut run = scheduler.start(Arc::clone(&raw), ignore);

    let mut partition = Partition::new(&raw);
    while let Some(outcome) = run.next().await {
        partition.record(&outcome);
    }
    let progress = run.progress();
    run.finish().await?;
    tracing::debug!("{} of {} probes completed", progress.completed, progress.total);

    let (mut kept, mut removed) = partition.into_parts();
    apply_zombie_policy(&find_zombies(&raw), options.zombie_policy(), &mut kept, &mut removed);

    tracing::debug!(
        "kept {} contexts, removed {}",
        kept.contexts.len(),
        removed.contexts.len()
    );
    Ok(CleanupResult { kept, removed })
}
