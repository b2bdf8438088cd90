// src/cleanup/scheduler.rs
use super::CleanupOptions;
use crate::config::IgnoreSet;
use crate::error::{CleanupError, Result};
use crate::kubeconfig::Kubeconfig;
use crate::probe::{ProbeTarget, ReachabilityProbe};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::{JoinHandle, JoinSet};

/// One verdict per context, produced by a worker and consumed once by the partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub context: String,
    pub reachable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

/// Read-only state every worker shares.
struct Shared {
    raw: Arc<Kubeconfig>,
    ignore: Arc<IgnoreSet>,
    probe: Arc<dyn ReachabilityProbe>,
    timeout: Duration,
    completed: AtomicUsize,
}

pub struct Scheduler {
    probe: Arc<dyn ReachabilityProbe>,
    timeout: Duration,
    max_workers: usize,
    progress_interval: Duration,
}

impl Scheduler {
    pub fn new(probe: Arc<dyn ReachabilityProbe>, options: &CleanupOptions) -> Self {
        Self {
            probe,
            timeout: options.timeout,
            max_workers: options.max_workers.max(1),
            progress_interval: options.progress_interval,
        }
    }

    pub fn worker_count(&self, contexts: usize) -> usize {
        contexts.min(self.max_workers)
    }

    /// Queues every context of `raw` and starts the worker pool. Outcomes
    /// are read back from the returned [`ProbeRun`] in completion order.
    pub fn start(&self, raw: Arc<Kubeconfig>, ignore: Arc<IgnoreSet>) -> ProbeRun {
        let total = raw.contexts.len();
        let capacity = total.max(1);

        let (queue_tx, queue_rx) = mpsc::channel::<String>(capacity);
        for name in raw.contexts.keys() {
            // capacity covers every name, so this never waits
            if queue_tx.try_send(name.clone()).is_err() {
                tracing::error!("work queue rejected context {}", name);
            }
        }
        drop(queue_tx);

        let shared = Arc::new(Shared {
            raw,
            ignore,
            probe: Arc::clone(&self.probe),
            timeout: self.timeout,
            completed: AtomicUsize::new(0),
        });

        let queue = Arc::new(Mutex::new(queue_rx));
        let (results_tx, results_rx) = mpsc::channel(capacity);
        let mut workers = JoinSet::new();
        let worker_count = self.worker_count(total);
        for id in 0..worker_count {
            workers.spawn(run_worker(
                id,
                Arc::clone(&queue),
                results_tx.clone(),
                Arc::clone(&shared),
            ));
        }
        drop(results_tx);

        tracing::debug!(
            "probing {} contexts with {} workers, timeout {:?}",
            total,
            worker_count,
            self.timeout
        );

        let (done_tx, done_rx) = oneshot::channel();
        let reporter = spawn_progress_reporter(
            Arc::clone(&shared),
            total,
            self.progress_interval,
            done_rx,
        );

        ProbeRun {
            outcomes: results_rx,
            workers,
            shared,
            total,
            received: 0,
            done: Some(done_tx),
            reporter,
        }
    }
}

/// A started probe run: the merged result stream plus the tasks behind it.
pub struct ProbeRun {
    outcomes: mpsc::Receiver<ProbeOutcome>,
    workers: JoinSet<()>,
    shared: Arc<Shared>,
    total: usize,
    received: usize,
    done: Option<oneshot::Sender<()>>,
    reporter: JoinHandle<()>,
}

impl ProbeRun {
    /// Next outcome in arrival order, `None` once every context has been reported.
    pub async fn next(&mut self) -> Option<ProbeOutcome> {
        if self.received == self.total {
            return None;
        }
        let outcome = self.outcomes.recv().await?;
        self.received += 1;
        Some(outcome)
    }

    pub fn progress(&self) -> Progress {
        Progress {
            completed: self.shared.completed.load(Ordering::Relaxed),
            total: self.total,
        }
    }

    /// Stops the progress reporter and waits for the workers. Fails if a
    /// worker died before every context was accounted for.
    pub async fn finish(mut self) -> Result<()> {
        let mut failure = None;
        while let Some(joined) = self.workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!("probe worker stopped unexpectedly: {}", e);
                failure.get_or_insert_with(|| e.to_string());
            }
        }

        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
        let _ = (&mut self.reporter).await;

        if self.received != self.total {
            return Err(CleanupError::Worker(failure.unwrap_or_else(|| {
                format!("only {} of {} contexts reported", self.received, self.total)
            })));
        }
        Ok(())
    }
}

async fn run_worker(
    id: usize,
    queue: Arc<Mutex<mpsc::Receiver<String>>>,
    results: mpsc::Sender<ProbeOutcome>,
    shared: Arc<Shared>,
) {
    loop {
        let next = queue.lock().await.recv().await;
        let Some(context) = next else {
            break;
        };

        let reachable = check_context(&shared, &context).await;
        shared.completed.fetch_add(1, Ordering::Relaxed);

        if results
            .send(ProbeOutcome { context, reachable })
            .await
            .is_err()
        {
            tracing::debug!("worker {} stopping, result stream closed", id);
            break;
        }
    }
}

async fn check_context(shared: &Shared, name: &str) -> bool {
    if shared.ignore.contains(name) {
        tracing::debug!("{} is in the ignore list, keeping it", name);
        return true;
    }

    let target = match resolve_target(&shared.raw, name, shared.timeout) {
        Ok(target) => target,
        Err(e) => {
            tracing::info!("{}", e);
            return false;
        }
    };

    match tokio::time::timeout(shared.timeout, shared.probe.probe(&target)).await {
        Ok(Ok(())) => {
            tracing::debug!("{} is reachable", name);
            true
        }
        Ok(Err(e)) => {
            tracing::info!("{}: {}", name, e);
            false
        }
        Err(_) => {
            tracing::info!("{}: no response within {:?}", name, shared.timeout);
            false
        }
    }
}

/// Looks up the user and cluster a context points at. A dangling
/// reference is reported as an error for the worker to log.
pub fn resolve_target<'a>(
    raw: &'a Kubeconfig,
    name: &'a str,
    timeout: Duration,
) -> Result<ProbeTarget<'a>> {
    let context = raw
        .contexts
        .get(name)
        .ok_or_else(|| CleanupError::Worker(format!("unknown context {}", name)))?;

    let auth_info =
        raw.auth_infos
            .get(&context.auth_info)
            .ok_or_else(|| CleanupError::MissingAuthInfo {
                context: name.to_string(),
                auth_info: context.auth_info.clone(),
            })?;
    let cluster = raw
        .clusters
        .get(&context.cluster)
        .ok_or_else(|| CleanupError::MissingCluster {
            context: name.to_string(),
            cluster: context.cluster.clone(),
        })?;

    Ok(ProbeTarget {
        context_name: name,
        context,
        cluster,
        auth_info,
        timeout,
    })
}

fn spawn_progress_reporter(
    shared: Arc<Shared>,
    total: usize,
    every: Duration,
    mut done: oneshot::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // the first tick fires immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = &mut done => break,
                _ = ticker.tick() => {
                    tracing::info!(
                        "Finished testing {} of {} connections...",
                        shared.completed.load(Ordering::Relaxed),
                        total
                    );
                }
            }
        }

        tracing::info!(
            "Finished testing {} connections...",
            shared.completed.load(Ordering::Relaxed)
        );
    })
}
