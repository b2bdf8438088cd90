// src/cleanup/partition.rs
use super::scheduler::ProbeOutcome;
use crate::kubeconfig::Kubeconfig;

/// Splits the source document into kept and removed halves, one outcome at a time.
///
/// Only the task draining the result stream owns a `Partition`, so the two
/// halves never need a lock. A cluster or user shared by contexts with
/// different outcomes is copied into both halves.
pub struct Partition<'a> {
    raw: &'a Kubeconfig,
    kept: Kubeconfig,
    removed: Kubeconfig,
}

impl<'a> Partition<'a> {
    pub fn new(raw: &'a Kubeconfig) -> Self {
        Self {
            raw,
            kept: Kubeconfig::empty_like(raw),
            removed: Kubeconfig::empty_like(raw),
        }
    }

    pub fn record(&mut self, outcome: &ProbeOutcome) {
        let target = if outcome.reachable {
            &mut self.kept
        } else {
            &mut self.removed
        };
        copy_context(self.raw, &outcome.context, target);
    }

    pub fn into_parts(self) -> (Kubeconfig, Kubeconfig) {
        (self.kept, self.removed)
    }
}

fn copy_context(raw: &Kubeconfig, name: &str, target: &mut Kubeconfig) {
    let Some(context) = raw.contexts.get(name) else {
        tracing::warn!("outcome for unknown context {}, ignoring", name);
        return;
    };

    target.contexts.insert(name.to_string(), context.clone());
    if let Some(auth_info) = raw.auth_infos.get(&context.auth_info) {
        target
            .auth_infos
            .insert(context.auth_info.clone(), auth_info.clone());
    }
    if let Some(cluster) = raw.clusters.get(&context.cluster) {
        target
            .clusters
            .insert(context.cluster.clone(), cluster.clone());
    }
    if raw.current_context.as_deref() == Some(name) {
        target.current_context = Some(name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleanup::testutil::config_with;

    fn outcome(context: &str, reachable: bool) -> ProbeOutcome {
        ProbeOutcome {
            context: context.to_string(),
            reachable,
        }
    }

    #[test]
    fn routes_context_with_its_cluster_and_user() {
        let raw = config_with(&[("a", "cx", "ux"), ("b", "cy", "uy")]);
        let mut partition = Partition::new(&raw);
        partition.record(&outcome("a", true));
        partition.record(&outcome("b", false));
        let (kept, removed) = partition.into_parts();

        assert!(kept.contexts.contains_key("a"));
        assert!(kept.clusters.contains_key("cx"));
        assert!(kept.auth_infos.contains_key("ux"));
        assert!(!kept.clusters.contains_key("cy"));

        assert!(removed.contexts.contains_key("b"));
        assert!(removed.clusters.contains_key("cy"));
        assert!(removed.auth_infos.contains_key("uy"));
        assert!(!removed.contexts.contains_key("a"));
    }

    #[test]
    fn shared_entries_land_in_both_halves() {
        let raw = config_with(&[("a", "shared", "u1"), ("b", "shared", "u2")]);
        let mut partition = Partition::new(&raw);
        partition.record(&outcome("a", true));
        partition.record(&outcome("b", false));
        let (kept, removed) = partition.into_parts();

        assert!(kept.clusters.contains_key("shared"));
        assert!(removed.clusters.contains_key("shared"));
    }

    #[test]
    fn missing_references_are_skipped() {
        let mut raw = config_with(&[("a", "cx", "ux")]);
        raw.clusters.clear();
        let mut partition = Partition::new(&raw);
        partition.record(&outcome("a", false));
        let (_, removed) = partition.into_parts();

        assert!(removed.contexts.contains_key("a"));
        assert!(removed.clusters.is_empty());
        assert!(removed.auth_infos.contains_key("ux"));
    }

    #[test]
    fn current_context_follows_its_context() {
        let mut raw = config_with(&[("a", "cx", "ux"), ("b", "cy", "uy")]);
        raw.current_context = Some("b".to_string());
        let mut partition = Partition::new(&raw);
        partition.record(&outcome("a", true));
        partition.record(&outcome("b", false));
        let (kept, removed) = partition.into_parts();

        assert_eq!(kept.current_context, None);
        assert_eq!(removed.current_context.as_deref(), Some("b"));
    }

    #[test]
    fn unknown_outcomes_change_nothing() {
        let raw = config_with(&[("a", "cx", "ux")]);
        let mut partition = Partition::new(&raw);
        partition.record(&outcome("ghost", true));
        let (kept, removed) = partition.into_parts();

        assert!(kept.is_empty());
        assert!(removed.is_empty());
    }
}
