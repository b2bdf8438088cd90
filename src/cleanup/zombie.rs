// src/cleanup/zombie.rs
use crate::kubeconfig::{AuthInfo, Cluster, Kubeconfig};
use std::collections::{BTreeMap, BTreeSet};

/// Clusters and users that no context in the source document points at.
#[derive(Debug, Default)]
pub struct Zombies<'a> {
    pub clusters: BTreeMap<&'a str, &'a Cluster>,
    pub auth_infos: BTreeMap<&'a str, &'a AuthInfo>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZombiePolicy {
    pub cleanup_clusters: bool,
    pub cleanup_users: bool,
}

/// Looks at every context of `raw`, whatever its probe outcome was.
pub fn find_zombies(raw: &Kubeconfig) -> Zombies<'_> {
    let used_clusters: BTreeSet<&str> = raw.contexts.values().map(|c| c.cluster.as_str()).collect();
    let used_users: BTreeSet<&str> = raw
        .contexts
        .values()
        .map(|c| c.auth_info.as_str())
        .collect();

    Zombies {
        clusters: raw
            .clusters
            .iter()
            .filter(|(name, _)| !used_clusters.contains(name.as_str()))
            .map(|(name, cluster)| (name.as_str(), cluster))
            .collect(),
        auth_infos: raw
            .auth_infos
            .iter()
            .filter(|(name, _)| !used_users.contains(name.as_str()))
            .map(|(name, user)| (name.as_str(), user))
            .collect(),
    }
}

/// Zombies are kept unless the matching cleanup flag is set.
pub fn apply_zombie_policy(
    zombies: &Zombies<'_>,
    policy: ZombiePolicy,
    kept: &mut Kubeconfig,
    removed: &mut Kubeconfig,
) {
    let clusters_to = if policy.cleanup_clusters { &mut *removed } else { &mut *kept };
    for (name, cluster) in &zombies.clusters {
        clusters_to
            .clusters
            .insert(name.to_string(), (*cluster).clone());
    }

    let users_to = if policy.cleanup_users { removed } else { kept };
    for (name, user) in &zombies.auth_infos {
        users_to
            .auth_infos
            .insert(name.to_string(), (*user).clone());
    }

    if !zombies.clusters.is_empty() || !zombies.auth_infos.is_empty() {
        tracing::debug!(
            "{} unreferenced clusters ({}), {} unreferenced users ({})",
            zombies.clusters.len(),
            if policy.cleanup_clusters { "removed" } else { "kept" },
            zombies.auth_infos.len(),
            if policy.cleanup_users { "removed" } else { "kept" },
        );
    }
}
