// src/kubeconfig/loader.rs
use super::types::{Kubeconfig, KubeconfigFile};
use crate::error::{CleanupError, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const KUBECONFIG_ENV: &str = "KUBECONFIG";

/// Picks the kubeconfig to clean up, lowest to highest precedence:
/// `~/.kube/config`, then `$KUBECONFIG`, then the `--kubeconfig` flag.
pub fn resolve_kubeconfig_path(
    flag: Option<&str>,
    env: Option<&str>,
    home: Option<&Path>,
) -> Result<PathBuf> {
    if let Some(path) = flag.filter(|p| !p.is_empty()) {
        return Ok(expand(path));
    }

    if let Some(value) = env.filter(|v| !v.is_empty()) {
        let mut paths = std::env::split_paths(value).filter(|p| !p.as_os_str().is_empty());
        if let Some(first) = paths.next() {
            if paths.next().is_some() {
                tracing::warn!(
                    "{} lists several files, only {} will be cleaned up",
                    KUBECONFIG_ENV,
                    first.display()
                );
            }
            return Ok(expand(&first.to_string_lossy()));
        }
    }

    home.map(|home| home.join(".kube").join("config"))
        .ok_or(CleanupError::KubeconfigPath)
}

pub fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}

pub fn load_from_file(path: &Path) -> Result<Kubeconfig> {
    let contents = fs::read_to_string(path).map_err(|e| CleanupError::io(path, e))?;
    let config = parse(&contents).map_err(|e| CleanupError::yaml(path, e))?;

    tracing::debug!(
        "loaded {} with {} contexts, {} clusters, {} users",
        path.display(),
        config.contexts.len(),
        config.clusters.len(),
        config.auth_infos.len()
    );
    Ok(config)
}

pub fn parse(contents: &str) -> std::result::Result<Kubeconfig, serde_yaml::Error> {
    if contents.trim().is_empty() {
        return Ok(Kubeconfig::default());
    }
    let file: KubeconfigFile = serde_yaml::from_str(contents)?;
    Ok(file.into())
}
