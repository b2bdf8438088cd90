// src/probe/credentials.rs
use super::{ProbeError, ProbeTarget};
use crate::kubeconfig::{expand, AuthInfo, Cluster, ExecConfig};

use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

const EXEC_INFO_ENV: &str = "KUBERNETES_EXEC_INFO";
const DEFAULT_EXEC_API_VERSION: &str = "client.authentication.k8s.io/v1beta1";
const EXEC_CLUSTER_EXTENSION: &str = "client.authentication.k8s.io/exec";

/// What ends up on the wire for one probe.
#[derive(Debug, Default)]
pub struct Credentials {
    pub bearer_token: Option<String>,
    pub basic: Option<(String, String)>,
    /// PEM, possibly followed by intermediate certificates
    pub client_certificate: Option<Vec<u8>>,
    pub client_key: Option<Vec<u8>>,
}

#[derive(Deserialize)]
struct ExecCredential {
    status: Option<ExecCredentialStatus>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecCredentialStatus {
    token: Option<String>,
    client_certificate_data: Option<String>,
    client_key_data: Option<String>,
}

/// Relative paths in a kubeconfig are relative to the file that holds them.
pub fn resolve_path(path: &str, base_dir: Option<&Path>) -> PathBuf {
    let expanded = expand(path);
    match base_dir {
        Some(base) if expanded.is_relative() => base.join(expanded),
        _ => expanded,
    }
}

/// Inline base64 data wins over a file reference, as in kubectl.
pub async fn read_data_or_file(
    data: Option<&str>,
    file: Option<&str>,
    base_dir: Option<&Path>,
    what: &str,
) -> Result<Option<Vec<u8>>, ProbeError> {
    if let Some(data) = data.filter(|d| !d.is_empty()) {
        return general_purpose::STANDARD
            .decode(data.trim())
            .map(Some)
            .map_err(|e| ProbeError::Credentials(format!("{} is not valid base64: {}", what, e)));
    }

    match file.filter(|f| !f.is_empty()) {
        Some(file) => {
            let path = resolve_path(file, base_dir);
            tokio::fs::read(&path).await.map(Some).map_err(|e| {
                ProbeError::Credentials(format!("cannot read {} {}: {}", what, path.display(), e))
            })
        }
        None => Ok(None),
    }
}

pub async fn resolve(
    target: &ProbeTarget<'_>,
    base_dir: Option<&Path>,
) -> Result<Credentials, ProbeError> {
    let user = target.auth_info;
    let mut credentials = Credentials {
        client_certificate: read_data_or_file(
            user.client_certificate_data.as_deref(),
            user.client_certificate.as_deref(),
            base_dir,
            "client certificate",
        )
        .await?,
        client_key: read_data_or_file(
            user.client_key_data.as_deref(),
            user.client_key.as_deref(),
            base_dir,
            "client key",
        )
        .await?,
        bearer_token: static_token(user, base_dir).await?,
        basic: match (&user.username, &user.password) {
            (Some(username), Some(password)) if !username.is_empty() => {
                Some((username.clone(), password.clone()))
            }
            _ => None,
        },
    };

    if credentials.bearer_token.is_none() {
        if let Some(exec) = &user.exec {
            let status = run_exec_plugin(exec, target.cluster, base_dir, target.timeout).await?;
            credentials.bearer_token = status.token.filter(|t| !t.is_empty());
            if credentials.client_certificate.is_none() {
                credentials.client_certificate = status.client_certificate_data.map(String::into_bytes);
                credentials.client_key = status.client_key_data.map(String::into_bytes);
            }
        }
    }

    Ok(credentials)
}

async fn static_token(user: &AuthInfo, base_dir: Option<&Path>) -> Result<Option<String>, ProbeError> {
    if let Some(token) = user.token.as_deref().filter(|t| !t.is_empty()) {
        return Ok(Some(token.to_string()));
    }

    if let Some(file) = user.token_file.as_deref().filter(|f| !f.is_empty()) {
        let path = resolve_path(file, base_dir);
        let token = tokio::fs::read_to_string(&path).await.map_err(|e| {
            ProbeError::Credentials(format!("cannot read token file {}: {}", path.display(), e))
        })?;
        return Ok(Some(token.trim().to_string()));
    }

    // Legacy auth providers (oidc, gcp, azure) cache their token in the config.
    let cached = user
        .auth_provider
        .as_ref()
        .and_then(|provider| provider.config.as_ref())
        .and_then(|config| {
            config
                .get("id-token")
                .or_else(|| config.get("access-token"))
                .cloned()
        })
        .filter(|t| !t.is_empty());
    Ok(cached)
}

/// The `KUBERNETES_EXEC_INFO` document handed to a credential plugin.
async fn exec_info(
    exec: &ExecConfig,
    cluster: &Cluster,
    base_dir: Option<&Path>,
) -> Result<serde_json::Value, ProbeError> {
    let api_version = exec
        .api_version
        .clone()
        .unwrap_or_else(|| DEFAULT_EXEC_API_VERSION.to_string());
    let mut spec = serde_json::json!({ "interactive": false });

    if exec.provide_cluster_info {
        let mut info = serde_json::Map::new();
        info.insert("server".to_string(), cluster.server.clone().into());
        if let Some(name) = &cluster.tls_server_name {
            info.insert("tls-server-name".to_string(), name.clone().into());
        }
        if cluster.insecure_skip_tls_verify {
            info.insert("insecure-skip-tls-verify".to_string(), true.into());
        }
        if let Some(ca) = read_data_or_file(
            cluster.certificate_authority_data.as_deref(),
            cluster.certificate_authority.as_deref(),
            base_dir,
            "certificate authority",
        )
        .await?
        {
            info.insert(
                "certificate-authority-data".to_string(),
                general_purpose::STANDARD.encode(ca).into(),
            );
        }
        if let Some(proxy) = &cluster.proxy_url {
            info.insert("proxy-url".to_string(), proxy.clone().into());
        }
        if let Some(config) = exec_cluster_config(cluster) {
            info.insert("config".to_string(), config);
        }
        spec["cluster"] = serde_json::Value::Object(info);
    }

    Ok(serde_json::json!({
        "apiVersion": api_version,
        "kind": "ExecCredential",
        "spec": spec,
    }))
}

/// Per-cluster plugin settings live in the cluster's extension list.
fn exec_cluster_config(cluster: &Cluster) -> Option<serde_json::Value> {
    cluster
        .other
        .get("extensions")?
        .as_sequence()?
        .iter()
        .find(|entry| entry.get("name").and_then(|n| n.as_str()) == Some(EXEC_CLUSTER_EXTENSION))
        .and_then(|entry| entry.get("extension"))
        .and_then(|extension| serde_json::to_value(extension).ok())
}

async fn run_exec_plugin(
    exec: &ExecConfig,
    cluster: &Cluster,
    base_dir: Option<&Path>,
    timeout: Duration,
) -> Result<ExecCredentialStatus, ProbeError> {
    // bare names are looked up on PATH, anything with a separator is a path
    let program = if exec.command.contains(std::path::MAIN_SEPARATOR) {
        resolve_path(&exec.command, base_dir)
    } else {
        PathBuf::from(&exec.command)
    };

    let exec_info = exec_info(exec, cluster, base_dir).await?;

    let mut command = Command::new(&program);
    command
        .args(exec.args.iter().flatten())
        .envs(exec.env.iter().flatten().map(|var| (&var.name, &var.value)))
        .env(EXEC_INFO_ENV, exec_info.to_string())
        .stdin(Stdio::null())
        .kill_on_drop(true);

    let output = tokio::time::timeout(timeout, command.output())
        .await
        .map_err(|_| ProbeError::Timeout(timeout))?
        .map_err(|e| {
            ProbeError::Credentials(format!("failed to run {}: {}", program.display(), e))
        })?;

    if !output.status.success() {
        return Err(ProbeError::Credentials(format!(
            "{} exited with {}: {}",
            program.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let credential: ExecCredential = serde_json::from_slice(&output.stdout).map_err(|e| {
        ProbeError::Credentials(format!("{} printed an invalid ExecCredential: {}", program.display(), e))
    })?;
    credential.status.ok_or_else(|| {
        ProbeError::Credentials(format!("{} returned no credential status", program.display()))
    })
}
