// src/kubeconfig/types.rs
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;

/// Keys we do not model are kept verbatim so they survive a rewrite.
pub type Extra = BTreeMap<String, Value>;

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Cluster {
    #[serde(default)]
    pub server: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_authority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_authority_data: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub insecure_skip_tls_verify: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_server_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
    #[serde(flatten)]
    pub other: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AuthInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_certificate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_certificate_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_key_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(rename = "tokenFile", default, skip_serializing_if = "Option::is_none")]
    pub token_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec: Option<ExecConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_provider: Option<AuthProviderConfig>,
    #[serde(flatten)]
    pub other: Extra,
}

/// Credential plugin invoked to obtain a token or client certificate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecConfig {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<ExecEnvVar>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    /// Pass the cluster's server and CA to the plugin in `KUBERNETES_EXEC_INFO`
    #[serde(default, skip_serializing_if = "is_false")]
    pub provide_cluster_info: bool,
    #[serde(flatten)]
    pub other: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecEnvVar {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthProviderConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    #[serde(default)]
    pub cluster: String,
    #[serde(rename = "user", default)]
    pub auth_info: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(flatten)]
    pub other: Extra,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedCluster {
    pub name: String,
    #[serde(default)]
    pub cluster: Cluster,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedAuthInfo {
    pub name: String,
    #[serde(default)]
    pub user: AuthInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedContext {
    pub name: String,
    #[serde(default)]
    pub context: Context,
}

/// On-disk `kind: Config` layout, where every entry is a `{name, <body>}` list item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubeconfigFile {
    #[serde(rename = "apiVersion", default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub preferences: Value,
    #[serde(default)]
    pub clusters: Option<Vec<NamedCluster>>,
    #[serde(default)]
    pub users: Option<Vec<NamedAuthInfo>>,
    #[serde(default)]
    pub contexts: Option<Vec<NamedContext>>,
    #[serde(rename = "current-context", default)]
    pub current_context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

fn default_api_version() -> String {
    "v1".to_string()
}

fn default_kind() -> String {
    "Config".to_string()
}

/// Name-indexed kubeconfig. Used for the source document as well as for
/// the kept and removed halves of a cleanup run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Kubeconfig {
    pub preferences: Value,
    pub extensions: Option<Value>,
    pub current_context: Option<String>,
    pub clusters: BTreeMap<String, Cluster>,
    pub auth_infos: BTreeMap<String, AuthInfo>,
    pub contexts: BTreeMap<String, Context>,
}

impl Kubeconfig {
    /// An empty document that inherits `preferences` and `extensions` from `source`.
    pub fn empty_like(source: &Kubeconfig) -> Self {
        Self {
            preferences: source.preferences.clone(),
            extensions: source.extensions.clone(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty() && self.clusters.is_empty() && self.auth_infos.is_empty()
    }

    pub fn to_file(&self) -> KubeconfigFile {
        let preferences = match &self.preferences {
            Value::Null => Value::Mapping(Default::default()),
            other => other.clone(),
        };

        KubeconfigFile {
            api_version: default_api_version(),
            kind: default_kind(),
            preferences,
            clusters: Some(
                self.clusters
                    .iter()
                    .map(|(name, cluster)| NamedCluster {
                        name: name.clone(),
                        cluster: cluster.clone(),
                    })
                    .collect(),
            ),
            users: Some(
                self.auth_infos
                    .iter()
                    .map(|(name, user)| NamedAuthInfo {
                        name: name.clone(),
                        user: user.clone(),
                    })
                    .collect(),
            ),
            contexts: Some(
                self.contexts
                    .iter()
                    .map(|(name, context)| NamedContext {
                        name: name.clone(),
                        context: context.clone(),
                    })
                    .collect(),
            ),
            current_context: self.current_context.clone().unwrap_or_default(),
            extensions: self.extensions.clone(),
        }
    }
}

impl From<KubeconfigFile> for Kubeconfig {
    fn from(file: KubeconfigFile) -> Self {
        let mut config = Kubeconfig {
            preferences: file.preferences,
            extensions: file.extensions,
            current_context: Some(file.current_context).filter(|name| !name.is_empty()),
            ..Kubeconfig::default()
        };

        for entry in file.clusters.unwrap_or_default() {
            if config.clusters.insert(entry.name.clone(), entry.cluster).is_some() {
                tracing::warn!("duplicate cluster entry {:?}, keeping the last one", entry.name);
            }
        }
        for entry in file.users.unwrap_or_default() {
            if config.auth_infos.insert(entry.name.clone(), entry.user).is_some() {
                tracing::warn!("duplicate user entry {:?}, keeping the last one", entry.name);
            }
        }
        for entry in file.contexts.unwrap_or_default() {
            if config.contexts.insert(entry.name.clone(), entry.context).is_some() {
                tracing::warn!("duplicate context entry {:?}, keeping the last one", entry.name);
            }
        }

        config
    }
}
