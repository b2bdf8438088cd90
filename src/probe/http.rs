// src/probe/http.rs
use super::credentials::{self, Credentials};
use super::{ProbeError, ProbeTarget, ReachabilityProbe};
use crate::kubeconfig::Cluster;

use async_trait::async_trait;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::PKey;
use openssl::stack::Stack;
use openssl::x509::X509;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

const USER_AGENT: &str = concat!("kubeconfig-cleanup/", env!("CARGO_PKG_VERSION"));

/// Asks the API server for its version, the cheapest authenticated call there is.
pub struct HttpProbe {
    base_dir: Option<PathBuf>,
}

impl HttpProbe {
    /// `base_dir` is the directory of the kubeconfig, used for relative file references.
    pub fn new(base_dir: Option<PathBuf>) -> Self {
        Self { base_dir }
    }

    async fn build_client(
        &self,
        cluster: &Cluster,
        credentials: &Credentials,
        pinned: Option<&(String, SocketAddr)>,
        timeout: Duration,
    ) -> Result<reqwest::Client, ProbeError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .connect_timeout(timeout);

        if cluster.insecure_skip_tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        } else if let Some(ca) = credentials::read_data_or_file(
            cluster.certificate_authority_data.as_deref(),
            cluster.certificate_authority.as_deref(),
            self.base_dir.as_deref(),
            "certificate authority",
        )
        .await?
        {
            builder = builder.tls_built_in_root_certs(false);
            for certificate in certificate_authorities(&ca)? {
                builder = builder.add_root_certificate(certificate);
            }
        }

        if let Some((name, addr)) = pinned {
            builder = builder.resolve(name, *addr);
        }

        if let (Some(cert), Some(key)) = (&credentials.client_certificate, &credentials.client_key) {
            builder = builder.identity(client_identity(cert, key)?);
        }

        if let Some(proxy) = cluster.proxy_url.as_deref().filter(|p| !p.is_empty()) {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| ProbeError::Tls(format!("invalid proxy-url {}: {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }

        builder.build().map_err(ProbeError::Request)
    }
}

#[async_trait]
impl ReachabilityProbe for HttpProbe {
    async fn probe(&self, target: &ProbeTarget<'_>) -> Result<(), ProbeError> {
        let mut url = version_url(&target.cluster.server)?;
        let pinned = match server_name_override(target.cluster, &url) {
            Some(name) => Some((name.to_string(), pin_server_name(&mut url, name).await?)),
            None => None,
        };
        let credentials = credentials::resolve(target, self.base_dir.as_deref()).await?;
        let client = self
            .build_client(target.cluster, &credentials, pinned.as_ref(), target.timeout)
            .await?;

        let mut request = client.get(url.clone());
        if let Some(token) = &credentials.bearer_token {
            request = request.bearer_auth(token);
        } else if let Some((username, password)) = &credentials.basic {
            request = request.basic_auth(username, Some(password));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProbeError::Timeout(target.timeout)
            } else {
                ProbeError::Request(e)
            }
        })?;

        let status = response.status();
        tracing::debug!(
            "{} (namespace {}): GET {} -> {}",
            target.context_name,
            target.context.namespace.as_deref().unwrap_or("default"),
            url,
            status
        );
        if status.is_success() {
            Ok(())
        } else {
            Err(ProbeError::Status(status))
        }
    }
}

/// `<server>/version`, keeping any path prefix the server URL carries.
pub fn version_url(server: &str) -> Result<Url, ProbeError> {
    let invalid = |reason: String| ProbeError::InvalidServer {
        url: server.to_string(),
        reason,
    };

    if server.trim().is_empty() {
        return Err(invalid("server is empty".to_string()));
    }
    let mut url = Url::parse(server.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {}", url.scheme())));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.join("version").map_err(|e| invalid(e.to_string()))
}

/// `tls-server-name` applies when the request itself would verify against
/// another host: https, verification on, no proxy in between.
fn server_name_override<'a>(cluster: &'a Cluster, url: &Url) -> Option<&'a str> {
    let name = cluster.tls_server_name.as_deref().filter(|n| !n.is_empty())?;
    if url.scheme() != "https" || cluster.insecure_skip_tls_verify || url.host_str() == Some(name) {
        return None;
    }
    if cluster.proxy_url.as_deref().is_some_and(|p| !p.is_empty()) {
        tracing::debug!("tls-server-name {} is not used behind proxy-url", name);
        return None;
    }
    Some(name)
}

/// Rewrites `url` to address `name` and returns where `name` must connect
/// to, which is the address of the original host.
async fn pin_server_name(url: &mut Url, name: &str) -> Result<SocketAddr, ProbeError> {
    let server = url.to_string();
    let invalid = |reason: String| ProbeError::InvalidServer {
        url: server.clone(),
        reason,
    };

    let host = url
        .host_str()
        .ok_or_else(|| invalid("server has no host".to_string()))?
        .to_string();
    let port = url
        .port_or_known_default()
        .ok_or_else(|| invalid("server has no port".to_string()))?;

    let addr = tokio::net::lookup_host(format!("{}:{}", host, port))
        .await
        .map_err(|e| invalid(format!("cannot resolve {}: {}", host, e)))?
        .next()
        .ok_or_else(|| invalid(format!("{} has no address", host)))?;

    url.set_host(Some(name))
        .map_err(|e| invalid(format!("invalid tls-server-name {:?}: {}", name, e)))?;
    Ok(addr)
}

fn certificate_authorities(pem: &[u8]) -> Result<Vec<reqwest::Certificate>, ProbeError> {
    let invalid = |reason: String| ProbeError::Tls(format!("invalid certificate authority: {}", reason));

    let certificates = X509::stack_from_pem(pem).map_err(|e| invalid(e.to_string()))?;
    if certificates.is_empty() {
        return Err(invalid("no PEM certificates found".to_string()));
    }

    certificates
        .iter()
        .map(|certificate| {
            let der = certificate.to_der().map_err(|e| invalid(e.to_string()))?;
            reqwest::Certificate::from_der(&der).map_err(|e| invalid(e.to_string()))
        })
        .collect()
}

/// Bundles a PEM certificate chain and key (PKCS#1 or PKCS#8) into the
/// PKCS#12 identity the TLS backend wants.
fn client_identity(cert_pem: &[u8], key_pem: &[u8]) -> Result<reqwest::Identity, ProbeError> {
    let tls = |what: &str, e: openssl::error::ErrorStack| ProbeError::Tls(format!("{}: {}", what, e));

    let mut chain = X509::stack_from_pem(cert_pem)
        .map_err(|e| tls("invalid client certificate", e))?
        .into_iter();
    let leaf = chain
        .next()
        .ok_or_else(|| ProbeError::Tls("client certificate is empty".to_string()))?;
    let key = PKey::private_key_from_pem(key_pem).map_err(|e| tls("invalid client key", e))?;

    let mut intermediates = Stack::new().map_err(|e| tls("openssl stack", e))?;
    for certificate in chain {
        intermediates
            .push(certificate)
            .map_err(|e| tls("openssl stack", e))?;
    }

    let der = Pkcs12::builder()
        .name("kubeconfig-cleanup")
        .pkey(&key)
        .cert(&leaf)
        .ca(intermediates)
        .build2("")
        .and_then(|pkcs12| pkcs12.to_der())
        .map_err(|e| tls("cannot bundle client identity", e))?;

    reqwest::Identity::from_pkcs12_der(&der, "")
        .map_err(|e| ProbeError::Tls(format!("client identity rejected: {}", e)))
}
