// src/kubeconfig/writer.rs
use super::types::Kubeconfig;
use crate::error::{CleanupError, Result};
use crate::types::OutputFormat;
use std::io::Write;

const DATA_OMITTED: &str = "DATA+OMITTED";
const REDACTED: &str = "REDACTED";

/// Replaces embedded certificates and secrets with placeholders,
/// matching what `kubectl config view` shows without `--raw`.
pub fn shorten(config: &mut Kubeconfig) {
    for cluster in config.clusters.values_mut() {
        if has_content(&cluster.certificate_authority_data) {
            cluster.certificate_authority_data = Some(DATA_OMITTED.to_string());
        }
    }

    for user in config.auth_infos.values_mut() {
        if has_content(&user.client_certificate_data) {
            user.client_certificate_data = Some(DATA_OMITTED.to_string());
        }
        if has_content(&user.client_key_data) {
            user.client_key_data = Some(DATA_OMITTED.to_string());
        }
        if has_content(&user.token) {
            user.token = Some(REDACTED.to_string());
        }
        if has_content(&user.password) {
            user.password = Some(REDACTED.to_string());
        }
    }
}

fn has_content(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

/// Renders `config` in the requested format. Returns `None` when the
/// document holds no contexts, clusters or users, so callers print nothing
/// instead of an empty kubeconfig.
pub fn render(config: &Kubeconfig, format: OutputFormat, raw: bool) -> Result<Option<String>> {
    if config.is_empty() {
        return Ok(None);
    }

    let mut config = config.clone();
    if !raw {
        shorten(&mut config);
    }

    let rendered = match format {
        OutputFormat::Yaml => serde_yaml::to_string(&config.to_file())
            .map_err(|e| CleanupError::Serialize(e.to_string()))?,
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(&config.to_file())?;
            json.push('\n');
            json
        }
        OutputFormat::Name => config
            .contexts
            .keys()
            .map(|name| format!("{}\n", name))
            .collect(),
    };
    Ok(Some(rendered))
}

pub fn print(
    config: &Kubeconfig,
    format: OutputFormat,
    raw: bool,
    out: &mut impl Write,
) -> Result<()> {
    let Some(rendered) = render(config, format, raw)? else {
        tracing::debug!("nothing left to print");
        return Ok(());
    };

    out.write_all(rendered.as_bytes())
        .and_then(|_| out.flush())
        .map_err(|e| CleanupError::io("<stdout>", e))
}
