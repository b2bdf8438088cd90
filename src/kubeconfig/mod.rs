mod loader;
mod types;
mod writer;

#[cfg(test)]
pub use loader::parse;
pub use loader::{expand, load_from_file, resolve_kubeconfig_path, KUBECONFIG_ENV};
pub use types::{AuthInfo, Cluster, Context, ExecConfig, Kubeconfig};
#[cfg(test)]
pub use types::{AuthProviderConfig, ExecEnvVar};
pub use writer::print;
