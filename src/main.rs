// src/main.rs
mod cleanup;
mod config;
mod error;
mod kubeconfig;
mod probe;
mod types;
mod utils;

use cleanup::{run_cleanup, CleanupOptions};
use config::IgnoreSet;
use error::Result;
use probe::HttpProbe;
use types::{OutputFormat, Selection};

use clap::{ArgAction, Parser};
use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

const EXAMPLES: &str = "\
Examples:
  # print the cleaned kubeconfig to stdout, similar to: kubectl config view
  kubectl config-cleanup

  # cleanup and save the result
  kubectl config-cleanup --raw > ./kubeconfig-clean.yaml

  # cleanup and print the entries that were removed
  kubectl config-cleanup --print-removed --raw > ./kubeconfig-removed.yaml

  # print only the names of the removed contexts
  kubectl config-cleanup --print-removed -o name";

/// Attempts to connect to each cluster defined in contexts and removes the ones that fail
#[derive(Parser, Debug)]
#[command(name = "kubectl-config_cleanup", version, about, after_help = EXAMPLES)]
pub struct Args {
    /// Kubeconfig file to clean up [default: $KUBECONFIG or ~/.kube/config]
    #[arg(long)]
    pub kubeconfig: Option<String>,

    /// Seconds to wait for a response from the server before continuing cleanup
    #[arg(short, long, default_value_t = cleanup::DEFAULT_TIMEOUT.as_secs())]
    pub timeout: u64,

    /// Cleanup cluster entries which are not specified by a context
    #[arg(long)]
    pub clusters: bool,

    /// Cleanup user entries which are not specified by a context
    #[arg(long)]
    pub users: bool,

    /// Print certificates and tokens instead of placeholders, suitable for piping to a new file
    #[arg(long)]
    pub raw: bool,

    /// Print the removed contents of the kubeconfig instead of what is kept
    #[arg(long)]
    pub print_removed: bool,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml)]
    pub output: OutputFormat,

    /// Contexts listed here are never probed and always kept [default: ~/.kube/config-cleanup.ignore]
    #[arg(long)]
    pub ignore_file: Option<String>,

    /// Maximum number of clusters probed at the same time
    #[arg(long, default_value_t = cleanup::MAX_WORKERS)]
    pub concurrency: usize,

    /// More log output on stderr, repeat for more
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    pub fn cleanup_options(&self) -> CleanupOptions {
        CleanupOptions {
            timeout: Duration::from_secs(self.timeout),
            cleanup_clusters: self.clusters,
            cleanup_users: self.users,
            max_workers: self.concurrency,
            ..CleanupOptions::default()
        }
    }
}

/// Everything a run needs from the outside world is passed in, which keeps
/// it testable without touching the real home directory or stdout.
async fn execute(
    args: &Args,
    env_kubeconfig: Option<&str>,
    home: Option<&Path>,
    out: &mut impl Write,
) -> Result<()> {
    let options = args.cleanup_options();
    options.validate()?;

    let ignore_path = match &args.ignore_file {
        Some(path) => Some(kubeconfig::expand(path)),
        None => IgnoreSet::default_path(home),
    };
    let ignore = match ignore_path {
        Some(path) => IgnoreSet::load_from_file(&path)?,
        None => IgnoreSet::default(),
    };
    if !ignore.is_empty() {
        tracing::debug!("{} contexts are in the ignore list", ignore.len());
    }

    let path = kubeconfig::resolve_kubeconfig_path(args.kubeconfig.as_deref(), env_kubeconfig, home)?;
    let raw = kubeconfig::load_from_file(&path)?;
    tracing::info!(
        "Testing {} connections from {}...",
        raw.contexts.len(),
        path.display()
    );

    let probe = HttpProbe::new(path.parent().map(Path::to_path_buf));
    let result = run_cleanup(Arc::new(raw), Arc::new(ignore), Arc::new(probe), &options).await?;

    let selected = result.select(Selection::from_print_removed(args.print_removed));
    kubeconfig::print(selected, args.output, args.raw, out)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    utils::logging::init_logging(args.verbose, args.quiet);

    let env_kubeconfig = std::env::var(kubeconfig::KUBECONFIG_ENV).ok();
    let home: Option<PathBuf> = dirs::home_dir();

    if let Err(err) = execute(&args, env_kubeconfig.as_deref(), home.as_deref(), &mut io::stdout()).await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::Router;
    use clap::CommandFactory;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn default_flags_give_default_options() {
        let args = Args::try_parse_from(["kubectl-config_cleanup"]).unwrap();
        let options = args.cleanup_options();

        assert_eq!(options.timeout, Duration::from_secs(10));
        assert_eq!(options.max_workers, 25);
        assert!(!options.cleanup_clusters);
        assert!(!options.cleanup_users);
        assert_eq!(args.output, OutputFormat::Yaml);
        assert!(!args.raw);
        assert!(!args.print_removed);
    }

    #[test]
    fn flags_map_onto_options() {
        let args = Args::try_parse_from([
            "kubectl-config_cleanup",
            "-t",
            "3",
            "--clusters",
            "--users",
            "--concurrency",
            "4",
            "-o",
            "json",
        ])
        .unwrap();
        let options = args.cleanup_options();

        assert_eq!(options.timeout, Duration::from_secs(3));
        assert!(options.cleanup_clusters);
        assert!(options.cleanup_users);
        assert_eq!(options.max_workers, 4);
        assert_eq!(args.output, OutputFormat::Json);
    }

    #[test]
    fn positional_arguments_are_rejected() {
        assert!(Args::try_parse_from(["kubectl-config_cleanup", "extra"]).is_err());
    }

    async fn live_server() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/version", get(|| async { "{\"major\":\"1\"}" }));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn dead_server() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}", addr)
    }

    fn write_kubeconfig(dir: &Path, live: &str, dead: &str) -> PathBuf {
        let path = dir.join("config");
        let contents = format!(
            r#"apiVersion: v1
kind: Config
clusters:
- name: live
  cluster:
    server: {live}
- name: dead
  cluster:
    server: {dead}
- name: orphan
  cluster:
    server: https://orphan.example.com
users:
- name: live-user
  user:
    token: live-token
- name: dead-user
  user:
    token: dead-token
contexts:
- name: live-ctx
  context:
    cluster: live
    user: live-user
- name: dead-ctx
  context:
    cluster: dead
    user: dead-user
- name: pinned-ctx
  context:
    cluster: dead
    user: dead-user
- name: broken-ctx
  context:
    cluster: nowhere
    user: live-user
current-context: live-ctx
"#
        );
        fs::write(&path, contents).unwrap();
        path
    }

    async fn run_cli(dir: &Path, extra: &[&str]) -> String {
        let mut argv = vec!["kubectl-config_cleanup"];
        argv.extend_from_slice(extra);
        let args = Args::try_parse_from(argv).unwrap();

        let mut out = Vec::new();
        execute(&args, None, Some(dir), &mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    fn setup_home(dir: &Path, live: &str, dead: &str) {
        let kube = dir.join(".kube");
        fs::create_dir_all(&kube).unwrap();
        write_kubeconfig(&kube, live, dead);
        fs::write(
            kube.join("config-cleanup.ignore"),
            "apiVersion: v1\nkind: ConfigMap\ndata:\n  contexts: pinned-ctx\n",
        )
        .unwrap();
    }

    #[tokio::test]
    async fn prints_the_kept_contexts() {
        let home = tempdir().unwrap();
        setup_home(home.path(), &live_server().await, &dead_server().await);

        let out = run_cli(home.path(), &["-t", "2", "-o", "name"]).await;
        assert_eq!(out, "live-ctx\npinned-ctx\n");
    }

    #[tokio::test]
    async fn prints_the_removed_contexts() {
        let home = tempdir().unwrap();
        setup_home(home.path(), &live_server().await, &dead_server().await);

        let out = run_cli(home.path(), &["-t", "2", "--print-removed", "-o", "name"]).await;
        assert_eq!(out, "broken-ctx\ndead-ctx\n");
    }

    #[tokio::test]
    async fn kept_yaml_is_shortened_and_keeps_orphans() {
        let home = tempdir().unwrap();
        setup_home(home.path(), &live_server().await, &dead_server().await);

        let out = run_cli(home.path(), &["-t", "2"]).await;
        let kept = kubeconfig::parse(&out).unwrap();

        assert!(kept.clusters.contains_key("orphan"));
        assert!(kept.clusters.contains_key("live"));
        assert_eq!(kept.current_context.as_deref(), Some("live-ctx"));
        assert_eq!(kept.auth_infos["live-user"].token.as_deref(), Some("REDACTED"));
    }

    #[tokio::test]
    async fn zombie_flags_move_orphans_to_removed() {
        let home = tempdir().unwrap();
        setup_home(home.path(), &live_server().await, &dead_server().await);

        let out = run_cli(home.path(), &["-t", "2", "--clusters", "--print-removed", "--raw"]).await;
        let removed = kubeconfig::parse(&out).unwrap();

        assert!(removed.clusters.contains_key("orphan"));
        assert!(removed.clusters.contains_key("dead"));
        assert_eq!(removed.auth_infos["dead-user"].token.as_deref(), Some("dead-token"));
    }

    #[tokio::test]
    async fn explicit_kubeconfig_flag_is_used() {
        let home = tempdir().unwrap();
        let other = tempdir().unwrap();
        let path = write_kubeconfig(other.path(), &live_server().await, &dead_server().await);

        let out = run_cli(
            home.path(),
            &["-t", "2", "-o", "name", "--kubeconfig", path.to_str().unwrap()],
        )
        .await;
        // no ignore file in this home, so pinned-ctx is probed and fails
        assert_eq!(out, "live-ctx\n");
    }

    #[tokio::test]
    async fn ignore_file_flag_replaces_the_default_list() {
        let home = tempdir().unwrap();
        setup_home(home.path(), &live_server().await, &dead_server().await);
        let other = tempdir().unwrap();
        let ignore = other.path().join("ignore.yaml");
        fs::write(
            &ignore,
            "apiVersion: v1\nkind: ConfigMap\ndata:\n  contexts: |\n    dead-ctx\n    unknown-ctx\n",
        )
        .unwrap();

        let out = run_cli(
            home.path(),
            &["-t", "2", "-o", "name", "--ignore-file", ignore.to_str().unwrap()],
        )
        .await;
        // pinned-ctx is only listed in the default file, so it gets probed and fails
        assert_eq!(out, "dead-ctx\nlive-ctx\n");
    }

    #[test]
    fn template_output_formats_are_rejected() {
        let result = Args::try_parse_from([
            "kubectl-config_cleanup",
            "-o",
            "jsonpath={.contexts[*].name}",
        ]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn missing_kubeconfig_is_fatal() {
        let home = tempdir().unwrap();
        let args = Args::try_parse_from(["kubectl-config_cleanup"]).unwrap();

        let mut out = Vec::new();
        let err = execute(&args, None, Some(home.path()), &mut out).await.unwrap_err();
        assert!(matches!(err, error::CleanupError::Io { .. }));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn nothing_is_printed_when_nothing_was_removed() {
        let home = tempdir().unwrap();
        let kube = home.path().join(".kube");
        fs::create_dir_all(&kube).unwrap();
        let live = live_server().await;
        fs::write(
            kube.join("config"),
            format!("clusters:\n- name: c\n  cluster:\n    server: {live}\nusers:\n- name: u\n  user: {{}}\ncontexts:\n- name: x\n  context:\n    cluster: c\n    user: u\n"),
        )
        .unwrap();

        let out = run_cli(home.path(), &["--print-removed"]).await;
        assert!(out.is_empty());
    }
}
