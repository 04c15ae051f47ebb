// autopushd: commit and push a working tree on a fixed interval.

use std::path::PathBuf;

use anyhow::Context;
use autopush_daemon::config::SyncConfig;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "autopushd", about = "Periodically commit and push a git working tree")]
struct Cli {
    /// Working tree to sync (defaults to the current directory).
    #[arg(long, default_value = ".")]
    repo: PathBuf,

    /// Config file (defaults to ~/.autopush/config.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Branch to align and push.
    #[arg(long)]
    branch: Option<String>,

    /// Remote URL prefix; the directory name and `.git` are appended.
    #[arg(long)]
    remote_base_url: Option<String>,

    /// Seconds between cycles.
    #[arg(long)]
    interval_sec: Option<u64>,

    /// Push without `-u`.
    #[arg(long)]
    no_upstream: bool,

    /// Bootstrap, run one cycle, and exit.
    #[arg(long)]
    once: bool,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<SyncConfig> {
        let mut config = match &self.config {
            Some(path) => SyncConfig::load_from(path)
                .with_context(|| format!("failed to load config `{}`", path.display()))?,
            None => SyncConfig::load().context("failed to load global config")?,
        };

        if let Some(branch) = &self.branch {
            config.branch = branch.clone();
        }
        if let Some(url) = &self.remote_base_url {
            config.remote_base_url = url.clone();
        }
        if let Some(interval) = self.interval_sec {
            config.interval_sec = interval;
        }
        if self.no_upstream {
            config.set_upstream = false;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.load_config()?;

    if cli.once {
        let report = autopush_daemon::runtime::run_once(&cli.repo, config).await?;
        let repo = report.repo_path.display();
        if report.outcome.is_success() {
            info!(repo = %repo, outcome = ?report.outcome, "single cycle finished");
            return Ok(());
        }
        warn!(
            repo = %repo,
            init = ?report.bootstrap.init,
            remote = ?report.bootstrap.remote,
            outcome = ?report.outcome,
            "single cycle did not complete"
        );
        std::process::exit(1);
    }

    autopush_daemon::runtime::run_daemon(&cli.repo, config)
        .await
        .context("autopush daemon terminated unexpectedly")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_override_config_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "branch = \"master\"\nremote_base_url = \"https://a.test/\"\n")
            .unwrap();

        let cli = Cli::parse_from([
            "autopushd",
            "--config",
            path.to_str().unwrap(),
            "--remote-base-url",
            "https://b.test/someone/",
            "--interval-sec",
            "30",
            "--no-upstream",
        ]);
        let config = cli.load_config().unwrap();

        assert_eq!(config.branch, "master");
        assert_eq!(config.remote_base_url, "https://b.test/someone/");
        assert_eq!(config.interval_sec, 30);
        assert!(!config.set_upstream);
        assert!(!cli.once);
        assert_eq!(cli.repo, PathBuf::from("."));
    }

    #[test]
    fn unreadable_config_is_an_error() {
        let cli = Cli::parse_from(["autopushd", "--config", "/definitely/missing/config.toml"]);
        assert!(cli.load_config().is_err());
    }
}
