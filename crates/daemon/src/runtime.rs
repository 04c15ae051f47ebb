use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::sync::watch;
use tracing::info;

use crate::config::SyncConfig;
use crate::git::bootstrap::{BootstrapReport, RepoBootstrapper};
use crate::git::cycle::{CycleOutcome, SyncCycle};
use crate::git::remote::repo_name;
use crate::git::worker::GitWorker;
use crate::scheduler::{run_cycle_blocking, run_forever, SchedulerConfig};

/// A validated configuration bound to a bootstrapped repository.
pub struct PreparedRepo {
    pub repo_path: PathBuf,
    pub config: SyncConfig,
    pub cycle: Arc<SyncCycle>,
    pub bootstrap: BootstrapReport,
}

/// Validate `config`, resolve `repo_path`, and run the one-time bootstrap.
pub async fn prepare(repo_path: &Path, config: SyncConfig) -> Result<PreparedRepo> {
    config.validate().context("refusing to start with invalid configuration")?;
    let repo_path = std::fs::canonicalize(repo_path)
        .with_context(|| format!("repository path `{}` is not accessible", repo_path.display()))?;
    let name = repo_name(&repo_path)
        .ok_or_else(|| anyhow!("cannot derive a repository name from `{}`", repo_path.display()))?;

    let worker = GitWorker::from_config(&repo_path, &config);
    let bootstrapper = RepoBootstrapper::new(&config);

    info!(
        repo = %repo_path.display(),
        name = %name,
        branch = %config.branch,
        remote_url = bootstrapper.expected_url(&worker).as_deref().unwrap_or_default(),
        interval_secs = config.interval_sec,
        "autopush starting"
    );

    // The counter record lives in the git directory, which only exists once
    // the bootstrap has run.
    let cycle_config = config.clone();
    let (bootstrap, cycle) = tokio::task::spawn_blocking(move || {
        let bootstrap = bootstrapper.ensure(&worker);
        (bootstrap, SyncCycle::for_worker(worker, &cycle_config))
    })
    .await
    .context("bootstrap task failed")?;
    info!(
        init = ?bootstrap.init,
        remote = ?bootstrap.remote,
        counter = %cycle.counter().path().display(),
        "repository bootstrap finished"
    );

    Ok(PreparedRepo { repo_path, config, cycle: Arc::new(cycle), bootstrap })
}

/// What a single `--once` run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnceReport {
    pub repo_path: PathBuf,
    pub bootstrap: BootstrapReport,
    pub outcome: CycleOutcome,
}

/// Bootstrap and run a single cycle.
pub async fn run_once(repo_path: &Path, config: SyncConfig) -> Result<OnceReport> {
    let prepared = prepare(repo_path, config).await?;
    let outcome = run_cycle_blocking(&prepared.cycle)
        .await
        .ok_or_else(|| anyhow!("sync cycle did not complete"))?;
    Ok(OnceReport { repo_path: prepared.repo_path, bootstrap: prepared.bootstrap, outcome })
}

/// Bootstrap, then sync on the configured interval until Ctrl-C.
pub async fn run_daemon(repo_path: &Path, config: SyncConfig) -> Result<()> {
    let prepared = prepare(repo_path, config).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("interrupt received, stopping after the current cycle");
        let _ = shutdown_tx.send(true);
    });

    let scheduler = SchedulerConfig::from(&prepared.config);
    let cycles = run_forever(prepared.cycle, scheduler, shutdown_rx).await;
    info!(repo = %prepared.repo_path.display(), cycles, "autopush stopped");
    Ok(())
}
