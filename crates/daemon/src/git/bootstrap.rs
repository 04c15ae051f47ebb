// One-time startup: make sure the working directory is a git repository and
// that its push remote points at `<base-url><repo-name>.git`.

use tracing::{info, warn};

use crate::config::SyncConfig;

use super::remote::{
    expected_remote_url, parse_remote_listing, remote_status, repo_name, RemoteStatus,
};
use super::worker::{CommandExecutor, GitWorker};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitAction {
    /// Repository metadata was already present.
    AlreadyInitialized,
    Initialized,
    /// `git init` failed; later commands will fail the same way each cycle.
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteAction {
    Unchanged,
    Added { url: String },
    Replaced { previous: Vec<String>, url: String },
    Failed { reason: String },
    /// The working directory has no base name to derive a URL from.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    pub init: InitAction,
    pub remote: RemoteAction,
}

#[derive(Debug, Clone)]
pub struct RepoBootstrapper {
    remote: String,
    remote_base_url: String,
}

impl RepoBootstrapper {
    pub fn new(config: &SyncConfig) -> Self {
        Self { remote: config.remote.clone(), remote_base_url: config.remote_base_url.clone() }
    }

    /// URL the remote must point at for `worker`'s repository.
    pub fn expected_url<E: CommandExecutor>(&self, worker: &GitWorker<E>) -> Option<String> {
        repo_name(worker.repo_path()).map(|name| expected_remote_url(&self.remote_base_url, &name))
    }

    /// Never fails: every problem is logged and recorded in the report.
    pub fn ensure<E: CommandExecutor>(&self, worker: &GitWorker<E>) -> BootstrapReport {
        let init = self.ensure_initialized(worker);
        let remote = self.ensure_remote(worker);
        BootstrapReport { init, remote }
    }

    fn ensure_initialized<E: CommandExecutor>(&self, worker: &GitWorker<E>) -> InitAction {
        // `.git` is a file for linked worktrees and submodules.
        if worker.repo_path().join(".git").exists() {
            return InitAction::AlreadyInitialized;
        }

        info!(path = %worker.repo_path().display(), "initializing git repository");
        match worker.init() {
            Ok(_) => InitAction::Initialized,
            Err(error) => {
                warn!(error = %error, "git init failed; continuing without a repository");
                InitAction::Failed { reason: error.to_string() }
            }
        }
    }

    fn ensure_remote<E: CommandExecutor>(&self, worker: &GitWorker<E>) -> RemoteAction {
        let Some(url) = self.expected_url(worker) else {
            warn!(path = %worker.repo_path().display(), "cannot derive repository name");
            return RemoteAction::Skipped;
        };

        let listing = match worker.remote_list() {
            Ok(output) => output.stdout,
            Err(error) => {
                warn!(error = %error, "could not list remotes; treating as none configured");
                String::new()
            }
        };
        let entries = parse_remote_listing(&listing);

        let previous = match remote_status(&entries, &self.remote, &url) {
            RemoteStatus::Matches => return RemoteAction::Unchanged,
            RemoteStatus::Missing => None,
            RemoteStatus::Mismatched { urls } => {
                info!(
                    remote = %self.remote,
                    ?urls,
                    expected = %url,
                    "remote points elsewhere, removing"
                );
                if let Err(error) = worker.remote_remove(&self.remote) {
                    warn!(error = %error, "failed to remove stale remote");
                }
                Some(urls)
            }
        };

        info!(remote = %self.remote, url = %url, "configuring remote");
        if let Err(error) = worker.remote_add(&self.remote, &url) {
            warn!(error = %error, "failed to add remote");
            return RemoteAction::Failed { reason: error.to_string() };
        }

        match previous {
            Some(previous) => RemoteAction::Replaced { previous, url },
            None => RemoteAction::Added { url },
        }
    }
}
