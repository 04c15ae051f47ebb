// One synchronization attempt: stage, commit, align the branch, push, and
// advance the commit counter only once the push is confirmed.
//
//   Start → Staged → (Committed | NoOp | CommitFailed)
//   Committed → BranchAligned → (Pushed | PushedUnrecorded | PushFailed)

use std::path::Path;

use chrono::{DateTime, Local};
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::store::counter::CounterStore;

use super::worker::{CommandExecutor, GitWorker, ProcessCommandExecutor};

/// Marker git prints when a commit has nothing staged.
const NOTHING_TO_COMMIT: &str = "nothing to commit";

/// Terminal state of a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing was staged; no commit, no push, counter untouched.
    NoOp,
    /// The commit itself failed for a reason other than an empty index.
    CommitFailed { reason: String },
    /// Push confirmed; `counter` is the value now persisted.
    Pushed { counter: u64 },
    /// Push confirmed but `counter` could not be written; the record still
    /// holds the previous value and the next commit reuses this number.
    PushedUnrecorded { counter: u64, reason: String },
    /// Push failed; the commit stays local and goes out with a later push.
    PushFailed { reason: String },
}

impl CycleOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CycleOutcome::NoOp | CycleOutcome::Pushed { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CycleOutcome::NoOp => "no_op",
            CycleOutcome::CommitFailed { .. } => "commit_failed",
            CycleOutcome::Pushed { .. } => "pushed",
            CycleOutcome::PushedUnrecorded { .. } => "pushed_unrecorded",
            CycleOutcome::PushFailed { .. } => "push_failed",
        }
    }
}

/// `Update: <n> - <YYYY-mm-dd HH:MM:SS>`.
pub fn commit_message(counter: u64, at: DateTime<Local>) -> String {
    format!("Update: {counter} - {}", at.format("%Y-%m-%d %H:%M:%S"))
}

pub struct SyncCycle<E = ProcessCommandExecutor> {
    worker: GitWorker<E>,
    counter: CounterStore,
    remote: String,
    branch: String,
    set_upstream: bool,
}

impl SyncCycle<ProcessCommandExecutor> {
    /// Real git in `repo_path`, configured from `config`. Build it after the
    /// repository is bootstrapped so the git directory can be resolved.
    pub fn from_config(repo_path: &Path, config: &SyncConfig) -> Self {
        Self::for_worker(GitWorker::from_config(repo_path, config), config)
    }
}

impl<E: CommandExecutor> SyncCycle<E> {
    /// Cycle whose counter record sits in the worker's git directory, as
    /// reported by git. Falls back to the working tree root when git cannot
    /// say where that is.
    pub fn for_worker(worker: GitWorker<E>, config: &SyncConfig) -> Self {
        let base = match worker.git_dir() {
            Ok(git_dir) => git_dir,
            Err(error) => {
                warn!(
                    error = %error,
                    command = error.command(),
                    "could not resolve git directory, keeping the counter in the working tree"
                );
                worker.repo_path().to_path_buf()
            }
        };
        let counter = CounterStore::new(config.counter_path(&base));
        debug!(path = %counter.path().display(), "counter record resolved");
        Self::new(worker, counter, config)
    }

    pub fn new(worker: GitWorker<E>, counter: CounterStore, config: &SyncConfig) -> Self {
        Self {
            worker,
            counter,
            remote: config.remote.clone(),
            branch: config.branch.clone(),
            set_upstream: config.set_upstream,
        }
    }

    pub fn worker(&self) -> &GitWorker<E> {
        &self.worker
    }

    pub fn counter(&self) -> &CounterStore {
        &self.counter
    }

    pub fn run_cycle(&self) -> CycleOutcome {
        self.run_cycle_at(Local::now())
    }

    /// Run a cycle whose commit message is stamped with `now`.
    pub fn run_cycle_at(&self, now: DateTime<Local>) -> CycleOutcome {
        let current = self.counter.read();
        let next = current.saturating_add(1);
        info!(counter = current, "sync cycle started");

        if let Err(error) = self.worker.add_all() {
            warn!(error = %error, "staging failed, attempting commit anyway");
        }

        match self.worker.diff_cached_name_status() {
            Ok(output) if output.stdout.trim().is_empty() => {
                info!("nothing staged, skipping commit and push");
                return CycleOutcome::NoOp;
            }
            Ok(output) => debug!(files = output.stdout.lines().count(), "changes staged"),
            Err(error) => {
                warn!(error = %error, "could not query staged changes, relying on commit output")
            }
        }

        let message = commit_message(next, now);
        match self.worker.commit(&message) {
            Ok(result) if result.success => info!(message = %message, "committed"),
            Ok(result) if result.combined_output().contains(NOTHING_TO_COMMIT) => {
                info!("nothing to commit, skipping push");
                return CycleOutcome::NoOp;
            }
            Ok(result) => {
                let output =
                    if result.stderr.trim().is_empty() { result.stdout } else { result.stderr };
                let reason = output.trim().to_string();
                warn!(code = ?result.code, reason = %reason, "commit failed");
                return CycleOutcome::CommitFailed { reason };
            }
            Err(error) => {
                warn!(error = %error, "commit failed");
                return CycleOutcome::CommitFailed { reason: error.to_string() };
            }
        }

        if let Err(error) = self.worker.rename_branch(&self.branch) {
            warn!(error = %error, branch = %self.branch, "could not align branch name");
        }

        match self.worker.push(&self.remote, &self.branch, self.set_upstream) {
            Ok(_) => match self.counter.write(next) {
                Ok(()) => {
                    info!(counter = next, remote = %self.remote, branch = %self.branch, "pushed");
                    CycleOutcome::Pushed { counter: next }
                }
                Err(error) => {
                    error!(
                        error = %format!("{error:#}"),
                        path = %self.counter.path().display(),
                        counter = next,
                        "push succeeded but the counter could not be persisted"
                    );
                    CycleOutcome::PushedUnrecorded { counter: next, reason: format!("{error:#}") }
                }
            },
            Err(error) => {
                warn!(
                    error = %error,
                    command = error.command(),
                    remote = %self.remote,
                    branch = %self.branch,
                    "push failed, counter not advanced; \
                     check network connectivity and remote credentials"
                );
                CycleOutcome::PushFailed { reason: error.to_string() }
            }
        }
    }
}
