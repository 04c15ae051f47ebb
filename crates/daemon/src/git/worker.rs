// Git command executor: spawns `git` in the repository directory, captures
// output, and reports failures as values instead of panicking or raising.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;
use wait_timeout::ChildExt;

use crate::config::SyncConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Failure of a single git invocation. None of these abort the process.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GitError {
    #[error("failed to run `{command}`: {message}")]
    ToolUnavailable { command: String, message: String },

    #[error("`{command}` failed with code {code:?}: {}", .stderr.trim())]
    CommandFailed { command: String, code: Option<i32>, stderr: String },

    #[error("`{command}` timed out after {}s", .timeout.as_secs())]
    TimedOut { command: String, timeout: Duration },
}

impl GitError {
    pub fn command(&self) -> &str {
        match self {
            GitError::ToolUnavailable { command, .. }
            | GitError::CommandFailed { command, .. }
            | GitError::TimedOut { command, .. } => command,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    /// Stdout followed by stderr, for matching on messages git may print to either.
    pub fn combined_output(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

pub trait CommandExecutor: Send + Sync {
    /// Run `program` to completion. A `TimedOut` I/O error means the child
    /// exceeded `timeout` and was killed.
    fn execute(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
        timeout: Option<Duration>,
    ) -> Result<CommandResult, std::io::Error>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessCommandExecutor;

impl CommandExecutor for ProcessCommandExecutor {
    fn execute(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
        timeout: Option<Duration>,
    ) -> Result<CommandResult, std::io::Error> {
        let Some(timeout) = timeout else {
            let output = Command::new(program).args(args).current_dir(cwd).output()?;
            return Ok(CommandResult {
                success: output.status.success(),
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        };

        let mut child = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        let deadline = Instant::now() + timeout;

        // Both pipes feed one channel so neither can fill up and stall the child.
        let (chunk_tx, chunk_rx) = mpsc::channel();
        if let Some(stdout) = child.stdout.take() {
            spawn_pipe_reader(stdout, chunk_tx.clone(), PipeChunk::Stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_pipe_reader(stderr, chunk_tx, PipeChunk::Stderr);
        }

        let Some(status) = child.wait_timeout(timeout)? else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("process exceeded {}ms", timeout.as_millis()),
            ));
        };

        let (stdout, stderr) = collect_output(&chunk_rx, deadline);
        Ok(CommandResult {
            success: status.success(),
            code: status.code(),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}

enum PipeChunk {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
}

/// Forward everything read from `pipe` until EOF or until the receiver is gone.
fn spawn_pipe_reader<R: Read + Send + 'static>(
    mut pipe: R,
    chunk_tx: Sender<PipeChunk>,
    wrap: fn(Vec<u8>) -> PipeChunk,
) {
    thread::spawn(move || {
        let mut buffer = [0u8; 8192];
        loop {
            match pipe.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => {
                    if chunk_tx.send(wrap(buffer[..read].to_vec())).is_err() {
                        break;
                    }
                }
                Err(error) if error.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
    });
}

/// Gather piped output until both readers hit EOF or `deadline` passes.
///
/// A process the child left running in the background keeps the pipes open
/// after the child itself exits; output received before the deadline is kept
/// and the readers are abandoned.
fn collect_output(chunk_rx: &Receiver<PipeChunk>, deadline: Instant) -> (Vec<u8>, Vec<u8>) {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut append = |chunk: PipeChunk| match chunk {
        PipeChunk::Stdout(bytes) => stdout.extend_from_slice(&bytes),
        PipeChunk::Stderr(bytes) => stderr.extend_from_slice(&bytes),
    };

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match chunk_rx.recv_timeout(remaining) {
            Ok(chunk) => append(chunk),
            Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                chunk_rx.try_iter().for_each(&mut append);
                debug!("output pipes still open at deadline; returning partial output");
                break;
            }
        }
    }

    (stdout, stderr)
}

/// Thin typed wrapper over the git CLI for a single working directory.
#[derive(Debug, Clone)]
pub struct GitWorker<E = ProcessCommandExecutor> {
    repo_path: PathBuf,
    program: String,
    timeout: Option<Duration>,
    executor: E,
}

impl GitWorker<ProcessCommandExecutor> {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self::with_executor(repo_path, ProcessCommandExecutor)
    }

    /// Worker using the configured git binary and per-command timeout.
    pub fn from_config(repo_path: impl Into<PathBuf>, config: &SyncConfig) -> Self {
        Self::new(repo_path)
            .with_program(config.git_program.clone())
            .with_timeout(config.command_timeout())
    }
}

impl<E: CommandExecutor> GitWorker<E> {
    pub fn with_executor(repo_path: impl Into<PathBuf>, executor: E) -> Self {
        Self { repo_path: repo_path.into(), program: "git".to_string(), timeout: None, executor }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Bound every invocation by `timeout`; `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Absolute path of the repository's git directory. For a linked worktree
    /// or submodule this is not `<repo>/.git`.
    pub fn git_dir(&self) -> Result<PathBuf, GitError> {
        let output = self.run(["rev-parse", "--absolute-git-dir"])?;
        Ok(PathBuf::from(output.stdout.trim()))
    }

    pub fn init(&self) -> Result<GitCommandOutput, GitError> {
        self.run(["init"])
    }

    pub fn remote_list(&self) -> Result<GitCommandOutput, GitError> {
        self.run(["remote", "-v"])
    }

    pub fn remote_remove(&self, name: &str) -> Result<GitCommandOutput, GitError> {
        self.run(["remote", "remove", name])
    }

    pub fn remote_add(&self, name: &str, url: &str) -> Result<GitCommandOutput, GitError> {
        self.run(["remote", "add", name, url])
    }

    pub fn add_all(&self) -> Result<GitCommandOutput, GitError> {
        self.run(["add", "."])
    }

    /// `git diff --cached --name-status`: empty stdout means nothing is staged.
    pub fn diff_cached_name_status(&self) -> Result<GitCommandOutput, GitError> {
        self.run(["diff", "--cached", "--name-status"])
    }

    /// Commit without treating a non-zero exit as an error; the caller
    /// inspects the result to tell "nothing to commit" from a real failure.
    pub fn commit(&self, message: &str) -> Result<CommandResult, GitError> {
        self.run_unchecked(["commit", "-m", message])
    }

    /// Force-rename the current branch. Safe to repeat.
    pub fn rename_branch(&self, branch: &str) -> Result<GitCommandOutput, GitError> {
        self.run(["branch", "-M", branch])
    }

    pub fn push(
        &self,
        remote: &str,
        branch: &str,
        set_upstream: bool,
    ) -> Result<GitCommandOutput, GitError> {
        if set_upstream {
            self.run(["push", "-u", remote, branch])
        } else {
            self.run(["push", remote, branch])
        }
    }

    /// Run git with `args`; a non-zero exit becomes `GitError::CommandFailed`.
    pub fn run<I, S>(&self, args: I) -> Result<GitCommandOutput, GitError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args = collect_args(args);
        let command = self.describe(&args);
        let result = self.execute(&command, &args)?;

        if result.success {
            return Ok(GitCommandOutput { stdout: result.stdout, stderr: result.stderr });
        }

        let stderr = if result.stderr.trim().is_empty() { result.stdout } else { result.stderr };

        Err(GitError::CommandFailed { command, code: result.code, stderr })
    }

    /// Run git with `args`, returning the raw result regardless of exit code.
    pub fn run_unchecked<I, S>(&self, args: I) -> Result<CommandResult, GitError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args = collect_args(args);
        let command = self.describe(&args);
        self.execute(&command, &args)
    }

    fn execute(&self, command: &str, args: &[String]) -> Result<CommandResult, GitError> {
        debug!(command, cwd = %self.repo_path.display(), "running git");
        self.executor.execute(&self.program, args, &self.repo_path, self.timeout).map_err(
            |error| match (error.kind(), self.timeout) {
                (std::io::ErrorKind::TimedOut, Some(timeout)) => {
                    GitError::TimedOut { command: command.to_string(), timeout }
                }
                _ => GitError::ToolUnavailable {
                    command: command.to_string(),
                    message: error.to_string(),
                },
            },
        )
    }

    fn describe(&self, args: &[String]) -> String {
        format!("{} {}", self.program, args.join(" "))
    }
}

fn collect_args<I, S>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter().map(|arg| arg.as_ref().to_string()).collect()
}
