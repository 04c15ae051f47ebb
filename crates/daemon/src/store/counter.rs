use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

/// Persisted commit counter: a single file whose whole content is the
/// decimal value.
#[derive(Debug, Clone)]
pub struct CounterStore {
    path: PathBuf,
}

impl CounterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current value. A missing or unparsable record reads as 0.
    pub fn read(&self) -> u64 {
        let Ok(contents) = fs::read_to_string(&self.path) else {
            return 0;
        };
        contents.trim().parse().unwrap_or_else(|_| {
            debug!(path = %self.path.display(), "counter record is not a number, treating as 0");
            0
        })
    }

    /// Replace the record with `value`. Written to a sibling temp file and
    /// renamed into place so readers never see a partial value.
    pub fn write(&self, value: u64) -> Result<()> {
        let tmp_path = self.temp_path();
        let mut file = fs::File::create(&tmp_path)
            .with_context(|| format!("failed to create `{}`", tmp_path.display()))?;
        write!(file, "{value}").context("failed to write counter")?;
        file.sync_data().context("failed to fsync counter")?;
        drop(file);

        fs::rename(&tmp_path, &self.path).with_context(|| {
            format!(
                "failed to move counter `{}` to `{}`",
                tmp_path.display(),
                self.path.display()
            )
        })
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
