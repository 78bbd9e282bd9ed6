//! Single-instance guard.
//!
//! `serve` writes its PID to the configured path and holds an `fs2`
//! exclusive lock on the file for as long as the [`PidFile`] lives.  A
//! second gateway pointed at the same path refuses to start.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use fs2::FileExt;

/// Locked PID file; removed from disk on [`PidFile::release`].
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
    // Holding the handle holds the lock.
    _file: File,
}

impl PidFile {
    pub fn acquire(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("opening PID file {}", path.display()))?;

        file.try_lock_exclusive().map_err(|_| {
            anyhow::anyhow!(
                "another wagate instance is running (PID file {} is locked)",
                path.display()
            )
        })?;

        // Truncate only once the lock is ours; the holder's PID stays intact
        // for a refused second instance.
        file.set_len(0)?;
        let pid = std::process::id();
        writeln!(&file, "{pid}")?;

        tracing::info!(path = %path.display(), pid, "PID file written");
        Ok(Self {
            path: path.to_path_buf(),
            _file: file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file, then drop the lock.
    pub fn release(self) {
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::info!(path = %self.path.display(), "PID file removed"),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove PID file")
            }
        }
    }
}
