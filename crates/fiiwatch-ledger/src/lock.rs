//! Single-writer run lock.
//!
//! Only one consolidation may hold the ledger at a time. The lock is a
//! sibling file created with `create_new` — atomic on every filesystem this
//! runs on — and removed on drop. A crash leaves a stale lock an operator
//! clears manually; that beats two writers interleaving workbook renames.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::LedgerError;

pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Acquires the lock for `ledger_path`, failing immediately if another
    /// run holds it.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Locked`] when the lock file already exists;
    /// [`LedgerError::Io`] on other filesystem failures.
    pub fn acquire(ledger_path: &Path) -> Result<Self, LedgerError> {
        let path = lock_path(ledger_path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| LedgerError::Io {
                    path: parent.display().to_string(),
                    source: e,
                })?;
            }
        }

        let mut file = match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(LedgerError::Locked {
                    path: path.display().to_string(),
                });
            }
            Err(e) => {
                return Err(LedgerError::Io {
                    path: path.display().to_string(),
                    source: e,
                });
            }
        };

        // Contents are diagnostics only; the lock is the file's existence.
        let _ = writeln!(file, "pid={}", std::process::id());

        Ok(Self { path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove run lock");
        }
    }
}

fn lock_path(ledger_path: &Path) -> PathBuf {
    let mut name = ledger_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "ledger".to_string());
    name.push_str(".lock");
    ledger_path.with_file_name(name)
}
