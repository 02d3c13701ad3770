//! Authorization record storage.

use anyhow::{Context, Result};
use parking_lot::{Mutex, MutexGuard};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::record::AuthRecord;

/// Mutex-guarded owner of the persisted authorization record.
///
/// The guard loop and the monitor loop both hold an `Arc<AuthStore>`; any
/// read-modify-write sequence acquires [`AuthStore::record`] for its whole
/// duration and calls [`AuthStore::persist`] while still holding the lock.
pub struct AuthStore {
    path: PathBuf,
    record: Mutex<AuthRecord>,
}

impl AuthStore {
    /// Load and validate the record at `path`.
    ///
    /// Missing, unreadable, or invalid records are fatal: the caller is
    /// expected to abort startup.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {} (run the installer first)", path.display()))?;
        let record: AuthRecord = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        record.validate()?;
        debug!(
            "Loaded authorization record: {} authorized, {} blocked",
            record.authorized_ids.len(),
            record.blocked_ids.len()
        );
        Ok(Self {
            path,
            record: Mutex::new(record),
        })
    }

    /// Build a store around an in-memory record, persisting to `path`.
    pub fn with_record(path: impl Into<PathBuf>, record: AuthRecord) -> Self {
        Self {
            path: path.into(),
            record: Mutex::new(record),
        }
    }

    /// Acquire the record for a read-modify-write sequence.
    pub fn record(&self) -> MutexGuard<'_, AuthRecord> {
        self.record.lock()
    }

    /// Write `record` to disk synchronously.
    ///
    /// The write goes to a temp file in the same directory and is renamed
    /// into place, so a crash never leaves a torn record. Errors are
    /// surfaced to the caller, not swallowed.
    pub fn persist(&self, record: &AuthRecord) -> Result<()> {
        let serialized = serde_json::to_vec_pretty(record)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &serialized)
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        restrict_to_owner(&tmp)?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        debug!("Persisted authorization record to {}", self.path.display());
        Ok(())
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Restrict a file to owner read/write (mode 0600).
#[cfg(unix)]
fn restrict_to_owner(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("failed to set permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &Path) -> Result<()> {
    Ok(())
}
