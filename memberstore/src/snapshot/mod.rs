use crate::database::Database;
use crate::error::{Result, StoreError};
use log::{info, warn};
use rusqlite::DatabaseName;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// The exact serialized content of a whole store.
pub type Blob = Vec<u8>;

impl Database {
    /// Serialize the entire store as it is right now.
    ///
    /// Two stores built by the same sequence of statements serialize to the
    /// same bytes, so a snapshot can be compared as well as transferred.
    pub fn create_snapshot(&self) -> Result<Blob> {
        let state = self.state();
        let data = state.connection()?.serialize(DatabaseName::Main)?;
        info!("Created snapshot of {} bytes", data.len());
        Ok(data.to_vec())
    }

    /// Replace the entire store with `blob`.
    ///
    /// The connection is closed, the store file is overwritten with the blob
    /// and sized to match it exactly, and the store is reopened at the same
    /// path. Statements built before the call are invalidated. When any step
    /// fails the error is returned and [`Database::is_open`] tells whether a
    /// store is open afterwards; installing again is allowed either way.
    pub fn install_snapshot(&self, blob: &[u8]) -> Result<()> {
        let path = {
            let mut state = self.state();
            let path = state.path().ok_or(StoreError::NotOpen)?.to_path_buf();
            state.disconnect();
            path
        };

        write_store_file(&path, blob)?;
        if let Err(e) = self.open(&path) {
            warn!("Reopening {} after snapshot install failed: {e}", path.display());
            return Err(e);
        }
        info!("Installed snapshot of {} bytes at {}", blob.len(), path.display());
        Ok(())
    }
}

fn snapshot_error(action: &'static str) -> impl FnOnce(std::io::Error) -> StoreError {
    move |source| StoreError::Snapshot { action, source }
}

fn write_store_file(path: &Path, blob: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .open(path)
        .map_err(snapshot_error("open"))?;
    file.write_all(blob).map_err(snapshot_error("write"))?;
    file.set_len(blob.len() as u64)
        .map_err(snapshot_error("resize"))?;
    file.sync_all().map_err(snapshot_error("sync"))?;
    Ok(())
}
