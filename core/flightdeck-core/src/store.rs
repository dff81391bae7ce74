//! Atomic, PID-keyed session store.
//!
//! One JSON file per live session, named by the owning PID. The OS never
//! assigns one PID to two simultaneously-live processes, so the key itself
//! rules out concurrent-writer collisions across sessions. Within a key,
//! callers must serialize writes per PID: the owning agent fires hook
//! processes one at a time, so no lock is taken here. Rename is the only
//! operation assumed atomic; readers only ever open the final path.

use std::path::{Path, PathBuf};

use fs_err as fs;

use crate::error::{DeckError, Result};
use crate::session::Session;

/// Key-value store over the sessions directory, keyed by owning PID.
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Opens the default store under the flightdeck base directory.
    pub fn open_default() -> Self {
        Self::new(crate::config::sessions_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record for one PID: `<dir>/<pid>.json`.
    pub fn path_for(&self, pid: u32) -> PathBuf {
        self.dir.join(format!("{}.json", pid))
    }

    /// Loads the record for a PID, or None when absent or undecodable.
    pub fn load(&self, pid: u32) -> Option<Session> {
        let path = self.path_for(pid);
        if !path.exists() {
            return None;
        }
        match fs::read_to_string(&path).map_err(|e| e.to_string()).and_then(|contents| {
            Session::from_json(&contents).map_err(|e| e.to_string())
        }) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Undecodable session record");
                None
            }
        }
    }

    /// Persists the record for a PID via temp file + atomic rename.
    ///
    /// A reader can never observe a partial write: the temp file lives
    /// beside the final path and is renamed onto it in one step.
    pub fn store(&self, pid: u32, session: &Session) -> Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)
                .map_err(|e| DeckError::io("create sessions directory", e))?;
        }

        let path = self.path_for(pid);
        let temp_path = self.dir.join(format!("{}.json.tmp", pid));
        let json = session.to_json()?;

        fs::write(&temp_path, &json).map_err(|e| DeckError::AtomicWrite {
            path: temp_path.clone(),
            source: e,
        })?;
        fs::rename(&temp_path, &path).map_err(|e| DeckError::AtomicWrite { path, source: e })?;
        Ok(())
    }

    /// Removes the record for a PID. Missing files are not an error.
    pub fn remove(&self, pid: u32) -> Result<()> {
        let path = self.path_for(pid);
        if path.exists() {
            fs::remove_file(&path).map_err(|e| DeckError::io("remove session record", e))?;
        }
        Ok(())
    }

    /// Lists every decodable record in the store.
    ///
    /// Skips temp files, non-JSON files, and records that fail to decode;
    /// one corrupt file never aborts the listing.
    pub fn list_all(&self) -> Vec<Session> {
        self.list_keyed().into_iter().map(|(_, s)| s).collect()
    }

    /// Lists every decodable record together with its PID key.
    ///
    /// The key is the decimal file name, which stays authoritative even
    /// when a record's own `pid` field is absent or stale.
    pub fn list_keyed(&self) -> Vec<(u32, Session)> {
        let mut sessions = Vec::new();

        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return sessions;
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            if path
                .file_name()
                .map(|n| n.to_string_lossy().ends_with(".tmp"))
                .unwrap_or(false)
            {
                continue;
            }
            let Some(pid) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u32>().ok())
            else {
                continue;
            };

            match std::fs::read_to_string(&path) {
                Ok(contents) => match Session::from_json(&contents) {
                    Ok(session) => sessions.push((pid, session)),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Skipping undecodable session record");
                    }
                },
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable session record");
                }
            }
        }

        sessions
    }
}
