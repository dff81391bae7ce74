//! Archive of ended sessions and the retention policy that bounds it.
//!
//! Archiving writes an append-only snapshot per ended session; retention
//! is a pure three-stage reduction (per-project dedup, age cutoff, count
//! cap) whose removal sets compose by union. The recent-projects view is a
//! pure projection over the archive listing, independently testable from
//! the directory scan that feeds it.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use fs_err as fs;
use serde::{Deserialize, Serialize};

use crate::config::RetentionConfig;
use crate::error::{DeckError, Result};
use crate::session::Session;

/// Archive file names are capped at this many characters (with extension).
const MAX_ARCHIVE_FILENAME_LEN: usize = 120;

/// One archived session and where it lives on disk.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub path: PathBuf,
    pub session: Session,
}

impl ArchiveEntry {
    /// The entry's end time; falls back to last activity for snapshots that
    /// predate the `ended_at` field.
    pub fn ended_at(&self) -> DateTime<Utc> {
        self.session.ended_at.unwrap_or(self.session.last_activity)
    }
}

/// A read-only projection of the archive: one row per distinct project,
/// built from that project's most recent archived session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentProject {
    pub project_path: String,
    pub project_name: String,
    pub session_count: usize,
    pub last_ended_at: DateTime<Utc>,
    pub last_session: Session,
}

/// Append-only store of ended-session snapshots.
pub struct ArchiveStore {
    dir: PathBuf,
}

impl ArchiveStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Opens the default archive under the flightdeck base directory.
    pub fn open_default() -> Self {
        Self::new(crate::config::archive_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes an ended-session snapshot into the archive.
    ///
    /// Sets `ended_at` if the caller has not already, and derives the file
    /// name from the sanitized project name plus the end timestamp.
    pub fn archive(&self, session: &Session) -> Result<PathBuf> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)
                .map_err(|e| DeckError::io("create archive directory", e))?;
        }

        let mut snapshot = session.clone();
        if snapshot.ended_at.is_none() {
            snapshot.ended_at = Some(Utc::now());
        }
        let ended = snapshot.ended_at.unwrap_or_else(Utc::now);

        let path = self.dir.join(archive_file_name(&snapshot.project_name, ended));
        let temp_path = path.with_extension("json.tmp");
        let json = snapshot.to_json()?;

        fs::write(&temp_path, &json).map_err(|e| DeckError::AtomicWrite {
            path: temp_path.clone(),
            source: e,
        })?;
        fs::rename(&temp_path, &path).map_err(|e| DeckError::AtomicWrite {
            path: path.clone(),
            source: e,
        })?;
        Ok(path)
    }

    /// Lists every decodable archive entry, newest first.
    pub fn list_all(&self) -> Vec<ArchiveEntry> {
        let mut entries = Vec::new();

        let Ok(dir_entries) = std::fs::read_dir(&self.dir) else {
            return entries;
        };

        for entry in dir_entries.flatten() {
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
            match std::fs::read_to_string(&path) {
                Ok(contents) => match Session::from_json(&contents) {
                    Ok(session) => entries.push(ArchiveEntry { path, session }),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Skipping undecodable archive entry");
                    }
                },
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable archive entry");
                }
            }
        }

        entries.sort_by_key(|e| std::cmp::Reverse(e.ended_at()));
        entries
    }

    /// Deletes the retention candidates and returns how many were removed.
    pub fn prune(&self, config: &RetentionConfig) -> usize {
        let entries = self.list_all();
        let candidates = prune_candidates(&entries, config, Utc::now());
        let mut removed = 0;
        for path in candidates {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove archive entry");
                }
            }
        }
        removed
    }
}

/// Derives an archive file name from a project name and an end timestamp.
///
/// The timestamp keeps its ISO-8601 reading but swaps colons for dashes
/// (filename-unsafe); the whole name is capped by truncating the project
/// part, never the timestamp.
pub fn archive_file_name(project_name: &str, ended_at: DateTime<Utc>) -> String {
    let timestamp = ended_at.format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let suffix_len = 1 + timestamp.len() + ".json".len();

    let sanitized: String = project_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let sanitized = if sanitized.is_empty() {
        "unknown".to_string()
    } else {
        sanitized
    };

    let max_name_len = MAX_ARCHIVE_FILENAME_LEN.saturating_sub(suffix_len);
    let name: String = sanitized.chars().take(max_name_len).collect();

    format!("{}-{}.json", name, timestamp)
}

/// The retention policy: returns the paths to remove.
///
/// Three stages over the sorted-by-recency listing, composing by union:
/// 1. per-project dedup (keep only the most recent entry per path),
/// 2. age cutoff over stage-1 survivors,
/// 3. count cap over stage-1-2 survivors, removing the oldest excess.
pub fn prune_candidates(
    entries: &[ArchiveEntry],
    config: &RetentionConfig,
    now: DateTime<Utc>,
) -> Vec<PathBuf> {
    let mut order: Vec<&ArchiveEntry> = entries.iter().collect();
    order.sort_by_key(|e| std::cmp::Reverse(e.ended_at()));

    let mut to_remove: HashSet<PathBuf> = HashSet::new();

    // Stage 1: dedup per project path, newest wins
    let mut seen_paths: HashSet<&str> = HashSet::new();
    let mut survivors: Vec<&ArchiveEntry> = Vec::new();
    for entry in order {
        if seen_paths.insert(entry.session.project_path.as_str()) {
            survivors.push(entry);
        } else {
            to_remove.insert(entry.path.clone());
        }
    }

    // Stage 2: age cutoff
    let cutoff = now - Duration::days(config.max_age_days);
    let survivors: Vec<&ArchiveEntry> = survivors
        .into_iter()
        .filter(|entry| {
            if entry.ended_at() < cutoff {
                to_remove.insert(entry.path.clone());
                false
            } else {
                true
            }
        })
        .collect();

    // Stage 3: count cap, oldest excess removed
    if survivors.len() > config.max_entries {
        for entry in &survivors[config.max_entries..] {
            to_remove.insert(entry.path.clone());
        }
    }

    to_remove.into_iter().collect()
}

/// Builds the recent-projects projection from an archive listing.
///
/// Groups by project path, counts sessions per path, keeps the most recent
/// entry, drops paths that are currently active, sorts by recency, and
/// truncates to the display limit. Pure: no I/O.
pub fn recent_projects(
    entries: &[ArchiveEntry],
    excluding: &HashSet<String>,
    limit: usize,
) -> Vec<RecentProject> {
    let mut by_path: HashMap<&str, (usize, &ArchiveEntry)> = HashMap::new();

    for entry in entries {
        let path = entry.session.project_path.as_str();
        match by_path.get_mut(path) {
            Some((count, best)) => {
                *count += 1;
                if entry.ended_at() > best.ended_at() {
                    *best = entry;
                }
            }
            None => {
                by_path.insert(path, (1, entry));
            }
        }
    }

    let mut projects: Vec<RecentProject> = by_path
        .into_iter()
        .filter(|(path, _)| !excluding.contains(*path))
        .map(|(path, (count, entry))| RecentProject {
            project_path: path.to_string(),
            project_name: entry.session.project_name.clone(),
            session_count: count,
            last_ended_at: entry.ended_at(),
            last_session: entry.session.clone(),
        })
        .collect();

    projects.sort_by_key(|p| std::cmp::Reverse(p.last_ended_at));
    projects.truncate(limit);
    projects
}
