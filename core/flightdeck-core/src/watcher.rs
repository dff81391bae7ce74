//! Filesystem watcher for the active session directory.
//!
//! The observer combines this with a periodic tick: notifications give low
//! latency, the tick catches liveness changes that produce no file event
//! (a process dying does not touch its record).

use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, TryRecvError};

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::{DeckError, Result};

/// Watches the sessions directory and reports whether anything changed.
pub struct SessionWatcher {
    /// Kept alive to maintain the watch
    _watcher: RecommendedWatcher,
    receiver: Receiver<std::result::Result<Event, notify::Error>>,
    sessions_dir: PathBuf,
}

impl SessionWatcher {
    /// Creates a watcher over the given sessions directory (created first
    /// if missing; a watch on a nonexistent path fails).
    pub fn new(sessions_dir: &Path) -> Result<Self> {
        if !sessions_dir.exists() {
            fs_err::create_dir_all(sessions_dir)
                .map_err(|e| DeckError::io("create sessions directory", e))?;
        }

        let (tx, rx) = channel();
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                // Receiver may be dropped during shutdown
                let _ = tx.send(res);
            },
            Config::default(),
        )
        .map_err(|e| DeckError::io("create file watcher", std::io::Error::other(e)))?;

        watcher
            .watch(sessions_dir, RecursiveMode::NonRecursive)
            .map_err(|e| DeckError::io("watch sessions directory", std::io::Error::other(e)))?;

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
            sessions_dir: sessions_dir.to_path_buf(),
        })
    }

    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    /// Drains pending events without blocking; true if any relevant change
    /// (create, modify, remove) occurred since the last call.
    pub fn drain_changes(&mut self) -> bool {
        let mut has_changes = false;

        loop {
            match self.receiver.try_recv() {
                Ok(Ok(event)) => {
                    if Self::is_relevant_event(&event) {
                        has_changes = true;
                    }
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "File watcher error");
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::warn!("File watcher channel disconnected");
                    break;
                }
            }
        }

        has_changes
    }

    fn is_relevant_event(event: &Event) -> bool {
        use notify::EventKind;

        matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        )
    }
}
