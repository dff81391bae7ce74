//! flightdeck-watch: the session observer.
//!
//! Long-running loop that lists all session records, discards the ones
//! whose owning process is gone (archiving them), prunes the archive, and
//! publishes the aggregate to `snapshot.json` for display surfaces to
//! consume. Wakes on filesystem notification and on a periodic tick; the
//! tick matters because a process dying touches no file.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use flightdeck_core::archive::{recent_projects, ArchiveStore, RecentProject};
use flightdeck_core::cleanup::load_live_sessions;
use flightdeck_core::config;
use flightdeck_core::process::SystemInspector;
use flightdeck_core::session::Session;
use flightdeck_core::store::SessionStore;
use flightdeck_core::watcher::SessionWatcher;

#[derive(Parser)]
#[command(name = "flightdeck-watch")]
#[command(about = "Flightdeck session observer")]
#[command(version)]
struct Cli {
    /// Seconds between liveness scans
    #[arg(long, default_value_t = 2)]
    interval: u64,

    /// Scan once, print the snapshot to stdout, and exit
    #[arg(long)]
    once: bool,
}

/// Aggregate published for display surfaces.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    generated_at: DateTime<Utc>,
    sessions: Vec<Session>,
    recent_projects: Vec<RecentProject>,
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let store = SessionStore::open_default();
    let archive = ArchiveStore::open_default();
    let logs_dir = config::logs_dir();
    let inspector = SystemInspector;
    let retention = config::Config::load().retention;

    if cli.once {
        let snapshot = scan(&store, &archive, &inspector, &logs_dir, &retention);
        match serde_json::to_string_pretty(&snapshot) {
            Ok(json) => println!("{}", json),
            Err(e) => warn!(error = %e, "Failed to serialize snapshot"),
        }
        return;
    }

    let mut watcher = match SessionWatcher::new(store.dir()) {
        Ok(w) => Some(w),
        Err(e) => {
            // Fall back to pure polling; the tick still drives scans
            warn!(error = %e, "File watching unavailable, polling only");
            None
        }
    };

    info!(dir = %store.dir().display(), interval = cli.interval, "Flightdeck observer started");

    let tick = Duration::from_secs(cli.interval.max(1));
    loop {
        let snapshot = scan(&store, &archive, &inspector, &logs_dir, &retention);
        publish(&config::snapshot_path(), &snapshot);

        // Sleep in short slices so file events shorten the latency of the
        // next scan without busy-waiting.
        let slice = Duration::from_millis(200);
        let mut slept = Duration::ZERO;
        while slept < tick {
            std::thread::sleep(slice);
            slept += slice;
            if watcher.as_mut().is_some_and(|w| w.drain_changes()) {
                debug!("Session directory changed");
                break;
            }
        }
    }
}

/// One observation pass: liveness cleanup, archive pruning, projection.
fn scan(
    store: &SessionStore,
    archive: &ArchiveStore,
    inspector: &SystemInspector,
    logs_dir: &Path,
    retention: &flightdeck_core::config::RetentionConfig,
) -> Snapshot {
    let (sessions, stats) = load_live_sessions(store, inspector, archive, logs_dir);
    if stats.dead_removed > 0 || stats.reused_removed > 0 {
        info!(
            dead = stats.dead_removed,
            reused = stats.reused_removed,
            archived = stats.archived,
            "Cleaned up dead session records"
        );
    }

    let pruned = archive.prune(retention);
    if pruned > 0 {
        debug!(pruned, "Pruned archive entries");
    }

    let active_paths: HashSet<String> =
        sessions.iter().map(|s| s.project_path.clone()).collect();
    let entries = archive.list_all();
    let recents = recent_projects(&entries, &active_paths, retention.recent_limit);

    Snapshot {
        generated_at: Utc::now(),
        sessions,
        recent_projects: recents,
    }
}

/// Publishes the snapshot via temp file + atomic rename so consumers never
/// observe a partial document.
fn publish(path: &Path, snapshot: &Snapshot) {
    let json = match serde_json::to_string_pretty(snapshot) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "Failed to serialize snapshot");
            return;
        }
    };

    let temp_path = path.with_extension("json.tmp");
    if let Err(e) = fs_err::write(&temp_path, &json) {
        warn!(path = %temp_path.display(), error = %e, "Failed to write snapshot");
        return;
    }
    if let Err(e) = fs_err::rename(&temp_path, path) {
        warn!(path = %path.display(), error = %e, "Failed to publish snapshot");
    }
}

fn init_logging() {
    let debug_enabled = std::env::var("FLIGHTDECK_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
