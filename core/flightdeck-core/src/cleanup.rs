//! Liveness-driven crash recovery for the active session store.
//!
//! There is no reliance on a terminating event: the owning agent can die
//! ungracefully and nothing will ever fire. Instead, a record is dead when
//! its PID no longer resolves to a live process, or when the PID is alive
//! but belongs to a different process than the one that wrote the record
//! (start-time fingerprint mismatch, i.e. PID reuse). Dead records are
//! archived and removed on sight; this is the only path that observes
//! "session end".

use std::path::Path;

use crate::archive::ArchiveStore;
use crate::hooklog;
use crate::process::{same_process, ProcessInspector};
use crate::session::Session;
use crate::store::SessionStore;

/// Results from one cleanup pass.
#[derive(Debug, Default, Clone)]
pub struct CleanupStats {
    /// Records whose PID no longer resolves to a live process.
    pub dead_removed: u32,
    /// Records whose PID is alive but owned by a different process now.
    pub reused_removed: u32,
    /// Snapshots written into the archive before removal.
    pub archived: u32,
}

/// Why a record is considered dead, if it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Live,
    /// PID missing from the record, or no live process behind it.
    Dead,
    /// PID alive but its start time no longer matches the record.
    Reused,
}

fn judge(pid: u32, session: &Session, inspector: &dyn ProcessInspector) -> Verdict {
    if session.pid.is_none() {
        // Single-path design: a record that never learned its owner has no
        // liveness story and cannot be trusted.
        return Verdict::Dead;
    }
    if !inspector.is_alive(pid) {
        return Verdict::Dead;
    }
    match (session.pid_start_time, inspector.start_time(pid)) {
        (Some(stored), Some(observed)) if !same_process(stored, observed) => Verdict::Reused,
        _ => Verdict::Live,
    }
}

/// True iff the record still belongs to a live owning process.
pub fn is_record_live(pid: u32, session: &Session, inspector: &dyn ProcessInspector) -> bool {
    judge(pid, session, inspector) == Verdict::Live
}

/// Lists the store, archives and removes dead records, returns the live ones.
pub fn load_live_sessions(
    store: &SessionStore,
    inspector: &dyn ProcessInspector,
    archive: &ArchiveStore,
    logs_dir: &Path,
) -> (Vec<Session>, CleanupStats) {
    let mut live = Vec::new();
    let mut stats = CleanupStats::default();

    for (pid, session) in store.list_keyed() {
        match judge(pid, &session, inspector) {
            Verdict::Live => live.push(session),
            Verdict::Dead => {
                reap(store, archive, logs_dir, pid, &session, &mut stats);
                stats.dead_removed += 1;
            }
            Verdict::Reused => {
                reap(store, archive, logs_dir, pid, &session, &mut stats);
                stats.reused_removed += 1;
            }
        }
    }

    (live, stats)
}

/// Session-start cleanup, scoped to the starting session's project path.
///
/// Removes dead records sharing the project path so stale siblings don't
/// accumulate when many sessions churn in the same directory. The starting
/// session's own record is never touched.
pub fn cleanup_project_siblings(
    store: &SessionStore,
    inspector: &dyn ProcessInspector,
    archive: &ArchiveStore,
    logs_dir: &Path,
    project_path: &str,
    keep_pid: u32,
) -> CleanupStats {
    let mut stats = CleanupStats::default();

    for (pid, session) in store.list_keyed() {
        if pid == keep_pid || session.project_path != project_path {
            continue;
        }
        match judge(pid, &session, inspector) {
            Verdict::Live => {}
            Verdict::Dead => {
                reap(store, archive, logs_dir, pid, &session, &mut stats);
                stats.dead_removed += 1;
            }
            Verdict::Reused => {
                reap(store, archive, logs_dir, pid, &session, &mut stats);
                stats.reused_removed += 1;
            }
        }
    }

    stats
}

fn reap(
    store: &SessionStore,
    archive: &ArchiveStore,
    logs_dir: &Path,
    pid: u32,
    session: &Session,
    stats: &mut CleanupStats,
) {
    match archive.archive(session) {
        Ok(_) => stats.archived += 1,
        Err(e) => {
            tracing::warn!(pid, error = %e, "Failed to archive dead session");
        }
    }
    if let Err(e) = store.remove(pid) {
        tracing::warn!(pid, error = %e, "Failed to remove dead session record");
    }
    hooklog::remove_session_log(logs_dir, &session.session_id);
}

/// Loads the record for a resolved PID, handling resume and PID reuse.
///
/// - No record: returns None (caller creates a fresh one).
/// - Record with a mismatched fingerprint: PID reuse; the stale record is
///   removed and None is returned.
/// - Record with a different session identifier but a matching owner:
///   "resume" - the identifier is updated in place and all accumulated
///   state is preserved.
pub fn load_for_event(
    store: &SessionStore,
    inspector: &dyn ProcessInspector,
    logs_dir: &Path,
    pid: u32,
    session_id: &str,
) -> Option<Session> {
    let mut session = store.load(pid)?;

    if let (Some(stored), Some(observed)) = (session.pid_start_time, inspector.start_time(pid)) {
        if !same_process(stored, observed) {
            tracing::debug!(pid, "Stale record from a previous owner of this PID");
            let _ = store.remove(pid);
            hooklog::remove_session_log(logs_dir, &session.session_id);
            return None;
        }
    }

    if session.session_id != session_id {
        tracing::debug!(
            pid,
            old = %session.session_id,
            new = %session_id,
            "Session resumed under a new identifier"
        );
        hooklog::remove_session_log(logs_dir, &session.session_id);
        session.session_id = session_id.to_string();
    }

    Some(session)
}
