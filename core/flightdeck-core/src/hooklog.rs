//! Diagnostic hook-event log surface.
//!
//! One append-only log per session identifier, recording each processed
//! event as `<timestamp> HOOK <event> <project>:<short-id> <old> -> <new>`,
//! plus a single shared `_errors.log` for failures that occur before a
//! session identifier is known. Not authoritative state: the session files
//! are. A session's log is deleted together with its record.

use std::path::{Path, PathBuf};

use chrono::Utc;
use fs_err::OpenOptions;
use std::io::Write as _;

const ERROR_LOG_NAME: &str = "_errors.log";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Replaces filename-hostile characters in a session identifier.
pub fn sanitize_session_id(session_id: &str) -> String {
    session_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `<project>:<short-id>` label used in log lines.
pub fn session_label(cwd: &str, session_id: &str) -> String {
    let project = Path::new(cwd)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown");
    let abbrev = &session_id[..session_id.len().min(8)];
    format!("{}:{}", project, abbrev)
}

fn session_log_path(logs_dir: &Path, session_id: &str) -> PathBuf {
    logs_dir.join(format!("{}.log", sanitize_session_id(session_id)))
}

/// Appends one processed-event line to the session's log.
///
/// Failures are swallowed: logging is diagnostic only and must never fail
/// the hook invocation.
pub fn append_hook_log(
    logs_dir: &Path,
    session_id: &str,
    event: &str,
    label: &str,
    old_status: &str,
    new_status: &str,
    note: &str,
) {
    let log_path = session_log_path(logs_dir, session_id);
    let _ = fs_err::create_dir_all(logs_dir);
    if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&log_path) {
        let extra = if note.is_empty() {
            String::new()
        } else {
            format!(" ({})", note)
        };
        let _ = writeln!(
            f,
            "{} HOOK {} {} {} -> {}{}",
            Utc::now().format(TIMESTAMP_FORMAT),
            event,
            label,
            old_status,
            new_status,
            extra,
        );
    }
}

/// Logs an error that occurred before a session identifier was known.
pub fn log_error(logs_dir: &Path, msg: &str) {
    let _ = fs_err::create_dir_all(logs_dir);
    let log_path = logs_dir.join(ERROR_LOG_NAME);
    if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&log_path) {
        let _ = writeln!(f, "{} ERROR {}", Utc::now().format(TIMESTAMP_FORMAT), msg);
    }
}

/// Removes a session's log (called alongside session record cleanup).
pub fn remove_session_log(logs_dir: &Path, session_id: &str) {
    let _ = std::fs::remove_file(session_log_path(logs_dir, session_id));
}
