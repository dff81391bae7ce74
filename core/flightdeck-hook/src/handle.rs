//! Event handler for coding-agent lifecycle hooks.
//!
//! Reads the event document from stdin (bounded by a timeout), resolves
//! the owning agent process, applies the status transition, and persists
//! the PID-keyed session record atomically.

use std::env;
use std::io::{self, Read};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use flightdeck_core::cleanup::{cleanup_project_siblings, load_for_event};
use flightdeck_core::config;
use flightdeck_core::event::{apply_event, EventContext, EventKind};
use flightdeck_core::git::current_branch;
use flightdeck_core::hooklog;
use flightdeck_core::process::{resolve_owner_pid, resolve_tty, ProcessInspector, SystemInspector};
use flightdeck_core::session::{Session, TerminalInfo};
use flightdeck_core::store::SessionStore;
use flightdeck_core::ArchiveStore;

/// Tag recorded in the `source` field of every record this binary writes.
const EVENT_SOURCE: &str = "claude";

/// Stdin must produce the event document within this window; afterwards
/// the event is abandoned and the caller is released.
const STDIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Input schema for the hook event document.
///
/// Some fields are parsed to match the caller's full schema even though
/// this handler does not consult them.
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct HookInput {
    session_id: String,
    cwd: String,
    hook_event_name: String,
    #[serde(default)]
    transcript_path: Option<String>,
    #[serde(default)]
    permission_mode: Option<String>,
    /// Only present for UserPromptSubmit
    #[serde(default)]
    prompt: Option<String>,
    /// Only present for PreToolUse/PostToolUse
    #[serde(default)]
    tool_name: Option<String>,
    /// Tool argument map; only string-valued entries are consulted
    #[serde(default)]
    tool_input: Option<Value>,
    /// Only present for Notification
    #[serde(default)]
    notification_type: Option<String>,
    /// Message content (Notification, PermissionRequest)
    #[serde(default)]
    message: Option<String>,
    /// Title (PermissionRequest)
    #[serde(default)]
    title: Option<String>,
    /// Trigger for SessionStart (e.g., "startup", "resume")
    #[serde(default)]
    trigger: Option<String>,
    /// Workspace/launch-target path for editor integration
    #[serde(default)]
    workspace: Option<String>,
}

pub fn run(hook_name: &str) -> Result<(), String> {
    let logs_dir = config::logs_dir();

    let Some(input) = read_stdin_with_timeout(hook_name, &logs_dir) else {
        return Ok(());
    };

    if input.trim().is_empty() {
        return Ok(());
    }

    let hook_input: HookInput = match serde_json::from_str(&input) {
        Ok(i) => i,
        Err(e) => {
            hooklog::log_error(&logs_dir, &format!("{}: failed to parse JSON: {}", hook_name, e));
            return Ok(());
        }
    };

    handle_hook(hook_name, hook_input)
}

/// Reads stdin on a helper thread so a caller that never closes the pipe
/// cannot hang the hook past the timeout.
fn read_stdin_with_timeout(hook_name: &str, logs_dir: &Path) -> Option<String> {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let mut buf = String::new();
        let result = io::stdin().read_to_string(&mut buf);
        let _ = tx.send((buf, result));
    });

    match rx.recv_timeout(STDIN_TIMEOUT) {
        Ok((buf, Ok(_))) => Some(buf),
        Ok((_, Err(e))) => {
            hooklog::log_error(logs_dir, &format!("{}: failed to read stdin: {}", hook_name, e));
            None
        }
        Err(_) => {
            hooklog::log_error(
                logs_dir,
                &format!(
                    "{}: stdin read timed out after {}s",
                    hook_name,
                    STDIN_TIMEOUT.as_secs()
                ),
            );
            None
        }
    }
}

/// Captures terminal information for window focusing.
///
/// The program name and terminal-specific handle come from the
/// environment; the controlling terminal comes from the ancestor walk
/// (the hook's own stdin is a pipe), with the TTY variable as fallback.
fn capture_terminal_info(inspector: &dyn ProcessInspector) -> TerminalInfo {
    let program = env::var("TERM_PROGRAM").unwrap_or_default();
    let session_id = env::var("ITERM_SESSION_ID")
        .ok()
        .or_else(|| env::var("KITTY_WINDOW_ID").ok());
    let tty = resolve_tty(inspector, std::process::id()).or_else(|| env::var("TTY").ok());

    TerminalInfo {
        program,
        session_id,
        tty,
    }
}

fn handle_hook(hook_name: &str, input: HookInput) -> Result<(), String> {
    let event = EventKind::parse(hook_name, input.notification_type.as_deref());

    // SessionEnd is deliberately a no-op: the agent can die without ever
    // sending it, so record removal belongs to liveness cleanup alone.
    if event == EventKind::SessionEnd {
        return Ok(());
    }

    let store = SessionStore::open_default();
    let archive = ArchiveStore::open_default();
    let logs_dir = config::logs_dir();
    let inspector = SystemInspector;

    let parent = std::os::unix::process::parent_id();
    let owner_pid = resolve_owner_pid(&inspector, parent);
    let fingerprint = inspector.start_time(owner_pid);

    let branch = current_branch(Path::new(&input.cwd));
    let terminal = capture_terminal_info(&inspector);

    let mut session = load_for_event(&store, &inspector, &logs_dir, owner_pid, &input.session_id)
        .unwrap_or_else(|| {
            Session::new(
                input.session_id.clone(),
                input.cwd.clone(),
                branch.clone(),
                terminal.clone(),
            )
        });

    // Refreshed on every event; cheap and keeps the card current
    session.branch = branch;
    session.terminal = terminal;
    if session.pid.is_none() {
        session.pid = Some(owner_pid);
        session.pid_start_time = fingerprint;
    }

    let ctx = EventContext {
        prompt: input.prompt,
        tool_name: input.tool_name,
        tool_input: input.tool_input,
        message: input.message,
        title: input.title,
        pid: Some(owner_pid),
        pid_start_time: fingerprint,
        workspace: input.workspace,
        source: Some(EVENT_SOURCE.to_string()),
    };

    let applied = apply_event(&mut session, event, &ctx);

    if event == EventKind::SessionStart {
        cleanup_project_siblings(
            &store,
            &inspector,
            &archive,
            &logs_dir,
            &input.cwd,
            owner_pid,
        );
    }

    store
        .store(owner_pid, &session)
        .map_err(|e| format!("failed to persist session: {}", e))?;

    let note = if applied.preserved { "preserved" } else { "" };
    hooklog::append_hook_log(
        &logs_dir,
        &session.session_id,
        hook_name,
        &hooklog::session_label(&input.cwd, &session.session_id),
        applied.old_status.as_str(),
        applied.new_status.as_str(),
        note,
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flightdeck_core::session::Status;
    use tempfile::tempdir;

    /// Serializes tests that set FLIGHTDECK_DIR; env vars are
    /// process-global and tests run in parallel.
    static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

    fn input_for(event: &str, session_id: &str) -> HookInput {
        HookInput {
            session_id: session_id.to_string(),
            cwd: "/nonexistent/test/project".to_string(),
            hook_event_name: event.to_string(),
            transcript_path: None,
            permission_mode: None,
            prompt: None,
            tool_name: None,
            tool_input: None,
            notification_type: None,
            message: None,
            title: None,
            trigger: None,
            workspace: None,
        }
    }

    /// Runs handle_hook against an isolated base dir. Must hold ENV_MUTEX.
    fn run_hook(base: &Path, event: &str, input: HookInput) {
        std::env::set_var("FLIGHTDECK_DIR", base);
        handle_hook(event, input).unwrap();
        std::env::remove_var("FLIGHTDECK_DIR");
    }

    fn only_session(base: &Path) -> Session {
        let store = SessionStore::new(base.join("sessions"));
        let sessions = store.list_all();
        assert_eq!(sessions.len(), 1, "expected exactly one session record");
        sessions.into_iter().next().unwrap()
    }

    #[test]
    fn test_parse_hook_input_minimal() {
        let json = r#"{
            "session_id": "abc123",
            "cwd": "/tmp/test",
            "hook_event_name": "SessionStart"
        }"#;
        let input: HookInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.session_id, "abc123");
        assert_eq!(input.cwd, "/tmp/test");
        assert!(input.prompt.is_none());
    }

    #[test]
    fn test_parse_hook_input_with_tool() {
        let json = r#"{
            "session_id": "abc123",
            "cwd": "/tmp/test",
            "hook_event_name": "PreToolUse",
            "tool_name": "Bash",
            "tool_input": {"command": "npm test"}
        }"#;
        let input: HookInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.tool_name, Some("Bash".to_string()));
        assert_eq!(
            input.tool_input.unwrap()["command"].as_str(),
            Some("npm test")
        );
    }

    #[test]
    fn test_parse_hook_input_with_title_and_message() {
        let json = r#"{
            "session_id": "abc123",
            "cwd": "/tmp/test",
            "hook_event_name": "PermissionRequest",
            "title": "Allow Bash command?",
            "message": "Run npm test",
            "tool_name": "Bash"
        }"#;
        let input: HookInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.title, Some("Allow Bash command?".to_string()));
        assert_eq!(input.message, Some("Run npm test".to_string()));
    }

    #[test]
    fn test_session_start_creates_pid_keyed_record() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let temp = tempdir().unwrap();

        run_hook(temp.path(), "SessionStart", input_for("SessionStart", "sess-1"));

        let session = only_session(temp.path());
        assert_eq!(session.status, Status::Idle);
        assert_eq!(session.session_id, "sess-1");
        // Owner PID resolved and fingerprinted from a live process
        let pid = session.pid.expect("record should carry its owning PID");
        assert!(SessionStore::new(temp.path().join("sessions"))
            .path_for(pid)
            .exists());
    }

    #[test]
    fn test_prompt_then_stop_sequence() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let temp = tempdir().unwrap();

        run_hook(temp.path(), "SessionStart", input_for("SessionStart", "seq"));

        let mut prompt = input_for("UserPromptSubmit", "seq");
        prompt.prompt = Some("fix the bug".to_string());
        run_hook(temp.path(), "UserPromptSubmit", prompt);
        assert_eq!(only_session(temp.path()).status, Status::Working);

        run_hook(temp.path(), "Stop", input_for("Stop", "seq"));
        let session = only_session(temp.path());
        assert_eq!(session.status, Status::Idle);
        assert_eq!(session.last_prompt, Some("fix the bug".to_string()));
        assert_eq!(session.last_tool, None);
    }

    #[test]
    fn test_notification_idle_sets_waiting_input() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let temp = tempdir().unwrap();

        run_hook(temp.path(), "SessionStart", input_for("SessionStart", "n"));
        let mut notif = input_for("Notification", "n");
        notif.notification_type = Some("idle_prompt".to_string());
        notif.message = Some("Your turn".to_string());
        run_hook(temp.path(), "Notification", notif);

        let session = only_session(temp.path());
        assert_eq!(session.status, Status::WaitingInput);
        assert_eq!(session.notification_message, Some("Your turn".to_string()));
    }

    #[test]
    fn test_precompact_sets_compacting() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let temp = tempdir().unwrap();

        run_hook(temp.path(), "SessionStart", input_for("SessionStart", "c"));
        run_hook(temp.path(), "PreCompact", input_for("PreCompact", "c"));
        assert_eq!(only_session(temp.path()).status, Status::Compacting);
    }

    #[test]
    fn test_session_end_is_a_noop() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let temp = tempdir().unwrap();

        run_hook(temp.path(), "SessionStart", input_for("SessionStart", "e"));
        run_hook(temp.path(), "SessionEnd", input_for("SessionEnd", "e"));

        // The record survives; only liveness cleanup removes it
        assert_eq!(only_session(temp.path()).session_id, "e");
    }

    #[test]
    fn test_resume_renames_record_in_place() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let temp = tempdir().unwrap();

        run_hook(temp.path(), "SessionStart", input_for("SessionStart", "old-id"));
        let mut prompt = input_for("UserPromptSubmit", "new-id");
        prompt.prompt = Some("continue".to_string());
        run_hook(temp.path(), "UserPromptSubmit", prompt);

        let session = only_session(temp.path());
        assert_eq!(session.session_id, "new-id");
    }

    #[test]
    fn test_hook_log_written() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let temp = tempdir().unwrap();

        run_hook(temp.path(), "SessionStart", input_for("SessionStart", "logged"));

        let log = temp.path().join("logs").join("logged.log");
        let contents = std::fs::read_to_string(log).unwrap();
        assert!(contents.contains("HOOK SessionStart"));
        assert!(contents.contains("-> idle"));
    }
}
