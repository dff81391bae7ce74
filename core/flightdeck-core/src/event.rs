//! Maps lifecycle events to status transitions and record updates.
//!
//! Classification first folds the raw hook name plus an optional
//! notification sub-type into a closed [`EventKind`] set; the transition
//! table is then a total pure function over (status, kind). Side effects
//! on the record are keyed on the event kind, not on the resulting status.

use serde_json::Value;

use crate::session::{Session, Status};

/// Maximum length for extracted tool detail strings.
pub const MAX_TOOL_DETAIL_LEN: usize = 120;

/// Closed set of classified lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    SessionStart,
    UserPromptSubmit,
    PreToolUse,
    PostToolUse,
    Stop,
    PermissionRequest,
    NotificationIdle,
    NotificationPermission,
    NotificationOther,
    PreCompact,
    SessionEnd,
    Unknown,
}

/// All event kinds, for exhaustive table tests.
pub const ALL_EVENT_KINDS: [EventKind; 12] = [
    EventKind::SessionStart,
    EventKind::UserPromptSubmit,
    EventKind::PreToolUse,
    EventKind::PostToolUse,
    EventKind::Stop,
    EventKind::PermissionRequest,
    EventKind::NotificationIdle,
    EventKind::NotificationPermission,
    EventKind::NotificationOther,
    EventKind::PreCompact,
    EventKind::SessionEnd,
    EventKind::Unknown,
];

impl EventKind {
    /// Classify a raw hook event name plus an optional notification sub-type.
    pub fn parse(event_name: &str, notification_type: Option<&str>) -> EventKind {
        match event_name {
            "SessionStart" => EventKind::SessionStart,
            "UserPromptSubmit" => EventKind::UserPromptSubmit,
            "PreToolUse" => EventKind::PreToolUse,
            "PostToolUse" => EventKind::PostToolUse,
            "Stop" => EventKind::Stop,
            "PermissionRequest" => EventKind::PermissionRequest,
            "PreCompact" => EventKind::PreCompact,
            "SessionEnd" => EventKind::SessionEnd,
            "Notification" => match notification_type {
                Some("idle_prompt") => EventKind::NotificationIdle,
                Some("permission_prompt") | Some("elicitation_dialog") => {
                    EventKind::NotificationPermission
                }
                _ => EventKind::NotificationOther,
            },
            _ => EventKind::Unknown,
        }
    }
}

/// The transition table: `(status, kind) -> Some(new status)` or `None`
/// to preserve the current status.
///
/// `PermissionRequest` owns the move to `waiting_permission`; the redundant
/// permission-type notification that follows asynchronously is a no-op so
/// it can never race a later `PreToolUse` back out of `working`.
pub fn next_status(_current: Status, kind: EventKind) -> Option<Status> {
    match kind {
        EventKind::SessionStart | EventKind::Stop => Some(Status::Idle),
        EventKind::UserPromptSubmit | EventKind::PreToolUse | EventKind::PostToolUse => {
            Some(Status::Working)
        }
        EventKind::NotificationIdle => Some(Status::WaitingInput),
        EventKind::PermissionRequest => Some(Status::WaitingPermission),
        EventKind::PreCompact => Some(Status::Compacting),
        EventKind::NotificationPermission
        | EventKind::NotificationOther
        | EventKind::SessionEnd
        | EventKind::Unknown => None,
    }
}

/// Event payload consulted by [`apply_event`] for side-effect field updates.
#[derive(Debug, Default)]
pub struct EventContext {
    pub prompt: Option<String>,
    pub tool_name: Option<String>,
    pub tool_input: Option<Value>,
    pub message: Option<String>,
    pub title: Option<String>,
    /// Owning PID and fingerprint, resolved by the event source.
    pub pid: Option<u32>,
    pub pid_start_time: Option<u64>,
    pub workspace: Option<String>,
    pub source: Option<String>,
}

/// Outcome of applying one event to a session record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Applied {
    pub old_status: Status,
    pub new_status: Status,
    /// True when the transition table answered "no change".
    pub preserved: bool,
}

/// Applies one classified event to a session record: status transition,
/// side-effect field updates, and the activity timestamp.
pub fn apply_event(session: &mut Session, kind: EventKind, ctx: &EventContext) -> Applied {
    let old_status = session.status;
    let preserved = match next_status(old_status, kind) {
        Some(new_status) => {
            session.status = new_status;
            false
        }
        None => true,
    };

    session.last_activity = chrono::Utc::now();

    match kind {
        EventKind::SessionStart => {
            session.last_tool = None;
            session.last_tool_detail = None;
            session.notification_message = None;
            session.last_prompt = None;
            session.pid = ctx.pid;
            session.pid_start_time = ctx.pid_start_time;
            if ctx.workspace.is_some() {
                session.workspace = ctx.workspace.clone();
            }
            if ctx.source.is_some() {
                session.source = ctx.source.clone();
            }
        }

        EventKind::UserPromptSubmit => {
            session.last_tool = None;
            session.last_tool_detail = None;
            session.notification_message = None;
            if let Some(ref prompt) = ctx.prompt {
                session.last_prompt = Some(prompt.clone());
            }
        }

        EventKind::PreToolUse => {
            if let Some(ref tool_name) = ctx.tool_name {
                session.last_tool = Some(tool_name.clone());
                session.last_tool_detail = ctx
                    .tool_input
                    .as_ref()
                    .and_then(|ti| extract_tool_detail(tool_name, ti));
            }
            // A stale permission message must not survive into working
            session.notification_message = None;
        }

        EventKind::PermissionRequest => {
            // Tool context is kept on purpose: once the permission resolves
            // into working, the card still shows what is running.
            session.notification_message = ctx.title.clone().or_else(|| {
                ctx.tool_name.as_ref().map(|t| {
                    let detail = ctx
                        .tool_input
                        .as_ref()
                        .and_then(|ti| extract_tool_detail(t, ti));
                    match detail {
                        Some(d) => format!("{}: {}", t, d),
                        None => t.clone(),
                    }
                })
            });
        }

        EventKind::NotificationIdle | EventKind::NotificationOther => {
            session.last_tool = None;
            session.last_tool_detail = None;
            if let Some(ref msg) = ctx.message {
                session.notification_message = Some(msg.clone());
            }
        }

        EventKind::Stop => {
            session.last_tool = None;
            session.last_tool_detail = None;
            session.notification_message = None;
        }

        EventKind::NotificationPermission
        | EventKind::PostToolUse
        | EventKind::PreCompact
        | EventKind::SessionEnd
        | EventKind::Unknown => {}
    }

    Applied {
        old_status,
        new_status: session.status,
        preserved,
    }
}

/// Extracts a human-readable detail string from a tool-argument map.
///
/// Maps tool names to the most relevant argument field:
/// - Bash -> command
/// - Edit/Write/Read -> file_path
/// - Grep/Glob -> pattern
/// - WebFetch -> url
/// - WebSearch -> query
/// - Task -> description
///
/// Only string-valued entries are consulted; non-string values and unknown
/// tools yield no detail.
pub fn extract_tool_detail(tool_name: &str, tool_input: &Value) -> Option<String> {
    let field = match tool_name {
        "Bash" => "command",
        "Edit" | "Write" | "Read" => "file_path",
        "Grep" | "Glob" => "pattern",
        "WebFetch" => "url",
        "WebSearch" => "query",
        "Task" => "description",
        _ => return None,
    };

    let value = tool_input.get(field)?.as_str()?;
    if value.is_empty() {
        return None;
    }

    if value.len() > MAX_TOOL_DETAIL_LEN {
        let truncated: String = value.chars().take(MAX_TOOL_DETAIL_LEN - 3).collect();
        Some(format!("{}...", truncated))
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{TerminalInfo, ALL_STATUSES};

    fn session() -> Session {
        Session::new(
            "abc123".to_string(),
            "/tmp/proj".to_string(),
            "main".to_string(),
            TerminalInfo::default(),
        )
    }

    #[test]
    fn test_classification() {
        assert_eq!(EventKind::parse("SessionStart", None), EventKind::SessionStart);
        assert_eq!(
            EventKind::parse("UserPromptSubmit", None),
            EventKind::UserPromptSubmit
        );
        assert_eq!(EventKind::parse("PreToolUse", None), EventKind::PreToolUse);
        assert_eq!(EventKind::parse("PostToolUse", None), EventKind::PostToolUse);
        assert_eq!(EventKind::parse("Stop", None), EventKind::Stop);
        assert_eq!(
            EventKind::parse("PermissionRequest", None),
            EventKind::PermissionRequest
        );
        assert_eq!(EventKind::parse("PreCompact", None), EventKind::PreCompact);
        assert_eq!(EventKind::parse("SessionEnd", None), EventKind::SessionEnd);
        assert_eq!(EventKind::parse("Whatever", None), EventKind::Unknown);
    }

    #[test]
    fn test_notification_subtype_classification() {
        assert_eq!(
            EventKind::parse("Notification", Some("idle_prompt")),
            EventKind::NotificationIdle
        );
        assert_eq!(
            EventKind::parse("Notification", Some("permission_prompt")),
            EventKind::NotificationPermission
        );
        assert_eq!(
            EventKind::parse("Notification", Some("elicitation_dialog")),
            EventKind::NotificationPermission
        );
        assert_eq!(
            EventKind::parse("Notification", Some("something_else")),
            EventKind::NotificationOther
        );
        assert_eq!(
            EventKind::parse("Notification", None),
            EventKind::NotificationOther
        );
    }

    #[test]
    fn test_transition_table_is_total() {
        // Every (status, kind) pair has a defined, deterministic answer.
        for status in ALL_STATUSES {
            for kind in ALL_EVENT_KINDS {
                let first = next_status(status, kind);
                let second = next_status(status, kind);
                assert_eq!(first, second);
            }
        }
    }

    #[test]
    fn test_start_and_stop_force_idle_from_every_status() {
        for status in ALL_STATUSES {
            assert_eq!(next_status(status, EventKind::SessionStart), Some(Status::Idle));
            assert_eq!(next_status(status, EventKind::Stop), Some(Status::Idle));
        }
    }

    #[test]
    fn test_tool_and_prompt_events_force_working() {
        for status in ALL_STATUSES {
            assert_eq!(
                next_status(status, EventKind::UserPromptSubmit),
                Some(Status::Working)
            );
            assert_eq!(next_status(status, EventKind::PreToolUse), Some(Status::Working));
            assert_eq!(next_status(status, EventKind::PostToolUse), Some(Status::Working));
        }
    }

    #[test]
    fn test_preserving_kinds_never_change_status() {
        for status in ALL_STATUSES {
            assert_eq!(next_status(status, EventKind::NotificationPermission), None);
            assert_eq!(next_status(status, EventKind::NotificationOther), None);
            assert_eq!(next_status(status, EventKind::SessionEnd), None);
            assert_eq!(next_status(status, EventKind::Unknown), None);
        }
    }

    #[test]
    fn test_directed_transitions() {
        assert_eq!(
            next_status(Status::Working, EventKind::NotificationIdle),
            Some(Status::WaitingInput)
        );
        assert_eq!(
            next_status(Status::Working, EventKind::PermissionRequest),
            Some(Status::WaitingPermission)
        );
        assert_eq!(
            next_status(Status::Working, EventKind::PreCompact),
            Some(Status::Compacting)
        );
    }

    #[test]
    fn test_extract_tool_detail_known_tools() {
        let input = serde_json::json!({"command": "npm test"});
        assert_eq!(
            extract_tool_detail("Bash", &input),
            Some("npm test".to_string())
        );

        let input = serde_json::json!({"file_path": "/src/main.rs", "old_string": "x"});
        assert_eq!(
            extract_tool_detail("Edit", &input),
            Some("/src/main.rs".to_string())
        );

        let input = serde_json::json!({"pattern": "TODO"});
        assert_eq!(extract_tool_detail("Grep", &input), Some("TODO".to_string()));
    }

    #[test]
    fn test_extract_tool_detail_unknown_tool_and_missing_field() {
        let input = serde_json::json!({"anything": "value"});
        assert_eq!(extract_tool_detail("UnknownTool", &input), None);
        assert_eq!(extract_tool_detail("Bash", &input), None);
    }

    #[test]
    fn test_extract_tool_detail_non_string_value_dropped() {
        let input = serde_json::json!({"command": 42});
        assert_eq!(extract_tool_detail("Bash", &input), None);
    }

    #[test]
    fn test_extract_tool_detail_truncation() {
        let long_cmd = "a".repeat(300);
        let input = serde_json::json!({"command": long_cmd});
        let result = extract_tool_detail("Bash", &input).unwrap();
        assert_eq!(result.len(), MAX_TOOL_DETAIL_LEN);
        assert!(result.ends_with("..."));
    }

    #[test]
    fn test_prompt_submit_records_prompt_and_clears_context() {
        let mut s = session();
        s.last_tool = Some("Bash".to_string());
        s.notification_message = Some("old".to_string());

        let ctx = EventContext {
            prompt: Some("fix bug".to_string()),
            ..Default::default()
        };
        let applied = apply_event(&mut s, EventKind::UserPromptSubmit, &ctx);

        assert_eq!(applied.new_status, Status::Working);
        assert!(!applied.preserved);
        assert_eq!(s.last_prompt, Some("fix bug".to_string()));
        assert_eq!(s.last_tool, None);
        assert_eq!(s.notification_message, None);
    }

    #[test]
    fn test_permission_request_keeps_tool_context() {
        let mut s = session();
        s.status = Status::Working;
        s.last_tool = Some("Bash".to_string());
        s.last_tool_detail = Some("rm -rf tmp".to_string());

        let ctx = EventContext {
            title: Some("Allow rm -rf".to_string()),
            ..Default::default()
        };
        apply_event(&mut s, EventKind::PermissionRequest, &ctx);

        assert_eq!(s.status, Status::WaitingPermission);
        assert_eq!(s.notification_message, Some("Allow rm -rf".to_string()));
        assert_eq!(s.last_tool, Some("Bash".to_string()));
        assert_eq!(s.last_tool_detail, Some("rm -rf tmp".to_string()));
    }

    #[test]
    fn test_permission_message_synthesized_from_tool() {
        let mut s = session();
        let ctx = EventContext {
            tool_name: Some("Bash".to_string()),
            tool_input: Some(serde_json::json!({"command": "npm install"})),
            ..Default::default()
        };
        apply_event(&mut s, EventKind::PermissionRequest, &ctx);
        assert_eq!(
            s.notification_message,
            Some("Bash: npm install".to_string())
        );
    }

    #[test]
    fn test_redundant_permission_notification_is_a_full_noop() {
        let mut s = session();
        s.status = Status::Working;
        s.last_tool = Some("Bash".to_string());
        s.last_tool_detail = Some("rm -rf tmp".to_string());
        let before_tool = s.last_tool.clone();

        let ctx = EventContext {
            message: Some("Claude needs your permission".to_string()),
            ..Default::default()
        };
        let applied = apply_event(&mut s, EventKind::NotificationPermission, &ctx);

        assert!(applied.preserved);
        assert_eq!(s.status, Status::Working);
        assert_eq!(s.last_tool, before_tool);
        assert_eq!(s.notification_message, None);
    }

    #[test]
    fn test_pre_tool_use_clears_stale_permission_message() {
        let mut s = session();
        s.status = Status::WaitingPermission;
        s.notification_message = Some("Allow rm -rf".to_string());

        let ctx = EventContext {
            tool_name: Some("Bash".to_string()),
            tool_input: Some(serde_json::json!({"command": "rm -rf tmp"})),
            ..Default::default()
        };
        apply_event(&mut s, EventKind::PreToolUse, &ctx);

        assert_eq!(s.status, Status::Working);
        assert_eq!(s.notification_message, None);
        assert_eq!(s.last_tool_detail, Some("rm -rf tmp".to_string()));
    }

    #[test]
    fn test_session_start_reinitializes_identity() {
        let mut s = session();
        s.status = Status::Working;
        s.last_tool = Some("Bash".to_string());
        s.last_prompt = Some("old prompt".to_string());

        let ctx = EventContext {
            pid: Some(4242),
            pid_start_time: Some(1_700_000_000),
            source: Some("claude".to_string()),
            ..Default::default()
        };
        apply_event(&mut s, EventKind::SessionStart, &ctx);

        assert_eq!(s.status, Status::Idle);
        assert_eq!(s.pid, Some(4242));
        assert_eq!(s.pid_start_time, Some(1_700_000_000));
        assert_eq!(s.last_tool, None);
        assert_eq!(s.last_prompt, None);
        assert_eq!(s.source, Some("claude".to_string()));
    }

    #[test]
    fn test_stop_clears_all_transient_context() {
        let mut s = session();
        s.status = Status::WaitingPermission;
        s.last_tool = Some("Bash".to_string());
        s.last_tool_detail = Some("npm test".to_string());
        s.notification_message = Some("Allow?".to_string());

        apply_event(&mut s, EventKind::Stop, &EventContext::default());

        assert_eq!(s.status, Status::Idle);
        assert_eq!(s.last_tool, None);
        assert_eq!(s.last_tool_detail, None);
        assert_eq!(s.notification_message, None);
    }

    #[test]
    fn test_idle_notification_records_message() {
        let mut s = session();
        s.status = Status::Working;
        s.last_tool = Some("Bash".to_string());

        let ctx = EventContext {
            message: Some("Waiting for your input".to_string()),
            ..Default::default()
        };
        apply_event(&mut s, EventKind::NotificationIdle, &ctx);

        assert_eq!(s.status, Status::WaitingInput);
        assert_eq!(s.last_tool, None);
        assert_eq!(
            s.notification_message,
            Some("Waiting for your input".to_string())
        );
    }
}
