//! Session record, status enum, and display helpers.
//!
//! A `Session` is the canonical representation of one coding-agent run,
//! persisted as a single JSON document keyed by the owning process ID.
//! The codec is backward compatible: unknown status strings decode to the
//! legacy catch-all and every post-v1 field carries a serde default.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Session status indicating the current state of a coding-agent session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Session is waiting for user input
    Idle,
    /// Session is actively processing (running tools, generating response)
    Working,
    /// Session is blocked on a permission approval (most urgent)
    WaitingPermission,
    /// Session finished its turn, waiting for a new prompt
    WaitingInput,
    /// Session is compacting its context window
    Compacting,
    /// Legacy fallback: any unknown status deserializes here
    #[serde(other)]
    NeedsAttention,
}

/// All status variants, for exhaustive table tests.
pub const ALL_STATUSES: [Status; 6] = [
    Status::Idle,
    Status::Working,
    Status::WaitingPermission,
    Status::WaitingInput,
    Status::Compacting,
    Status::NeedsAttention,
];

impl Status {
    /// Returns the visual indicator character for this status.
    pub fn indicator(&self) -> &'static str {
        match self {
            Status::Idle => "\u{00B7}",        // middle dot
            Status::Working => "\u{25C9}",     // fisheye
            Status::Compacting => "\u{29D6}",  // hourglass
            Status::WaitingPermission | Status::WaitingInput | Status::NeedsAttention => {
                "\u{2192}" // arrow
            }
        }
    }

    /// Returns the snake_case string representation of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Idle => "idle",
            Status::Working => "working",
            Status::WaitingPermission => "waiting_permission",
            Status::WaitingInput => "waiting_input",
            Status::Compacting => "compacting",
            Status::NeedsAttention => "needs_attention",
        }
    }

    /// Returns true if this status represents a state needing user attention.
    pub fn needs_attention(&self) -> bool {
        matches!(
            self,
            Status::WaitingPermission | Status::WaitingInput | Status::NeedsAttention
        )
    }
}

/// Terminal information for window focusing.
///
/// Opaque to the state engine; passed through to the focus collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TerminalInfo {
    /// Terminal program name (e.g., "iTerm.app", "vscode", "kitty")
    pub program: String,
    /// Terminal-specific session handle (iTerm2 or Kitty)
    #[serde(default)]
    pub session_id: Option<String>,
    /// Controlling terminal path (e.g., "/dev/ttys003")
    #[serde(default)]
    pub tty: Option<String>,
}

/// One coding-agent session with all its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session identifier supplied by the agent. Not stable across resume.
    pub session_id: String,
    /// Full path to the project directory
    pub project_path: String,
    /// Project name (last component of project_path)
    pub project_name: String,
    /// Current git branch
    pub branch: String,
    /// Current session status
    pub status: Status,
    /// Timestamp of last activity
    pub last_activity: DateTime<Utc>,
    /// Timestamp when session started
    pub started_at: DateTime<Utc>,
    /// Terminal information for window focusing
    pub terminal: TerminalInfo,
    /// Owning process ID (the agent process, not the hook shim)
    #[serde(default)]
    pub pid: Option<u32>,
    /// Start time of the owning PID, seconds since epoch. Guards against
    /// the OS handing the same PID to an unrelated process later.
    #[serde(default)]
    pub pid_start_time: Option<u64>,
    /// Last prompt submitted by the user
    #[serde(default)]
    pub last_prompt: Option<String>,
    /// Last tool name from PreToolUse (e.g., "Bash", "Edit")
    #[serde(default)]
    pub last_tool: Option<String>,
    /// Detail from the last tool (command, file path, pattern, ...)
    #[serde(default)]
    pub last_tool_detail: Option<String>,
    /// Message from PermissionRequest or Notification
    #[serde(default)]
    pub notification_message: Option<String>,
    /// Human-assigned session name
    #[serde(default)]
    pub session_name: Option<String>,
    /// Workspace/launch-target path for editor integration
    #[serde(default)]
    pub workspace: Option<String>,
    /// Set only when the session is archived
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    /// Legacy flag, superseded by the `compacting` status. Decoded from old
    /// records, never set by new code.
    #[serde(default)]
    pub context_compacted: bool,
    /// Which event source produced this record
    #[serde(default)]
    pub source: Option<String>,
}

impl Session {
    /// Creates a new idle session for the given project.
    pub fn new(
        session_id: String,
        project_path: String,
        branch: String,
        terminal: TerminalInfo,
    ) -> Self {
        let project_name = extract_project_name(&project_path);
        let now = Utc::now();

        Self {
            session_id,
            project_path,
            project_name,
            branch,
            status: Status::Idle,
            last_activity: now,
            started_at: now,
            terminal,
            pid: None,
            pid_start_time: None,
            last_prompt: None,
            last_tool: None,
            last_tool_detail: None,
            notification_message: None,
            session_name: None,
            workspace: None,
            ended_at: None,
            context_compacted: false,
            source: None,
        }
    }

    /// Parse a Session from a JSON string.
    pub fn from_json(json: &str) -> crate::error::Result<Session> {
        serde_json::from_str(json).map_err(|e| crate::error::DeckError::json("session record", e))
    }

    /// Serialize this session to pretty-printed JSON.
    pub fn to_json(&self) -> crate::error::Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| crate::error::DeckError::json("session record", e))
    }

    /// True if the stored fingerprint matches an observed process start time.
    ///
    /// Start times are compared with a one-second tolerance to absorb
    /// timestamp rounding between process-table queries.
    pub fn fingerprint_matches(&self, observed_start: u64) -> bool {
        match self.pid_start_time {
            Some(stored) => stored.abs_diff(observed_start) <= 1,
            None => false,
        }
    }
}

/// Extracts the project name from a path (last component).
pub fn extract_project_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string()
}

/// Truncate a prompt string to max_len, adding "..." if truncated.
///
/// Also normalizes whitespace (newlines, multiple spaces) to single spaces
/// so prompts display on one line everywhere.
pub fn truncate_prompt(prompt: &str, max_len: usize) -> String {
    let normalized: String = prompt.split_whitespace().collect::<Vec<_>>().join(" ");

    if normalized.len() <= max_len {
        normalized
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        // Don't cut in the middle of a multi-byte character
        let truncated: String = normalized.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format a datetime as relative time (e.g., "5m ago", "2h ago", "12s ago").
pub fn format_relative_time(datetime: DateTime<Utc>) -> String {
    let now = Utc::now();
    let duration = now.signed_duration_since(datetime);

    if duration.num_seconds() < 0 {
        return "just now".to_string();
    }

    let days = duration.num_days();
    let hours = duration.num_hours();
    let minutes = duration.num_minutes();

    if days > 0 {
        format!("{}d ago", days)
    } else if hours > 0 {
        format!("{}h ago", hours)
    } else if minutes > 0 {
        format!("{}m ago", minutes)
    } else {
        format!("{}s ago", duration.num_seconds())
    }
}

/// Format a tool name and optional detail for display.
///
/// Examples:
/// - Bash + "npm test" -> "Running: npm test"
/// - Edit + "/src/main.rs" -> "Editing main.rs"
/// - Grep + "TODO" -> "Searching: TODO"
pub fn format_tool_display(tool: &str, detail: Option<&str>, max_len: usize) -> String {
    let result = match (tool, detail) {
        ("Bash", Some(cmd)) => format!("Running: {}", cmd),
        ("Edit" | "Write" | "Read", Some(path)) => {
            let filename = Path::new(path)
                .file_name()
                .and_then(|f| f.to_str())
                .unwrap_or(path);
            let action = match tool {
                "Edit" => "Editing",
                "Write" => "Writing",
                _ => "Reading",
            };
            format!("{} {}", action, filename)
        }
        ("Grep", Some(pattern)) => format!("Searching: {}", pattern),
        ("Glob", Some(pattern)) => format!("Finding: {}", pattern),
        ("WebFetch", Some(url)) => format!("Fetching: {}", url),
        ("WebSearch", Some(query)) => format!("Searching: {}", query),
        ("Task", Some(desc)) => format!("Task: {}", desc),
        (name, Some(detail)) => format!("{}: {}", name, detail),
        (name, None) => format!("{}...", name),
    };

    if result.len() <= max_len {
        result
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let truncated: String = result.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Sessions grouped by status for display purposes.
#[derive(Debug, Default)]
pub struct GroupedSessions<'a> {
    /// Sessions blocked on permission approval (most urgent)
    pub waiting_permission: Vec<&'a Session>,
    /// Sessions finished, waiting for new prompt
    pub waiting_input: Vec<&'a Session>,
    /// Sessions actively processing or compacting
    pub working: Vec<&'a Session>,
    /// Sessions waiting for user input
    pub idle: Vec<&'a Session>,
}

impl<'a> GroupedSessions<'a> {
    /// Group sessions by their status.
    pub fn from_sessions(sessions: &'a [Session]) -> Self {
        let mut grouped = Self::default();
        for session in sessions {
            match session.status {
                Status::WaitingPermission => grouped.waiting_permission.push(session),
                Status::WaitingInput | Status::NeedsAttention => {
                    grouped.waiting_input.push(session)
                }
                Status::Working | Status::Compacting => grouped.working.push(session),
                Status::Idle => grouped.idle.push(session),
            }
        }
        grouped
    }

    /// Returns true if there are any sessions in any group.
    pub fn has_any(&self) -> bool {
        !self.waiting_permission.is_empty()
            || !self.waiting_input.is_empty()
            || !self.working.is_empty()
            || !self.idle.is_empty()
    }
}
