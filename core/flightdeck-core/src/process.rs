//! Process identity oracle: owner resolution, start-time fingerprinting,
//! liveness probing, and controlling-terminal discovery.
//!
//! All OS access goes through the [`ProcessInspector`] trait so liveness
//! and cleanup logic can be tested against a fake process table. Nothing
//! in this module mutates state, and every lookup has a safe "unknown"
//! fallback; a failed query must never abort a hook invocation.

use std::collections::HashMap;
use std::process::Command;

use sysinfo::{Pid, ProcessRefreshKind, System};

/// Shell image names that are skipped when resolving the owning process.
const KNOWN_SHELLS: [&str; 5] = ["sh", "bash", "zsh", "fish", "dash"];

/// Maximum parent-chain hops when skipping shell wrappers.
const SHELL_WALK_MAX_HOPS: usize = 4;

/// Maximum parent-chain hops when looking for a controlling terminal.
const TTY_WALK_MAX_HOPS: usize = 6;

/// Two start-time observations within this many seconds identify the same
/// process (absorbs timestamp rounding between process-table queries).
pub const START_TIME_TOLERANCE_SECS: u64 = 1;

/// Narrow process-table capability, injectable for tests.
pub trait ProcessInspector {
    /// Parent PID, or None if the process is gone or has no parent.
    fn parent_of(&self, pid: u32) -> Option<u32>;
    /// Process image name (basename, e.g. "bash").
    fn name_of(&self, pid: u32) -> Option<String>;
    /// Process start time, seconds since epoch.
    fn start_time(&self, pid: u32) -> Option<u64>;
    /// Zero-signal liveness probe. Permission errors count as alive.
    fn is_alive(&self, pid: u32) -> bool;
    /// Controlling terminal path, e.g. "/dev/ttys003".
    fn tty_of(&self, pid: u32) -> Option<String>;
}

/// True iff two start-time observations identify the same process.
pub fn same_process(a: u64, b: u64) -> bool {
    a.abs_diff(b) <= START_TIME_TOLERANCE_SECS
}

fn is_shell(name: &str) -> bool {
    // Login shells report as "-bash"; some tables report a full path.
    let base = name
        .trim_start_matches('-')
        .rsplit('/')
        .next()
        .unwrap_or(name);
    KNOWN_SHELLS.contains(&base)
}

/// Resolves the PID that owns the current event.
///
/// `parent` is the event source's immediate parent. When that parent is a
/// shell wrapper, the owner is the first non-shell ancestor within a
/// bounded walk; an exhausted walk returns the last PID visited.
pub fn resolve_owner_pid(inspector: &dyn ProcessInspector, parent: u32) -> u32 {
    let mut current = parent;
    for _ in 0..SHELL_WALK_MAX_HOPS {
        match inspector.name_of(current) {
            Some(name) if is_shell(&name) => match inspector.parent_of(current) {
                Some(next) if next != 0 && next != current => current = next,
                _ => break,
            },
            _ => break,
        }
    }
    current
}

/// Finds the controlling terminal for an event by walking up from `start`.
///
/// The event source itself usually has no controlling terminal (its stdin
/// is a pipe), so the first ancestor that reports one wins.
pub fn resolve_tty(inspector: &dyn ProcessInspector, start: u32) -> Option<String> {
    let mut current = start;
    for _ in 0..TTY_WALK_MAX_HOPS {
        if let Some(tty) = inspector.tty_of(current) {
            return Some(tty);
        }
        match inspector.parent_of(current) {
            Some(next) if next != 0 && next != current => current = next,
            _ => break,
        }
    }
    None
}

/// Production inspector backed by the operating system process table.
pub struct SystemInspector;

impl SystemInspector {
    fn refreshed(pid: u32) -> System {
        let mut sys = System::new();
        sys.refresh_process_specifics(Pid::from_u32(pid), ProcessRefreshKind::new());
        sys
    }
}

impl ProcessInspector for SystemInspector {
    fn parent_of(&self, pid: u32) -> Option<u32> {
        let sys = Self::refreshed(pid);
        sys.process(Pid::from_u32(pid))
            .and_then(|p| p.parent())
            .map(|p| p.as_u32())
    }

    fn name_of(&self, pid: u32) -> Option<String> {
        let sys = Self::refreshed(pid);
        sys.process(Pid::from_u32(pid)).map(|p| p.name().to_string())
    }

    fn start_time(&self, pid: u32) -> Option<u64> {
        let sys = Self::refreshed(pid);
        sys.process(Pid::from_u32(pid)).map(|p| p.start_time())
    }

    fn is_alive(&self, pid: u32) -> bool {
        #[cfg(unix)]
        {
            // SAFETY: kill with signal 0 performs permission and existence
            // checks without delivering a signal. EPERM means the PID is
            // alive in another user's context; ESRCH means it is gone.
            #[allow(unsafe_code)]
            let rc = unsafe { libc::kill(pid as libc::pid_t, 0) };
            if rc == 0 {
                return true;
            }
            matches!(
                std::io::Error::last_os_error().raw_os_error(),
                Some(libc::EPERM)
            )
        }
        #[cfg(not(unix))]
        {
            Self::refreshed(pid).process(Pid::from_u32(pid)).is_some()
        }
    }

    fn tty_of(&self, pid: u32) -> Option<String> {
        // sysinfo does not expose the controlling terminal; `ps` does, and
        // the call is bounded and synchronous.
        let output = Command::new("ps")
            .args(["-o", "tty=", "-p", &pid.to_string()])
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let tty = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if tty.is_empty() || tty == "?" || tty == "??" || tty == "-" {
            return None;
        }
        if tty.starts_with("/dev/") {
            Some(tty)
        } else {
            Some(format!("/dev/{}", tty))
        }
    }
}

/// In-memory process table for tests.
#[derive(Debug, Default)]
pub struct FakeInspector {
    processes: HashMap<u32, FakeProcess>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeProcess {
    pub parent: Option<u32>,
    pub name: String,
    pub start_time: u64,
    pub tty: Option<String>,
}

impl FakeInspector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pid: u32, process: FakeProcess) {
        self.processes.insert(pid, process);
    }

    pub fn remove(&mut self, pid: u32) {
        self.processes.remove(&pid);
    }
}

impl ProcessInspector for FakeInspector {
    fn parent_of(&self, pid: u32) -> Option<u32> {
        self.processes.get(&pid).and_then(|p| p.parent)
    }

    fn name_of(&self, pid: u32) -> Option<String> {
        self.processes.get(&pid).map(|p| p.name.clone())
    }

    fn start_time(&self, pid: u32) -> Option<u64> {
        self.processes.get(&pid).map(|p| p.start_time)
    }

    fn is_alive(&self, pid: u32) -> bool {
        self.processes.contains_key(&pid)
    }

    fn tty_of(&self, pid: u32) -> Option<String> {
        self.processes.get(&pid).and_then(|p| p.tty.clone())
    }
}
