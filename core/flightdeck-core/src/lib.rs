//! Flightdeck core: the session state engine shared by the hook handler
//! and the watcher.
//!
//! Short-lived hook processes write PID-keyed session records through the
//! atomic store; the long-running watcher lists them, discards records
//! whose owning process is gone, and publishes the rest. No daemon, no
//! sockets, no locks: the filesystem is the message bus.

pub mod archive;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod event;
pub mod git;
pub mod hooklog;
pub mod process;
pub mod session;
pub mod store;
pub mod watcher;

pub use archive::{recent_projects, ArchiveEntry, ArchiveStore, RecentProject};
pub use cleanup::{cleanup_project_siblings, load_for_event, load_live_sessions, CleanupStats};
pub use config::Config;
pub use error::{DeckError, Result};
pub use event::{apply_event, next_status, EventContext, EventKind};
pub use process::{ProcessInspector, SystemInspector};
pub use session::{GroupedSessions, Session, Status, TerminalInfo};
pub use store::SessionStore;
pub use watcher::SessionWatcher;
