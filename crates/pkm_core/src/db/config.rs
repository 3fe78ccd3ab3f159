//! Connection settings for file-backed sessions.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// How long a session waits on a locked database before failing.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings applied to every connection a session factory opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// SQLite database file.
    pub path: PathBuf,
    /// Lock wait applied through `busy_timeout`.
    pub busy_timeout: Duration,
}

impl SessionConfig {
    /// Creates a config for `path` with default timeouts.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// Sets the lock wait.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}
