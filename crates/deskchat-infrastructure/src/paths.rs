//! Path resolution for deskchat data files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.deskchat/                 # Base directory (override: $DESKCHAT_HOME)
//! ├── sessions/
//! │   ├── <session-id>.toml    # Session + its messages
//! │   └── ...
//! └── active_session.txt       # ID of the currently active session
//! ```

use std::env;
use std::path::PathBuf;

use deskchat_core::error::{DeskchatError, Result};

/// Unified path management for deskchat storage.
pub struct DeskchatPaths;

impl DeskchatPaths {
    /// Returns the base data directory.
    ///
    /// `$DESKCHAT_HOME` takes precedence; otherwise `~/.deskchat`.
    ///
    /// # Errors
    ///
    /// Returns a config error if the home directory cannot be determined.
    pub fn base_dir() -> Result<PathBuf> {
        if let Ok(dir) = env::var("DESKCHAT_HOME") {
            if !dir.trim().is_empty() {
                return Ok(PathBuf::from(dir));
            }
        }
        dirs::home_dir()
            .map(|home| home.join(".deskchat"))
            .ok_or_else(|| DeskchatError::config("cannot determine home directory"))
    }

    /// Returns the sessions directory under the base directory.
    pub fn sessions_dir() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("sessions"))
    }
}
