//! Signed-in identity
//!
//! The services identify the caller only by a user id sent alongside each
//! request. [`SessionStore`] is the one place that id is written or cleared;
//! everything else receives a [`Session`] value at construction and never
//! reads storage itself.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};

/// The signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub signed_in_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            signed_in_at: Utc::now(),
        }
    }
}

/// Owns the persisted session file
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Store at the default path (`$XDG_STATE_HOME/drivesense/session.json`)
    pub fn open_default() -> Self {
        Self::at(Config::session_path())
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current session, if any. A corrupt file reads as signed out.
    pub fn load(&self) -> Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        match serde_json::from_str::<Session>(&content) {
            Ok(session) if !session.user_id.trim().is_empty() => Ok(Some(session)),
            Ok(_) => Ok(None),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Ignoring unreadable session file");
                Ok(None)
            }
        }
    }

    /// Current session, or [`Error::NotSignedIn`].
    pub fn require(&self) -> Result<Session> {
        self.load()?.ok_or(Error::NotSignedIn)
    }

    /// Persist a new session after login or account creation.
    pub fn sign_in(&self, user_id: &str) -> Result<Session> {
        if user_id.trim().is_empty() {
            return Err(Error::NotSignedIn);
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let session = Session::new(user_id);
        std::fs::write(&self.path, serde_json::to_string_pretty(&session)?)?;
        tracing::info!(user_id = %user_id, "Session started");
        Ok(session)
    }

    /// Clear the session. Signing out twice is not an error.
    pub fn sign_out(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!("Session cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
