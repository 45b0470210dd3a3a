//! Local sync state (`progy.toml`)
//!
//! Records which upstream a working directory tracks and when it last
//! synced. Created at `init`, updated on every successful sync. Without it
//! the upstream identity is unknown, so `sync` and `save` hard-stop on a
//! missing or unreadable state file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ProgyError, Result};

/// Sync state file name inside a working directory
pub const SYNC_STATE_FILE: &str = "progy.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncState {
    pub course: CourseRef,
    #[serde(default)]
    pub sync: SyncMeta,
}

/// Upstream identity of a tracked course
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseRef {
    /// Course id, keys the upstream cache directory
    pub id: String,

    /// Upstream repository URL
    pub repo: String,

    /// Branch the course is pinned to
    pub branch: String,

    /// Subpath within the upstream repo for monorepo-style courses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncMeta {
    /// Timestamp of the last successful sync
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<DateTime<Utc>>,
}

impl SyncState {
    pub fn new(id: &str, repo: &str, branch: &str, path: Option<String>) -> Self {
        Self {
            course: CourseRef {
                id: id.to_string(),
                repo: repo.to_string(),
                branch: branch.to_string(),
                path,
            },
            sync: SyncMeta::default(),
        }
    }

    /// Load from a working directory. Missing or unreadable state is an
    /// error; callers that can proceed without it (reset) handle it.
    pub fn load(workdir: &Path) -> Result<Self> {
        let path = workdir.join(SYNC_STATE_FILE);
        if !path.exists() {
            return Err(ProgyError::not_found("sync state (run `progy init` first)", path));
        }

        let content = std::fs::read_to_string(&path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save(&self, workdir: &Path) -> Result<()> {
        let path = workdir.join(SYNC_STATE_FILE);
        let content = toml::to_string_pretty(self).map_err(|e| {
            ProgyError::validation(&path, format!("failed to serialize sync state: {e}"))
        })?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Record a successful sync
    pub fn touch(&mut self) {
        self.sync.last_sync = Some(Utc::now());
    }
}
