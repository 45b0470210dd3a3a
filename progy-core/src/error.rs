//! Progy error taxonomy with clear, actionable messages
//!
//! Low-level git operations never produce these directly; they return
//! structured [`crate::git::GitResult`] values. Conversion into an error
//! happens at the orchestration boundary (sync manager, CLI) where a human
//! decision is needed.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProgyError {
    /// A file, course or package could not be found
    #[error("Not found: {what}\n  looked in: {path}")]
    NotFound { what: String, path: PathBuf },

    /// A course configuration failed validation
    #[error("Invalid course configuration: {reason}\n\nFix {path} and retry.")]
    Validation { path: PathBuf, reason: String },

    /// Another process holds the advisory sync lock for this working directory
    #[error("Another sync is in progress for this course (pid {holder_pid}, started {acquired_at}).\n\nWait for it to finish, or remove {lock_path} if you are sure no other progy process is running.")]
    LockContention {
        lock_path: PathBuf,
        holder_pid: u32,
        acquired_at: String,
    },

    /// A git subprocess exited non-zero; stderr/stdout passed through verbatim
    #[error("git {operation} failed:\n{stderr}")]
    GitFailure { operation: String, stderr: String },

    /// Registry or credential endpoint failure, distinct from git failures
    /// so callers can suggest checking connectivity instead of repo state
    #[error("Network request to {endpoint} failed: {detail}")]
    NetworkFailure { endpoint: String, detail: String },

    /// Rejection of spoofing or path-traversal attempts
    #[error("Security violation: {reason}")]
    Security { reason: String },

    /// A packed .progy archive exists but cannot be read back
    #[error("Archive is corrupt or truncated: {path}\n\nRe-pack the course or re-download the archive.")]
    CorruptArchive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ProgyError>;

impl ProgyError {
    pub fn not_found(what: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        ProgyError::NotFound {
            what: what.into(),
            path: path.into(),
        }
    }

    pub fn validation(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ProgyError::Validation {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn security(reason: impl Into<String>) -> Self {
        ProgyError::Security {
            reason: reason.into(),
        }
    }

    /// Log spoofing/traversal rejections to the security target
    pub fn log_if_security_critical(&self) {
        if let ProgyError::Security { reason } = self {
            tracing::error!(target: "security", "SECURITY VIOLATION: {}", reason);
        }
    }
}
