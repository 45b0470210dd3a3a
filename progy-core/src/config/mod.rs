//! Course configuration (`course.json`)
//!
//! Identifies a course, declares how exercises are run, where content lives,
//! and optional setup checks. Loading validates the runner template and the
//! structural requirements up front so unknown-placeholder and missing-
//! directory mistakes surface at load time, not mid-run.

mod template;

pub use template::{RunnerTemplate, PLACEHOLDERS};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ProgyError, Result};

/// Config file name inside a course working directory
pub const COURSE_CONFIG_FILE: &str = "course.json";

/// The trusted official publisher namespace. A locally-authored config must
/// never pre-populate `repo` with a URL under this namespace; official status
/// is sync/server-assigned only.
pub const OFFICIAL_REPO_NAMESPACE: &str = "github.com/progy-courses/";

/// A course's `course.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseConfig {
    /// Stable course identifier (slug-like)
    pub id: String,

    /// Human-readable course title
    pub name: String,

    /// Course content version
    pub version: String,

    /// How exercises are executed
    pub runner: RunnerConfig,

    /// Where course content lives
    pub content: ContentConfig,

    /// Optional environment setup checks and guide
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup: Option<SetupConfig>,

    /// Upstream repository URL. Sync-assigned; see [`OFFICIAL_REPO_NAMESPACE`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
}

/// Runner command declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Command template with `{{exercise}}`, `{{id}}`, `{{module}}` placeholders
    pub command: String,

    /// Working directory for the runner, relative to the course root
    #[serde(default = "default_cwd")]
    pub cwd: String,
}

fn default_cwd() -> String {
    ".".to_string()
}

/// Content layout declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Content root directory, relative to the course root
    pub root: String,

    /// Exercises subdirectory under the content root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exercises: Option<String>,
}

/// Environment setup section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupConfig {
    /// Named shell-command checks run before the first exercise
    #[serde(default)]
    pub checks: Vec<SetupCheck>,

    /// Markdown setup guide path, relative to the course root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guide: Option<String>,
}

/// A single named setup check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupCheck {
    pub name: String,
    pub command: String,
}

impl CourseConfig {
    /// Load and validate a course config from a course root directory
    pub fn load(course_root: &Path) -> Result<Self> {
        let path = course_root.join(COURSE_CONFIG_FILE);
        Self::load_from_path(&path)
    }

    /// Load and validate a course config from an explicit file path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ProgyError::not_found("course configuration", path));
        }

        let content = std::fs::read_to_string(path)?;
        let config: CourseConfig = serde_json::from_str(&content).map_err(|e| {
            ProgyError::validation(path, format!("invalid JSON: {e}"))
        })?;

        config.validate(path)?;
        Ok(config)
    }

    /// Validate structure, runner template, and trust-sensitive fields
    pub fn validate(&self, path: &Path) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(ProgyError::validation(path, "`id` must not be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(ProgyError::validation(path, "`name` must not be empty"));
        }
        if self.content.root.trim().is_empty() {
            return Err(ProgyError::validation(
                path,
                "`content.root` must not be empty",
            ));
        }

        // Catch unknown placeholders at load time, not at run time
        RunnerTemplate::parse(&self.runner.command).map_err(|reason| {
            ProgyError::validation(path, format!("invalid runner command: {reason}"))
        })?;

        // Trust invariant: only the sync pipeline may assert official status.
        // A hand-written config claiming the official namespace is a spoofing
        // attempt, even if everything else is well-formed.
        if let Some(repo) = &self.repo {
            if repo.contains(OFFICIAL_REPO_NAMESPACE) {
                let err = ProgyError::security(format!(
                    "course config pre-populates `repo` with the official \
                     namespace ({repo}); this field is sync-assigned only"
                ));
                err.log_if_security_critical();
                return Err(err);
            }
        }

        Ok(())
    }

    /// Parsed runner template. Safe to unwrap placeholders after `validate`.
    pub fn runner_template(&self) -> Result<RunnerTemplate> {
        RunnerTemplate::parse(&self.runner.command).map_err(|reason| {
            ProgyError::validation(
                PathBuf::from(COURSE_CONFIG_FILE),
                format!("invalid runner command: {reason}"),
            )
        })
    }

    /// Absolute content root for a given course root
    pub fn content_root(&self, course_root: &Path) -> PathBuf {
        course_root.join(&self.content.root)
    }
}
