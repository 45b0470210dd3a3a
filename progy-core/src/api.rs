//! Framework-agnostic endpoint contract
//!
//! Serde request/response types plus thin async functions over the core, so
//! an HTTP layer (or the CLI, which consumes the same functions) can expose
//! them 1:1. Endpoint failures are reported as `{ "success": false,
//! "error": ... }` bodies via [`error_body`], never a bare status code.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path};

use crate::config::CourseConfig;
use crate::error::{ProgyError, Result};
use crate::manifest::{self, Manifest};
use crate::progress::ProgressStore;
use crate::runner;

/// `GET /exercises/code` response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeResponse {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
}

/// `POST /exercises/run` request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub exercise_name: String,
    pub id: String,
}

/// `POST /exercises/run` response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    pub success: bool,
    pub output: String,
    pub friendly_output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<ProgressSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate progress attached to a successful run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub xp_awarded: u32,
    pub total_xp: u32,
    pub streak_days: u32,
    pub passed_count: usize,
}

/// Uniform error envelope for endpoint failures
pub fn error_body(error: &ProgyError) -> serde_json::Value {
    serde_json::json!({
        "success": false,
        "error": error.to_string(),
    })
}

/// `GET /exercises`: rebuild and return the manifest
pub fn list_exercises(course_root: &Path, config: &CourseConfig) -> Result<Manifest> {
    manifest::rebuild_cache(course_root, &config.content_root(course_root))
}

/// Reject any requested path that could escape the content root
fn guard_relative(content_root: &Path, requested: &str) -> Result<std::path::PathBuf> {
    let path = Path::new(requested);
    if path.is_absolute()
        || path
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
    {
        let err = ProgyError::security(format!(
            "requested path {requested:?} escapes the content root"
        ));
        err.log_if_security_critical();
        return Err(err);
    }
    Ok(content_root.join(path))
}

/// `GET /exercises/code`: read an exercise's code and optional markdown
pub fn get_code(
    course_root: &Path,
    config: &CourseConfig,
    path: &str,
    markdown_path: Option<&str>,
) -> Result<CodeResponse> {
    let content_root = config.content_root(course_root);

    let code_path = guard_relative(&content_root, path)?;
    let code = std::fs::read_to_string(&code_path)
        .map_err(|_| ProgyError::not_found("exercise code", &code_path))?;

    let markdown = match markdown_path {
        Some(md) => {
            let md_path = guard_relative(&content_root, md)?;
            std::fs::read_to_string(md_path).ok()
        }
        None => None,
    };

    Ok(CodeResponse { code, markdown })
}

/// `POST /exercises/run`: execute an exercise and record progress
pub async fn run(course_root: &Path, config: &CourseConfig, request: &RunRequest) -> Result<RunResponse> {
    let manifest = manifest::scan(&config.content_root(course_root))?;
    let exercise = manifest.find(&request.id).ok_or_else(|| {
        ProgyError::not_found(format!("exercise `{}`", request.id), course_root)
    })?;

    let outcome = runner::run_exercise(course_root, config, exercise).await?;

    let mut store = ProgressStore::load_or_default(course_root)?;
    let xp_awarded = store.record(&exercise.id, outcome.success);
    store.save(course_root)?;

    Ok(RunResponse {
        success: outcome.success,
        output: outcome.output,
        friendly_output: outcome.friendly_output,
        progress: Some(ProgressSummary {
            xp_awarded,
            total_xp: store.stats.total_xp,
            streak_days: store.stats.streak_days,
            passed_count: store.passed_count(),
        }),
        error: outcome.error,
    })
}
