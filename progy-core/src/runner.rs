//! Exercise runner
//!
//! Substitutes the exercise's identity into the course's validated runner
//! template and executes it, capturing output. The template was validated
//! at config load, so rendering here cannot hit an unknown placeholder.

use std::collections::HashMap;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::CourseConfig;
use crate::error::{ProgyError, Result};
use crate::manifest::Exercise;

/// Captured result of an exercise run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub success: bool,
    /// Raw combined stdout + stderr
    pub output: String,
    /// Trimmed, student-facing output
    pub friendly_output: String,
    /// Failure detail, when the run did not succeed
    pub error: Option<String>,
}

/// Run one exercise with the course's configured runner
pub async fn run_exercise(
    course_root: &Path,
    config: &CourseConfig,
    exercise: &Exercise,
) -> Result<RunOutcome> {
    let template = config.runner_template()?;

    let exercise_path = Path::new(&config.content.root)
        .join(&exercise.path)
        .to_string_lossy()
        .replace('\\', "/");

    let mut values = HashMap::new();
    values.insert("exercise", exercise_path);
    values.insert("id", exercise.id.clone());
    values.insert("module", exercise.module.clone());

    let command_line = template.render(&values);
    let words = shell_words::split(&command_line).map_err(|e| {
        ProgyError::validation(
            "course.json",
            format!("runner command `{command_line}` cannot be parsed: {e}"),
        )
    })?;

    let (program, args) = words.split_first().ok_or_else(|| {
        ProgyError::validation("course.json", "runner command rendered to nothing")
    })?;

    let cwd = course_root.join(&config.runner.cwd);
    debug!("Running {:?} {:?} (cwd {:?})", program, args, cwd);

    let output = Command::new(program)
        .args(args)
        .current_dir(&cwd)
        .output()
        .await
        .map_err(|e| ProgyError::validation(
            "course.json",
            format!("failed to spawn runner `{program}`: {e}"),
        ))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let combined = format!("{stdout}{stderr}");
    let success = output.status.success();

    info!(
        "Exercise {} {}",
        exercise.id,
        if success { "passed" } else { "failed" }
    );

    Ok(RunOutcome {
        success,
        friendly_output: combined.trim().to_string(),
        output: combined,
        error: (!success).then(|| {
            if stderr.trim().is_empty() {
                format!("runner exited with {}", output.status)
            } else {
                stderr.trim().to_string()
            }
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ContentConfig, RunnerConfig};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn config(command: &str) -> CourseConfig {
        CourseConfig {
            id: "demo".to_string(),
            name: "Demo".to_string(),
            version: "0.1.0".to_string(),
            runner: RunnerConfig {
                command: command.to_string(),
                cwd: ".".to_string(),
            },
            content: ContentConfig {
                root: "content".to_string(),
                exercises: None,
            },
            setup: None,
            repo: None,
        }
    }

    fn exercise() -> Exercise {
        Exercise {
            id: "01_intro/hello.sh".to_string(),
            exercise_name: "hello".to_string(),
            module: "01_intro".to_string(),
            clean_module: "intro".to_string(),
            path: PathBuf::from("01_intro/hello.sh"),
            markdown_path: None,
        }
    }

    #[tokio::test]
    async fn captures_output_and_success() {
        let temp = TempDir::new().unwrap();
        let outcome = run_exercise(temp.path(), &config("echo ran {{id}}"), &exercise())
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.friendly_output, "ran 01_intro/hello.sh");
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn failure_populates_error() {
        let temp = TempDir::new().unwrap();
        let outcome = run_exercise(temp.path(), &config("false"), &exercise())
            .await
            .unwrap();

        assert!(!outcome.success);
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn missing_program_is_an_error() {
        let temp = TempDir::new().unwrap();
        let result = run_exercise(
            temp.path(),
            &config("definitely-not-a-real-program-xyz"),
            &exercise(),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn substitutes_exercise_path() {
        let temp = TempDir::new().unwrap();
        let outcome = run_exercise(temp.path(), &config("echo {{exercise}}"), &exercise())
            .await
            .unwrap();
        assert_eq!(outcome.friendly_output, "content/01_intro/hello.sh");
    }
}
