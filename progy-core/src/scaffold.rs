//! Instructor scaffolding
//!
//! Creates module/exercise/lesson/quiz directory structures with the
//! numeric-prefix auto-increment convention the scanner expects. All
//! created paths are validated to stay inside the course root.

use std::path::{Component, Path, PathBuf};
use tracing::info;

use crate::error::{ProgyError, Result};
use crate::manifest::numeric_prefix;

/// What kind of structure to scaffold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaffoldKind {
    Module,
    Exercise,
    Lesson,
    Quiz,
}

/// Next two-digit numeric prefix for a directory: max existing prefix + 1,
/// or `01` when no prefixed entries exist
pub fn next_number(dir: &Path) -> Result<u32> {
    if !dir.is_dir() {
        return Ok(1);
    }

    let mut max = 0u32;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        let prefix = numeric_prefix(&name);
        if prefix != crate::manifest::NO_PREFIX_SENTINEL && prefix > max {
            max = prefix;
        }
    }

    Ok(max + 1)
}

/// Reject names that could escape the course root once joined
fn validate_name(name: &str) -> Result<()> {
    let suspicious = name.is_empty()
        || name.starts_with('.')
        || name.contains('/')
        || name.contains('\\')
        || Path::new(name)
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));

    if suspicious {
        let err = ProgyError::security(format!(
            "scaffold name {name:?} would escape the course content root"
        ));
        err.log_if_security_critical();
        return Err(err);
    }
    Ok(())
}

/// Defense in depth: after joining, the result must still sit under root
fn ensure_within(root: &Path, candidate: &Path) -> Result<()> {
    let mut depth = 0i32;
    for component in candidate.strip_prefix(root).unwrap_or(candidate).components() {
        match component {
            Component::ParentDir => depth -= 1,
            Component::Normal(_) => depth += 1,
            _ => {}
        }
        if depth < 0 {
            let err = ProgyError::security(format!(
                "resolved path {candidate:?} escapes the course root {root:?}"
            ));
            err.log_if_security_critical();
            return Err(err);
        }
    }
    Ok(())
}

/// Scaffold a new structure under the content root.
///
/// Modules are created directly under the content root; exercises, lessons
/// and quizzes under an existing module. Returns the created directory.
pub fn scaffold(
    content_root: &Path,
    kind: ScaffoldKind,
    name: &str,
    module: Option<&str>,
) -> Result<PathBuf> {
    validate_name(name)?;
    if let Some(module) = module {
        validate_name(module)?;
    }

    let parent = match (kind, module) {
        (ScaffoldKind::Module, _) => content_root.to_path_buf(),
        (_, Some(module)) => {
            let dir = content_root.join(module);
            if !dir.is_dir() {
                return Err(ProgyError::not_found("module", dir));
            }
            dir
        }
        (_, None) => {
            return Err(ProgyError::validation(
                content_root,
                "exercises, lessons and quizzes need a --module",
            ))
        }
    };

    let number = next_number(&parent)?;
    let dir_name = format!("{number:02}_{name}");
    let target = parent.join(&dir_name);
    ensure_within(content_root, &target)?;

    if target.exists() {
        return Err(ProgyError::validation(
            &target,
            format!("{dir_name} already exists"),
        ));
    }

    std::fs::create_dir_all(&target)?;

    match kind {
        ScaffoldKind::Module => {
            std::fs::write(
                target.join("info.toml"),
                format!("[module]\ntitle = \"{name}\"\n"),
            )?;
            std::fs::write(target.join("README.md"), format!("# {name}\n"))?;
        }
        ScaffoldKind::Exercise => {
            std::fs::write(
                target.join("exercise.rs"),
                "// TODO: implement this exercise\nfn main() {\n    todo!()\n}\n",
            )?;
            std::fs::write(
                target.join("README.md"),
                format!("# {name}\n\nDescribe the exercise here.\n"),
            )?;
        }
        ScaffoldKind::Lesson => {
            std::fs::write(target.join("README.md"), format!("# {name}\n\nLesson text.\n"))?;
        }
        ScaffoldKind::Quiz => {
            std::fs::write(
                target.join("quiz.toml"),
                "[[questions]]\nprompt = \"\"\nanswers = []\ncorrect = 0\n",
            )?;
            std::fs::write(target.join("README.md"), format!("# {name}\n"))?;
        }
    }

    info!("Scaffolded {:?} at {:?}", kind, target);
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn next_number_starts_at_one() {
        let temp = TempDir::new().unwrap();
        assert_eq!(next_number(temp.path()).unwrap(), 1);
        assert_eq!(next_number(&temp.path().join("missing")).unwrap(), 1);
    }

    #[test]
    fn next_number_is_max_plus_one() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("01_intro")).unwrap();
        fs::create_dir(temp.path().join("05_skipped")).unwrap();
        fs::create_dir(temp.path().join("notes")).unwrap();

        assert_eq!(next_number(temp.path()).unwrap(), 6);
    }

    #[test]
    fn scaffold_module_creates_prefixed_dir() {
        let temp = TempDir::new().unwrap();

        let first = scaffold(temp.path(), ScaffoldKind::Module, "intro", None).unwrap();
        assert!(first.ends_with("01_intro"));
        assert!(first.join("info.toml").exists());
        assert!(first.join("README.md").exists());

        let second = scaffold(temp.path(), ScaffoldKind::Module, "types", None).unwrap();
        assert!(second.ends_with("02_types"));
    }

    #[test]
    fn scaffold_exercise_needs_existing_module() {
        let temp = TempDir::new().unwrap();

        let err = scaffold(temp.path(), ScaffoldKind::Exercise, "hello", Some("01_intro"))
            .unwrap_err();
        assert!(matches!(err, ProgyError::NotFound { .. }));

        scaffold(temp.path(), ScaffoldKind::Module, "intro", None).unwrap();
        let created =
            scaffold(temp.path(), ScaffoldKind::Exercise, "hello", Some("01_intro")).unwrap();
        assert!(created.ends_with("01_intro/01_hello"));
        assert!(created.join("exercise.rs").exists());
    }

    #[test]
    fn scaffold_without_module_is_rejected_for_exercises() {
        let temp = TempDir::new().unwrap();
        let err = scaffold(temp.path(), ScaffoldKind::Exercise, "hello", None).unwrap_err();
        assert!(matches!(err, ProgyError::Validation { .. }));
    }

    #[test]
    fn traversal_names_are_rejected() {
        let temp = TempDir::new().unwrap();

        for bad in ["../escape", "a/b", ".hidden", ""] {
            let err = scaffold(temp.path(), ScaffoldKind::Module, bad, None).unwrap_err();
            assert!(matches!(err, ProgyError::Security { .. }), "name {bad:?}");
        }
    }

    #[test]
    fn scaffold_quiz_and_lesson() {
        let temp = TempDir::new().unwrap();
        scaffold(temp.path(), ScaffoldKind::Module, "intro", None).unwrap();

        let quiz = scaffold(temp.path(), ScaffoldKind::Quiz, "checkpoint", Some("01_intro")).unwrap();
        assert!(quiz.join("quiz.toml").exists());

        let lesson =
            scaffold(temp.path(), ScaffoldKind::Lesson, "welcome", Some("01_intro")).unwrap();
        assert!(lesson.join("README.md").exists());
    }
}
