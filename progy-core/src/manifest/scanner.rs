//! Content tree scanner
//!
//! Walks a course content root, discovers modules by numeric-prefix
//! convention and exercises by entry-file probing, and determines
//! pedagogical ordering from `info.toml` or README link order.
//!
//! A malformed module or exercise never fails the whole scan; it is skipped
//! with a warning so one bad directory cannot take down listing for the rest
//! of the course.

use std::path::Path;
use tracing::{debug, warn};

use super::{Exercise, Manifest};
use crate::error::Result;

/// Sort position for module names without a numeric prefix
pub const NO_PREFIX_SENTINEL: u32 = 999;

/// Entry names reserved for tooling, never treated as modules or exercises
const RESERVED_NAMES: &[&str] = &["mod.rs", "README.md", "info.toml"];

/// Candidate entry file names probed in priority order
const ENTRY_CANDIDATES: &[&str] = &["exercise.rs", "main.rs", "main.go", "index.ts", "index.js"];

/// Extensions recognized as exercise code
const CODE_EXTENSIONS: &[&str] = &[
    "rs", "go", "ts", "js", "py", "c", "cpp", "java", "rb", "sh",
];

/// Leading integer prefix of a module name, or [`NO_PREFIX_SENTINEL`]
pub fn numeric_prefix(name: &str) -> u32 {
    let digits: String = name.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return NO_PREFIX_SENTINEL;
    }
    digits.parse().unwrap_or(NO_PREFIX_SENTINEL)
}

/// Total module ordering: numeric prefix ascending, ties lexical
pub fn module_sort_key(name: &str) -> (u32, String) {
    (numeric_prefix(name), name.to_string())
}

/// Module name with its `NN_` prefix stripped
fn clean_module_name(name: &str) -> String {
    let stripped = name.trim_start_matches(|c: char| c.is_ascii_digit());
    stripped.strip_prefix('_').unwrap_or(stripped).to_string()
}

fn is_reserved(name: &str) -> bool {
    name.starts_with('.') || RESERVED_NAMES.contains(&name)
}

fn has_code_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| CODE_EXTENSIONS.contains(&e))
        .unwrap_or(false)
}

/// Scan a content root into a manifest.
///
/// A missing content root yields an empty manifest, not an error: a freshly
/// initialized course simply has nothing to list yet.
pub fn scan(content_root: &Path) -> Result<Manifest> {
    let mut manifest = Manifest::default();

    if !content_root.is_dir() {
        debug!("Content root {:?} does not exist; empty manifest", content_root);
        return Ok(manifest);
    }

    let mut module_names = Vec::new();
    for entry in std::fs::read_dir(content_root)? {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Skipping unreadable entry under {:?}: {}", content_root, e);
                continue;
            }
        };
        let name = entry.file_name().to_string_lossy().to_string();
        if is_reserved(&name) || !entry.path().is_dir() {
            continue;
        }
        module_names.push(name);
    }
    module_names.sort_by_key(|name| module_sort_key(name));

    for module_name in module_names {
        let module_dir = content_root.join(&module_name);
        match scan_module(&module_dir, &module_name) {
            Ok(exercises) => {
                manifest.modules.insert(module_name, exercises);
            }
            Err(e) => {
                warn!("Skipping malformed module {:?}: {}", module_dir, e);
            }
        }
    }

    Ok(manifest)
}

fn scan_module(module_dir: &Path, module_name: &str) -> Result<Vec<Exercise>> {
    let explicit_order = explicit_order(module_dir);
    let clean_module = clean_module_name(module_name);

    let mut children = Vec::new();
    for entry in std::fs::read_dir(module_dir)? {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Skipping unreadable entry under {:?}: {}", module_dir, e);
                continue;
            }
        };
        children.push(entry.path());
    }
    children.sort();

    let mut exercises = Vec::new();
    for child in children {
        let name = match child.file_name().and_then(|n| n.to_str()) {
            Some(n) => n.to_string(),
            None => continue,
        };
        if is_reserved(&name) {
            continue;
        }

        let exercise = if child.is_dir() {
            discover_directory_exercise(&child, &name, module_name, &clean_module)
        } else if has_code_extension(&name) {
            let stem = Path::new(&name)
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| name.clone());
            Some(Exercise {
                id: format!("{module_name}/{name}"),
                exercise_name: stem,
                module: module_name.to_string(),
                clean_module: clean_module.clone(),
                path: Path::new(module_name).join(&name),
                markdown_path: None,
            })
        } else {
            None
        };

        match exercise {
            Some(e) => exercises.push(e),
            None => debug!("No runnable entry in {:?}; excluded from manifest", child),
        }
    }

    sort_exercises(&mut exercises, &explicit_order);
    Ok(exercises)
}

/// Probe a directory for its entry file. Only entries with a runnable main
/// file (or at least one recognized source file) make it into the manifest.
fn discover_directory_exercise(
    dir: &Path,
    dir_name: &str,
    module_name: &str,
    clean_module: &str,
) -> Option<Exercise> {
    let entry_name = ENTRY_CANDIDATES
        .iter()
        .find(|candidate| dir.join(candidate).is_file())
        .map(|c| c.to_string())
        .or_else(|| first_code_file(dir));

    let entry_name = entry_name?;

    let markdown_path = dir
        .join("README.md")
        .is_file()
        .then(|| Path::new(module_name).join(dir_name).join("README.md"));

    Some(Exercise {
        id: format!("{module_name}/{dir_name}/{entry_name}"),
        exercise_name: dir_name.to_string(),
        module: module_name.to_string(),
        clean_module: clean_module.to_string(),
        path: Path::new(module_name).join(dir_name).join(&entry_name),
        markdown_path,
    })
}

fn first_code_file(dir: &Path) -> Option<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .filter_map(|e| e.file_name().to_str().map(String::from))
        .filter(|name| has_code_extension(name) && !is_reserved(name))
        .collect();
    names.sort();
    names.into_iter().next()
}

/// Sort by explicit-order index; absentees after, lexical among themselves
fn sort_exercises(exercises: &mut [Exercise], explicit_order: &[String]) {
    exercises.sort_by(|a, b| {
        let pos_a = explicit_order.iter().position(|n| n == &a.exercise_name);
        let pos_b = explicit_order.iter().position(|n| n == &b.exercise_name);
        match (pos_a, pos_b) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.exercise_name.cmp(&b.exercise_name),
        }
    });
}

/// Explicit exercise order for a module: `info.toml` quoted `name` entries
/// first, README bullet-link order second, empty (lexical fallback) last.
/// Unreadable files are treated as "no explicit order", never as an error.
fn explicit_order(module_dir: &Path) -> Vec<String> {
    let info_path = module_dir.join("info.toml");
    if let Ok(content) = std::fs::read_to_string(&info_path) {
        let names = info_toml_names(&content);
        if !names.is_empty() {
            return names;
        }
    }

    let readme_path = module_dir.join("README.md");
    if let Ok(content) = std::fs::read_to_string(&readme_path) {
        return readme_link_order(&content);
    }

    Vec::new()
}

/// Quoted `name = "..."` entries from info.toml, in literal document order
fn info_toml_names(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let rest = line.strip_prefix("name")?.trim_start();
            let rest = rest.strip_prefix('=')?.trim_start();
            let rest = rest.strip_prefix('"')?;
            let end = rest.find('"')?;
            Some(rest[..end].to_string())
        })
        .collect()
}

/// Text inside the first `[...]` on each bullet line, in document order
fn readme_link_order(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if !line.starts_with('-') {
                return None;
            }
            let start = line.find('[')?;
            let end = line[start..].find(']')? + start;
            Some(line[start + 1..end].to_string())
        })
        .collect()
}
