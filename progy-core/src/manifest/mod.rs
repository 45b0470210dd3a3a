//! Course manifest - exercise discovery and the `exercises.json` cache
//!
//! The manifest maps module names to ordered exercise lists. It is a derived
//! artifact rebuilt from the content tree on demand; deleting
//! `exercises.json` and rescanning must always reproduce it. Scanning never
//! mutates the source tree.

mod scanner;

pub use scanner::{module_sort_key, numeric_prefix, scan, NO_PREFIX_SENTINEL};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Cache file name inside a course working directory
pub const MANIFEST_CACHE_FILE: &str = "exercises.json";

/// A single runnable exercise
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    /// Stable identifier: entry path relative to the content root
    pub id: String,

    /// Display name (directory name, or file name minus extension)
    pub exercise_name: String,

    /// Module directory name as it appears on disk (e.g. `01_intro`)
    pub module: String,

    /// Module name with the numeric prefix stripped (e.g. `intro`)
    pub clean_module: String,

    /// Code entry path relative to the content root
    pub path: PathBuf,

    /// Exercise README path relative to the content root, if present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown_path: Option<PathBuf>,
}

/// Mapping from module name to its ordered exercises
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    pub modules: BTreeMap<String, Vec<Exercise>>,
}

impl Manifest {
    /// Module names in pedagogical order: numeric prefix ascending,
    /// non-prefixed modules last, ties lexical
    pub fn ordered_modules(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modules.keys().map(String::as_str).collect();
        names.sort_by_key(|name| module_sort_key(name));
        names
    }

    /// Total exercise count across all modules
    pub fn exercise_count(&self) -> usize {
        self.modules.values().map(Vec::len).sum()
    }

    /// Find an exercise by its stable id
    pub fn find(&self, id: &str) -> Option<&Exercise> {
        self.modules
            .values()
            .flat_map(|exercises| exercises.iter())
            .find(|e| e.id == id)
    }

    /// Persist the manifest as formatted JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load a previously persisted manifest
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Rebuild the manifest from the content tree and refresh the cache file.
///
/// The cache is written next to the course root; it is never consulted as a
/// source of truth by the scan itself.
pub fn rebuild_cache(course_root: &Path, content_root: &Path) -> Result<Manifest> {
    let manifest = scan(content_root)?;
    manifest.save(&course_root.join(MANIFEST_CACHE_FILE))?;
    Ok(manifest)
}
