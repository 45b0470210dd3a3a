//! Guard snapshots
//!
//! A bounded-size sample of a course's text files, shipped alongside every
//! publish for automated content-safety review. Bounded on both axes (file
//! count and bytes per file) so a large course cannot balloon the payload.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::Result;

/// Maximum number of files sampled into a snapshot
pub const MAX_SNAPSHOT_FILES: usize = 50;

/// Maximum bytes sampled per file
pub const MAX_SNAPSHOT_FILE_BYTES: usize = 8 * 1024;

/// Extensions considered text content worth reviewing
const TEXT_EXTENSIONS: &[&str] = &[
    "md", "toml", "json", "txt", "rs", "go", "ts", "js", "py", "c", "cpp", "java", "rb", "sh",
];

/// Directories skipped while sampling
const SKIPPED_DIRS: &[&str] = &[".git", ".progy", "node_modules", "target", "dist", "build"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardSnapshot {
    /// Sampled files, relative path + (possibly truncated) content
    pub files: Vec<SampledFile>,
    /// Total files considered before the count cap applied
    pub total_candidates: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampledFile {
    pub path: String,
    pub content: String,
    pub truncated: bool,
}

impl GuardSnapshot {
    /// Sample a course directory. Files are taken in sorted path order so
    /// the snapshot for an unchanged course is deterministic.
    pub fn sample(course_dir: &Path) -> Result<Self> {
        let mut candidates = Vec::new();

        for entry in WalkDir::new(course_dir).min_depth(1).sort_by_file_name() {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = match entry.path().strip_prefix(course_dir) {
                Ok(r) => r,
                Err(_) => continue,
            };
            if relative.components().any(|c| {
                SKIPPED_DIRS.contains(&c.as_os_str().to_string_lossy().as_ref())
                    || c.as_os_str().to_string_lossy().starts_with('.')
            }) {
                continue;
            }
            let is_text = relative
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| TEXT_EXTENSIONS.contains(&e))
                .unwrap_or(false);
            if is_text {
                candidates.push(entry.path().to_path_buf());
            }
        }

        let total_candidates = candidates.len();
        let mut files = Vec::new();

        for path in candidates.into_iter().take(MAX_SNAPSHOT_FILES) {
            let bytes = match std::fs::read(&path) {
                Ok(b) => b,
                Err(e) => {
                    debug!("Skipping unreadable snapshot candidate {:?}: {}", path, e);
                    continue;
                }
            };

            let truncated = bytes.len() > MAX_SNAPSHOT_FILE_BYTES;
            let slice = if truncated {
                &bytes[..MAX_SNAPSHOT_FILE_BYTES]
            } else {
                &bytes[..]
            };

            let relative = path
                .strip_prefix(course_dir)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");

            files.push(SampledFile {
                path: relative,
                content: String::from_utf8_lossy(slice).into_owned(),
                truncated,
            });
        }

        Ok(Self {
            files,
            total_candidates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn samples_text_files_only() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("content")).unwrap();
        fs::write(temp.path().join("content/a.md"), "# hello").unwrap();
        fs::write(temp.path().join("content/b.bin"), [0u8, 1, 2]).unwrap();

        let snapshot = GuardSnapshot::sample(temp.path()).unwrap();
        assert_eq!(snapshot.files.len(), 1);
        assert_eq!(snapshot.files[0].path, "content/a.md");
        assert_eq!(snapshot.total_candidates, 1);
    }

    #[test]
    fn truncates_large_files() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("big.md"),
            "x".repeat(MAX_SNAPSHOT_FILE_BYTES * 2),
        )
        .unwrap();

        let snapshot = GuardSnapshot::sample(temp.path()).unwrap();
        assert!(snapshot.files[0].truncated);
        assert_eq!(snapshot.files[0].content.len(), MAX_SNAPSHOT_FILE_BYTES);
    }

    #[test]
    fn caps_file_count() {
        let temp = TempDir::new().unwrap();
        for i in 0..(MAX_SNAPSHOT_FILES + 10) {
            fs::write(temp.path().join(format!("file_{i:03}.md")), "content").unwrap();
        }

        let snapshot = GuardSnapshot::sample(temp.path()).unwrap();
        assert_eq!(snapshot.files.len(), MAX_SNAPSHOT_FILES);
        assert_eq!(snapshot.total_candidates, MAX_SNAPSHOT_FILES + 10);
    }

    #[test]
    fn skips_internal_directories() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(".git")).unwrap();
        fs::write(temp.path().join(".git/config.md"), "internal").unwrap();
        fs::write(temp.path().join("visible.md"), "public").unwrap();

        let snapshot = GuardSnapshot::sample(temp.path()).unwrap();
        assert_eq!(snapshot.files.len(), 1);
        assert_eq!(snapshot.files[0].path, "visible.md");
    }
}
