//! Sync/layering manager
//!
//! Reconciles three file sets: the upstream "official" course at a pinned
//! ref, a local cache of the last-fetched upstream snapshot, and the
//! student's working directory. Exercise files double as both starter code
//! and workspace, so layering is strictly additive: upstream content is
//! copied in only where the working directory has nothing, and the single
//! explicit exception is [`SyncManager::reset_exercise`], which overwrites
//! exactly one named file.
//!
//! Every mutating sequence runs under the advisory lock, covering the whole
//! fetch+layer+commit+pull+push window rather than individual git calls.

mod state;

pub use state::{CourseRef, SyncMeta, SyncState, SYNC_STATE_FILE};

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{ProgyError, Result};
use crate::git::{self, LockGuard};

/// Directories never copied out of the upstream cache
const CACHE_INTERNAL_DIRS: &[&str] = &[".git", ".progy"];

/// Lockfile names excluded from progress commits
const LOCKFILE_NAMES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "Cargo.lock",
    "poetry.lock",
];

/// File names excluded from progress commits: course metadata the student
/// did not author
const METADATA_FILES: &[&str] = &["info.toml", "course.json"];

/// Build-output directory names excluded from progress commits
const BUILD_DIRS: &[&str] = &["node_modules", "target", "dist", "build", "__pycache__"];

/// Credentials context for authenticated remote operations
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Backend endpoint issuing short-lived git credentials
    pub credentials_endpoint: String,
    /// User auth token presented to the endpoint
    pub token: String,
}

/// What a layering pass did
#[derive(Debug, Default)]
pub struct LayerOutcome {
    /// Files copied in from upstream
    pub copied: Vec<PathBuf>,
    /// Files left untouched because the working directory already has them
    pub skipped: usize,
}

/// Result of a full sync cycle
#[derive(Debug)]
pub struct SyncOutcome {
    pub layered: LayerOutcome,
    pub cache_dir: PathBuf,
}

/// Orchestrates course init, sync, save and reset for a working directory
pub struct SyncManager {
    cache_root: PathBuf,
}

impl SyncManager {
    /// Manager with the per-user cache root (`<cache_dir>/progy/courses`)
    pub fn new() -> Result<Self> {
        let cache_root = directories::ProjectDirs::from("dev", "progy", "progy")
            .map(|dirs| dirs.cache_dir().join("courses"))
            .ok_or_else(|| {
                ProgyError::not_found("user cache directory", PathBuf::from("~/.cache"))
            })?;
        Ok(Self::with_cache_root(cache_root))
    }

    /// Manager with an explicit cache root (tests, editors)
    pub fn with_cache_root(cache_root: PathBuf) -> Self {
        Self { cache_root }
    }

    /// Cache directory for a course id
    pub fn cache_dir(&self, course_id: &str) -> PathBuf {
        self.cache_root.join(course_id)
    }

    /// Ensure the upstream cache for a course is present and current.
    ///
    /// Clones on first use, pulls afterwards. The pull lands in the cache
    /// directory only; the student's working directory is never touched here.
    pub async fn ensure_official_course(&self, course: &CourseRef) -> Result<PathBuf> {
        let cache_dir = self.cache_dir(&course.id);

        if cache_dir.join(".git").is_dir() {
            debug!("Updating upstream cache at {:?}", cache_dir);
            git::checkout_branch(&cache_dir, &course.branch)
                .await
                .require("checkout")?;
            let pull = git::pull(&cache_dir).await;
            require_pull(pull)?;
        } else {
            info!("Cloning {} into {:?}", course.repo, cache_dir);
            git::clone_repo(&course.repo, &cache_dir)
                .await
                .require("clone")?;
            git::checkout_branch(&cache_dir, &course.branch)
                .await
                .require("checkout")?;
        }

        Ok(cache_dir)
    }

    /// Layer upstream content into the working directory.
    ///
    /// Additive-only: a file the working directory already has is never
    /// overwritten (student edits live there), unless `initial` is set for
    /// the very first init. Net-new upstream files and directories are
    /// always copied in. Nothing is ever deleted.
    pub fn apply_layering(
        &self,
        workdir: &Path,
        cache_dir: &Path,
        initial: bool,
        subpath: Option<&str>,
    ) -> Result<LayerOutcome> {
        let source = match subpath {
            Some(sub) if !sub.is_empty() => cache_dir.join(sub),
            _ => cache_dir.to_path_buf(),
        };
        if !source.is_dir() {
            return Err(ProgyError::not_found("upstream course content", source));
        }

        let mut outcome = LayerOutcome::default();

        for entry in WalkDir::new(&source).min_depth(1) {
            let entry = entry.map_err(|e| {
                ProgyError::Io(e.into_io_error().unwrap_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::Other, "walk error")
                }))
            })?;
            let relative = entry
                .path()
                .strip_prefix(&source)
                .expect("walkdir yields children of source");

            if relative
                .components()
                .any(|c| CACHE_INTERNAL_DIRS.contains(&c.as_os_str().to_string_lossy().as_ref()))
            {
                continue;
            }

            let dest = workdir.join(relative);
            if entry.file_type().is_dir() {
                std::fs::create_dir_all(&dest)?;
                continue;
            }
            if !entry.file_type().is_file() {
                continue;
            }

            if dest.exists() && !initial {
                // Student already received this file; their edits win
                outcome.skipped += 1;
                continue;
            }

            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &dest)?;
            outcome.copied.push(relative.to_path_buf());
        }

        info!(
            "Layered {} new files into {:?} ({} already present, untouched)",
            outcome.copied.len(),
            workdir,
            outcome.skipped
        );
        Ok(outcome)
    }

    /// Reset exactly one file to its upstream version.
    ///
    /// The only path by which upstream content may clobber local state:
    /// explicit, student-initiated, and scoped to a single relative file.
    pub fn reset_exercise(
        &self,
        workdir: &Path,
        cache_dir: &Path,
        relative_path: &Path,
        subpath: Option<&str>,
    ) -> Result<PathBuf> {
        if relative_path.is_absolute()
            || relative_path
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            let err = ProgyError::security(format!(
                "reset path must be a plain relative path inside the course: {relative_path:?}"
            ));
            err.log_if_security_critical();
            return Err(err);
        }

        let source_root = match subpath {
            Some(sub) if !sub.is_empty() => cache_dir.join(sub),
            _ => cache_dir.to_path_buf(),
        };
        let source = source_root.join(relative_path);

        if source.is_dir() {
            return Err(ProgyError::validation(
                relative_path,
                "reset works on a single file, not a directory",
            ));
        }
        if !source.is_file() {
            return Err(ProgyError::not_found("upstream version of file", source));
        }

        let dest = workdir.join(relative_path);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(&source, &dest)?;

        info!("Reset {:?} to its upstream version", relative_path);
        Ok(dest)
    }

    /// Initialize a working directory to track an upstream course.
    ///
    /// Fresh clone plus an initial (copy-everything) layering, then writes
    /// the sync state.
    pub async fn init(
        &self,
        workdir: &Path,
        course: CourseRef,
    ) -> Result<SyncOutcome> {
        std::fs::create_dir_all(workdir)?;
        let _lock = LockGuard::try_acquire(workdir)?;

        let cache_dir = self.ensure_official_course(&course).await?;
        let layered =
            self.apply_layering(workdir, &cache_dir, true, course.path.as_deref())?;

        if !workdir.join(".git").is_dir() {
            git::init(workdir).await.require("init")?;
        }

        let mut state = SyncState::new(
            &course.id,
            &course.repo,
            &course.branch,
            course.path.clone(),
        );
        state.touch();
        state.save(workdir)?;

        Ok(SyncOutcome { layered, cache_dir })
    }

    /// Pull the latest upstream content and layer it in non-destructively
    pub async fn sync(&self, workdir: &Path) -> Result<SyncOutcome> {
        // Hard stop without sync state: the upstream identity is unknown
        let mut state = SyncState::load(workdir)?;
        let _lock = LockGuard::try_acquire(workdir)?;

        let cache_dir = self.ensure_official_course(&state.course).await?;
        let layered = self.apply_layering(
            workdir,
            &cache_dir,
            false,
            state.course.path.as_deref(),
        )?;

        state.touch();
        state.save(workdir)?;

        Ok(SyncOutcome { layered, cache_dir })
    }

    /// Commit and push the student's progress.
    ///
    /// Stages only files passing the noise filter, so the upstream history
    /// captures pedagogically meaningful changes rather than tooling files.
    pub async fn save(
        &self,
        workdir: &Path,
        message: &str,
        auth: Option<&AuthContext>,
    ) -> Result<()> {
        let mut state = SyncState::load(workdir)?;
        let _lock = LockGuard::try_acquire(workdir)?;

        if let Some(auth) = auth {
            // Per-operation: tokens rotate
            git::update_origin(workdir, &auth.credentials_endpoint, &auth.token).await?;
        }

        let status = git::status_porcelain(workdir).await.require("status")?;
        let changed = changed_paths(&status.stdout);
        let meaningful: Vec<&str> = changed
            .iter()
            .map(String::as_str)
            .filter(|p| is_progress_path(Path::new(p)))
            .collect();

        if meaningful.is_empty() {
            info!("Nothing to save: no meaningful changes in {:?}", workdir);
            return Ok(());
        }

        git::add(workdir, &meaningful).await.require("add")?;
        git::commit(workdir, message).await.require("commit")?;

        if git::get_git_info(workdir)
            .await
            .and_then(|i| i.remote)
            .is_some()
        {
            require_pull(git::pull(workdir).await)?;
            git::push(workdir).await.require("push")?;
        } else {
            warn!("No origin remote configured for {:?}; progress committed locally only", workdir);
        }

        state.touch();
        state.save(workdir)?;
        Ok(())
    }

    /// Reset using sync state when available; without it, fall back to the
    /// course cache that actually contains the file (reset must keep working
    /// even when `progy.toml` is gone, as long as a cache exists).
    pub fn reset_in_workdir(&self, workdir: &Path, relative_path: &Path) -> Result<PathBuf> {
        match SyncState::load(workdir) {
            Ok(state) => {
                let cache_dir = self.cache_dir(&state.course.id);
                if !cache_dir.is_dir() {
                    return Err(ProgyError::not_found(
                        "upstream cache (run `progy sync` first)",
                        cache_dir,
                    ));
                }
                self.reset_exercise(workdir, &cache_dir, relative_path, state.course.path.as_deref())
            }
            Err(_) => {
                warn!("Sync state missing; searching course caches for {:?}", relative_path);
                let candidates = self.caches_containing(relative_path)?;
                match candidates.as_slice() {
                    [cache_dir] => {
                        self.reset_exercise(workdir, cache_dir, relative_path, None)
                    }
                    [] => Err(ProgyError::not_found(
                        "upstream version of file in any course cache",
                        relative_path,
                    )),
                    _ => Err(ProgyError::validation(
                        relative_path,
                        "file exists in multiple course caches; restore progy.toml to disambiguate",
                    )),
                }
            }
        }
    }

    fn caches_containing(&self, relative_path: &Path) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        if !self.cache_root.is_dir() {
            return Ok(found);
        }
        for entry in std::fs::read_dir(&self.cache_root)? {
            let entry = entry?;
            let dir = entry.path();
            if dir.is_dir() && dir.join(relative_path).is_file() {
                found.push(dir);
            }
        }
        Ok(found)
    }
}

/// Surface merge conflicts as a distinct failure; never auto-resolve
fn require_pull(result: git::GitResult) -> Result<()> {
    if result.success {
        return Ok(());
    }
    let combined = format!("{}\n{}", result.stdout, result.stderr);
    let operation = if combined.contains("CONFLICT")
        || combined.contains("Automatic merge failed")
        || combined.contains("would be overwritten")
    {
        "pull (merge conflict)"
    } else {
        "pull"
    };
    result.require(operation).map(|_| ())
}

/// Paths from `git status --porcelain` output
fn changed_paths(porcelain: &str) -> Vec<String> {
    porcelain
        .lines()
        .filter_map(|line| {
            if line.len() < 4 {
                return None;
            }
            let path = line[3..].trim();
            // Renames are reported as `old -> new`; the new path is staged
            let path = path.rsplit(" -> ").next().unwrap_or(path);
            Some(path.trim_matches('"').to_string())
        })
        .collect()
}

/// Noise filter for progress commits: excludes internal/metadata paths so
/// the history captures only changes the student authored
pub fn is_progress_path(path: &Path) -> bool {
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.starts_with('.') || BUILD_DIRS.contains(&name.as_ref()) {
            return false;
        }
    }

    match path.file_name().map(|n| n.to_string_lossy()) {
        Some(name) => {
            !METADATA_FILES.contains(&name.as_ref())
                && !LOCKFILE_NAMES.contains(&name.as_ref())
                && name != SYNC_STATE_FILE
        }
        None => false,
    }
}
