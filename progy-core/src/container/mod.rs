//! Course containers (`.progy` archives)
//!
//! Packs a course directory into a single gzip-compressed tar archive and
//! extracts it back. A packed archive is a complete, self-contained course
//! snapshot: unpacking needs no network access. Version-control metadata,
//! local sync state and build artifacts are never packed.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{ProgyError, Result};

/// File extension for packed courses
pub const ARCHIVE_EXTENSION: &str = "progy";

/// Directories excluded from packing
const EXCLUDED_DIRS: &[&str] = &[
    ".git",
    ".progy",
    "node_modules",
    "target",
    "dist",
    "build",
    "__pycache__",
];

/// Files excluded from packing (sync state and derived caches)
const EXCLUDED_FILES: &[&str] = &["progy.toml", "exercises.json"];

/// Whether a path component sequence is excluded from packing
fn is_excluded(relative: &Path) -> bool {
    for component in relative.components() {
        let name = component.as_os_str().to_string_lossy();
        if EXCLUDED_DIRS.contains(&name.as_ref()) {
            return true;
        }
    }
    // Never nest packed archives (also keeps an in-progress pack out of
    // its own source walk)
    if relative
        .extension()
        .map(|e| e == ARCHIVE_EXTENSION)
        .unwrap_or(false)
    {
        return true;
    }
    relative
        .file_name()
        .map(|n| {
            let name = n.to_string_lossy();
            EXCLUDED_FILES.contains(&name.as_ref())
        })
        .unwrap_or(false)
}

/// Pack `source_dir` into a `.progy` archive at `dest_file`
pub fn pack(source_dir: &Path, dest_file: &Path) -> Result<()> {
    if !source_dir.is_dir() {
        return Err(ProgyError::not_found("course directory", source_dir));
    }

    if let Some(parent) = dest_file.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(dest_file)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    let mut packed = 0usize;
    for entry in WalkDir::new(source_dir).min_depth(1) {
        let entry = entry.map_err(|e| {
            ProgyError::Io(e.into_io_error().unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::Other, "walk error")
            }))
        })?;
        let relative = entry
            .path()
            .strip_prefix(source_dir)
            .expect("walkdir yields children of source_dir");

        if is_excluded(relative) {
            debug!("Excluding {:?} from archive", relative);
            continue;
        }

        if entry.file_type().is_dir() {
            builder.append_dir(relative, entry.path())?;
        } else if entry.file_type().is_file() {
            builder.append_path_with_name(entry.path(), relative)?;
            packed += 1;
        }
    }

    builder.into_inner()?.finish()?;
    info!("Packed {} files from {:?} into {:?}", packed, source_dir, dest_file);
    Ok(())
}

/// Unpack an archive into an ephemeral directory
pub fn unpack(archive_file: &Path) -> Result<tempfile::TempDir> {
    let temp = tempfile::tempdir()?;
    unpack_to(archive_file, temp.path())?;
    Ok(temp)
}

/// Unpack an archive into `dest_dir`.
///
/// Distinguishes a missing archive (suggest re-download) from a corrupt or
/// truncated one (suggest re-pack).
pub fn unpack_to(archive_file: &Path, dest_dir: &Path) -> Result<()> {
    if !archive_file.is_file() {
        return Err(ProgyError::not_found("course archive", archive_file));
    }

    std::fs::create_dir_all(dest_dir)?;

    let file = File::open(archive_file)?;
    let decoder = GzDecoder::new(file);
    let mut archive = tar::Archive::new(decoder);

    archive.unpack(dest_dir).map_err(|e| ProgyError::CorruptArchive {
        path: archive_file.to_path_buf(),
        source: e,
    })?;

    info!("Unpacked {:?} into {:?}", archive_file, dest_dir);
    Ok(())
}

/// SHA-256 digest of a packed archive, for registry checksums
pub fn sha256_digest(file: &Path) -> Result<String> {
    let mut reader = File::open(file)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];

    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("sha256:{}", hex::encode(hasher.finalize())))
}
