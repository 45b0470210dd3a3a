//! Registry publisher
//!
//! Versions, snapshots and uploads a packed course to the backend registry.
//! Version bumps follow semver (bumping a segment zeroes the lower ones),
//! registry names are `@owner/slug`, and every publish carries a guard
//! snapshot: a bounded-size sample of the course's text content used for
//! automated content review.

mod snapshot;

pub use snapshot::{GuardSnapshot, SampledFile, MAX_SNAPSHOT_FILES, MAX_SNAPSHOT_FILE_BYTES};

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::container;
use crate::error::{ProgyError, Result};

/// Which semver segment to bump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BumpLevel {
    Major,
    Minor,
    Patch,
}

/// Lifecycle of a published package version. Transitions are one-directional
/// and server-owned except for explicit admin/owner action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageStatus {
    Draft,
    InReview,
    Published,
    Archived,
    Rejected,
    Banned,
}

/// Metadata attached to a publish request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishMetadata {
    /// Scoped registry name, `@owner/slug`
    pub name: String,
    pub version: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Content checksum of the archive (`sha256:...`)
    pub checksum: String,
    /// Archive size in bytes
    pub size: u64,
}

/// Registry response for a successful publish
#[derive(Debug, Clone, Deserialize)]
pub struct PublishReceipt {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub status: Option<PackageStatus>,
}

/// Bump one segment of a three-part semver string, zeroing the lower ones
pub fn bump_version(version: &str, level: BumpLevel) -> Result<String> {
    let parsed = semver::Version::parse(version).map_err(|e| {
        ProgyError::validation(
            "version",
            format!("`{version}` is not a valid semantic version: {e}"),
        )
    })?;

    let bumped = match level {
        BumpLevel::Major => semver::Version::new(parsed.major + 1, 0, 0),
        BumpLevel::Minor => semver::Version::new(parsed.major, parsed.minor + 1, 0),
        BumpLevel::Patch => semver::Version::new(parsed.major, parsed.minor, parsed.patch + 1),
    };

    Ok(bumped.to_string())
}

/// Derive a registry slug from a course title: lowercase, runs of
/// non-alphanumerics collapsed to a single underscore, trimmed
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_was_separator = true;

    for c in title.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            last_was_separator = false;
        } else if !last_was_separator {
            slug.push('_');
            last_was_separator = true;
        }
    }

    slug.trim_end_matches('_').to_string()
}

/// Full scoped registry name for an owner + course title
pub fn scoped_name(owner: &str, title: &str) -> String {
    format!("@{}/{}", owner, slugify(title))
}

/// Upload a packed course to the registry.
///
/// Multipart payload: metadata JSON, guard snapshot JSON, and the archive
/// blob. Any non-2xx response surfaces the raw response body so the caller
/// can show the registry's actual rejection reason.
pub async fn publish(
    endpoint: &str,
    auth_token: &str,
    metadata: &PublishMetadata,
    snapshot: &GuardSnapshot,
    packed_file: &Path,
) -> Result<PublishReceipt> {
    if !packed_file.is_file() {
        return Err(ProgyError::not_found("packed course archive", packed_file));
    }

    let archive_bytes = tokio::fs::read(packed_file).await?;
    let metadata_json = serde_json::to_string(metadata)?;
    let snapshot_json = serde_json::to_string(snapshot)?;

    let file_name = packed_file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "course.progy".to_string());

    let form = reqwest::multipart::Form::new()
        .text("metadata", metadata_json)
        .text("guardSnapshot", snapshot_json)
        .part(
            "file",
            reqwest::multipart::Part::bytes(archive_bytes)
                .file_name(file_name)
                .mime_str("application/gzip")
                .map_err(|e| ProgyError::NetworkFailure {
                    endpoint: endpoint.to_string(),
                    detail: format!("failed to build multipart payload: {e}"),
                })?,
        );

    let client = reqwest::Client::builder()
        .user_agent(concat!("progy/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(120))
        .build()
        .map_err(|e| ProgyError::NetworkFailure {
            endpoint: endpoint.to_string(),
            detail: format!("failed to create HTTP client: {e}"),
        })?;

    info!("Publishing {} v{} to {}", metadata.name, metadata.version, endpoint);

    let response = client
        .post(endpoint)
        .bearer_auth(auth_token)
        .multipart(form)
        .send()
        .await
        .map_err(|e| ProgyError::NetworkFailure {
            endpoint: endpoint.to_string(),
            detail: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        // The registry's body is the actionable part (name collision,
        // guard failure, ...); pass it through verbatim
        let body = response.text().await.unwrap_or_default();
        return Err(ProgyError::NetworkFailure {
            endpoint: endpoint.to_string(),
            detail: format!("registry rejected publish: HTTP {status}: {body}"),
        });
    }

    response
        .json::<PublishReceipt>()
        .await
        .map_err(|e| ProgyError::NetworkFailure {
            endpoint: endpoint.to_string(),
            detail: format!("invalid registry response: {e}"),
        })
}

/// Build publish metadata for a packed archive
pub fn metadata_for(
    owner: &str,
    title: &str,
    version: &str,
    description: Option<String>,
    packed_file: &Path,
) -> Result<PublishMetadata> {
    let checksum = container::sha256_digest(packed_file)?;
    let size = std::fs::metadata(packed_file)?.len();

    Ok(PublishMetadata {
        name: scoped_name(owner, title),
        version: version.to_string(),
        title: title.to_string(),
        description,
        checksum,
        size,
    })
}

/// Write a new version into a course config file in place.
///
/// Patches only the `version` key in the raw JSON so fields we do not
/// model (authors often carry custom metadata) survive the rewrite.
pub fn persist_version(config_path: &Path, version: &str) -> Result<()> {
    let raw = std::fs::read_to_string(config_path).map_err(|_| {
        ProgyError::not_found("course config", config_path.to_path_buf())
    })?;
    let mut doc: serde_json::Value = serde_json::from_str(&raw)?;
    doc["version"] = serde_json::Value::String(version.to_string());
    std::fs::write(config_path, serde_json::to_string_pretty(&doc)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bump_minor_resets_patch() {
        assert_eq!(bump_version("1.2.9", BumpLevel::Minor).unwrap(), "1.3.0");
    }

    #[test]
    fn bump_major_resets_minor_and_patch() {
        assert_eq!(bump_version("1.2.9", BumpLevel::Major).unwrap(), "2.0.0");
    }

    #[test]
    fn bump_patch_increments_only_patch() {
        assert_eq!(bump_version("0.0.1", BumpLevel::Patch).unwrap(), "0.0.2");
    }

    #[test]
    fn bump_rejects_garbage() {
        assert!(bump_version("not-a-version", BumpLevel::Patch).is_err());
    }

    #[test]
    fn slugify_collapses_non_alphanumerics() {
        assert_eq!(slugify("My Awesome Course!"), "my_awesome_course");
        assert_eq!(slugify("  Rust --- 101  "), "rust_101");
        assert_eq!(slugify("already_fine"), "already_fine");
    }

    #[test]
    fn scoped_name_includes_owner() {
        assert_eq!(scoped_name("alice", "My Awesome Course!"), "@alice/my_awesome_course");
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&PackageStatus::InReview).unwrap();
        assert_eq!(json, "\"in_review\"");
    }

    #[test]
    fn persist_version_keeps_unmodeled_fields() {
        let dir = tempfile::TempDir::new().unwrap();
        let config_path = dir.path().join("course.json");
        std::fs::write(
            &config_path,
            r#"{"id":"demo","name":"Demo","version":"1.0.0","customField":true}"#,
        )
        .unwrap();

        persist_version(&config_path, "1.1.0").unwrap();

        let doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&config_path).unwrap()).unwrap();
        assert_eq!(doc["version"], "1.1.0");
        assert_eq!(doc["customField"], true);
    }

    #[test]
    fn persist_version_on_missing_file_is_not_found() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("course.json");
        assert!(matches!(
            persist_version(&missing, "1.0.0"),
            Err(ProgyError::NotFound { .. })
        ));
    }
}
