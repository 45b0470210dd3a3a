//! End-to-end course lifecycle: scan growth, init/sync layering against a
//! real upstream git repository, and single-file reset.

use std::path::Path;

use progy_core::git;
use progy_core::manifest;
use progy_core::sync::{CourseRef, SyncManager};
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn read(root: &Path, rel: &str) -> String {
    std::fs::read_to_string(root.join(rel)).unwrap()
}

/// Build a committed upstream course repo; returns its current branch
async fn commit_all(upstream: &Path, message: &str) {
    assert!(git::add(upstream, &["."]).await.success);
    let commit = git::commit(upstream, message).await;
    assert!(commit.success, "commit failed: {}", commit.stderr);
}

async fn make_upstream(upstream: &Path) -> String {
    assert!(git::init(upstream).await.success);
    assert!(git::config_user(upstream, "Test Author", "author@example.com").await.success);

    write(upstream, "course.json", r#"{"id": "demo"}"#);
    write(upstream, "content/01_intro/ex/exercise.py", "# starter\n");
    commit_all(upstream, "initial course").await;

    git::exec(&["rev-parse", "--abbrev-ref", "HEAD"], upstream)
        .await
        .stdout
}

#[test]
fn manifest_grows_with_content() {
    let course = TempDir::new().unwrap();
    let content_root = course.path().join("content");

    // Nothing yet: empty manifest, not an error
    let empty = manifest::scan(&content_root).unwrap();
    assert!(empty.modules.is_empty());

    write(
        course.path(),
        "content/01_intro/01_hello/exercise.py",
        "print('hello')\n",
    );

    let grown = manifest::scan(&content_root).unwrap();
    let intro = &grown.modules["01_intro"];
    assert_eq!(intro.len(), 1);
    assert_eq!(intro[0].id, "01_intro/01_hello/exercise.py");
    assert_eq!(intro[0].exercise_name, "01_hello");
    assert_eq!(intro[0].module, "01_intro");
    assert_eq!(intro[0].clean_module, "intro");
}

#[tokio::test]
async fn init_sync_reset_cycle() {
    let upstream = TempDir::new().unwrap();
    let caches = TempDir::new().unwrap();
    let workdir = TempDir::new().unwrap();

    let branch = make_upstream(upstream.path()).await;
    let manager = SyncManager::with_cache_root(caches.path().to_path_buf());

    let course = CourseRef {
        id: "demo".to_string(),
        repo: upstream.path().to_string_lossy().to_string(),
        branch: branch.clone(),
        path: None,
    };

    // First init copies everything and records sync state
    let outcome = manager.init(workdir.path(), course).await.unwrap();
    assert!(!outcome.layered.copied.is_empty());
    assert_eq!(read(workdir.path(), "content/01_intro/ex/exercise.py"), "# starter\n");
    assert!(workdir.path().join("progy.toml").exists());

    // Student solves the exercise; upstream changes the same file and adds
    // a new module
    write(workdir.path(), "content/01_intro/ex/exercise.py", "# my solution\n");
    write(
        upstream.path(),
        "content/01_intro/ex/exercise.py",
        "# upstream rewrite\n",
    );
    write(upstream.path(), "content/02_new/ex/exercise.py", "# new module\n");
    commit_all(upstream.path(), "update course").await;

    // Sync delivers the new module but never clobbers the solved file
    let outcome = manager.sync(workdir.path()).await.unwrap();
    assert_eq!(read(workdir.path(), "content/01_intro/ex/exercise.py"), "# my solution\n");
    assert_eq!(read(workdir.path(), "content/02_new/ex/exercise.py"), "# new module\n");
    assert!(outcome.layered.skipped > 0);

    // Explicit reset is the only destructive path, scoped to one file
    manager
        .reset_in_workdir(workdir.path(), Path::new("content/01_intro/ex/exercise.py"))
        .unwrap();
    assert_eq!(
        read(workdir.path(), "content/01_intro/ex/exercise.py"),
        "# upstream rewrite\n"
    );
    assert_eq!(read(workdir.path(), "content/02_new/ex/exercise.py"), "# new module\n");
}

#[tokio::test]
async fn save_filters_noise_inside_new_directories() {
    let upstream = TempDir::new().unwrap();
    let caches = TempDir::new().unwrap();
    let workdir = TempDir::new().unwrap();

    let branch = make_upstream(upstream.path()).await;
    let manager = SyncManager::with_cache_root(caches.path().to_path_buf());
    let course = CourseRef {
        id: "demo".to_string(),
        repo: upstream.path().to_string_lossy().to_string(),
        branch,
        path: None,
    };
    manager.init(workdir.path(), course).await.unwrap();
    assert!(git::config_user(workdir.path(), "Student", "student@example.com")
        .await
        .success);

    // A brand-new untracked directory mixing meaningful work with noise:
    // the filter must judge each file inside it, not the directory entry
    write(workdir.path(), "notes/my-notes.md", "# scratch\n");
    write(workdir.path(), "notes/package-lock.json", "{}\n");

    manager.save(workdir.path(), "progress", None).await.unwrap();

    let tracked = git::exec(&["ls-files"], workdir.path()).await.stdout;
    assert!(tracked.contains("notes/my-notes.md"));
    assert!(!tracked.contains("notes/package-lock.json"));
}

#[tokio::test]
async fn sync_without_state_is_a_hard_stop() {
    let caches = TempDir::new().unwrap();
    let workdir = TempDir::new().unwrap();
    let manager = SyncManager::with_cache_root(caches.path().to_path_buf());

    let err = manager.sync(workdir.path()).await.unwrap_err();
    assert!(matches!(err, progy_core::ProgyError::NotFound { .. }));
}

#[tokio::test]
async fn concurrent_sync_is_rejected_while_locked() {
    let upstream = TempDir::new().unwrap();
    let caches = TempDir::new().unwrap();
    let workdir = TempDir::new().unwrap();

    let branch = make_upstream(upstream.path()).await;
    let manager = SyncManager::with_cache_root(caches.path().to_path_buf());
    let course = CourseRef {
        id: "demo".to_string(),
        repo: upstream.path().to_string_lossy().to_string(),
        branch,
        path: None,
    };
    manager.init(workdir.path(), course).await.unwrap();

    // Simulate another process holding the lock for the whole window
    let guard = git::LockGuard::try_acquire(workdir.path()).unwrap();
    let err = manager.sync(workdir.path()).await.unwrap_err();
    assert!(matches!(err, progy_core::ProgyError::LockContention { .. }));

    drop(guard);
    assert!(manager.sync(workdir.path()).await.is_ok());
}
