use canopy_core::git::ChangeCollector;
use canopy_core::{fingerprint_changes, FileStatus, GitCli, VcsSource};
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use tempfile::TempDir;

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(["-c", "user.name=Canopy Test", "-c", "user.email=test@example.com"])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to run git");
    assert!(
        status.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&status.stderr)
    );
}

fn init_repo() -> TempDir {
    let temp = TempDir::new().unwrap();
    git(temp.path(), &["init", "-q"]);
    std::fs::write(temp.path().join("lib.rs"), "fn one() {}\n").unwrap();
    git(temp.path(), &["add", "."]);
    git(temp.path(), &["commit", "-q", "-m", "initial"]);
    temp
}

#[tokio::test]
async fn status_and_diff_against_a_real_repository() {
    if !git_available() {
        eprintln!("git not installed; skipping");
        return;
    }
    let repo = init_repo();
    std::fs::write(repo.path().join("lib.rs"), "fn one() {}\nfn two() {}\n").unwrap();
    std::fs::write(repo.path().join("notes.txt"), "todo\n").unwrap();

    let snapshot = GitCli::new().status(repo.path()).await.unwrap();
    assert_eq!(snapshot.modified, vec!["lib.rs".to_string()]);
    assert_eq!(snapshot.untracked, vec!["notes.txt".to_string()]);

    let collected = ChangeCollector::new(Arc::new(GitCli::new()), 20_000)
        .collect("repo", repo.path(), None)
        .await
        .unwrap();
    assert_eq!(collected.changes.changed_file_count, 2);
    assert_eq!(collected.changes.total_insertions, 1);
    assert!(collected.diff.contains("+fn two() {}"));
    assert!(collected.diff.contains("new untracked file: notes.txt"));
    let untracked = collected
        .changes
        .changes
        .iter()
        .find(|c| c.path == "notes.txt")
        .unwrap();
    assert_eq!(untracked.status, FileStatus::Untracked);
    assert!(collected.changes.last_modified_ms.is_some());
}

#[tokio::test]
async fn non_ascii_untracked_path_is_collected_verbatim_and_fingerprinted() {
    if !git_available() {
        eprintln!("git not installed; skipping");
        return;
    }
    let repo = init_repo();
    std::fs::write(repo.path().join("café.txt"), "draft\n").unwrap();
    let collector = ChangeCollector::new(Arc::new(GitCli::new()), 20_000);

    let before = collector.collect("repo", repo.path(), None).await.unwrap();
    let paths: Vec<&str> = before
        .changes
        .changes
        .iter()
        .map(|c| c.path.as_str())
        .collect();
    assert_eq!(paths, vec!["café.txt"]);
    assert!(before.changes.last_modified_ms.is_some());

    std::fs::write(
        repo.path().join("café.txt"),
        "draft\nwith a second, longer line\n",
    )
    .unwrap();
    let after = collector.collect("repo", repo.path(), None).await.unwrap();

    assert_ne!(
        fingerprint_changes(&before.changes, &before.diff, "model"),
        fingerprint_changes(&after.changes, &after.diff, "model")
    );
}

#[tokio::test]
async fn renamed_file_reports_destination_path() {
    if !git_available() {
        eprintln!("git not installed; skipping");
        return;
    }
    let repo = init_repo();
    git(repo.path(), &["mv", "lib.rs", "bibliothèque.rs"]);

    let snapshot = GitCli::new().status(repo.path()).await.unwrap();
    assert_eq!(snapshot.renamed, vec!["bibliothèque.rs".to_string()]);
    assert!(snapshot.deleted.is_empty());
}

#[tokio::test]
async fn clean_repository_has_no_changes() {
    if !git_available() {
        eprintln!("git not installed; skipping");
        return;
    }
    let repo = init_repo();

    let collected = ChangeCollector::new(Arc::new(GitCli::new()), 20_000)
        .collect("repo", repo.path(), None)
        .await
        .unwrap();
    assert!(collected.changes.is_empty());
    assert!(collected.diff.is_empty());
}

#[tokio::test]
async fn worktree_listing_includes_linked_worktrees() {
    if !git_available() {
        eprintln!("git not installed; skipping");
        return;
    }
    let repo = init_repo();
    let linked_parent = TempDir::new().unwrap();
    let linked = linked_parent.path().join("feature-wt");
    git(
        repo.path(),
        &["worktree", "add", "-q", "-b", "feature/issue-9", linked.to_str().unwrap()],
    );

    let entries = GitCli::new().list_worktrees(repo.path()).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries
        .iter()
        .any(|e| e.branch.as_deref() == Some("feature/issue-9")));
}
