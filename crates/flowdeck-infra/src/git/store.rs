//! Git implementation of the workflow commit store.
//!
//! Implements `CommitStore` from `flowdeck-core` on top of a local git
//! repository holding the `<uuid>.yaml` files. libgit2 is synchronous, so
//! every repository operation runs on the blocking pool with the repository
//! opened per call; commits are serialized through one store-wide lock
//! because the git index is a single shared file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use flowdeck_core::store::{CommitStore, DELETE_MESSAGE_PREFIX};
use flowdeck_types::error::CommitStoreError;
use flowdeck_types::workflow::{CommitEntry, CommitRelation, DeletedWorkflow, WorkflowDoc};
use git2::{Commit, DiffFormat, DiffOptions, ErrorCode, Oid, Repository, Signature, Sort};
use tokio::sync::Mutex;

/// Commit-graph store rooted at a single directory of workflow files.
pub struct GitCommitStore {
    root: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

fn git_err(e: git2::Error) -> CommitStoreError {
    CommitStoreError::Backend(e.message().to_string())
}

fn io_err(e: std::io::Error) -> CommitStoreError {
    CommitStoreError::Io(e.to_string())
}

impl GitCommitStore {
    /// Open the store at `root`, initializing the directory and the git
    /// repository on first use.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, CommitStoreError> {
        let root = root.into();
        let init_root = root.clone();
        tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&init_root).map_err(io_err)?;
            match Repository::open(&init_root) {
                Ok(_) => Ok(()),
                Err(_) => Repository::init(&init_root).map(|_| ()).map_err(git_err),
            }
        })
        .await
        .map_err(|e| CommitStoreError::Io(format!("store task failed: {e}")))??;

        Ok(Self {
            root,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Absolute path of a store entry. Entries are bare file names; anything
    /// that would escape the store directory is rejected.
    fn entry_path(&self, filename: &str) -> Result<PathBuf, CommitStoreError> {
        if filename.is_empty()
            || filename.contains('/')
            || filename.contains('\\')
            || filename.contains("..")
        {
            return Err(CommitStoreError::Io(format!(
                "invalid store path '{filename}'"
            )));
        }
        Ok(self.root.join(filename))
    }

    async fn with_repo<F, T>(&self, f: F) -> Result<T, CommitStoreError>
    where
        F: FnOnce(&Repository, &Path) -> Result<T, CommitStoreError> + Send + 'static,
        T: Send + 'static,
    {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || {
            let repo = Repository::open(&root).map_err(git_err)?;
            f(&repo, &root)
        })
        .await
        .map_err(|e| CommitStoreError::Io(format!("store task failed: {e}")))?
    }

    /// Like [`with_repo`], but holding the store-wide write lock for the
    /// duration of the call.
    async fn with_repo_write<F, T>(&self, f: F) -> Result<T, CommitStoreError>
    where
        F: FnOnce(&Repository, &Path) -> Result<T, CommitStoreError> + Send + 'static,
        T: Send + 'static,
    {
        let _guard = self.write_lock.lock().await;
        self.with_repo(f).await
    }
}

// ---------------------------------------------------------------------------
// Repository helpers (blocking context)
// ---------------------------------------------------------------------------

fn resolve_commit<'r>(repo: &'r Repository, hash: &str) -> Result<Commit<'r>, CommitStoreError> {
    repo.revparse_single(hash)
        .and_then(|obj| obj.peel_to_commit())
        .map_err(git_err)
}

fn head_commit(repo: &Repository) -> Result<Option<Commit<'_>>, CommitStoreError> {
    match repo.head() {
        Ok(head) => head.peel_to_commit().map(Some).map_err(git_err),
        Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
            Ok(None)
        }
        Err(e) => Err(git_err(e)),
    }
}

fn tree_entry_id(commit: &Commit<'_>, path: &str) -> Result<Option<Oid>, CommitStoreError> {
    let tree = commit.tree().map_err(git_err)?;
    match tree.get_path(Path::new(path)) {
        Ok(entry) => Ok(Some(entry.id())),
        Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
        Err(e) => Err(git_err(e)),
    }
}

fn tree_entry_content(
    repo: &Repository,
    commit: &Commit<'_>,
    path: &str,
) -> Result<Option<String>, CommitStoreError> {
    match tree_entry_id(commit, path)? {
        Some(oid) => {
            let blob = repo.find_blob(oid).map_err(git_err)?;
            Ok(Some(String::from_utf8_lossy(blob.content()).into_owned()))
        }
        None => Ok(None),
    }
}

fn commit_entry(commit: &Commit<'_>) -> CommitEntry {
    CommitEntry {
        hash: commit.id().to_string(),
        author: commit
            .author()
            .name()
            .unwrap_or("unknown")
            .to_string(),
        timestamp: commit.time().seconds(),
        message: commit.message().unwrap_or("").trim().to_string(),
    }
}

/// Stage the given paths from the working tree state and commit. Returns the
/// head hash unchanged when the staged tree matches it.
fn stage_and_commit(
    repo: &Repository,
    root: &Path,
    paths: &[String],
    message: &str,
) -> Result<String, CommitStoreError> {
    let mut index = repo.index().map_err(git_err)?;
    for path in paths {
        if root.join(path).exists() {
            index.add_path(Path::new(path)).map_err(git_err)?;
        } else {
            match index.remove_path(Path::new(path)) {
                Ok(()) => {}
                Err(e) if e.code() == ErrorCode::NotFound => {}
                Err(e) => return Err(git_err(e)),
            }
        }
    }
    index.write().map_err(git_err)?;
    let tree_id = index.write_tree().map_err(git_err)?;

    let head = head_commit(repo)?;
    if let Some(parent) = &head {
        if parent.tree_id() == tree_id {
            return Ok(parent.id().to_string());
        }
    }

    let tree = repo.find_tree(tree_id).map_err(git_err)?;
    let signature = repo
        .signature()
        .or_else(|_| Signature::now("flowdeck", "flowdeck@localhost"))
        .map_err(git_err)?;
    let parents: Vec<&Commit<'_>> = head.iter().collect();
    let oid = repo
        .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
        .map_err(git_err)?;
    Ok(oid.to_string())
}

/// Walk from head, newest first. Yields `None` immediately for an unborn
/// branch.
fn revwalk_from_head(repo: &Repository) -> Result<Option<git2::Revwalk<'_>>, CommitStoreError> {
    if head_commit(repo)?.is_none() {
        return Ok(None);
    }
    let mut revwalk = repo.revwalk().map_err(git_err)?;
    revwalk.push_head().map_err(git_err)?;
    revwalk
        .set_sorting(Sort::TOPOLOGICAL | Sort::TIME)
        .map_err(git_err)?;
    Ok(Some(revwalk))
}

impl CommitStore for GitCommitStore {
    async fn write_file(&self, filename: &str, content: &str) -> Result<(), CommitStoreError> {
        let path = self.entry_path(filename)?;
        tokio::fs::create_dir_all(&self.root).await.map_err(io_err)?;
        tokio::fs::write(&path, content).await.map_err(io_err)
    }

    async fn read_file(&self, filename: &str) -> Result<Option<String>, CommitStoreError> {
        let path = self.entry_path(filename)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(e)),
        }
    }

    async fn remove_file(&self, filename: &str) -> Result<(), CommitStoreError> {
        let path = self.entry_path(filename)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(e)),
        }
    }

    async fn file_exists(&self, filename: &str) -> Result<bool, CommitStoreError> {
        let path = self.entry_path(filename)?;
        Ok(tokio::fs::try_exists(&path).await.map_err(io_err)?)
    }

    async fn file_mtime_ms(&self, filename: &str) -> Result<Option<i64>, CommitStoreError> {
        let path = self.entry_path(filename)?;
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(e)),
        };
        let modified = metadata.modified().map_err(io_err)?;
        let millis = modified
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default();
        Ok(Some(millis))
    }

    async fn commit_paths(
        &self,
        paths: &[String],
        message: &str,
    ) -> Result<String, CommitStoreError> {
        let paths = paths.to_vec();
        let message = message.to_string();
        self.with_repo_write(move |repo, root| stage_and_commit(repo, root, &paths, &message))
            .await
    }

    async fn remove_and_commit(
        &self,
        filename: &str,
        message: &str,
    ) -> Result<String, CommitStoreError> {
        self.remove_file(filename).await?;
        let paths = vec![filename.to_string()];
        let message = message.to_string();
        self.with_repo_write(move |repo, root| stage_and_commit(repo, root, &paths, &message))
            .await
    }

    async fn history(&self, filename: &str) -> Result<Vec<CommitEntry>, CommitStoreError> {
        let filename = filename.to_string();
        self.with_repo(move |repo, _root| {
            let Some(revwalk) = revwalk_from_head(repo)? else {
                return Ok(Vec::new());
            };
            let mut entries = Vec::new();
            for oid in revwalk {
                let commit = repo.find_commit(oid.map_err(git_err)?).map_err(git_err)?;
                let current = tree_entry_id(&commit, &filename)?;
                let previous = match commit.parent(0) {
                    Ok(parent) => tree_entry_id(&parent, &filename)?,
                    Err(_) => None,
                };
                match (current, previous) {
                    // A deletion bounds the history of the current incarnation.
                    (None, Some(_)) => break,
                    (None, None) => continue,
                    (Some(c), Some(p)) if c == p => continue,
                    (Some(_), _) => entries.push(commit_entry(&commit)),
                }
            }
            Ok(entries)
        })
        .await
    }

    async fn latest_commit(&self, filename: &str) -> Result<Option<String>, CommitStoreError> {
        let filename = filename.to_string();
        self.with_repo(move |repo, _root| {
            let Some(revwalk) = revwalk_from_head(repo)? else {
                return Ok(None);
            };
            for oid in revwalk {
                let commit = repo.find_commit(oid.map_err(git_err)?).map_err(git_err)?;
                let current = tree_entry_id(&commit, &filename)?;
                let previous = match commit.parent(0) {
                    Ok(parent) => tree_entry_id(&parent, &filename)?,
                    Err(_) => None,
                };
                match (current, previous) {
                    (None, Some(_)) => return Ok(None),
                    (None, None) => continue,
                    (Some(c), Some(p)) if c == p => continue,
                    (Some(_), _) => return Ok(Some(commit.id().to_string())),
                }
            }
            Ok(None)
        })
        .await
    }

    async fn content_at(&self, filename: &str, hash: &str) -> Result<String, CommitStoreError> {
        let filename = filename.to_string();
        let hash = hash.to_string();
        self.with_repo(move |repo, _root| {
            let commit = resolve_commit(repo, &hash)?;
            tree_entry_content(repo, &commit, &filename)?
                .ok_or_else(|| CommitStoreError::NotInTree(filename.clone()))
        })
        .await
    }

    async fn content_before_change(
        &self,
        filename: &str,
        hash: &str,
    ) -> Result<String, CommitStoreError> {
        let filename = filename.to_string();
        let hash = hash.to_string();
        self.with_repo(move |repo, _root| {
            let commit = resolve_commit(repo, &hash)?;
            if let Ok(parent) = commit.parent(0) {
                if let Some(content) = tree_entry_content(repo, &parent, &filename)? {
                    return Ok(content);
                }
            }
            tree_entry_content(repo, &commit, &filename)?
                .ok_or_else(|| CommitStoreError::NotInTree(filename.clone()))
        })
        .await
    }

    async fn diff(&self, filename: &str, hash: &str) -> Result<String, CommitStoreError> {
        let filename = filename.to_string();
        let hash = hash.to_string();
        self.with_repo(move |repo, _root| {
            let commit = resolve_commit(repo, &hash)?;
            let tree = commit.tree().map_err(git_err)?;
            let parent_tree = match commit.parent(0) {
                Ok(parent) => Some(parent.tree().map_err(git_err)?),
                Err(_) => None,
            };

            let mut opts = DiffOptions::new();
            opts.pathspec(&filename);
            let diff = repo
                .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut opts))
                .map_err(git_err)?;

            let mut patch = String::new();
            diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
                match line.origin() {
                    '+' | '-' | ' ' => patch.push(line.origin()),
                    _ => {}
                }
                patch.push_str(&String::from_utf8_lossy(line.content()));
                true
            })
            .map_err(git_err)?;
            Ok(patch.trim().to_string())
        })
        .await
    }

    async fn deleted_entries(&self) -> Result<Vec<DeletedWorkflow>, CommitStoreError> {
        self.with_repo(move |repo, root| {
            let Some(revwalk) = revwalk_from_head(repo)? else {
                return Ok(Vec::new());
            };

            let mut seen: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
            let mut deleted = Vec::new();
            for oid in revwalk {
                let commit = repo.find_commit(oid.map_err(git_err)?).map_err(git_err)?;
                let Ok(parent) = commit.parent(0) else {
                    continue;
                };
                let parent_tree = parent.tree().map_err(git_err)?;
                let tree = commit.tree().map_err(git_err)?;
                let diff = repo
                    .diff_tree_to_tree(Some(&parent_tree), Some(&tree), None)
                    .map_err(git_err)?;

                for delta in diff.deltas() {
                    if delta.status() != git2::Delta::Deleted {
                        continue;
                    }
                    let Some(path) = delta.old_file().path().and_then(Path::to_str) else {
                        continue;
                    };
                    if !path.ends_with(".yaml") {
                        continue;
                    }
                    // Newest deletion per file wins; restored files are live again.
                    if !seen.insert(path.to_string()) || root.join(path).exists() {
                        continue;
                    }

                    let message = commit.message().unwrap_or("").trim().to_string();
                    let name = match message.strip_prefix(DELETE_MESSAGE_PREFIX) {
                        Some(rest) => Some(rest.trim().to_string()),
                        None => tree_entry_content(repo, &parent, path)?
                            .and_then(|content| WorkflowDoc::parse(&content))
                            .and_then(|doc| doc.name().map(str::to_string)),
                    };

                    deleted.push(DeletedWorkflow {
                        filename: path.to_string(),
                        commit_hash: commit.id().to_string(),
                        name,
                        author: commit.author().name().unwrap_or("unknown").to_string(),
                        timestamp: commit.time().seconds(),
                        message,
                    });
                }
            }
            Ok(deleted)
        })
        .await
    }

    async fn restore_path_from(
        &self,
        filename: &str,
        hash: &str,
    ) -> Result<String, CommitStoreError> {
        let filename = filename.to_string();
        let hash = hash.to_string();
        self.with_repo_write(move |repo, root| {
            if root.join(&filename).exists() {
                return Err(CommitStoreError::PreconditionFailed(format!(
                    "File '{filename}' already exists. Cannot restore."
                )));
            }

            // A deletion commit no longer carries the file; its parent holds
            // the last live content.
            let commit = resolve_commit(repo, &hash)?;
            let parent = commit
                .parent(0)
                .map_err(|_| CommitStoreError::NotInTree(filename.clone()))?;
            let content = tree_entry_content(repo, &parent, &filename)?
                .ok_or_else(|| CommitStoreError::NotInTree(filename.clone()))?;

            std::fs::write(root.join(&filename), content).map_err(io_err)?;
            stage_and_commit(
                repo,
                root,
                &[filename.clone()],
                &format!("Restore workflow: {filename}"),
            )
        })
        .await
    }

    async fn revert_path_to(&self, filename: &str, hash: &str) -> Result<String, CommitStoreError> {
        let filename = filename.to_string();
        let hash = hash.to_string();
        self.with_repo_write(move |repo, root| {
            let commit = resolve_commit(repo, &hash)?;
            let content = tree_entry_content(repo, &commit, &filename)?
                .ok_or_else(|| CommitStoreError::NotInTree(filename.clone()))?;

            std::fs::write(root.join(&filename), content).map_err(io_err)?;
            let short: String = hash.chars().take(7).collect();
            stage_and_commit(
                repo,
                root,
                &[filename.clone()],
                &format!("Revert {filename} to version {short}"),
            )
        })
        .await
    }

    async fn relationship(&self, a: &str, b: &str) -> Result<CommitRelation, CommitStoreError> {
        let a = a.to_string();
        let b = b.to_string();
        self.with_repo(move |repo, _root| {
            let Ok(a_commit) = resolve_commit(repo, &a) else {
                return Ok(CommitRelation::Unknown);
            };
            let Ok(b_commit) = resolve_commit(repo, &b) else {
                return Ok(CommitRelation::Unknown);
            };
            let (a_oid, b_oid) = (a_commit.id(), b_commit.id());
            if a_oid == b_oid {
                return Ok(CommitRelation::Equal);
            }
            if repo.graph_descendant_of(a_oid, b_oid).map_err(git_err)? {
                return Ok(CommitRelation::Ahead);
            }
            if repo.graph_descendant_of(b_oid, a_oid).map_err(git_err)? {
                return Ok(CommitRelation::Behind);
            }
            match repo.merge_base(a_oid, b_oid) {
                Ok(_) => Ok(CommitRelation::Diverged),
                Err(_) => Ok(CommitRelation::Unknown),
            }
        })
        .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_store() -> (GitCommitStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = GitCommitStore::open(dir.path()).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_write_commit_and_history() {
        let (store, _dir) = test_store().await;

        store.write_file("a.yaml", "workflow:\n  name: a\n").await.unwrap();
        let first = store
            .commit_paths(&["a.yaml".to_string()], "Create workflow a")
            .await
            .unwrap();
        store.write_file("a.yaml", "workflow:\n  name: a\n  project: p\n").await.unwrap();
        let second = store
            .commit_paths(&["a.yaml".to_string()], "Update workflow a")
            .await
            .unwrap();

        let history = store.history("a.yaml").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].hash, second);
        assert_eq!(history[0].message, "Update workflow a");
        assert_eq!(history[1].hash, first);
        assert_eq!(history[1].message, "Create workflow a");

        assert_eq!(store.latest_commit("a.yaml").await.unwrap(), Some(second));
        assert_eq!(store.latest_commit("missing.yaml").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_commit_paths_is_a_noop_when_clean() {
        let (store, _dir) = test_store().await;

        store.write_file("a.yaml", "v1").await.unwrap();
        let first = store
            .commit_paths(&["a.yaml".to_string()], "Create workflow a")
            .await
            .unwrap();
        let again = store
            .commit_paths(&["a.yaml".to_string()], "no changes here")
            .await
            .unwrap();

        assert_eq!(first, again);
        assert_eq!(store.history("a.yaml").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unrelated_commits_are_not_in_history() {
        let (store, _dir) = test_store().await;

        store.write_file("a.yaml", "v1").await.unwrap();
        store
            .commit_paths(&["a.yaml".to_string()], "Create workflow a")
            .await
            .unwrap();
        store.write_file("b.yaml", "v1").await.unwrap();
        store
            .commit_paths(&["b.yaml".to_string()], "Create workflow b")
            .await
            .unwrap();

        let history = store.history("a.yaml").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].message, "Create workflow a");
    }

    #[tokio::test]
    async fn test_content_at_and_before_change() {
        let (store, _dir) = test_store().await;

        store.write_file("a.yaml", "v1\n").await.unwrap();
        let first = store
            .commit_paths(&["a.yaml".to_string()], "Create workflow a")
            .await
            .unwrap();
        store.write_file("a.yaml", "v2\n").await.unwrap();
        let second = store
            .commit_paths(&["a.yaml".to_string()], "Update workflow a")
            .await
            .unwrap();

        assert_eq!(store.content_at("a.yaml", &second).await.unwrap(), "v2\n");
        assert_eq!(store.content_at("a.yaml", &first).await.unwrap(), "v1\n");
        assert_eq!(
            store.content_before_change("a.yaml", &second).await.unwrap(),
            "v1\n"
        );
        // The first commit has no parent, so the content at the commit itself
        // is returned.
        assert_eq!(
            store.content_before_change("a.yaml", &first).await.unwrap(),
            "v1\n"
        );

        let err = store.content_at("other.yaml", &second).await.unwrap_err();
        assert!(matches!(err, CommitStoreError::NotInTree(_)));
    }

    #[tokio::test]
    async fn test_diff_marks_changed_lines() {
        let (store, _dir) = test_store().await;

        store.write_file("a.yaml", "line one\nline two\n").await.unwrap();
        let first = store
            .commit_paths(&["a.yaml".to_string()], "Create workflow a")
            .await
            .unwrap();
        store.write_file("a.yaml", "line one\nline three\n").await.unwrap();
        let second = store
            .commit_paths(&["a.yaml".to_string()], "Update workflow a")
            .await
            .unwrap();

        let patch = store.diff("a.yaml", &second).await.unwrap();
        assert!(patch.contains("-line two"));
        assert!(patch.contains("+line three"));
        assert!(!patch.contains("-line one"));

        // Parentless commit: the whole file is the introduction patch.
        let intro = store.diff("a.yaml", &first).await.unwrap();
        assert!(intro.contains("+line one"));
        assert!(intro.contains("+line two"));
    }

    #[tokio::test]
    async fn test_deletion_bounds_history_of_reused_filename() {
        let (store, _dir) = test_store().await;

        store.write_file("a.yaml", "v1").await.unwrap();
        store
            .commit_paths(&["a.yaml".to_string()], "Create workflow a")
            .await
            .unwrap();
        store
            .remove_and_commit("a.yaml", "Delete workflow: a")
            .await
            .unwrap();
        store.write_file("a.yaml", "reborn").await.unwrap();
        store
            .commit_paths(&["a.yaml".to_string()], "Create workflow a2")
            .await
            .unwrap();

        let history = store.history("a.yaml").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].message, "Create workflow a2");
    }

    #[tokio::test]
    async fn test_deleted_entries_and_restore() {
        let (store, _dir) = test_store().await;

        store
            .write_file("a.yaml", "workflow:\n  name: daily-etl\n")
            .await
            .unwrap();
        store
            .commit_paths(&["a.yaml".to_string()], "Create workflow daily-etl")
            .await
            .unwrap();
        store.write_file("b.yaml", "workflow:\n  name: keeper\n").await.unwrap();
        store
            .commit_paths(&["b.yaml".to_string()], "Create workflow keeper")
            .await
            .unwrap();
        let deletion = store
            .remove_and_commit("a.yaml", "Delete workflow: daily-etl")
            .await
            .unwrap();

        let deleted = store.deleted_entries().await.unwrap();
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].filename, "a.yaml");
        assert_eq!(deleted[0].commit_hash, deletion);
        assert_eq!(deleted[0].name.as_deref(), Some("daily-etl"));

        store.restore_path_from("a.yaml", &deletion).await.unwrap();
        assert_eq!(
            store.read_file("a.yaml").await.unwrap().as_deref(),
            Some("workflow:\n  name: daily-etl\n")
        );
        assert!(store.deleted_entries().await.unwrap().is_empty());

        let err = store
            .restore_path_from("a.yaml", &deletion)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "File 'a.yaml' already exists. Cannot restore."
        );
    }

    #[tokio::test]
    async fn test_deleted_name_falls_back_to_yaml() {
        let (store, _dir) = test_store().await;

        store
            .write_file("a.yaml", "workflow:\n  name: daily-etl\n")
            .await
            .unwrap();
        store
            .commit_paths(&["a.yaml".to_string()], "Create workflow daily-etl")
            .await
            .unwrap();
        store
            .remove_and_commit("a.yaml", "remove old stuff")
            .await
            .unwrap();

        let deleted = store.deleted_entries().await.unwrap();
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].name.as_deref(), Some("daily-etl"));
        assert_eq!(deleted[0].message, "remove old stuff");
    }

    #[tokio::test]
    async fn test_revert_path_to() {
        let (store, _dir) = test_store().await;

        store.write_file("a.yaml", "v1\n").await.unwrap();
        let first = store
            .commit_paths(&["a.yaml".to_string()], "Create workflow a")
            .await
            .unwrap();
        store.write_file("a.yaml", "v2\n").await.unwrap();
        store
            .commit_paths(&["a.yaml".to_string()], "Update workflow a")
            .await
            .unwrap();

        store.revert_path_to("a.yaml", &first).await.unwrap();
        assert_eq!(store.read_file("a.yaml").await.unwrap().as_deref(), Some("v1\n"));

        let history = store.history("a.yaml").await.unwrap();
        let short: String = first.chars().take(7).collect();
        assert_eq!(history[0].message, format!("Revert a.yaml to version {short}"));
    }

    #[tokio::test]
    async fn test_relationship() {
        let (store, dir) = test_store().await;

        store.write_file("a.yaml", "v1").await.unwrap();
        let first = store
            .commit_paths(&["a.yaml".to_string()], "Create workflow a")
            .await
            .unwrap();
        store.write_file("a.yaml", "v2").await.unwrap();
        let second = store
            .commit_paths(&["a.yaml".to_string()], "Update workflow a")
            .await
            .unwrap();

        assert_eq!(
            store.relationship(&second, &first).await.unwrap(),
            CommitRelation::Ahead
        );
        assert_eq!(
            store.relationship(&first, &second).await.unwrap(),
            CommitRelation::Behind
        );
        assert_eq!(
            store.relationship(&first, &first).await.unwrap(),
            CommitRelation::Equal
        );
        assert_eq!(
            store.relationship("no-such-hash", &first).await.unwrap(),
            CommitRelation::Unknown
        );

        // A dangling sibling of head shares the first commit as merge base.
        let repo = Repository::open(dir.path()).unwrap();
        let base = repo
            .revparse_single(&first)
            .unwrap()
            .peel_to_commit()
            .unwrap();
        let signature = Signature::now("test", "test@localhost").unwrap();
        let tree = base.tree().unwrap();
        let divergent = repo
            .commit(None, &signature, &signature, "sidetrack", &tree, &[&base])
            .unwrap();
        assert_eq!(
            store
                .relationship(&second, &divergent.to_string())
                .await
                .unwrap(),
            CommitRelation::Diverged
        );
    }

    #[tokio::test]
    async fn test_file_helpers() {
        let (store, _dir) = test_store().await;

        assert!(!store.file_exists("a.yaml").await.unwrap());
        assert!(store.file_mtime_ms("a.yaml").await.unwrap().is_none());
        assert!(store.read_file("a.yaml").await.unwrap().is_none());

        store.write_file("a.yaml", "v1").await.unwrap();
        assert!(store.file_exists("a.yaml").await.unwrap());
        assert!(store.file_mtime_ms("a.yaml").await.unwrap().unwrap() > 0);

        store.remove_file("a.yaml").await.unwrap();
        assert!(!store.file_exists("a.yaml").await.unwrap());
        // Removing an absent file is not an error.
        store.remove_file("a.yaml").await.unwrap();

        let err = store.write_file("../escape.yaml", "nope").await.unwrap_err();
        assert!(matches!(err, CommitStoreError::Io(_)));
    }

    #[tokio::test]
    async fn test_empty_repository_has_no_history() {
        let (store, _dir) = test_store().await;
        assert!(store.history("a.yaml").await.unwrap().is_empty());
        assert!(store.deleted_entries().await.unwrap().is_empty());
        assert!(store.latest_commit("a.yaml").await.unwrap().is_none());
    }
}
