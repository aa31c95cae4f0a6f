//! Workflow store service.
//!
//! Composes the commit store and the workflow index: every save lands as
//! exactly one commit, deletions stay recoverable through the commit graph,
//! and the index row tracks which commit was last pushed upstream. All
//! mutations for a single workflow are serialized through a per-UUID lock.

use std::sync::Arc;

use dashmap::DashMap;
use flowdeck_types::error::{CommitStoreError, RepositoryError, WorkflowError};
use flowdeck_types::workflow::{
    CommitEntry, DeletedWorkflow, DriftState, LocalWorkflow, SaveWorkflowOutcome,
    SaveWorkflowRequest, WorkflowDetails, WorkflowDoc, WorkflowRecord,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::repository::WorkflowIndex;
use crate::store::{CommitStore, DELETE_MESSAGE_PREFIX};

/// Remove `# online-version:` marker lines, keeping everything else intact.
fn strip_online_marker(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    for line in content.split_inclusive('\n') {
        if !line.starts_with("# online-version:") {
            out.push_str(line);
        }
    }
    out
}

/// Prepend the marker line naming the commit that went upstream.
fn prepend_online_marker(content: &str, hash: &str) -> String {
    format!("# online-version: {hash}\n{content}")
}

/// Service orchestrating local workflow storage.
///
/// Generic over the commit store and index traits so the core stays free of
/// IO concerns; `flowdeck-infra` provides the git and sqlite implementations.
pub struct WorkflowStore<C: CommitStore, R: WorkflowIndex> {
    commits: C,
    index: R,
    write_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl<C: CommitStore, R: WorkflowIndex> WorkflowStore<C, R> {
    pub fn new(commits: C, index: R) -> Self {
        Self {
            commits,
            index,
            write_locks: DashMap::new(),
        }
    }

    /// Per-UUID write lock. Mutating operations on the same workflow take
    /// this before touching the store or the index.
    fn write_lock(&self, uuid: Uuid) -> Arc<Mutex<()>> {
        self.write_locks
            .entry(uuid)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Save a workflow definition.
    ///
    /// Without a UUID this is a create: the name must be free and a fresh
    /// UUID is assigned. With a UUID it is an update: the row must exist and
    /// the name must not belong to another workflow. Either way the file is
    /// written and committed before the index row is upserted.
    pub async fn save(
        &self,
        request: SaveWorkflowRequest,
    ) -> Result<SaveWorkflowOutcome, WorkflowError> {
        let name = request.name.trim().to_string();
        match request.uuid {
            Some(uuid) => self.save_update(uuid, &name, &request).await,
            None => self.save_create(&name, &request).await,
        }
    }

    async fn save_create(
        &self,
        name: &str,
        request: &SaveWorkflowRequest,
    ) -> Result<SaveWorkflowOutcome, WorkflowError> {
        let existing = self
            .index
            .find_by_name(name)
            .await
            .map_err(|e| WorkflowError::StorageError(e.to_string()))?;
        if existing.is_some() {
            return Err(WorkflowError::NameConflict(name.to_string()));
        }

        let uuid = Uuid::now_v7();
        let lock = self.write_lock(uuid);
        let _guard = lock.lock().await;

        let record = WorkflowRecord {
            uuid,
            name: name.to_string(),
            online_version: None,
            locations: request.locations.clone(),
            project_code: None,
            project_name: None,
        };
        let filename = record.filename();
        self.commits.write_file(&filename, &request.content).await?;
        let message = format!("Create workflow {name}");
        self.commits
            .commit_paths(std::slice::from_ref(&filename), &message)
            .await?;
        self.put_record(&record).await?;

        Ok(SaveWorkflowOutcome { filename, uuid })
    }

    async fn save_update(
        &self,
        uuid: Uuid,
        name: &str,
        request: &SaveWorkflowRequest,
    ) -> Result<SaveWorkflowOutcome, WorkflowError> {
        let lock = self.write_lock(uuid);
        let _guard = lock.lock().await;

        let existing = self
            .index
            .get(&uuid)
            .await
            .map_err(|e| WorkflowError::StorageError(e.to_string()))?
            .ok_or_else(|| WorkflowError::NotFound(uuid.to_string()))?;
        let clash = self
            .index
            .find_by_name_excluding(name, &uuid)
            .await
            .map_err(|e| WorkflowError::StorageError(e.to_string()))?;
        if clash.is_some() {
            return Err(WorkflowError::NameConflict(name.to_string()));
        }

        let filename = existing.filename();
        let mut paths = vec![filename.clone()];

        // A pre-UUID file is folded into <uuid>.yaml on its first save.
        let mut migrated = false;
        if let Some(original) = request.original_filename.as_deref() {
            if original != filename && self.commits.file_exists(original).await? {
                self.commits.remove_file(original).await?;
                paths.push(original.to_string());
                migrated = true;
            }
        }

        self.commits.write_file(&filename, &request.content).await?;
        let message = if migrated {
            format!("Migrate and update workflow {name} to UUID-based storage")
        } else {
            format!("Update workflow {name}")
        };
        self.commits.commit_paths(&paths, &message).await?;

        let record = WorkflowRecord {
            uuid,
            name: name.to_string(),
            online_version: existing.online_version.clone(),
            locations: request.locations.clone().or(existing.locations),
            project_code: existing.project_code,
            project_name: existing.project_name.clone(),
        };
        self.put_record(&record).await?;

        Ok(SaveWorkflowOutcome { filename, uuid })
    }

    async fn put_record(&self, record: &WorkflowRecord) -> Result<(), WorkflowError> {
        self.index.put(record).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => WorkflowError::NameConflict(record.name.clone()),
            other => WorkflowError::StorageError(other.to_string()),
        })
    }

    /// Fetch the index row for a workflow.
    pub async fn get_record(&self, uuid: &Uuid) -> Result<WorkflowRecord, WorkflowError> {
        self.index
            .get(uuid)
            .await
            .map_err(|e| WorkflowError::StorageError(e.to_string()))?
            .ok_or_else(|| WorkflowError::NotFound(uuid.to_string()))
    }

    /// Full detail for a workflow, including the raw YAML from the working
    /// tree. A row whose file has gone missing counts as not found.
    pub async fn details(&self, uuid: &Uuid) -> Result<WorkflowDetails, WorkflowError> {
        let record = self.get_record(uuid).await?;
        let filename = record.filename();
        let content = self
            .commits
            .read_file(&filename)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(uuid.to_string()))?;
        Ok(WorkflowDetails {
            name: record.name,
            uuid: record.uuid,
            filename,
            yaml_content: content,
        })
    }

    /// One listing entry per index row, with schedule and drift state
    /// derived from the working-tree file and the commit graph.
    pub async fn list(&self) -> Result<Vec<LocalWorkflow>, WorkflowError> {
        let records = self
            .index
            .list_all()
            .await
            .map_err(|e| WorkflowError::StorageError(e.to_string()))?;
        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            let filename = record.filename();
            let Some(content) = self.commits.read_file(&filename).await? else {
                tracing::warn!(uuid = %record.uuid, file = %filename, "indexed workflow has no file in the store");
                continue;
            };
            let update_time = self
                .commits
                .file_mtime_ms(&filename)
                .await?
                .unwrap_or_default();
            let schedule = WorkflowDoc::parse(&content).and_then(|doc| doc.schedule_json());
            let local_status = self
                .drift_state(&filename, record.online_version.as_deref())
                .await?;
            entries.push(LocalWorkflow {
                name: record.name,
                uuid: record.uuid,
                code: filename,
                project_name: "Local File".to_string(),
                release_state: "OFFLINE".to_string(),
                update_time,
                schedule,
                local_status,
                is_local: true,
            });
        }
        Ok(entries)
    }

    async fn drift_state(
        &self,
        filename: &str,
        online_version: Option<&str>,
    ) -> Result<DriftState, WorkflowError> {
        let Some(online) = online_version else {
            return Ok(DriftState::Unsubmitted);
        };
        let Some(head) = self.commits.latest_commit(filename).await? else {
            return Ok(DriftState::Unknown);
        };
        let relation = self.commits.relationship(&head, online).await?;
        Ok(relation.into())
    }

    /// Delete a workflow: drop the index row and commit the file removal.
    /// Returns the removed record so callers can cascade to the upstream
    /// mirror by name.
    pub async fn delete(&self, uuid: &Uuid) -> Result<WorkflowRecord, WorkflowError> {
        let lock = self.write_lock(*uuid);
        let _guard = lock.lock().await;

        let record = self
            .index
            .get(uuid)
            .await
            .map_err(|e| WorkflowError::StorageError(e.to_string()))?
            .ok_or_else(|| WorkflowError::NotFound(uuid.to_string()))?;
        self.index
            .delete(uuid)
            .await
            .map_err(|e| WorkflowError::StorageError(e.to_string()))?;

        let filename = record.filename();
        if self.commits.file_exists(&filename).await? {
            let message = format!("{DELETE_MESSAGE_PREFIX}{}", record.name);
            self.commits.remove_and_commit(&filename, &message).await?;
        }

        Ok(record)
    }

    /// Deleted-but-recoverable workflows, newest deletion per file.
    pub async fn deleted_list(&self) -> Result<Vec<DeletedWorkflow>, WorkflowError> {
        Ok(self.commits.deleted_entries().await?)
    }

    /// Commit history of a workflow file, newest first.
    pub async fn history(&self, uuid: &Uuid) -> Result<Vec<CommitEntry>, WorkflowError> {
        let filename = format!("{uuid}.yaml");
        Ok(self.commits.history(&filename).await?)
    }

    /// Unified diff a commit introduced to a workflow file.
    pub async fn diff_at(&self, uuid: &Uuid, hash: &str) -> Result<String, WorkflowError> {
        let filename = format!("{uuid}.yaml");
        Ok(self.commits.diff(&filename, hash).await?)
    }

    /// File content just before `hash` changed it. Serves the deleted-file
    /// preview, where `hash` is the deletion commit itself.
    pub async fn content_before_change(
        &self,
        filename: &str,
        hash: &str,
    ) -> Result<String, WorkflowError> {
        Ok(self.commits.content_before_change(filename, hash).await?)
    }

    /// Exact file content as of `hash`.
    pub async fn content_at(&self, filename: &str, hash: &str) -> Result<String, WorkflowError> {
        Ok(self.commits.content_at(filename, hash).await?)
    }

    /// Restore a deleted workflow file from the parent of its deletion
    /// commit and re-create its index row, naming it from the restored YAML
    /// with the UUID as fallback.
    pub async fn restore(&self, filename: &str, commit_hash: &str) -> Result<(), WorkflowError> {
        let stem = filename.strip_suffix(".yaml").unwrap_or(filename);
        match Uuid::parse_str(stem) {
            Ok(uuid) => {
                let lock = self.write_lock(uuid);
                let _guard = lock.lock().await;
                self.commits.restore_path_from(filename, commit_hash).await?;
                let content = self.commits.read_file(filename).await?.unwrap_or_default();
                let name = WorkflowDoc::parse(&content)
                    .and_then(|doc| doc.name().map(str::to_string))
                    .unwrap_or_else(|| uuid.to_string());
                let record = WorkflowRecord {
                    uuid,
                    name,
                    online_version: None,
                    locations: None,
                    project_code: None,
                    project_name: None,
                };
                self.put_record(&record).await?;
            }
            Err(_) => {
                // Pre-UUID file names carry no index row to re-create.
                self.commits.restore_path_from(filename, commit_hash).await?;
            }
        }
        Ok(())
    }

    /// Overwrite a workflow with its content at `commit_hash` and commit
    /// the revert.
    pub async fn revert(&self, uuid: &Uuid, commit_hash: &str) -> Result<(), WorkflowError> {
        let lock = self.write_lock(*uuid);
        let _guard = lock.lock().await;
        let filename = format!("{uuid}.yaml");
        self.commits.revert_path_to(&filename, commit_hash).await?;
        Ok(())
    }

    /// Record the commit that just went upstream.
    ///
    /// Commits any pending edits under an `Online workflow` message (a clean
    /// tree makes that a no-op and the current head is used), then rewrites
    /// the file with a fresh `# online-version:` marker naming that hash and
    /// commits the marker separately. The hash lands in the index row and is
    /// returned.
    pub async fn record_online_version(&self, uuid: &Uuid) -> Result<String, WorkflowError> {
        let lock = self.write_lock(*uuid);
        let _guard = lock.lock().await;

        let mut record = self
            .index
            .get(uuid)
            .await
            .map_err(|e| WorkflowError::StorageError(e.to_string()))?
            .ok_or_else(|| WorkflowError::NotFound(uuid.to_string()))?;
        let filename = record.filename();

        let message = format!("Online workflow {}", record.name);
        self.commits
            .commit_paths(std::slice::from_ref(&filename), &message)
            .await?;
        let hash = self
            .commits
            .latest_commit(&filename)
            .await?
            .ok_or_else(|| CommitStoreError::NoHistory(filename.clone()))?;

        let content = self
            .commits
            .read_file(&filename)
            .await?
            .ok_or(WorkflowError::FileMissing(filename.clone()))?;
        let updated = prepend_online_marker(&strip_online_marker(&content), &hash);
        self.commits.write_file(&filename, &updated).await?;
        let marker_message = format!("Update online-version for {}", record.name);
        self.commits
            .commit_paths(std::slice::from_ref(&filename), &marker_message)
            .await?;

        record.online_version = Some(hash.clone());
        self.put_record(&record).await?;

        Ok(hash)
    }

    /// Remember which upstream project a workflow was reconciled into.
    pub async fn set_remote_link(
        &self,
        uuid: &Uuid,
        project_code: i64,
        project_name: &str,
    ) -> Result<(), WorkflowError> {
        let lock = self.write_lock(*uuid);
        let _guard = lock.lock().await;

        let mut record = self
            .index
            .get(uuid)
            .await
            .map_err(|e| WorkflowError::StorageError(e.to_string()))?
            .ok_or_else(|| WorkflowError::NotFound(uuid.to_string()))?;
        record.project_code = Some(project_code);
        record.project_name = Some(project_name.to_string());
        self.put_record(&record).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    use flowdeck_types::workflow::CommitRelation;

    use super::*;

    // In-memory commit store with linear history. Each commit snapshots the
    // full tree so content-at and restore behave like the real store.
    #[derive(Default, Clone)]
    struct MemoryCommitStore {
        inner: Arc<StdMutex<MemoryState>>,
    }

    #[derive(Default)]
    struct MemoryState {
        files: HashMap<String, String>,
        commits: Vec<MemoryCommit>,
    }

    #[derive(Clone)]
    struct MemoryCommit {
        hash: String,
        message: String,
        paths: Vec<String>,
        tree: HashMap<String, String>,
    }

    impl MemoryState {
        fn commit(&mut self, paths: Vec<String>, message: &str) -> String {
            let hash = format!("{:040x}", self.commits.len() + 1);
            self.commits.push(MemoryCommit {
                hash: hash.clone(),
                message: message.to_string(),
                paths,
                tree: self.files.clone(),
            });
            hash
        }

        fn position(&self, hash: &str) -> Option<usize> {
            self.commits.iter().position(|c| c.hash == hash)
        }
    }

    impl MemoryCommitStore {
        fn last_message(&self) -> String {
            let state = self.inner.lock().unwrap();
            state.commits.last().map(|c| c.message.clone()).unwrap_or_default()
        }

        fn commit_count(&self) -> usize {
            self.inner.lock().unwrap().commits.len()
        }

        fn file(&self, filename: &str) -> Option<String> {
            self.inner.lock().unwrap().files.get(filename).cloned()
        }
    }

    impl CommitStore for MemoryCommitStore {
        async fn write_file(&self, filename: &str, content: &str) -> Result<(), CommitStoreError> {
            let mut state = self.inner.lock().unwrap();
            state.files.insert(filename.to_string(), content.to_string());
            Ok(())
        }

        async fn read_file(&self, filename: &str) -> Result<Option<String>, CommitStoreError> {
            Ok(self.inner.lock().unwrap().files.get(filename).cloned())
        }

        async fn remove_file(&self, filename: &str) -> Result<(), CommitStoreError> {
            self.inner.lock().unwrap().files.remove(filename);
            Ok(())
        }

        async fn file_exists(&self, filename: &str) -> Result<bool, CommitStoreError> {
            Ok(self.inner.lock().unwrap().files.contains_key(filename))
        }

        async fn file_mtime_ms(&self, filename: &str) -> Result<Option<i64>, CommitStoreError> {
            let state = self.inner.lock().unwrap();
            Ok(state.files.get(filename).map(|_| 1_700_000_000_000))
        }

        async fn commit_paths(
            &self,
            paths: &[String],
            message: &str,
        ) -> Result<String, CommitStoreError> {
            let mut state = self.inner.lock().unwrap();
            // No-op when the named paths match the previous tree.
            if let Some(last) = state.commits.last() {
                let unchanged = paths.iter().all(|p| {
                    state.files.get(p) == last.tree.get(p)
                });
                if unchanged {
                    return Ok(last.hash.clone());
                }
            }
            Ok(state.commit(paths.to_vec(), message))
        }

        async fn remove_and_commit(
            &self,
            filename: &str,
            message: &str,
        ) -> Result<String, CommitStoreError> {
            let mut state = self.inner.lock().unwrap();
            state.files.remove(filename);
            Ok(state.commit(vec![filename.to_string()], message))
        }

        async fn history(&self, filename: &str) -> Result<Vec<CommitEntry>, CommitStoreError> {
            let state = self.inner.lock().unwrap();
            Ok(state
                .commits
                .iter()
                .rev()
                .filter(|c| c.paths.iter().any(|p| p == filename))
                .filter(|c| c.tree.contains_key(filename))
                .map(|c| CommitEntry {
                    hash: c.hash.clone(),
                    author: "test".to_string(),
                    timestamp: 0,
                    message: c.message.clone(),
                })
                .collect())
        }

        async fn latest_commit(
            &self,
            filename: &str,
        ) -> Result<Option<String>, CommitStoreError> {
            let state = self.inner.lock().unwrap();
            Ok(state
                .commits
                .iter()
                .rev()
                .find(|c| c.paths.iter().any(|p| p == filename))
                .map(|c| c.hash.clone()))
        }

        async fn content_at(
            &self,
            filename: &str,
            hash: &str,
        ) -> Result<String, CommitStoreError> {
            let state = self.inner.lock().unwrap();
            let idx = state
                .position(hash)
                .ok_or_else(|| CommitStoreError::NotInTree(filename.to_string()))?;
            state.commits[idx]
                .tree
                .get(filename)
                .cloned()
                .ok_or_else(|| CommitStoreError::NotInTree(filename.to_string()))
        }

        async fn content_before_change(
            &self,
            filename: &str,
            hash: &str,
        ) -> Result<String, CommitStoreError> {
            let state = self.inner.lock().unwrap();
            let idx = state
                .position(hash)
                .ok_or_else(|| CommitStoreError::NotInTree(filename.to_string()))?;
            let parent = idx
                .checked_sub(1)
                .and_then(|i| state.commits[i].tree.get(filename).cloned());
            parent
                .or_else(|| state.commits[idx].tree.get(filename).cloned())
                .ok_or_else(|| CommitStoreError::NotInTree(filename.to_string()))
        }

        async fn diff(&self, _filename: &str, _hash: &str) -> Result<String, CommitStoreError> {
            Ok(String::new())
        }

        async fn deleted_entries(&self) -> Result<Vec<DeletedWorkflow>, CommitStoreError> {
            let state = self.inner.lock().unwrap();
            let mut seen = Vec::new();
            for commit in state.commits.iter().rev() {
                for path in &commit.paths {
                    if commit.tree.contains_key(path)
                        || state.files.contains_key(path)
                        || seen.iter().any(|e: &DeletedWorkflow| &e.filename == path)
                    {
                        continue;
                    }
                    let name = commit
                        .message
                        .strip_prefix(DELETE_MESSAGE_PREFIX)
                        .map(str::to_string);
                    seen.push(DeletedWorkflow {
                        filename: path.clone(),
                        commit_hash: commit.hash.clone(),
                        name,
                        author: "test".to_string(),
                        timestamp: 0,
                        message: commit.message.clone(),
                    });
                }
            }
            Ok(seen)
        }

        async fn restore_path_from(
            &self,
            filename: &str,
            hash: &str,
        ) -> Result<String, CommitStoreError> {
            let mut state = self.inner.lock().unwrap();
            if state.files.contains_key(filename) {
                return Err(CommitStoreError::PreconditionFailed(format!(
                    "File '{filename}' already exists. Cannot restore."
                )));
            }
            let idx = state
                .position(hash)
                .ok_or_else(|| CommitStoreError::NotInTree(filename.to_string()))?;
            let content = idx
                .checked_sub(1)
                .and_then(|i| state.commits[i].tree.get(filename).cloned())
                .ok_or_else(|| CommitStoreError::NotInTree(filename.to_string()))?;
            state.files.insert(filename.to_string(), content);
            Ok(state.commit(
                vec![filename.to_string()],
                &format!("Restore workflow: {filename}"),
            ))
        }

        async fn revert_path_to(
            &self,
            filename: &str,
            hash: &str,
        ) -> Result<String, CommitStoreError> {
            let content = self.content_at(filename, hash).await?;
            let mut state = self.inner.lock().unwrap();
            state.files.insert(filename.to_string(), content);
            let short = &hash[..7.min(hash.len())];
            Ok(state.commit(
                vec![filename.to_string()],
                &format!("Revert {filename} to version {short}"),
            ))
        }

        async fn relationship(
            &self,
            a: &str,
            b: &str,
        ) -> Result<CommitRelation, CommitStoreError> {
            if a == b {
                return Ok(CommitRelation::Equal);
            }
            let state = self.inner.lock().unwrap();
            match (state.position(a), state.position(b)) {
                (Some(ia), Some(ib)) if ia > ib => Ok(CommitRelation::Ahead),
                (Some(ia), Some(ib)) if ia < ib => Ok(CommitRelation::Behind),
                (Some(_), Some(_)) => Ok(CommitRelation::Equal),
                _ => Ok(CommitRelation::Unknown),
            }
        }
    }

    #[derive(Default, Clone)]
    struct MemoryIndex {
        rows: Arc<StdMutex<HashMap<Uuid, WorkflowRecord>>>,
    }

    impl MemoryIndex {
        fn row(&self, uuid: &Uuid) -> Option<WorkflowRecord> {
            self.rows.lock().unwrap().get(uuid).cloned()
        }

        fn len(&self) -> usize {
            self.rows.lock().unwrap().len()
        }
    }

    impl WorkflowIndex for MemoryIndex {
        async fn put(&self, record: &WorkflowRecord) -> Result<(), RepositoryError> {
            let mut rows = self.rows.lock().unwrap();
            let clash = rows
                .values()
                .any(|r| r.name == record.name && r.uuid != record.uuid);
            if clash {
                return Err(RepositoryError::Conflict(record.name.clone()));
            }
            rows.insert(record.uuid, record.clone());
            Ok(())
        }

        async fn get(&self, uuid: &Uuid) -> Result<Option<WorkflowRecord>, RepositoryError> {
            Ok(self.rows.lock().unwrap().get(uuid).cloned())
        }

        async fn delete(&self, uuid: &Uuid) -> Result<bool, RepositoryError> {
            Ok(self.rows.lock().unwrap().remove(uuid).is_some())
        }

        async fn exists(&self, uuid: &Uuid) -> Result<bool, RepositoryError> {
            Ok(self.rows.lock().unwrap().contains_key(uuid))
        }

        async fn find_by_name(
            &self,
            name: &str,
        ) -> Result<Option<WorkflowRecord>, RepositoryError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .values()
                .find(|r| r.name == name)
                .cloned())
        }

        async fn find_by_name_excluding(
            &self,
            name: &str,
            uuid: &Uuid,
        ) -> Result<Option<WorkflowRecord>, RepositoryError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .values()
                .find(|r| r.name == name && r.uuid != *uuid)
                .cloned())
        }

        async fn list_all(&self) -> Result<Vec<WorkflowRecord>, RepositoryError> {
            let mut rows: Vec<_> = self.rows.lock().unwrap().values().cloned().collect();
            rows.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(rows)
        }
    }

    fn service() -> (
        WorkflowStore<MemoryCommitStore, MemoryIndex>,
        MemoryCommitStore,
        MemoryIndex,
    ) {
        let commits = MemoryCommitStore::default();
        let index = MemoryIndex::default();
        let store = WorkflowStore::new(commits.clone(), index.clone());
        (store, commits, index)
    }

    fn create_request(name: &str) -> SaveWorkflowRequest {
        SaveWorkflowRequest {
            name: name.to_string(),
            content: format!("workflow:\n  name: {name}\n"),
            uuid: None,
            original_filename: None,
            locations: None,
        }
    }

    #[test]
    fn test_strip_online_marker_removes_only_marker_lines() {
        let content = "# online-version: abc123\nworkflow:\n  # a comment\n  name: etl\n";
        assert_eq!(
            strip_online_marker(content),
            "workflow:\n  # a comment\n  name: etl\n"
        );
    }

    #[test]
    fn test_prepend_online_marker_leads_the_file() {
        let updated = prepend_online_marker("workflow: {}\n", "deadbeef");
        assert!(updated.starts_with("# online-version: deadbeef\n"));
        assert!(updated.ends_with("workflow: {}\n"));
    }

    #[tokio::test]
    async fn test_save_create_commits_and_indexes() {
        let (store, commits, index) = service();

        let outcome = store.save(create_request("etl-a")).await.unwrap();
        assert_eq!(outcome.filename, format!("{}.yaml", outcome.uuid));
        assert_eq!(commits.commit_count(), 1);
        assert_eq!(commits.last_message(), "Create workflow etl-a");

        let row = index.row(&outcome.uuid).unwrap();
        assert_eq!(row.name, "etl-a");
        assert!(row.online_version.is_none());
    }

    #[tokio::test]
    async fn test_save_create_rejects_duplicate_name() {
        let (store, commits, _index) = service();
        store.save(create_request("etl-a")).await.unwrap();

        let err = store.save(create_request("etl-a")).await.unwrap_err();
        assert!(matches!(err, WorkflowError::NameConflict(_)));
        assert_eq!(
            err.to_string(),
            "A workflow with the name 'etl-a' already exists."
        );
        assert_eq!(commits.commit_count(), 1, "conflict must not commit");
    }

    #[tokio::test]
    async fn test_save_update_requires_existing_row() {
        let (store, _commits, _index) = service();
        let mut request = create_request("etl-a");
        request.uuid = Some(Uuid::now_v7());

        let err = store.save(request).await.unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_save_update_rejects_name_of_other_workflow() {
        let (store, commits, index) = service();
        store.save(create_request("foo")).await.unwrap();
        let bar = store.save(create_request("bar")).await.unwrap();

        let mut request = create_request("foo");
        request.uuid = Some(bar.uuid);
        let err = store.save(request).await.unwrap_err();

        assert!(matches!(err, WorkflowError::NameConflict(_)));
        assert_eq!(commits.commit_count(), 2, "conflict must not commit");
        assert_eq!(index.row(&bar.uuid).unwrap().name, "bar");
    }

    #[tokio::test]
    async fn test_save_update_migrates_legacy_file() {
        let (store, commits, _index) = service();
        let outcome = store.save(create_request("etl-a")).await.unwrap();

        // Simulate a pre-UUID file still sitting in the store.
        commits.write_file("etl-a.yaml", "workflow: {}\n").await.unwrap();

        let mut request = create_request("etl-a");
        request.uuid = Some(outcome.uuid);
        request.original_filename = Some("etl-a.yaml".to_string());
        request.content = "workflow:\n  name: etl-a\n  v: 2\n".to_string();
        store.save(request).await.unwrap();

        assert_eq!(
            commits.last_message(),
            "Migrate and update workflow etl-a to UUID-based storage"
        );
        assert!(commits.file("etl-a.yaml").is_none());
        assert!(commits.file(&outcome.filename).is_some());
    }

    #[tokio::test]
    async fn test_record_online_version_rewrites_marker() {
        let (store, commits, index) = service();
        let outcome = store.save(create_request("etl-a")).await.unwrap();

        let hash = store.record_online_version(&outcome.uuid).await.unwrap();

        let row = index.row(&outcome.uuid).unwrap();
        assert_eq!(row.online_version.as_deref(), Some(hash.as_str()));

        let content = commits.file(&outcome.filename).unwrap();
        assert!(content.starts_with(&format!("# online-version: {hash}\n")));
        assert_eq!(
            commits.last_message(),
            "Update online-version for etl-a"
        );

        // A second submission replaces the marker instead of stacking one.
        let second = store.record_online_version(&outcome.uuid).await.unwrap();
        let content = commits.file(&outcome.filename).unwrap();
        assert_eq!(
            content.matches("# online-version:").count(),
            1,
            "exactly one marker line"
        );
        assert!(content.starts_with(&format!("# online-version: {second}\n")));
    }

    #[tokio::test]
    async fn test_delete_commits_removal_and_drops_row() {
        let (store, commits, index) = service();
        let outcome = store.save(create_request("etl-a")).await.unwrap();

        let removed = store.delete(&outcome.uuid).await.unwrap();
        assert_eq!(removed.name, "etl-a");
        assert_eq!(index.len(), 0);
        assert!(commits.file(&outcome.filename).is_none());
        assert_eq!(commits.last_message(), "Delete workflow: etl-a");

        let err = store.delete(&outcome.uuid).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("Workflow with UUID {} not found.", outcome.uuid)
        );
    }

    #[tokio::test]
    async fn test_delete_then_restore_recreates_row() {
        let (store, commits, index) = service();
        let outcome = store.save(create_request("etl-a")).await.unwrap();
        let original = commits.file(&outcome.filename).unwrap();

        store.delete(&outcome.uuid).await.unwrap();
        let deleted = store.deleted_list().await.unwrap();
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].filename, outcome.filename);
        assert_eq!(deleted[0].name.as_deref(), Some("etl-a"));

        store
            .restore(&outcome.filename, &deleted[0].commit_hash)
            .await
            .unwrap();
        assert_eq!(commits.file(&outcome.filename).unwrap(), original);
        let row = index.row(&outcome.uuid).unwrap();
        assert_eq!(row.name, "etl-a");
        assert!(row.online_version.is_none());
    }

    #[tokio::test]
    async fn test_restore_rejects_existing_file() {
        let (store, commits, _index) = service();
        let outcome = store.save(create_request("etl-a")).await.unwrap();
        store.delete(&outcome.uuid).await.unwrap();
        let deleted = store.deleted_list().await.unwrap();

        store
            .restore(&outcome.filename, &deleted[0].commit_hash)
            .await
            .unwrap();
        assert!(commits.file(&outcome.filename).is_some());

        let err = store
            .restore(&outcome.filename, &deleted[0].commit_hash)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("File '{}' already exists. Cannot restore.", outcome.filename)
        );
    }

    #[tokio::test]
    async fn test_revert_writes_exact_content() {
        let (store, commits, _index) = service();
        let outcome = store.save(create_request("etl-a")).await.unwrap();
        let v1 = commits.file(&outcome.filename).unwrap();
        let v1_hash = store.history(&outcome.uuid).await.unwrap()[0].hash.clone();

        let mut request = create_request("etl-a");
        request.uuid = Some(outcome.uuid);
        request.content = "workflow:\n  name: etl-a\n  v: 2\n".to_string();
        store.save(request).await.unwrap();
        assert_ne!(commits.file(&outcome.filename).unwrap(), v1);

        store.revert(&outcome.uuid, &v1_hash).await.unwrap();
        assert_eq!(commits.file(&outcome.filename).unwrap(), v1);
    }

    #[tokio::test]
    async fn test_list_reports_drift() {
        let (store, _commits, _index) = service();
        let outcome = store.save(create_request("etl-a")).await.unwrap();

        let entries = store.list().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].local_status, DriftState::Unsubmitted);
        assert_eq!(entries[0].release_state, "OFFLINE");
        assert_eq!(entries[0].project_name, "Local File");
        assert_eq!(entries[0].code, outcome.filename);

        store.record_online_version(&outcome.uuid).await.unwrap();
        let entries = store.list().await.unwrap();
        // The marker commit itself sits on top of the recorded hash.
        assert_eq!(entries[0].local_status, DriftState::Ahead);

        let mut request = create_request("etl-a");
        request.uuid = Some(outcome.uuid);
        request.content = "workflow:\n  name: etl-a\n  v: 2\n".to_string();
        store.save(request).await.unwrap();
        let entries = store.list().await.unwrap();
        assert_eq!(entries[0].local_status, DriftState::Ahead);
    }

    #[tokio::test]
    async fn test_list_parses_schedule_from_yaml() {
        let (store, _commits, _index) = service();
        let mut request = create_request("etl-a");
        request.content =
            "workflow:\n  name: etl-a\n  schedule:\n    crontab: '0 0 2 * * ?'\n".to_string();
        store.save(request).await.unwrap();

        let entries = store.list().await.unwrap();
        let schedule = entries[0].schedule.as_ref().unwrap();
        assert_eq!(schedule["crontab"], "0 0 2 * * ?");
    }

    #[tokio::test]
    async fn test_details_returns_raw_yaml() {
        let (store, _commits, _index) = service();
        let outcome = store.save(create_request("etl-a")).await.unwrap();

        let details = store.details(&outcome.uuid).await.unwrap();
        assert_eq!(details.name, "etl-a");
        assert_eq!(details.filename, outcome.filename);
        assert_eq!(details.yaml_content, "workflow:\n  name: etl-a\n");

        let err = store.details(&Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_details_treats_missing_file_as_not_found() {
        let (store, commits, _index) = service();
        let outcome = store.save(create_request("etl-a")).await.unwrap();
        commits.remove_file(&outcome.filename).await.unwrap();

        let err = store.details(&outcome.uuid).await.unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(_)));
    }
}
