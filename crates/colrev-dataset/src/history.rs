//! Version history of the project files
//!
//! Every operation ends in one commit, and several checks compare the
//! working copy with the last committed version. [`History`] is the seam:
//! [`GitHistory`] works on a real repository through `git2`, and
//! [`MemoryHistory`] keeps snapshots in memory for tests and dry runs.
//!
//! Paths passed to a history are relative to the project root.

use crate::bibtex;
use crate::error::{DatasetError, HistoryError};
use colrev_record::{ContentHash, RecordsDict};
use git2::{ErrorCode, IndexAddOption, Repository, Signature, StatusOptions};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name used when the repository has no configured identity
const FALLBACK_NAME: &str = "colrev";
const FALLBACK_EMAIL: &str = "colrev@localhost";

/// One commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    /// Commit id
    pub id: String,
    /// First line of the message
    pub summary: String,
}

/// Access to committed versions of project files
pub trait History: Send + Sync {
    /// Content of `path` at revision `rev` (`HEAD`, a commit id, ...)
    ///
    /// Returns `None` when the revision does not contain the path.
    ///
    /// # Errors
    /// Returns [`HistoryError::UnknownRevision`] for revisions that do not
    /// resolve.
    fn file_at(&self, rev: &str, path: &Path) -> Result<Option<String>, HistoryError>;

    /// Commits that changed `path`, newest first
    ///
    /// # Errors
    /// Returns [`HistoryError`] when the history cannot be walked.
    fn iter_commits(&self, path: &Path) -> Result<Vec<CommitInfo>, HistoryError>;

    /// Stage the current state of `path` (removal included)
    ///
    /// # Errors
    /// Returns [`HistoryError`] when staging fails.
    fn add_changes(&self, path: &Path) -> Result<(), HistoryError>;

    /// Stage `paths` and commit everything staged
    ///
    /// # Errors
    /// Returns [`HistoryError`] when staging or committing fails.
    fn commit(&self, message: &str, paths: &[PathBuf]) -> Result<String, HistoryError>;

    /// Whether tracked files have uncommitted changes
    ///
    /// # Errors
    /// Returns [`HistoryError`] when the status cannot be read.
    fn is_dirty(&self) -> Result<bool, HistoryError>;

    /// Whether the upstream branch has commits the local branch lacks
    ///
    /// # Errors
    /// Returns [`HistoryError`] when the branches cannot be compared.
    fn behind_remote(&self) -> Result<bool, HistoryError>;

    /// Whether any commit contains `path`
    ///
    /// # Errors
    /// Returns [`HistoryError`] when the history cannot be walked.
    fn file_in_history(&self, path: &Path) -> Result<bool, HistoryError> {
        Ok(!self.iter_commits(path)?.is_empty())
    }

    /// Records file at revision `rev`, parsed
    ///
    /// # Errors
    /// Returns [`DatasetError`] when the revision is unknown or the committed
    /// content does not parse.
    fn records_at(&self, rev: &str, path: &Path) -> Result<Option<RecordsDict>, DatasetError> {
        match self.file_at(rev, path)? {
            Some(content) => Ok(Some(bibtex::parse_str(&content)?)),
            None => Ok(None),
        }
    }
}

// ============================================================================
// Git
// ============================================================================

/// History backed by a Git repository
pub struct GitHistory {
    repo: Mutex<Repository>,
    root: PathBuf,
}

impl fmt::Debug for GitHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHistory").field("root", &self.root).finish()
    }
}

impl GitHistory {
    /// Open the repository at `root`
    ///
    /// # Errors
    /// Returns [`HistoryError::Git`] when `root` is not a repository.
    pub fn open(root: &Path) -> Result<Self, HistoryError> {
        let repo = Repository::open(root)?;
        Ok(Self {
            repo: Mutex::new(repo),
            root: root.to_path_buf(),
        })
    }

    /// Create a repository at `root`
    ///
    /// # Errors
    /// Returns [`HistoryError::Git`] when initialization fails.
    pub fn init(root: &Path) -> Result<Self, HistoryError> {
        let repo = Repository::init(root)?;
        Ok(Self {
            repo: Mutex::new(repo),
            root: root.to_path_buf(),
        })
    }

    fn signature(repo: &Repository) -> Result<Signature<'static>, HistoryError> {
        match repo.signature() {
            Ok(sig) => Ok(sig.to_owned()),
            Err(_) => Ok(Signature::now(FALLBACK_NAME, FALLBACK_EMAIL)?),
        }
    }

    fn blob_id(tree: &git2::Tree<'_>, path: &Path) -> Option<git2::Oid> {
        tree.get_path(path).ok().map(|entry| entry.id())
    }
}

fn is_unborn(err: &git2::Error) -> bool {
    matches!(err.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound)
}

impl History for GitHistory {
    fn file_at(&self, rev: &str, path: &Path) -> Result<Option<String>, HistoryError> {
        let repo = self.repo.lock();
        let commit = match repo.revparse_single(rev).and_then(|obj| obj.peel_to_commit()) {
            Ok(commit) => commit,
            Err(e) if is_unborn(&e) => return Err(HistoryError::UnknownRevision(rev.to_string())),
            Err(e) => return Err(e.into()),
        };
        let tree = commit.tree()?;
        let entry = match tree.get_path(path) {
            Ok(entry) => entry,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let object = entry.to_object(&repo)?;
        let Some(blob) = object.as_blob() else {
            return Ok(None);
        };
        String::from_utf8(blob.content().to_vec())
            .map(Some)
            .map_err(|_| HistoryError::NonUtf8(path.to_path_buf()))
    }

    fn iter_commits(&self, path: &Path) -> Result<Vec<CommitInfo>, HistoryError> {
        let repo = self.repo.lock();
        let mut revwalk = repo.revwalk()?;
        match revwalk.push_head() {
            Ok(()) => {}
            Err(e) if is_unborn(&e) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        }
        revwalk.set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::TIME)?;

        let mut commits = Vec::new();
        for oid in revwalk {
            let commit = repo.find_commit(oid?)?;
            let current = Self::blob_id(&commit.tree()?, path);
            let previous = if commit.parent_count() > 0 {
                Self::blob_id(&commit.parent(0)?.tree()?, path)
            } else {
                None
            };
            if current.is_some() && current != previous {
                commits.push(CommitInfo {
                    id: commit.id().to_string(),
                    summary: commit.summary().unwrap_or_default().to_string(),
                });
            }
        }
        Ok(commits)
    }

    fn add_changes(&self, path: &Path) -> Result<(), HistoryError> {
        let repo = self.repo.lock();
        let mut index = repo.index()?;
        if self.root.join(path).exists() {
            index.add_path(path)?;
        } else {
            index.remove_path(path)?;
        }
        index.write()?;
        debug!(path = %path.display(), "staged");
        Ok(())
    }

    fn commit(&self, message: &str, paths: &[PathBuf]) -> Result<String, HistoryError> {
        for path in paths {
            self.add_changes(path)?;
        }
        let repo = self.repo.lock();
        let mut index = repo.index()?;
        if paths.is_empty() {
            index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
            index.write()?;
        }
        let tree = repo.find_tree(index.write_tree()?)?;
        let signature = Self::signature(&repo)?;
        let parent = match repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(e) if is_unborn(&e) => None,
            Err(e) => return Err(e.into()),
        };
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        let oid = repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;
        debug!(commit = %oid, "committed");
        Ok(oid.to_string())
    }

    fn is_dirty(&self) -> Result<bool, HistoryError> {
        let repo = self.repo.lock();
        let mut options = StatusOptions::new();
        options.include_untracked(false).include_ignored(false);
        let statuses = repo.statuses(Some(&mut options))?;
        Ok(statuses
            .iter()
            .any(|entry| entry.status() != git2::Status::CURRENT))
    }

    fn behind_remote(&self) -> Result<bool, HistoryError> {
        let repo = self.repo.lock();
        let head = match repo.head() {
            Ok(head) => head,
            Err(e) if is_unborn(&e) => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        if !head.is_branch() {
            return Ok(false);
        }
        let Some(local) = head.target() else {
            return Ok(false);
        };
        let branch = git2::Branch::wrap(head);
        let Ok(upstream) = branch.upstream() else {
            return Ok(false);
        };
        let Some(remote) = upstream.get().target() else {
            return Ok(false);
        };
        let (_, behind) = repo.graph_ahead_behind(local, remote)?;
        Ok(behind > 0)
    }
}

// ============================================================================
// In-memory
// ============================================================================

#[derive(Debug, Clone)]
struct Snapshot {
    info: CommitInfo,
    files: BTreeMap<PathBuf, String>,
}

#[derive(Debug, Default)]
struct MemoryState {
    // oldest first
    snapshots: Vec<Snapshot>,
    staged: BTreeMap<PathBuf, Option<String>>,
    behind_remote: bool,
}

/// History kept in memory, reading the working copy from disk
#[derive(Debug)]
pub struct MemoryHistory {
    root: PathBuf,
    state: Mutex<MemoryState>,
}

impl MemoryHistory {
    /// Empty history over the working copy at `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Builder: report the remote as ahead
    #[must_use]
    pub fn with_behind_remote(self, behind: bool) -> Self {
        self.state.lock().behind_remote = behind;
        self
    }

    fn head_files(state: &MemoryState) -> BTreeMap<PathBuf, String> {
        state
            .snapshots
            .last()
            .map(|s| s.files.clone())
            .unwrap_or_default()
    }

    fn read_working(&self, path: &Path) -> Result<Option<String>, HistoryError> {
        let full = self.root.join(path);
        if !full.exists() {
            return Ok(None);
        }
        std::fs::read_to_string(&full)
            .map(Some)
            .map_err(|source| HistoryError::Io { path: full, source })
    }

    fn resolve<'a>(state: &'a MemoryState, rev: &str) -> Option<&'a Snapshot> {
        if let Some(steps) = rev.strip_prefix("HEAD") {
            let back = if steps.is_empty() {
                0
            } else {
                steps.strip_prefix('~')?.parse::<usize>().ok()?
            };
            let len = state.snapshots.len();
            return (back < len).then(|| &state.snapshots[len - 1 - back]);
        }
        state.snapshots.iter().find(|s| s.info.id.starts_with(rev))
    }
}

impl History for MemoryHistory {
    fn file_at(&self, rev: &str, path: &Path) -> Result<Option<String>, HistoryError> {
        let state = self.state.lock();
        let snapshot = Self::resolve(&state, rev)
            .ok_or_else(|| HistoryError::UnknownRevision(rev.to_string()))?;
        Ok(snapshot.files.get(path).cloned())
    }

    fn iter_commits(&self, path: &Path) -> Result<Vec<CommitInfo>, HistoryError> {
        let state = self.state.lock();
        let mut previous: Option<&String> = None;
        let mut commits = Vec::new();
        for snapshot in &state.snapshots {
            let current = snapshot.files.get(path);
            if current.is_some() && current != previous {
                commits.push(snapshot.info.clone());
            }
            previous = current;
        }
        commits.reverse();
        Ok(commits)
    }

    fn add_changes(&self, path: &Path) -> Result<(), HistoryError> {
        let content = self.read_working(path)?;
        self.state.lock().staged.insert(path.to_path_buf(), content);
        Ok(())
    }

    fn commit(&self, message: &str, paths: &[PathBuf]) -> Result<String, HistoryError> {
        for path in paths {
            self.add_changes(path)?;
        }
        let mut state = self.state.lock();
        let mut files = Self::head_files(&state);
        for (path, content) in std::mem::take(&mut state.staged) {
            match content {
                Some(content) => files.insert(path, content),
                None => files.remove(&path),
            };
        }

        let mut digest = format!("{}\n{message}\n", state.snapshots.len());
        for (path, content) in &files {
            digest.push_str(&format!("{}\n{content}\n", path.display()));
        }
        let id = ContentHash::compute(digest.as_bytes()).to_string();
        let summary = message.lines().next().unwrap_or_default().to_string();
        state.snapshots.push(Snapshot {
            info: CommitInfo {
                id: id.clone(),
                summary,
            },
            files,
        });
        Ok(id)
    }

    fn is_dirty(&self) -> Result<bool, HistoryError> {
        let files = Self::head_files(&self.state.lock());
        for (path, committed) in &files {
            if self.read_working(path)?.as_ref() != Some(committed) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn behind_remote(&self) -> Result<bool, HistoryError> {
        Ok(self.state.lock().behind_remote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write(root: &Path, path: &str, content: &str) {
        let full = root.join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, content).unwrap();
    }

    #[test]
    fn memory_history_tracks_versions() {
        let dir = tempfile::tempdir().unwrap();
        let history = MemoryHistory::new(dir.path());
        let path = Path::new("data/records.bib");

        write(dir.path(), "data/records.bib", "v1");
        let first = history.commit("load", &[path.to_path_buf()]).unwrap();
        write(dir.path(), "settings.json", "{}");
        history.commit("settings", &[PathBuf::from("settings.json")]).unwrap();
        write(dir.path(), "data/records.bib", "v2");
        assert!(history.is_dirty().unwrap());
        history.commit("prep", &[path.to_path_buf()]).unwrap();
        assert!(!history.is_dirty().unwrap());

        let commits = history.iter_commits(path).unwrap();
        let summaries: Vec<&str> = commits.iter().map(|c| c.summary.as_str()).collect();
        assert_eq!(summaries, vec!["prep", "load"]);
        assert_eq!(history.file_at("HEAD", path).unwrap().as_deref(), Some("v2"));
        assert_eq!(history.file_at(&first, path).unwrap().as_deref(), Some("v1"));
        assert_eq!(history.file_at("HEAD~2", path).unwrap().as_deref(), Some("v1"));
    }

    #[test]
    fn memory_history_unknown_revision() {
        let history = MemoryHistory::new("/nonexistent");
        assert!(matches!(
            history.file_at("HEAD", Path::new("a")),
            Err(HistoryError::UnknownRevision(_))
        ));
        assert!(!history.file_in_history(Path::new("a")).unwrap());
    }

    #[test]
    fn memory_history_behind_flag() {
        let history = MemoryHistory::new("/nonexistent").with_behind_remote(true);
        assert!(history.behind_remote().unwrap());
    }

    #[test]
    fn git_history_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let history = GitHistory::init(dir.path()).unwrap();
        let path = PathBuf::from("data/records.bib");
        assert!(history.iter_commits(&path).unwrap().is_empty());
        assert!(!history.behind_remote().unwrap());

        write(dir.path(), "data/records.bib", "@article{a,\n}\n");
        history.commit("Load", &[path.clone()]).unwrap();
        assert!(!history.is_dirty().unwrap());

        write(dir.path(), "data/records.bib", "@article{b,\n}\n");
        assert!(history.is_dirty().unwrap());
        history.commit("Prep", &[path.clone()]).unwrap();

        let commits = history.iter_commits(&path).unwrap();
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].summary, "Prep");
        let committed = history.records_at("HEAD~1", &path).unwrap().unwrap();
        assert!(committed.contains_key("a"));
        assert_eq!(history.file_at("HEAD", Path::new("missing.txt")).unwrap(), None);
    }
}
