//! Provenance records for tool definitions.
//!
//! Every definition traces back to a registered root source: a filesystem
//! path, an in-memory block, or a fetched git checkout. Children derived
//! during directory traversal keep a back-link to their parent so relative
//! resolution (data directories, context directory) can walk up the chain.

use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default name of the per-directory data directory.
pub const DEFAULT_DATA_DIR_NAME: &str = ".data";
/// Default name of the per-directory preload library directory.
pub const DEFAULT_LIB_DIR_NAME: &str = ".lib";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Directory,
    File,
    Block,
    GitDirectory,
    GitFile,
}

/// Where a tool definition came from. Immutable once created.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    kind: SourceKind,
    path: Option<PathBuf>,
    git_remote: Option<String>,
    git_path: Option<String>,
    git_commit: Option<String>,
    name: String,
    parent: Option<Arc<SourceInfo>>,
    priority: i32,
    context_directory: Option<PathBuf>,
    data_dir_name: String,
    lib_dir_name: String,
    /// Resolved data directory for this source, when one exists beside it.
    data_dir: Option<PathBuf>,
}

impl SourceInfo {
    /// Root source for a registered filesystem path.
    pub fn root_path(path: impl Into<PathBuf>, priority: i32) -> Self {
        let path = path.into();
        let kind = if path.is_dir() {
            SourceKind::Directory
        } else {
            SourceKind::File
        };
        let context_directory = path.parent().map(Path::to_path_buf);
        Self {
            kind,
            name: path.display().to_string(),
            path: Some(path),
            git_remote: None,
            git_path: None,
            git_commit: None,
            parent: None,
            priority,
            context_directory,
            data_dir_name: DEFAULT_DATA_DIR_NAME.to_string(),
            lib_dir_name: DEFAULT_LIB_DIR_NAME.to_string(),
            data_dir: None,
        }
    }

    /// Root source for an in-memory definition block.
    pub fn root_block(name: impl Into<String>, priority: i32) -> Self {
        Self {
            kind: SourceKind::Block,
            path: None,
            git_remote: None,
            git_path: None,
            git_commit: None,
            name: format!("(block {})", name.into()),
            parent: None,
            priority,
            context_directory: None,
            data_dir_name: DEFAULT_DATA_DIR_NAME.to_string(),
            lib_dir_name: DEFAULT_LIB_DIR_NAME.to_string(),
            data_dir: None,
        }
    }

    /// Root source for a git checkout materialized at `local_path`.
    pub fn root_git(
        remote: impl Into<String>,
        git_path: impl Into<String>,
        commit: impl Into<String>,
        local_path: impl Into<PathBuf>,
        priority: i32,
    ) -> Self {
        let remote = remote.into();
        let git_path = git_path.into();
        let commit = commit.into();
        let local_path = local_path.into();
        let kind = if local_path.is_dir() {
            SourceKind::GitDirectory
        } else {
            SourceKind::GitFile
        };
        Self {
            kind,
            name: format!("git({remote} {git_path} {commit})"),
            path: Some(local_path),
            git_remote: Some(remote),
            git_path: Some(git_path),
            git_commit: Some(commit),
            parent: None,
            priority,
            context_directory: None,
            data_dir_name: DEFAULT_DATA_DIR_NAME.to_string(),
            lib_dir_name: DEFAULT_LIB_DIR_NAME.to_string(),
            data_dir: None,
        }
    }

    /// Derive the source record for a child entry discovered during
    /// directory traversal. The child inherits context directory and
    /// well-known directory names; `data_dir` is the child's own resolved
    /// data directory, if any.
    pub fn child(self: &Arc<Self>, path: impl Into<PathBuf>, data_dir: Option<PathBuf>) -> Self {
        let path = path.into();
        let kind = match (self.kind, path.is_dir()) {
            (SourceKind::GitDirectory | SourceKind::GitFile, true) => SourceKind::GitDirectory,
            (SourceKind::GitDirectory | SourceKind::GitFile, false) => SourceKind::GitFile,
            (_, true) => SourceKind::Directory,
            (_, false) => SourceKind::File,
        };
        Self {
            kind,
            name: path.display().to_string(),
            path: Some(path),
            git_remote: self.git_remote.clone(),
            git_path: self.git_path.clone(),
            git_commit: self.git_commit.clone(),
            parent: Some(Arc::clone(self)),
            priority: self.priority,
            context_directory: self.context_directory.clone(),
            data_dir_name: self.data_dir_name.clone(),
            lib_dir_name: self.lib_dir_name.clone(),
            data_dir: data_dir.or_else(|| self.data_dir.clone()),
        }
    }

    pub const fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Arc<Self>> {
        self.parent.as_ref()
    }

    pub const fn priority(&self) -> i32 {
        self.priority
    }

    pub fn context_directory(&self) -> Option<&Path> {
        self.context_directory.as_deref()
    }

    pub fn data_dir_name(&self) -> &str {
        &self.data_dir_name
    }

    pub fn lib_dir_name(&self) -> &str {
        &self.lib_dir_name
    }

    /// Resolve a data file by checking this source's data directory, then
    /// walking up the parent chain. Returns the first existing path.
    pub fn find_data(&self, relative: &Path) -> Option<PathBuf> {
        let mut cur = Some(self);
        while let Some(info) = cur {
            if let Some(dir) = &info.data_dir {
                let candidate = dir.join(relative);
                if candidate.exists() {
                    return Some(candidate);
                }
            }
            cur = info.parent.as_ref().map(Arc::as_ref);
        }
        None
    }
}
