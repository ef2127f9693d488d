//! The loader: lazy, priority-ordered discovery and resolution of tools.
//!
//! Sources register onto a worklist; nothing is read until a lookup (or
//! listing) needs definitions under a prefix. Directory sources follow the
//! well-known layout: `.index.toml` contributes to the directory's own
//! tool, `.preload.luau` / `.preload/` register script libraries for the
//! subtree, `.data/` resolves data files, dot-prefixed names are otherwise
//! skipped, and each remaining `*.toml` file or subdirectory becomes a
//! subtool named after its stem.

pub mod manifest;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use include_dir::{Dir, DirEntry, File};

use crate::error::{DefinitionError, LookupError};
use crate::source_info::SourceInfo;
use crate::tool::{Inheritance, Tool};

const INDEX_FILE_NAME: &str = ".index.toml";
const PRELOAD_FILE_NAME: &str = ".preload.luau";
const PRELOAD_DIR_NAME: &str = ".preload";
const DATA_DIR_NAME: &str = ".data";
const TOOL_EXTENSION: &str = "toml";
const PRELOAD_EXTENSION: &str = "luau";

/// Delegation chains longer than this are treated as loops.
const DELEGATION_BOUND: usize = 32;

/// Materializes `(remote, path, commit)` into a local directory.
/// Implementations should be idempotent and may cache.
pub trait GitFetcher: Send + Sync {
    fn fetch(&self, remote: &str, path: &str, commit: &str) -> anyhow::Result<PathBuf>;
}

/// Named middleware whose `config` hook runs during `finish_definition`.
pub trait Middleware: Send + Sync {
    fn config(&self, tool: &mut Tool, loader: &Loader) -> Result<(), DefinitionError>;
}

type BlockFn = Box<dyn FnOnce(&mut Loader, &mut Tool) -> Result<(), LookupError> + Send>;

enum EmbeddedNode {
    Dir(&'static Dir<'static>),
    File(&'static File<'static>),
}

enum WorkItem {
    Path {
        source: Arc<SourceInfo>,
        path: PathBuf,
        words: Vec<String>,
        remaining: Option<Vec<String>>,
        priority: i32,
    },
    Block {
        name: String,
        block: BlockFn,
        priority: i32,
    },
    Git {
        remote: String,
        path: String,
        commit: String,
        priority: i32,
    },
    Embedded {
        node: EmbeddedNode,
        source: Arc<SourceInfo>,
        words: Vec<String>,
        remaining: Option<Vec<String>>,
        priority: i32,
    },
}

impl WorkItem {
    const fn priority(&self) -> i32 {
        match self {
            Self::Path { priority, .. }
            | Self::Block { priority, .. }
            | Self::Git { priority, .. }
            | Self::Embedded { priority, .. } => *priority,
        }
    }
}

enum ToolState {
    Building(Box<Tool>),
    /// Temporarily checked out for definition building; holds what child
    /// tools created meanwhile need to inherit.
    Checked(Inheritance),
    Finished(Arc<Tool>),
}

struct ToolEntry {
    state: ToolState,
    /// Winning definition priority. `None` for namespace placeholders that
    /// no definition has claimed.
    priority: Option<i32>,
}

/// Composes sources into a tool lookup service.
pub struct Loader {
    entries: HashMap<Vec<String>, ToolEntry>,
    worklist: Vec<WorkItem>,
    max_priority: i32,
    min_priority: i32,
    middleware: BTreeMap<String, Arc<dyn Middleware>>,
    git_fetcher: Option<Arc<dyn GitFetcher>>,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

fn is_prefix(candidate: &[String], of: &[String]) -> bool {
    candidate.len() <= of.len() && candidate.iter().zip(of).all(|(a, b)| a == b)
}

/// Advance a remaining-words lookahead past a child word. `None` keeps the
/// subtree eager; an off-path child becomes lazy.
fn advance(remaining: Option<&Vec<String>>, word: &str) -> Option<Vec<String>> {
    match remaining {
        None => None,
        Some(words) if words.is_empty() => Some(Vec::new()),
        Some(words) if words[0] == word => Some(words[1..].to_vec()),
        Some(_) => Some(Vec::new()),
    }
}

/// Default search roots, highest priority first: the project-local
/// `.tooltree/tools`, then the user-level directory (`TOOLTREE_HOME` or the
/// platform config dir).
pub fn default_search_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd.join(".tooltree/tools"));
    }
    if let Some(base) = user_dir() {
        roots.push(base.join("tools"));
    }
    roots
}

/// The user-level base directory. `TOOLTREE_HOME` (set and non-empty)
/// replaces the platform-native config dir.
pub fn user_dir() -> Option<PathBuf> {
    if let Ok(home) = std::env::var("TOOLTREE_HOME")
        && !home.is_empty()
    {
        return Some(PathBuf::from(home));
    }
    dirs::config_dir().map(|d| d.join("tooltree"))
}

impl Loader {
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            Vec::new(),
            ToolEntry {
                state: ToolState::Building(Box::new(Tool::new(Vec::new(), 0))),
                priority: None,
            },
        );
        Self {
            entries,
            worklist: Vec::new(),
            max_priority: 0,
            min_priority: 0,
            middleware: BTreeMap::new(),
            git_fetcher: None,
        }
    }

    fn next_priority(&mut self, high_priority: bool) -> i32 {
        if high_priority {
            self.max_priority += 1;
            self.max_priority
        } else {
            self.min_priority -= 1;
            self.min_priority
        }
    }

    // --- source registration ---

    /// Register a filesystem root: a directory searched for an index and
    /// children, or a single tool manifest file.
    pub fn add_path(&mut self, path: impl Into<PathBuf>, high_priority: bool) {
        let path = path.into();
        let priority = self.next_priority(high_priority);
        tracing::debug!(path = %path.display(), priority, "registering path source");
        let source = Arc::new(SourceInfo::root_path(&path, priority));
        self.worklist.push(WorkItem::Path {
            source,
            path,
            words: Vec::new(),
            remaining: Some(Vec::new()),
            priority,
        });
    }

    /// Register an in-memory definition block evaluated against the root
    /// tool. The block receives the loader and may recurse into
    /// `activate_tool` to define nested tools at `root.priority()`.
    pub fn add_block<F>(&mut self, name: impl Into<String>, high_priority: bool, block: F)
    where
        F: FnOnce(&mut Self, &mut Tool) -> Result<(), LookupError> + Send + 'static,
    {
        let priority = self.next_priority(high_priority);
        self.worklist.push(WorkItem::Block {
            name: name.into(),
            block: Box::new(block),
            priority,
        });
    }

    /// Register a remote source, fetched lazily through the installed
    /// [`GitFetcher`].
    pub fn add_git_source(
        &mut self,
        remote: impl Into<String>,
        path: impl Into<String>,
        commit: impl Into<String>,
        high_priority: bool,
    ) {
        let priority = self.next_priority(high_priority);
        self.worklist.push(WorkItem::Git {
            remote: remote.into(),
            path: path.into(),
            commit: commit.into(),
            priority,
        });
    }

    /// Register an embedded directory (compiled-in builtins) following the
    /// same layout protocol as filesystem directories.
    pub fn add_embedded(
        &mut self,
        dir: &'static Dir<'static>,
        name: impl Into<String>,
        high_priority: bool,
    ) {
        let priority = self.next_priority(high_priority);
        let source = Arc::new(SourceInfo::root_block(name, priority));
        self.worklist.push(WorkItem::Embedded {
            node: EmbeddedNode::Dir(dir),
            source,
            words: Vec::new(),
            remaining: Some(Vec::new()),
            priority,
        });
    }

    pub fn set_git_fetcher(&mut self, fetcher: Arc<dyn GitFetcher>) {
        self.git_fetcher = Some(fetcher);
    }

    pub fn add_middleware(&mut self, name: impl Into<String>, middleware: Arc<dyn Middleware>) {
        self.middleware.insert(name.into(), middleware);
    }

    pub fn middleware(&self, name: &str) -> Option<Arc<dyn Middleware>> {
        self.middleware.get(name).cloned()
    }

    // --- queries ---

    /// Whether a tool is defined at `words`, without triggering any load.
    pub fn tool_defined(&self, words: &[String]) -> bool {
        self.entries.contains_key(words)
    }

    /// Resolve an argument vector to the deepest tool whose full name is a
    /// prefix of its non-flag head, plus the remaining arguments.
    pub fn lookup(&mut self, args: &[String]) -> Result<(Arc<Tool>, Vec<String>), LookupError> {
        let orig_prefix: Vec<String> = args
            .iter()
            .take_while(|a| !a.starts_with('-'))
            .cloned()
            .collect();
        let mut cur_prefix = orig_prefix.clone();
        let selected = loop {
            self.load_for_prefix(&cur_prefix, false)?;
            let mut found = None;
            for n in (cur_prefix.len()..=orig_prefix.len()).rev() {
                if self.entries.contains_key(&orig_prefix[..n]) {
                    found = Some(n);
                    break;
                }
            }
            if let Some(n) = found {
                break n;
            }
            if cur_prefix.is_empty() {
                break 0;
            }
            cur_prefix.pop();
        };

        let tool = self.finalize(&orig_prefix[..selected])?;
        let tool = self.resolve_delegation(tool)?;
        Ok((tool, args[selected..].to_vec()))
    }

    /// Follow delegation targets to the final tool, bounding chain length
    /// and detecting cycles.
    fn resolve_delegation(&mut self, mut tool: Arc<Tool>) -> Result<Arc<Tool>, LookupError> {
        let mut visited: Vec<Vec<String>> = vec![tool.full_name().to_vec()];
        while let Some(target) = tool.delegate_target() {
            let target = target.to_vec();
            if visited.contains(&target) || visited.len() >= DELEGATION_BOUND {
                let mut chain: Vec<String> = visited.iter().map(|w| w.join(" ")).collect();
                chain.push(target.join(" "));
                return Err(LookupError::DelegationCycle { chain });
            }
            self.load_for_prefix(&target, false)?;
            if !self.entries.contains_key(&target) {
                return Err(LookupError::DelegateNotFound {
                    tool: tool.display_name(),
                    target: target.join(" "),
                });
            }
            tool = self.finalize(&target)?;
            visited.push(target);
        }
        Ok(tool)
    }

    /// Enumerate subtools under `prefix`, sorted by full name. Tools (and
    /// aliases) whose simple name starts with `_` are excluded unless
    /// `include_hidden` is set.
    pub fn list_subtools(
        &mut self,
        prefix: &[String],
        recursive: bool,
        include_hidden: bool,
    ) -> Result<Vec<Arc<Tool>>, LookupError> {
        self.load_for_prefix(prefix, true)?;
        let mut names: Vec<Vec<String>> = self
            .entries
            .keys()
            .filter(|words| {
                words.len() > prefix.len()
                    && is_prefix(prefix, words)
                    && (recursive || words.len() == prefix.len() + 1)
            })
            .cloned()
            .collect();
        names.sort();
        let mut out = Vec::with_capacity(names.len());
        for words in names {
            let tool = self.finalize(&words)?;
            if tool.is_hidden() && !include_hidden {
                continue;
            }
            out.push(tool);
        }
        Ok(out)
    }

    /// Obtain or create the tool at `words` under `priority` and run `f`
    /// against it. Returns `Ok(false)` when a higher-priority definition
    /// already owns the name (the definition is skipped). The root tool
    /// aggregates every source's subtree, so root evaluation is never
    /// priority-gated.
    pub fn activate_tool<F>(
        &mut self,
        words: &[String],
        priority: i32,
        f: F,
    ) -> Result<bool, LookupError>
    where
        F: FnOnce(&mut Self, &mut Tool) -> Result<(), LookupError>,
    {
        if words.is_empty() {
            return self.evaluate_at_root(priority, f).map(|()| true);
        }
        let Some(mut tool) = self.checkout_tool(words, priority)? else {
            return Ok(false);
        };
        let result = f(self, &mut tool);
        self.checkin_tool(words.to_vec(), tool);
        result.map(|()| true)
    }

    fn evaluate_at_root<F>(&mut self, priority: i32, f: F) -> Result<(), LookupError>
    where
        F: FnOnce(&mut Self, &mut Tool) -> Result<(), LookupError>,
    {
        let Some(mut tool) = self.take_building(&[]) else {
            return Ok(());
        };
        tool.set_priority(priority);
        let result = f(self, &mut tool);
        self.checkin_tool(Vec::new(), tool);
        result
    }

    /// Drop all lower-priority sources from the worklist. Fails when tools
    /// below `priority` have already been materialized.
    pub fn truncate_load_path(&mut self, priority: i32) -> Result<(), LookupError> {
        let materialized_below = self
            .entries
            .values()
            .any(|entry| entry.priority.is_some_and(|p| p < priority));
        if materialized_below {
            return Err(LookupError::TruncateAfterLoad { priority });
        }
        self.worklist.retain(|item| item.priority() >= priority);
        Ok(())
    }

    // --- tool entry management ---

    fn parent_inheritance(&self, words: &[String]) -> Option<Inheritance> {
        let parent = &words[..words.len().saturating_sub(1)];
        self.entries.get(parent).map(|entry| match &entry.state {
            ToolState::Building(tool) => Inheritance::of(tool),
            ToolState::Finished(tool) => Inheritance::of(tool),
            ToolState::Checked(inheritance) => inheritance.clone(),
        })
    }

    /// Create placeholder entries down to `words`, so namespaces appear in
    /// the map as soon as their directory is seen.
    fn ensure_tool(&mut self, words: &[String]) {
        if words.is_empty() || self.entries.contains_key(words) {
            return;
        }
        self.ensure_tool(&words[..words.len() - 1]);
        let tool = match self.parent_inheritance(words) {
            Some(inheritance) => Tool::new_child(words.to_vec(), 0, &inheritance),
            None => Tool::new(words.to_vec(), 0),
        };
        self.entries.insert(
            words.to_vec(),
            ToolEntry {
                state: ToolState::Building(Box::new(tool)),
                priority: None,
            },
        );
    }

    /// Take a building tool out of the map, leaving its inheritance behind
    /// for children created while it is out.
    fn take_building(&mut self, words: &[String]) -> Option<Box<Tool>> {
        let entry = self.entries.get_mut(words)?;
        let inheritance = match &entry.state {
            ToolState::Building(tool) => Inheritance::of(tool),
            _ => return None,
        };
        match std::mem::replace(&mut entry.state, ToolState::Checked(inheritance)) {
            ToolState::Building(tool) => Some(tool),
            other => {
                entry.state = other;
                None
            }
        }
    }

    fn checkin_tool(&mut self, words: Vec<String>, tool: Box<Tool>) {
        if let Some(entry) = self.entries.get_mut(&words) {
            entry.state = ToolState::Building(tool);
        }
    }

    /// Priority admission: skip when a higher-priority definition exists,
    /// replace when a higher-priority definition arrives, merge otherwise.
    fn checkout_tool(
        &mut self,
        words: &[String],
        priority: i32,
    ) -> Result<Option<Box<Tool>>, LookupError> {
        self.ensure_tool(words);
        let existing = match self.entries.get(words) {
            Some(entry) => entry.priority,
            None => return Ok(None),
        };
        if existing.is_some_and(|p| p > priority) {
            tracing::trace!(?words, priority, "skipping lower-priority definition");
            return Ok(None);
        }
        if existing.is_some_and(|p| p < priority) {
            // A higher-priority definition replaces the old tool wholesale.
            let fresh = match self.parent_inheritance(words) {
                Some(inheritance) if !words.is_empty() => {
                    Tool::new_child(words.to_vec(), priority, &inheritance)
                }
                _ => Tool::new(words.to_vec(), priority),
            };
            if let Some(entry) = self.entries.get_mut(words) {
                entry.state = ToolState::Checked(Inheritance::of(&fresh));
                entry.priority = Some(priority);
            }
            return Ok(Some(Box::new(fresh)));
        }
        let Some(mut tool) = self.take_building(words) else {
            // Checked out elsewhere or already finished: nothing to merge.
            return Ok(None);
        };
        tool.set_priority(priority);
        if let Some(entry) = self.entries.get_mut(words) {
            entry.priority = Some(priority);
        }
        Ok(Some(tool))
    }

    /// Finish a tool's definition and seal it behind an `Arc`.
    fn finalize(&mut self, words: &[String]) -> Result<Arc<Tool>, LookupError> {
        self.ensure_tool(words);
        if let Some(entry) = self.entries.get(words)
            && let ToolState::Finished(tool) = &entry.state
        {
            return Ok(Arc::clone(tool));
        }
        let Some(mut tool) = self.take_building(words) else {
            return Err(LookupError::Definition(DefinitionError::new(
                crate::error::DefinitionErrorKind::DefinitionFrozen {
                    tool: words.join(" "),
                },
            )));
        };
        match tool.finish_definition(self) {
            Ok(()) => {
                let tool = Arc::<Tool>::from(tool);
                if let Some(entry) = self.entries.get_mut(words) {
                    entry.state = ToolState::Finished(Arc::clone(&tool));
                }
                Ok(tool)
            }
            Err(e) => {
                self.checkin_tool(words.to_vec(), tool);
                Err(e.into())
            }
        }
    }

    // --- worklist draining ---

    fn item_relevant(&self, item: &WorkItem, prefix: &[String], all: bool) -> bool {
        match item {
            WorkItem::Block { .. } | WorkItem::Git { .. } => true,
            WorkItem::Path {
                words, remaining, ..
            }
            | WorkItem::Embedded {
                words, remaining, ..
            } => {
                remaining.is_none()
                    || is_prefix(words, prefix)
                    || (all && is_prefix(prefix, words))
            }
        }
    }

    /// Drain the worklist of everything that can contribute tools at or
    /// above `prefix` (or below it too, when `all` is set), until no
    /// progress is made.
    fn load_for_prefix(&mut self, prefix: &[String], all: bool) -> Result<(), LookupError> {
        loop {
            let mut progressed = false;
            let items = std::mem::take(&mut self.worklist);
            let mut iter = items.into_iter();
            while let Some(item) = iter.next() {
                if self.item_relevant(&item, prefix, all) {
                    progressed = true;
                    if let Err(e) = self.process_item(item, prefix, all) {
                        self.worklist.extend(iter);
                        return Err(e);
                    }
                } else {
                    self.worklist.push(item);
                }
            }
            if !progressed {
                return Ok(());
            }
        }
    }

    fn process_item(
        &mut self,
        item: WorkItem,
        prefix: &[String],
        all: bool,
    ) -> Result<(), LookupError> {
        match item {
            WorkItem::Path {
                source,
                path,
                words,
                remaining,
                priority,
            } => {
                let remaining = effective_remaining(&words, remaining, prefix, all);
                self.process_path(&source, &path, words, remaining, priority)
            }
            WorkItem::Block {
                name,
                block,
                priority,
            } => {
                tracing::debug!(name, priority, "evaluating block source");
                self.evaluate_at_root(priority, move |loader, tool| {
                    block(loader, tool).map_err(|e| match e {
                        LookupError::Definition(d) => LookupError::Definition(
                            d.with_source(&format!("(block {name})")),
                        ),
                        other => other,
                    })
                })
            }
            WorkItem::Git {
                remote,
                path,
                commit,
                priority,
            } => {
                let Some(fetcher) = self.git_fetcher.clone() else {
                    return Err(LookupError::GitFetch {
                        remote,
                        message: "no git fetcher installed".to_string(),
                    });
                };
                tracing::debug!(remote, path, commit, "fetching git source");
                let local = fetcher.fetch(&remote, &path, &commit).map_err(|e| {
                    LookupError::GitFetch {
                        remote: remote.clone(),
                        message: format!("{e:#}"),
                    }
                })?;
                let source = Arc::new(SourceInfo::root_git(remote, path, commit, &local, priority));
                self.worklist.push(WorkItem::Path {
                    source,
                    path: local,
                    words: Vec::new(),
                    remaining: Some(Vec::new()),
                    priority,
                });
                Ok(())
            }
            WorkItem::Embedded {
                node,
                source,
                words,
                remaining,
                priority,
            } => {
                let remaining = effective_remaining(&words, remaining, prefix, all);
                self.process_embedded(&node, &source, words, remaining, priority)
            }
        }
    }

    fn process_path(
        &mut self,
        source: &Arc<SourceInfo>,
        path: &Path,
        words: Vec<String>,
        remaining: Option<Vec<String>>,
        priority: i32,
    ) -> Result<(), LookupError> {
        if path.is_file() {
            if path.extension().is_some_and(|e| e == TOOL_EXTENSION) {
                let source = Arc::clone(source);
                let path = path.to_path_buf();
                self.activate_tool(&words, priority, move |loader, tool| {
                    tool.set_source_info(source);
                    manifest::evaluate_file(loader, tool, &path)
                })?;
            }
            return Ok(());
        }
        if !path.is_dir() {
            return Err(LookupError::Unreadable {
                path: path.to_path_buf(),
                message: "not a readable file or directory".to_string(),
            });
        }

        tracing::debug!(path = %path.display(), words = ?words, "loading directory source");
        self.ensure_tool(&words);

        let preload_file = path.join(PRELOAD_FILE_NAME);
        if preload_file.is_file() {
            let text = read_text(&preload_file)?;
            self.append_prelude(&words, &text);
        }
        let preload_dir = path.join(PRELOAD_DIR_NAME);
        if preload_dir.is_dir() {
            for child in sorted_entries(&preload_dir)? {
                if child.path.extension().is_some_and(|e| e == PRELOAD_EXTENSION) {
                    let text = read_text(&child.path)?;
                    self.append_prelude(&words, &text);
                }
            }
        }

        let data_dir = {
            let dir = path.join(DATA_DIR_NAME);
            dir.is_dir().then_some(dir)
        };

        let index = path.join(INDEX_FILE_NAME);
        if index.is_file() {
            let index_source = Arc::new(source.child(&index, data_dir.clone()));
            self.activate_tool(&words, priority, move |loader, tool| {
                tool.set_source_info(Arc::clone(&index_source));
                manifest::evaluate_file(loader, tool, index_source.path().unwrap_or(&index))
            })?;
        }

        for child in sorted_entries(path)? {
            if child.name.starts_with('.') {
                continue;
            }
            let child_word = if child.is_dir {
                child.name.clone()
            } else if child.path.extension().is_some_and(|e| e == TOOL_EXTENSION) {
                match child.path.file_stem().and_then(|s| s.to_str()) {
                    Some(stem) => stem.to_string(),
                    None => continue,
                }
            } else {
                continue;
            };
            let mut child_words = words.clone();
            child_words.push(child_word.clone());
            let child_remaining = advance(remaining.as_ref(), &child_word);
            let child_source = Arc::new(source.child(&child.path, data_dir.clone()));
            self.worklist.push(WorkItem::Path {
                source: child_source,
                path: child.path,
                words: child_words,
                remaining: child_remaining,
                priority,
            });
        }
        Ok(())
    }

    fn process_embedded(
        &mut self,
        node: &EmbeddedNode,
        source: &Arc<SourceInfo>,
        words: Vec<String>,
        remaining: Option<Vec<String>>,
        priority: i32,
    ) -> Result<(), LookupError> {
        let dir = match node {
            EmbeddedNode::File(file) => {
                let virtual_path = PathBuf::from(format!("<builtin>/{}", file.path().display()));
                let content = file.contents_utf8().unwrap_or_default();
                let parsed = manifest::parse_str(content, &virtual_path)?;
                let source = Arc::clone(source);
                self.activate_tool(&words, priority, move |loader, tool| {
                    tool.set_source_info(source);
                    manifest::apply(loader, tool, &parsed, &virtual_path.display().to_string())
                })?;
                return Ok(());
            }
            EmbeddedNode::Dir(dir) => dir,
        };

        self.ensure_tool(&words);
        let mut children: Vec<&'static DirEntry<'static>> = dir.entries().iter().collect();
        children.sort_by_key(|entry| entry.path().file_name().map(std::ffi::OsStr::to_os_string));

        for entry in &children {
            let Some(name) = entry.path().file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name == PRELOAD_FILE_NAME
                && let DirEntry::File(file) = entry
            {
                self.append_prelude(&words, file.contents_utf8().unwrap_or_default());
            }
            if name == INDEX_FILE_NAME
                && let DirEntry::File(file) = entry
            {
                let virtual_path = PathBuf::from(format!("<builtin>/{}", file.path().display()));
                let content = file.contents_utf8().unwrap_or_default();
                let parsed = manifest::parse_str(content, &virtual_path)?;
                let source = Arc::clone(source);
                self.activate_tool(&words, priority, move |loader, tool| {
                    tool.set_source_info(source);
                    manifest::apply(loader, tool, &parsed, &virtual_path.display().to_string())
                })?;
            }
        }

        for entry in children {
            let Some(name) = entry.path().file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let (node, child_word) = match entry {
                DirEntry::Dir(sub) => (EmbeddedNode::Dir(sub), name.to_string()),
                DirEntry::File(file) => {
                    if file.path().extension().is_some_and(|e| e == TOOL_EXTENSION) {
                        match file.path().file_stem().and_then(|s| s.to_str()) {
                            Some(stem) => (EmbeddedNode::File(file), stem.to_string()),
                            None => continue,
                        }
                    } else {
                        continue;
                    }
                }
            };
            let mut child_words = words.clone();
            child_words.push(child_word.clone());
            let child_remaining = advance(remaining.as_ref(), &child_word);
            self.worklist.push(WorkItem::Embedded {
                node,
                source: Arc::clone(source),
                words: child_words,
                remaining: child_remaining,
                priority,
            });
        }
        Ok(())
    }

    /// Attach preload library source to the tool at `words`; children
    /// created afterwards inherit it.
    fn append_prelude(&mut self, words: &[String], text: &str) {
        self.ensure_tool(words);
        if let Some(mut tool) = self.take_building(words) {
            tool.append_script_prelude(text);
            self.checkin_tool(words.to_vec(), tool);
        }
    }
}

fn effective_remaining(
    words: &[String],
    stored: Option<Vec<String>>,
    prefix: &[String],
    all: bool,
) -> Option<Vec<String>> {
    if all || stored.is_none() {
        return None;
    }
    if is_prefix(words, prefix) {
        return Some(prefix[words.len()..].to_vec());
    }
    stored
}

struct ChildEntry {
    name: String,
    path: PathBuf,
    is_dir: bool,
}

/// Enumerate a directory's children in sorted order.
fn sorted_entries(dir: &Path) -> Result<Vec<ChildEntry>, LookupError> {
    let unreadable = |e: std::io::Error| LookupError::Unreadable {
        path: dir.to_path_buf(),
        message: e.to_string(),
    };
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(unreadable)? {
        let entry = entry.map_err(unreadable)?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        let path = entry.path();
        let is_dir = path.is_dir();
        out.push(ChildEntry { name, path, is_dir });
    }
    out.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(out)
}

fn read_text(path: &Path) -> Result<String, LookupError> {
    std::fs::read_to_string(path).map_err(|e| LookupError::Unreadable {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
