//! Execution context handed to a tool's run handler.
//!
//! A context is the product of one argument parse: the populated data map,
//! the collected usage errors, and enough provenance to resolve data files.
//! Keys are plain strings; the validated accessor-key set gates the
//! [`Context::fetch`] convenience path the way per-tool accessors would.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use crate::error::UsageError;
use crate::source_info::SourceInfo;

#[derive(Debug, Clone, Default)]
pub struct Context {
    tool_name: Vec<String>,
    data: BTreeMap<String, Value>,
    /// Tokens not consumed as flags or declared args (or all tokens
    /// verbatim when the tool disables argument parsing).
    args: Vec<String>,
    usage_errors: Vec<UsageError>,
    accessor_keys: BTreeSet<String>,
    source_info: Option<Arc<SourceInfo>>,
    context_directory: Option<PathBuf>,
}

impl Context {
    pub(crate) fn new(
        tool_name: Vec<String>,
        data: BTreeMap<String, Value>,
        args: Vec<String>,
        usage_errors: Vec<UsageError>,
        accessor_keys: BTreeSet<String>,
        source_info: Option<Arc<SourceInfo>>,
        context_directory: Option<PathBuf>,
    ) -> Self {
        Self {
            tool_name,
            data,
            args,
            usage_errors,
            accessor_keys,
            source_info,
            context_directory,
        }
    }

    /// Full name of the tool this context was parsed for.
    pub fn tool_name(&self) -> &[String] {
        &self.tool_name
    }

    /// The raw value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Accessor-style fetch: only keys that passed accessor validation at
    /// definition time resolve here.
    pub fn fetch(&self, key: &str) -> Option<&Value> {
        self.accessor_keys.contains(key).then(|| self.get(key)).flatten()
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    pub fn data(&self) -> &BTreeMap<String, Value> {
        &self.data
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn usage_errors(&self) -> &[UsageError] {
        &self.usage_errors
    }

    /// Resolved context directory for the tool, when one applies.
    pub fn context_directory(&self) -> Option<&Path> {
        self.context_directory.as_deref()
    }

    /// Resolve a data file by walking the defining source's data
    /// directories up the chain.
    pub fn find_data(&self, relative: impl AsRef<Path>) -> Option<PathBuf> {
        self.source_info
            .as_ref()
            .and_then(|info| info.find_data(relative.as_ref()))
    }
}
