//! Per-tool registries with ancestry lookup.
//!
//! Each tool owns one [`RegistryCell`] holding its named acceptors,
//! completions, mixins, and templates, plus a link to its parent tool's
//! cell. Lookup walks from the tool up to the root; the nearest
//! registration wins. Cells take a write lock only while the owning tool is
//! under construction; finalized tools read concurrently.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::acceptor::Acceptor;
use crate::completion::Completion;
use crate::error::DefinitionError;

/// A named capability set. Its table merges into the context data at the
/// start of each run (later mixins win); the initializer runs after the
/// merge.
#[derive(Clone, Default)]
pub struct Mixin {
    pub table: BTreeMap<String, Value>,
    pub initializer: Option<Arc<dyn Fn(&mut crate::context::Context) + Send + Sync>>,
}

impl std::fmt::Debug for Mixin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mixin")
            .field("table", &self.table)
            .field("initializer", &self.initializer.is_some())
            .finish()
    }
}

/// A named expansion invoked with an argument value against the tool under
/// construction.
pub type Template =
    Arc<dyn Fn(&mut super::Tool, &Value) -> Result<(), DefinitionError> + Send + Sync>;

#[derive(Default)]
struct RegistryMaps {
    acceptors: BTreeMap<String, Acceptor>,
    completions: BTreeMap<String, Completion>,
    mixins: BTreeMap<String, Mixin>,
    templates: BTreeMap<String, Template>,
}

/// One tool's registrations plus the parent link.
#[derive(Default)]
pub struct RegistryCell {
    maps: RwLock<RegistryMaps>,
    parent: Option<Arc<RegistryCell>>,
}

impl RegistryCell {
    pub fn root() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn child_of(parent: &Arc<Self>) -> Arc<Self> {
        Arc::new(Self {
            maps: RwLock::new(RegistryMaps::default()),
            parent: Some(Arc::clone(parent)),
        })
    }

    fn read<R>(&self, f: impl FnOnce(&RegistryMaps) -> R) -> R {
        // Poisoning cannot occur: registries are written only during
        // single-threaded definition building.
        match self.maps.read() {
            Ok(guard) => f(&guard),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }

    fn write(&self, f: impl FnOnce(&mut RegistryMaps)) {
        if let Ok(mut guard) = self.maps.write() {
            f(&mut guard);
        }
    }

    pub fn add_acceptor(&self, name: &str, acceptor: Acceptor) {
        self.write(|m| {
            m.acceptors.insert(name.to_string(), acceptor);
        });
    }

    pub fn add_completion(&self, name: &str, completion: Completion) {
        self.write(|m| {
            m.completions.insert(name.to_string(), completion);
        });
    }

    pub fn add_mixin(&self, name: &str, mixin: Mixin) {
        self.write(|m| {
            m.mixins.insert(name.to_string(), mixin);
        });
    }

    pub fn add_template(&self, name: &str, template: Template) {
        self.write(|m| {
            m.templates.insert(name.to_string(), template);
        });
    }

    /// Walk self and ancestors; nearest match wins.
    pub fn lookup_acceptor(&self, name: &str) -> Option<Acceptor> {
        self.read(|m| m.acceptors.get(name).cloned())
            .or_else(|| self.parent.as_ref().and_then(|p| p.lookup_acceptor(name)))
    }

    pub fn lookup_completion(&self, name: &str) -> Option<Completion> {
        self.read(|m| m.completions.get(name).cloned())
            .or_else(|| self.parent.as_ref().and_then(|p| p.lookup_completion(name)))
    }

    pub fn lookup_mixin(&self, name: &str) -> Option<Mixin> {
        self.read(|m| m.mixins.get(name).cloned())
            .or_else(|| self.parent.as_ref().and_then(|p| p.lookup_mixin(name)))
    }

    pub fn lookup_template(&self, name: &str) -> Option<Template> {
        self.read(|m| m.templates.get(name).cloned())
            .or_else(|| self.parent.as_ref().and_then(|p| p.lookup_template(name)))
    }
}

impl std::fmt::Debug for RegistryCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.read(|m| {
            f.debug_struct("RegistryCell")
                .field("acceptors", &m.acceptors.len())
                .field("completions", &m.completions.len())
                .field("mixins", &m.mixins.len())
                .field("templates", &m.templates.len())
                .field("has_parent", &self.parent.is_some())
                .finish()
        })
    }
}
