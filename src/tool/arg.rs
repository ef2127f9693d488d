//! Positional arguments.

use serde_json::Value;

use crate::acceptor::Acceptor;
use crate::completion::Completion;
use crate::wrap::WrappableText;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Required,
    Optional,
    /// Collects every positional beyond the declared slots.
    Remaining,
}

/// One positional argument slot.
#[derive(Debug, Clone)]
pub struct PositionalArg {
    key: String,
    kind: ArgKind,
    acceptor: Acceptor,
    default: Value,
    desc: WrappableText,
    long_desc: Vec<WrappableText>,
    display_name: String,
    completion: Completion,
}

/// Declarative description of a positional arg, consumed by the tool's
/// `add_required_arg` / `add_optional_arg` / `set_remaining_args`.
pub struct ArgSpec {
    pub(crate) key: String,
    pub(crate) acceptor: Option<Acceptor>,
    pub(crate) acceptor_name: Option<String>,
    pub(crate) default: Option<Value>,
    pub(crate) desc: WrappableText,
    pub(crate) long_desc: Vec<WrappableText>,
    pub(crate) display_name: Option<String>,
    pub(crate) completion: Option<Completion>,
    pub(crate) add_method: Option<bool>,
}

impl ArgSpec {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            acceptor: None,
            acceptor_name: None,
            default: None,
            desc: WrappableText::default(),
            long_desc: Vec::new(),
            display_name: None,
            completion: None,
            add_method: None,
        }
    }

    #[must_use]
    pub fn accept(mut self, acceptor: Acceptor) -> Self {
        self.acceptor = Some(acceptor);
        self
    }

    /// Reference a named acceptor, resolved through the tool's registry
    /// chain when the arg is added.
    #[must_use]
    pub fn accept_name(mut self, name: impl Into<String>) -> Self {
        self.acceptor_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    #[must_use]
    pub fn desc(mut self, desc: impl Into<WrappableText>) -> Self {
        self.desc = desc.into();
        self
    }

    #[must_use]
    pub fn long_desc<I, T>(mut self, desc: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<WrappableText>,
    {
        self.long_desc.extend(desc.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn completion(mut self, completion: Completion) -> Self {
        self.completion = Some(completion);
        self
    }

    #[must_use]
    pub fn add_method(mut self, add: bool) -> Self {
        self.add_method = Some(add);
        self
    }
}

impl PositionalArg {
    pub(crate) fn build(spec: ArgSpec, kind: ArgKind, acceptor: Acceptor) -> Self {
        let display_name = spec
            .display_name
            .unwrap_or_else(|| spec.key.replace('-', "_").to_uppercase());
        Self {
            key: spec.key,
            kind,
            acceptor,
            default: spec.default.unwrap_or(Value::Null),
            desc: spec.desc,
            long_desc: spec.long_desc,
            display_name,
            completion: spec.completion.unwrap_or_default(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub const fn kind(&self) -> ArgKind {
        self.kind
    }

    pub const fn acceptor(&self) -> &Acceptor {
        &self.acceptor
    }

    pub const fn default(&self) -> &Value {
        &self.default
    }

    pub const fn desc(&self) -> &WrappableText {
        &self.desc
    }

    pub fn long_desc(&self) -> &[WrappableText] {
        &self.long_desc
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub const fn completion(&self) -> &Completion {
        &self.completion
    }
}
