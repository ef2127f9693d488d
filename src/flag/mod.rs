//! Flags: spellings, handlers, and assembly rules.

pub mod group;
pub mod syntax;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::acceptor::Acceptor;
use crate::completion::Completion;
use crate::error::{DefinitionError, DefinitionErrorKind};
use crate::util;
use crate::wrap::WrappableText;

pub use group::{FlagGroup, GroupKind};
pub use syntax::{FlagStyle, FlagSyntax, FlagType, ValueType};

/// How a flag's converted value lands in the parse data.
#[derive(Clone, Default)]
pub enum FlagHandler {
    /// Overwrite the previous value.
    #[default]
    Set,
    /// Append to an accumulator list.
    Push,
    /// `fn(new, current) -> stored` for counters and the like.
    Custom(Arc<dyn Fn(Value, Value) -> Value + Send + Sync>),
}

impl fmt::Debug for FlagHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Set => f.write_str("Set"),
            Self::Push => f.write_str("Push"),
            Self::Custom(_) => f.write_str("Custom"),
        }
    }
}

impl FlagHandler {
    /// Fold a newly parsed value into the current stored value.
    pub fn apply(&self, new: Value, current: Option<&Value>) -> Value {
        match self {
            Self::Set => new,
            Self::Push => {
                let mut list = match current {
                    Some(Value::Array(items)) => items.clone(),
                    _ => Vec::new(),
                };
                list.push(new);
                Value::Array(list)
            }
            Self::Custom(func) => func(new, current.cloned().unwrap_or(Value::Null)),
        }
    }
}

/// Declarative description of a flag, consumed by `Tool::add_flag`.
pub struct FlagSpec {
    pub(crate) key: String,
    pub(crate) syntaxes: Vec<String>,
    pub(crate) acceptor: Option<Acceptor>,
    pub(crate) acceptor_name: Option<String>,
    pub(crate) default: Option<Value>,
    pub(crate) handler: FlagHandler,
    pub(crate) desc: WrappableText,
    pub(crate) long_desc: Vec<WrappableText>,
    pub(crate) group: Option<String>,
    pub(crate) report_collisions: Option<bool>,
    pub(crate) display_name: Option<String>,
    pub(crate) flag_completion: Option<Completion>,
    pub(crate) value_completion: Option<Completion>,
    pub(crate) add_method: Option<bool>,
}

impl FlagSpec {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            syntaxes: Vec::new(),
            acceptor: None,
            acceptor_name: None,
            default: None,
            handler: FlagHandler::Set,
            desc: WrappableText::default(),
            long_desc: Vec::new(),
            group: None,
            report_collisions: None,
            display_name: None,
            flag_completion: None,
            value_completion: None,
            add_method: None,
        }
    }

    #[must_use]
    pub fn syntax(mut self, spelling: impl Into<String>) -> Self {
        self.syntaxes.push(spelling.into());
        self
    }

    #[must_use]
    pub fn syntaxes<I, S>(mut self, spellings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.syntaxes.extend(spellings.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn accept(mut self, acceptor: Acceptor) -> Self {
        self.acceptor = Some(acceptor);
        self
    }

    /// Reference a named acceptor, resolved through the tool's registry
    /// chain when the flag is added.
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
    pub fn handler(mut self, handler: FlagHandler) -> Self {
        self.handler = handler;
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
    pub fn group(mut self, name: impl Into<String>) -> Self {
        self.group = Some(name.into());
        self
    }

    #[must_use]
    pub fn report_collisions(mut self, report: bool) -> Self {
        self.report_collisions = Some(report);
        self
    }

    #[must_use]
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn complete_flags(mut self, completion: Completion) -> Self {
        self.flag_completion = Some(completion);
        self
    }

    #[must_use]
    pub fn complete_values(mut self, completion: Completion) -> Self {
        self.value_completion = Some(completion);
        self
    }

    #[must_use]
    pub fn add_method(mut self, add: bool) -> Self {
        self.add_method = Some(add);
        self
    }
}

/// A fully assembled flag.
#[derive(Debug, Clone)]
pub struct Flag {
    key: String,
    syntaxes: Vec<FlagSyntax>,
    acceptor: Acceptor,
    handler: FlagHandler,
    default: Value,
    desc: WrappableText,
    long_desc: Vec<WrappableText>,
    display_name: String,
    sort_str: String,
    flag_completion: Completion,
    value_completion: Completion,
    group_index: usize,
    flag_type: FlagType,
    value_type: Option<ValueType>,
    value_label: Option<String>,
    value_delim: String,
}

impl Flag {
    /// Assemble a flag from its spec.
    ///
    /// `used_flags` is the tool's set of occupied flag strings; colliding
    /// spellings are dropped when `report_collisions` is off, or rejected
    /// otherwise. A flag whose every spelling was dropped comes back
    /// inactive (empty spelling list) and must not be added to the tool.
    pub(crate) fn build(
        spec: FlagSpec,
        acceptor: Acceptor,
        used_flags: &BTreeSet<String>,
        report_collisions: bool,
    ) -> Result<Self, DefinitionError> {
        // A synthesized spelling takes a value label when an acceptor or a
        // non-boolean default implies one; explicit spellings resolve to
        // value type only when an acceptor is present.
        let wants_label = !acceptor.is_default()
            || spec
                .default
                .as_ref()
                .is_some_and(|d| !matches!(d, Value::Bool(_) | Value::Null));
        let needs_value = !acceptor.is_default();

        let strings = if spec.syntaxes.is_empty() {
            let mut synthesized = format!("--{}", util::to_kebab_case(&spec.key));
            if wants_label {
                synthesized.push_str(" VALUE");
            }
            vec![synthesized]
        } else {
            spec.syntaxes
        };

        let mut syntaxes = Vec::with_capacity(strings.len());
        for string in &strings {
            let syntax = FlagSyntax::parse(string)?;
            let collision = syntax.flags().iter().find(|f| used_flags.contains(*f));
            if let Some(flag) = collision {
                if report_collisions {
                    return Err(DefinitionError::new(DefinitionErrorKind::FlagCollision {
                        key: spec.key.clone(),
                        flag: flag.clone(),
                    }));
                }
                continue;
            }
            syntaxes.push(syntax);
        }

        let (flag_type, value_type) =
            resolve_types(&spec.key, &syntaxes, needs_value)?;

        // Canonical label and delimiter: the first long spelling with an
        // explicit label wins, then the first short one.
        let canonical = syntaxes
            .iter()
            .filter(|s| s.style() == FlagStyle::Long)
            .chain(syntaxes.iter().filter(|s| s.style() == FlagStyle::Short))
            .find_map(|s| s.value_label().map(|l| (l.to_string(), s.value_delim().to_string())));
        let (value_label, value_delim) = match canonical {
            Some((label, delim)) => (Some(label), delim),
            None if flag_type == FlagType::Value => {
                (Some("VALUE".to_string()), "=".to_string())
            }
            None => (None, String::new()),
        };

        for syntax in &mut syntaxes {
            syntax.configure_canonical(
                flag_type,
                value_type,
                value_label.as_deref().unwrap_or("VALUE"),
                &value_delim,
            );
        }

        let default = spec.default.unwrap_or_else(|| {
            if matches!(spec.handler, FlagHandler::Push) {
                Value::Array(Vec::new())
            } else {
                Value::Null
            }
        });

        let display_name = spec.display_name.clone().unwrap_or_else(|| {
            syntaxes
                .first()
                .map_or_else(|| spec.key.clone(), |s| s.positive_flag().to_string())
        });
        let sort_str = syntaxes
            .iter()
            .find(|s| s.style() == FlagStyle::Long)
            .or_else(|| syntaxes.first())
            .map(|s| s.sort_str().to_string())
            .unwrap_or_default();

        Ok(Self {
            key: spec.key,
            syntaxes,
            acceptor,
            handler: spec.handler,
            default,
            desc: spec.desc,
            long_desc: spec.long_desc,
            display_name,
            sort_str,
            flag_completion: spec.flag_completion.unwrap_or_default(),
            value_completion: spec.value_completion.unwrap_or_default(),
            group_index: 0,
            flag_type,
            value_type,
            value_label,
            value_delim,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn syntaxes(&self) -> &[FlagSyntax] {
        &self.syntaxes
    }

    /// A flag with no surviving spellings is inactive and never added.
    pub fn is_active(&self) -> bool {
        !self.syntaxes.is_empty()
    }

    /// Every flag string this flag occupies.
    pub fn effective_flags(&self) -> impl Iterator<Item = &str> {
        self.syntaxes.iter().flat_map(|s| s.flags()).map(String::as_str)
    }

    pub const fn acceptor(&self) -> &Acceptor {
        &self.acceptor
    }

    pub const fn handler(&self) -> &FlagHandler {
        &self.handler
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

    pub fn sort_str(&self) -> &str {
        &self.sort_str
    }

    pub const fn flag_completion(&self) -> &Completion {
        &self.flag_completion
    }

    pub const fn value_completion(&self) -> &Completion {
        &self.value_completion
    }

    pub const fn group_index(&self) -> usize {
        self.group_index
    }

    pub(crate) fn set_group_index(&mut self, index: usize) {
        self.group_index = index;
    }

    pub const fn flag_type(&self) -> FlagType {
        self.flag_type
    }

    pub const fn value_type(&self) -> Option<ValueType> {
        self.value_type
    }

    pub fn value_label(&self) -> Option<&str> {
        self.value_label.as_deref()
    }

    pub fn value_delim(&self) -> &str {
        &self.value_delim
    }
}

/// Resolve the shared flag type and value type across spellings.
fn resolve_types(
    key: &str,
    syntaxes: &[FlagSyntax],
    needs_value: bool,
) -> Result<(FlagType, Option<ValueType>), DefinitionError> {
    let mut explicit_boolean = false;
    let mut explicit_value = false;
    let mut required = false;
    let mut optional = false;
    for syntax in syntaxes {
        match syntax.flag_type() {
            Some(FlagType::Boolean) => explicit_boolean = true,
            Some(FlagType::Value) => {
                explicit_value = true;
                match syntax.value_type() {
                    Some(ValueType::Required) => required = true,
                    Some(ValueType::Optional) => optional = true,
                    None => {}
                }
            }
            None => {}
        }
    }
    if explicit_boolean && explicit_value {
        return Err(DefinitionError::new(
            DefinitionErrorKind::ContradictoryFlagTypes {
                key: key.to_string(),
            },
        ));
    }
    if required && optional {
        return Err(DefinitionError::new(
            DefinitionErrorKind::ContradictoryFlagTypes {
                key: key.to_string(),
            },
        ));
    }
    let flag_type = if explicit_value || (!explicit_boolean && needs_value) {
        FlagType::Value
    } else {
        FlagType::Boolean
    };
    let value_type = (flag_type == FlagType::Value).then(|| {
        if optional {
            ValueType::Optional
        } else {
            ValueType::Required
        }
    });
    Ok((flag_type, value_type))
}

/// Result of resolving a user-typed flag string against a tool.
#[derive(Debug)]
pub enum FlagResolution<'a> {
    NotFound,
    Unique(FlagMatch<'a>),
    /// Candidate positive flag strings, for the ambiguity error.
    Multiple(Vec<String>),
}

/// A uniquely resolved flag string.
#[derive(Debug, Clone, Copy)]
pub struct FlagMatch<'a> {
    pub flag: &'a Flag,
    pub syntax: &'a FlagSyntax,
    /// The string matched the `--no-` spelling.
    pub negated: bool,
}
