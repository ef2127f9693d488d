//! The tool definition model.
//!
//! A [`Tool`] accumulates its contract — flags, positional args, flag
//! groups, acceptors, completions, mixins, templates, handlers — through
//! the definition API, then freezes at [`Tool::finish_definition`].
//! Invariant violations are rejected at the point of definition where
//! possible, otherwise at finish.

pub mod arg;
pub mod registry;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value;

use crate::acceptor::{Acceptor, AcceptorSpec};
use crate::completion::Completion;
use crate::context::Context;
use crate::error::{DefinitionError, DefinitionErrorKind};
use crate::flag::{Flag, FlagGroup, FlagResolution, FlagMatch, FlagSpec, FlagStyle, GroupKind};
use crate::loader::Loader;
use crate::source_info::SourceInfo;
use crate::wrap::WrappableText;

pub use arg::{ArgKind, ArgSpec, PositionalArg};
pub use registry::{Mixin, RegistryCell, Template};

/// A tool's run handler: receives the parsed context, returns an exit code.
pub type RunHandler = Arc<dyn Fn(&mut Context) -> i32 + Send + Sync>;

/// Interrupt/signal/usage-error handlers share the run handler shape.
pub type Handler = RunHandler;

/// An initializer applied to the context at the start of each run.
pub type Initializer = Arc<dyn Fn(&mut Context, &Value) + Send + Sync>;

/// Inherited policy bag. Child tools start from their parent's settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Default for `FlagSpec::report_collisions` when a spec leaves it
    /// unset.
    pub report_collisions: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            report_collisions: true,
        }
    }
}

#[allow(clippy::unwrap_used)] // pattern is a checked constant
static ACCESSOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*[!?=]?$").unwrap());

/// Names the accessor shim refuses: the context's own surface.
const RESERVED_ACCESSORS: &[&str] = &[
    "run",
    "initialize",
    "options",
    "get",
    "set",
    "fetch",
    "data",
    "args",
    "usage_errors",
    "find_data",
    "context_directory",
    "tool_name",
];

/// Declarative description of a flag group.
pub struct GroupSpec {
    kind: GroupKind,
    name: Option<String>,
    desc: WrappableText,
    long_desc: Vec<WrappableText>,
    prepend: bool,
    report_collisions: bool,
}

impl GroupSpec {
    pub fn new(kind: GroupKind) -> Self {
        Self {
            kind,
            name: None,
            desc: WrappableText::default(),
            long_desc: Vec::new(),
            prepend: false,
            report_collisions: true,
        }
    }

    pub fn all_required() -> Self {
        Self::new(GroupKind::Required)
    }

    pub fn exactly_one_required() -> Self {
        Self::new(GroupKind::ExactlyOne)
    }

    pub fn at_most_one_required() -> Self {
        Self::new(GroupKind::AtMostOne)
    }

    pub fn at_least_one_required() -> Self {
        Self::new(GroupKind::AtLeastOne)
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
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
    pub fn prepend(mut self, prepend: bool) -> Self {
        self.prepend = prepend;
        self
    }

    #[must_use]
    pub fn report_collisions(mut self, report: bool) -> Self {
        self.report_collisions = report;
        self
    }
}

/// A command definition: a node in the tool tree.
pub struct Tool {
    full_name: Vec<String>,
    priority: i32,
    desc: WrappableText,
    desc_set: bool,
    /// Priority of the definition that set `desc`; same-priority
    /// replacement is a conflict, lower-priority replacement is ignored.
    desc_priority: Option<i32>,
    long_desc: Vec<WrappableText>,
    flags: Vec<Flag>,
    flag_groups: Vec<FlagGroup>,
    required_args: Vec<PositionalArg>,
    optional_args: Vec<PositionalArg>,
    remaining_arg: Option<PositionalArg>,
    default_data: BTreeMap<String, Value>,
    used_flags: BTreeSet<String>,
    accessor_keys: BTreeSet<String>,
    registries: Arc<RegistryCell>,
    mixin_names: Vec<String>,
    middleware_names: Vec<String>,
    run_handler: Option<RunHandler>,
    run_priority: Option<i32>,
    interrupt_handler: Option<Handler>,
    usage_error_handler: Option<Handler>,
    signal_handlers: BTreeMap<i32, Handler>,
    initializers: Vec<(Initializer, Value)>,
    source_info: Option<Arc<SourceInfo>>,
    context_directory: Option<PathBuf>,
    argument_parsing_disabled: bool,
    flags_before_args_enforced: bool,
    exact_flag_match_required: bool,
    delegate_target: Option<Vec<String>>,
    completion: Completion,
    settings: Settings,
    script_prelude: String,
    definition_finished: bool,
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("full_name", &self.full_name)
            .field("priority", &self.priority)
            .field("flags", &self.flags.len())
            .field("runnable", &self.run_handler.is_some())
            .field("delegate_target", &self.delegate_target)
            .field("finished", &self.definition_finished)
            .finish_non_exhaustive()
    }
}

/// What a child tool inherits from its parent at creation: the registry
/// chain, settings, context directory, and script prelude.
#[derive(Clone)]
pub(crate) struct Inheritance {
    pub registries: Arc<RegistryCell>,
    pub settings: Settings,
    pub context_directory: Option<PathBuf>,
    pub prelude: String,
}

impl Inheritance {
    pub(crate) fn of(tool: &Tool) -> Self {
        Self {
            registries: Arc::clone(&tool.registries),
            settings: tool.settings.clone(),
            context_directory: tool.context_directory.clone(),
            prelude: tool.script_prelude.clone(),
        }
    }
}

impl Tool {
    /// A root-level tool with fresh registries.
    pub fn new(full_name: Vec<String>, priority: i32) -> Self {
        Self::with_registries(full_name, priority, RegistryCell::root(), Settings::default())
    }

    /// A tool whose registries and settings chain off its parent.
    pub(crate) fn new_child(full_name: Vec<String>, priority: i32, parent: &Inheritance) -> Self {
        let mut tool = Self::with_registries(
            full_name,
            priority,
            RegistryCell::child_of(&parent.registries),
            parent.settings.clone(),
        );
        tool.context_directory = parent.context_directory.clone();
        tool.script_prelude = parent.prelude.clone();
        tool
    }

    fn with_registries(
        full_name: Vec<String>,
        priority: i32,
        registries: Arc<RegistryCell>,
        settings: Settings,
    ) -> Self {
        Self {
            full_name,
            priority,
            desc: WrappableText::default(),
            desc_set: false,
            desc_priority: None,
            long_desc: Vec::new(),
            flags: Vec::new(),
            flag_groups: vec![FlagGroup::new(GroupKind::Base, None)],
            required_args: Vec::new(),
            optional_args: Vec::new(),
            remaining_arg: None,
            default_data: BTreeMap::new(),
            used_flags: BTreeSet::new(),
            accessor_keys: BTreeSet::new(),
            registries,
            mixin_names: Vec::new(),
            middleware_names: Vec::new(),
            run_handler: None,
            run_priority: None,
            interrupt_handler: None,
            usage_error_handler: None,
            signal_handlers: BTreeMap::new(),
            initializers: Vec::new(),
            source_info: None,
            context_directory: None,
            argument_parsing_disabled: false,
            flags_before_args_enforced: false,
            exact_flag_match_required: false,
            delegate_target: None,
            completion: Completion::Empty,
            settings,
            script_prelude: String::new(),
            definition_finished: false,
        }
    }

    // --- identity ---

    pub fn full_name(&self) -> &[String] {
        &self.full_name
    }

    pub fn simple_name(&self) -> Option<&str> {
        self.full_name.last().map(String::as_str)
    }

    pub fn display_name(&self) -> String {
        self.full_name.join(" ")
    }

    pub fn is_root(&self) -> bool {
        self.full_name.is_empty()
    }

    pub const fn priority(&self) -> i32 {
        self.priority
    }

    pub(crate) fn set_priority(&mut self, priority: i32) {
        self.priority = priority;
    }

    /// A tool whose simple name starts with `_` is hidden from listings.
    pub fn is_hidden(&self) -> bool {
        self.simple_name().is_some_and(|n| n.starts_with('_'))
    }

    fn check_not_finished(&self) -> Result<(), DefinitionError> {
        if self.definition_finished {
            return Err(DefinitionError::new(DefinitionErrorKind::DefinitionFrozen {
                tool: self.display_name(),
            }));
        }
        Ok(())
    }

    fn check_definable(&self) -> Result<(), DefinitionError> {
        self.check_not_finished()?;
        if self.delegate_target.is_some() {
            return Err(DefinitionError::new(DefinitionErrorKind::DelegateConflict {
                tool: self.display_name(),
                detail: "a delegating tool takes no flags, args, or handler".to_string(),
            }));
        }
        if self.argument_parsing_disabled {
            return Err(DefinitionError::new(
                DefinitionErrorKind::ParsingDisabledConflict {
                    tool: self.display_name(),
                },
            ));
        }
        Ok(())
    }

    fn check_key_free(&self, key: &str) -> Result<(), DefinitionError> {
        let taken = self.flags.iter().any(|f| f.key() == key)
            || self.required_args.iter().any(|a| a.key() == key)
            || self.optional_args.iter().any(|a| a.key() == key)
            || self.remaining_arg.as_ref().is_some_and(|a| a.key() == key);
        if taken {
            return Err(DefinitionError::new(DefinitionErrorKind::DuplicateKey {
                key: key.to_string(),
            }));
        }
        Ok(())
    }

    // --- descriptions ---

    pub const fn desc(&self) -> &WrappableText {
        &self.desc
    }

    /// Replace the short description. A second replacement at the same
    /// priority is a merge conflict; one from a lower priority is ignored.
    pub fn set_desc(&mut self, desc: impl Into<WrappableText>) -> Result<(), DefinitionError> {
        self.check_not_finished()?;
        if let Some(existing) = self.desc_priority {
            if existing == self.priority {
                return Err(DefinitionError::new(DefinitionErrorKind::FieldConflict {
                    tool: self.display_name(),
                    field: "desc".to_string(),
                }));
            }
            if existing > self.priority {
                return Ok(());
            }
        }
        self.desc = desc.into();
        self.desc_set = true;
        self.desc_priority = Some(self.priority);
        Ok(())
    }

    pub fn long_desc(&self) -> &[WrappableText] {
        &self.long_desc
    }

    /// Long descriptions append across merged definitions.
    pub fn append_long_desc<I, T>(&mut self, desc: I) -> Result<(), DefinitionError>
    where
        I: IntoIterator<Item = T>,
        T: Into<WrappableText>,
    {
        self.check_not_finished()?;
        self.long_desc.extend(desc.into_iter().map(Into::into));
        Ok(())
    }

    // --- flags ---

    pub fn add_flag(&mut self, spec: FlagSpec) -> Result<(), DefinitionError> {
        self.check_definable()?;
        self.check_key_free(&spec.key)?;

        let acceptor = match (&spec.acceptor, &spec.acceptor_name) {
            (Some(acceptor), _) => acceptor.clone(),
            (None, Some(name)) => self.resolve_acceptor(name)?,
            (None, None) => Acceptor::default(),
        };
        let group_index = match &spec.group {
            Some(name) => self
                .flag_groups
                .iter()
                .position(|g| g.name() == Some(name.as_str()))
                .ok_or_else(|| {
                    DefinitionError::new(DefinitionErrorKind::UnknownGroup { name: name.clone() })
                })?,
            None => 0,
        };
        let report = spec
            .report_collisions
            .unwrap_or(self.settings.report_collisions);
        let add_method = spec.add_method;
        let key = spec.key.clone();

        let mut flag = Flag::build(spec, acceptor, &self.used_flags, report)?;
        if !flag.is_active() {
            return Ok(());
        }

        self.used_flags
            .extend(flag.effective_flags().map(str::to_string));
        self.default_data.insert(key.clone(), flag.default().clone());
        self.maybe_add_accessor(&key, add_method)?;
        flag.set_group_index(group_index);
        self.flag_groups[group_index].add_flag_key(&key);
        self.flags.push(flag);
        Ok(())
    }

    pub fn flags(&self) -> &[Flag] {
        &self.flags
    }

    pub fn flag(&self, key: &str) -> Option<&Flag> {
        self.flags.iter().find(|f| f.key() == key)
    }

    /// The set of occupied flag strings, including disabled ones.
    pub fn used_flags(&self) -> &BTreeSet<String> {
        &self.used_flags
    }

    /// All long flag strings bound by active flags, for suggestions.
    pub fn long_flag_strings(&self) -> Vec<String> {
        self.flags
            .iter()
            .flat_map(Flag::effective_flags)
            .filter(|f| f.starts_with("--"))
            .map(str::to_string)
            .collect()
    }

    /// Reserve flag strings without binding them to a flag.
    pub fn disable_flag<I, S>(&mut self, flags: I) -> Result<(), DefinitionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.check_not_finished()?;
        for flag in flags {
            let flag = flag.into();
            let active = self
                .flags
                .iter()
                .any(|f| f.effective_flags().any(|s| s == flag));
            if active {
                return Err(DefinitionError::new(
                    DefinitionErrorKind::DisableActiveFlag { flag },
                ));
            }
            self.used_flags.insert(flag);
        }
        Ok(())
    }

    // --- flag groups ---

    pub fn add_flag_group(&mut self, spec: GroupSpec) -> Result<(), DefinitionError> {
        self.check_not_finished()?;
        if let Some(name) = &spec.name
            && self
                .flag_groups
                .iter()
                .any(|g| g.name() == Some(name.as_str()))
        {
            if spec.report_collisions {
                return Err(DefinitionError::new(DefinitionErrorKind::DuplicateKey {
                    key: name.clone(),
                }));
            }
            return Ok(());
        }
        let mut group = FlagGroup::new(spec.kind, spec.name);
        group.set_desc(spec.desc);
        group.append_long_desc(spec.long_desc);
        if spec.prepend {
            // The implicit base group stays at index 0; prepending slots the
            // new group ahead of every explicit one.
            for flag in &mut self.flags {
                let index = flag.group_index();
                if index >= 1 {
                    flag.set_group_index(index + 1);
                }
            }
            self.flag_groups.insert(1, group);
        } else {
            self.flag_groups.push(group);
        }
        Ok(())
    }

    pub fn flag_groups(&self) -> &[FlagGroup] {
        &self.flag_groups
    }

    // --- positional args ---

    fn build_arg(&mut self, spec: ArgSpec, kind: ArgKind) -> Result<PositionalArg, DefinitionError> {
        self.check_definable()?;
        self.check_key_free(&spec.key)?;
        if self.remaining_arg.is_some() {
            return Err(DefinitionError::new(DefinitionErrorKind::ArgAfterRemaining {
                key: spec.key,
            }));
        }
        let acceptor = match (&spec.acceptor, &spec.acceptor_name) {
            (Some(acceptor), _) => acceptor.clone(),
            (None, Some(name)) => self.resolve_acceptor(name)?,
            (None, None) => Acceptor::default(),
        };
        let add_method = spec.add_method;
        let key = spec.key.clone();
        let default = spec.default.clone();
        let built = PositionalArg::build(spec, kind, acceptor);
        self.default_data
            .insert(key.clone(), default.unwrap_or(Value::Null));
        self.maybe_add_accessor(&key, add_method)?;
        Ok(built)
    }

    pub fn add_required_arg(&mut self, spec: ArgSpec) -> Result<(), DefinitionError> {
        let built = self.build_arg(spec, ArgKind::Required)?;
        self.required_args.push(built);
        Ok(())
    }

    pub fn add_optional_arg(&mut self, spec: ArgSpec) -> Result<(), DefinitionError> {
        let built = self.build_arg(spec, ArgKind::Optional)?;
        self.optional_args.push(built);
        Ok(())
    }

    pub fn set_remaining_args(&mut self, spec: ArgSpec) -> Result<(), DefinitionError> {
        let built = self.build_arg(spec, ArgKind::Remaining)?;
        // Remaining args accumulate into a list unless a default was given.
        let slot = self
            .default_data
            .entry(built.key().to_string())
            .or_insert(Value::Null);
        if slot.is_null() {
            *slot = Value::Array(Vec::new());
        }
        self.remaining_arg = Some(built);
        Ok(())
    }

    pub fn required_args(&self) -> &[PositionalArg] {
        &self.required_args
    }

    pub fn optional_args(&self) -> &[PositionalArg] {
        &self.optional_args
    }

    pub fn remaining_arg(&self) -> Option<&PositionalArg> {
        self.remaining_arg.as_ref()
    }

    /// The positional slot at `index`: required slots first, then optional.
    pub fn positional_slot(&self, index: usize) -> Option<&PositionalArg> {
        self.required_args
            .get(index)
            .or_else(|| self.optional_args.get(index - self.required_args.len()))
    }

    pub fn positional_slot_count(&self) -> usize {
        self.required_args.len() + self.optional_args.len()
    }

    // --- registries ---

    pub fn add_acceptor(
        &mut self,
        name: &str,
        spec: AcceptorSpec,
        type_desc: Option<String>,
    ) -> Result<(), DefinitionError> {
        self.check_not_finished()?;
        let acceptor = spec.build(type_desc)?;
        self.registries.add_acceptor(name, acceptor);
        Ok(())
    }

    pub fn add_completion(&mut self, name: &str, completion: Completion) -> Result<(), DefinitionError> {
        self.check_not_finished()?;
        self.registries.add_completion(name, completion);
        Ok(())
    }

    pub fn add_mixin(&mut self, name: &str, mixin: Mixin) -> Result<(), DefinitionError> {
        self.check_not_finished()?;
        self.registries.add_mixin(name, mixin);
        Ok(())
    }

    pub fn add_template(&mut self, name: &str, template: Template) -> Result<(), DefinitionError> {
        self.check_not_finished()?;
        self.registries.add_template(name, template);
        Ok(())
    }

    /// Record a mixin for inclusion at run start.
    pub fn include_mixin(&mut self, name: &str) -> Result<(), DefinitionError> {
        self.check_not_finished()?;
        if self.registries.lookup_mixin(name).is_none() {
            return Err(DefinitionError::new(DefinitionErrorKind::UnknownMixin {
                name: name.to_string(),
            }));
        }
        self.mixin_names.push(name.to_string());
        Ok(())
    }

    /// Invoke a registered template against this tool.
    pub fn expand_template(&mut self, name: &str, args: &Value) -> Result<(), DefinitionError> {
        self.check_not_finished()?;
        let template = self.registries.lookup_template(name).ok_or_else(|| {
            DefinitionError::new(DefinitionErrorKind::UnknownTemplate {
                name: name.to_string(),
            })
        })?;
        template(self, args)
    }

    fn resolve_acceptor(&self, name: &str) -> Result<Acceptor, DefinitionError> {
        self.lookup_acceptor(name)
            .ok_or_else(|| {
                DefinitionError::new(DefinitionErrorKind::UnknownAcceptor {
                    name: name.to_string(),
                })
            })
    }

    /// Lookup walks this tool's registries, then its ancestors'. Well-known
    /// acceptor names resolve as a last resort.
    pub fn lookup_acceptor(&self, name: &str) -> Option<Acceptor> {
        self.registries
            .lookup_acceptor(name)
            .or_else(|| Acceptor::well_known(name))
    }

    pub fn lookup_completion(&self, name: &str) -> Option<Completion> {
        self.registries.lookup_completion(name)
    }

    pub fn lookup_mixin(&self, name: &str) -> Option<Mixin> {
        self.registries.lookup_mixin(name)
    }

    pub fn lookup_template(&self, name: &str) -> Option<Template> {
        self.registries.lookup_template(name)
    }

    // --- policies and handlers ---

    pub fn disable_argument_parsing(&mut self) -> Result<(), DefinitionError> {
        self.check_not_finished()?;
        if !self.flags.is_empty()
            || self.positional_slot_count() > 0
            || self.remaining_arg.is_some()
        {
            return Err(DefinitionError::new(
                DefinitionErrorKind::ParsingDisabledConflict {
                    tool: self.display_name(),
                },
            ));
        }
        if self.flags_before_args_enforced {
            return Err(DefinitionError::new(
                DefinitionErrorKind::FlagsBeforeArgsConflict {
                    tool: self.display_name(),
                },
            ));
        }
        self.argument_parsing_disabled = true;
        Ok(())
    }

    pub fn enforce_flags_before_args(&mut self) -> Result<(), DefinitionError> {
        self.check_not_finished()?;
        if self.argument_parsing_disabled {
            return Err(DefinitionError::new(
                DefinitionErrorKind::FlagsBeforeArgsConflict {
                    tool: self.display_name(),
                },
            ));
        }
        self.flags_before_args_enforced = true;
        Ok(())
    }

    pub fn require_exact_flag_match(&mut self) -> Result<(), DefinitionError> {
        self.check_not_finished()?;
        self.exact_flag_match_required = true;
        Ok(())
    }

    pub const fn argument_parsing_disabled(&self) -> bool {
        self.argument_parsing_disabled
    }

    pub const fn flags_before_args_enforced(&self) -> bool {
        self.flags_before_args_enforced
    }

    pub const fn exact_flag_match_required(&self) -> bool {
        self.exact_flag_match_required
    }

    /// Turn this tool into an alias for `target`.
    pub fn delegate_to(&mut self, target: Vec<String>) -> Result<(), DefinitionError> {
        self.check_not_finished()?;
        if !self.flags.is_empty()
            || self.positional_slot_count() > 0
            || self.remaining_arg.is_some()
            || self.run_handler.is_some()
        {
            return Err(DefinitionError::new(DefinitionErrorKind::DelegateConflict {
                tool: self.display_name(),
                detail: "flags, args, or a run handler are already defined".to_string(),
            }));
        }
        self.delegate_target = Some(target);
        Ok(())
    }

    pub fn delegate_target(&self) -> Option<&[String]> {
        self.delegate_target.as_deref()
    }

    pub fn set_run_handler(&mut self, handler: RunHandler) -> Result<(), DefinitionError> {
        self.check_not_finished()?;
        if self.delegate_target.is_some() {
            return Err(DefinitionError::new(DefinitionErrorKind::DelegateConflict {
                tool: self.display_name(),
                detail: "a delegating tool takes no run handler".to_string(),
            }));
        }
        if let Some(existing) = self.run_priority {
            if existing == self.priority {
                return Err(DefinitionError::new(DefinitionErrorKind::FieldConflict {
                    tool: self.display_name(),
                    field: "run handler".to_string(),
                }));
            }
            if existing > self.priority {
                return Ok(());
            }
        }
        self.run_handler = Some(handler);
        self.run_priority = Some(self.priority);
        Ok(())
    }

    pub fn run_handler(&self) -> Option<&RunHandler> {
        self.run_handler.as_ref()
    }

    pub fn is_runnable(&self) -> bool {
        self.run_handler.is_some()
    }

    /// Most-recently-set handler wins for each of these.
    pub fn set_interrupt_handler(&mut self, handler: Handler) -> Result<(), DefinitionError> {
        self.check_not_finished()?;
        self.interrupt_handler = Some(handler);
        Ok(())
    }

    pub fn interrupt_handler(&self) -> Option<&Handler> {
        self.interrupt_handler.as_ref()
    }

    pub fn set_usage_error_handler(&mut self, handler: Handler) -> Result<(), DefinitionError> {
        self.check_not_finished()?;
        self.usage_error_handler = Some(handler);
        Ok(())
    }

    pub fn usage_error_handler(&self) -> Option<&Handler> {
        self.usage_error_handler.as_ref()
    }

    pub fn set_signal_handler(&mut self, signal: i32, handler: Handler) -> Result<(), DefinitionError> {
        self.check_not_finished()?;
        self.signal_handlers.insert(signal, handler);
        Ok(())
    }

    pub fn signal_handler(&self, signal: i32) -> Option<&Handler> {
        self.signal_handlers.get(&signal)
    }

    pub fn add_initializer(&mut self, initializer: Initializer, args: Value) -> Result<(), DefinitionError> {
        self.check_not_finished()?;
        self.initializers.push((initializer, args));
        Ok(())
    }

    /// Record an inherent tool property, forcing an accessor for it.
    pub fn static_value(&mut self, key: &str, value: Value) -> Result<(), DefinitionError> {
        self.check_not_finished()?;
        self.default_data.insert(key.to_string(), value);
        self.maybe_add_accessor(key, Some(true))
    }

    pub fn use_middleware(&mut self, name: impl Into<String>) -> Result<(), DefinitionError> {
        self.check_not_finished()?;
        self.middleware_names.push(name.into());
        Ok(())
    }

    // --- provenance ---

    pub(crate) fn set_source_info(&mut self, info: Arc<SourceInfo>) {
        if self.source_info.is_none() {
            if self.context_directory.is_none() {
                self.context_directory = info.context_directory().map(Path::to_path_buf);
            }
            self.source_info = Some(info);
        }
    }

    pub fn source_info(&self) -> Option<&Arc<SourceInfo>> {
        self.source_info.as_ref()
    }

    pub fn set_context_directory(&mut self, dir: impl Into<PathBuf>) -> Result<(), DefinitionError> {
        self.check_not_finished()?;
        self.context_directory = Some(dir.into());
        Ok(())
    }

    pub fn context_directory(&self) -> Option<&Path> {
        self.context_directory.as_deref()
    }

    pub(crate) fn append_script_prelude(&mut self, source: &str) {
        if !self.script_prelude.is_empty() {
            self.script_prelude.push('\n');
        }
        self.script_prelude.push_str(source);
    }

    pub fn script_prelude(&self) -> &str {
        &self.script_prelude
    }

    pub fn set_completion(&mut self, completion: Completion) -> Result<(), DefinitionError> {
        self.check_not_finished()?;
        self.completion = completion;
        Ok(())
    }

    pub const fn completion(&self) -> &Completion {
        &self.completion
    }

    pub fn default_data(&self) -> &BTreeMap<String, Value> {
        &self.default_data
    }

    pub fn accessor_keys(&self) -> &BTreeSet<String> {
        &self.accessor_keys
    }

    // --- merge policy support ---

    /// Whether a definition has already claimed this tool's identity
    /// (description, run handler, or delegation). Drives `if_defined`.
    pub(crate) fn has_definition(&self) -> bool {
        self.desc_set || self.run_handler.is_some() || self.delegate_target.is_some()
    }

    /// Discard everything definitional, keeping identity, registries,
    /// settings, provenance, and the script prelude.
    pub(crate) fn reset_definition(&mut self) {
        self.desc = WrappableText::default();
        self.desc_set = false;
        self.desc_priority = None;
        self.long_desc.clear();
        self.flags.clear();
        self.flag_groups = vec![FlagGroup::new(GroupKind::Base, None)];
        self.required_args.clear();
        self.optional_args.clear();
        self.remaining_arg = None;
        self.default_data.clear();
        self.used_flags.clear();
        self.accessor_keys.clear();
        self.mixin_names.clear();
        self.middleware_names.clear();
        self.run_handler = None;
        self.interrupt_handler = None;
        self.usage_error_handler = None;
        self.signal_handlers.clear();
        self.initializers.clear();
        self.run_priority = None;
        self.argument_parsing_disabled = false;
        self.flags_before_args_enforced = false;
        self.exact_flag_match_required = false;
        self.delegate_target = None;
        self.completion = Completion::Empty;
    }

    // --- finalization ---

    pub const fn definition_finished(&self) -> bool {
        self.definition_finished
    }

    /// Run middleware config hooks, sort each group's flags, and freeze.
    /// Idempotent.
    pub fn finish_definition(&mut self, loader: &Loader) -> Result<(), DefinitionError> {
        if self.definition_finished {
            return Ok(());
        }
        for name in self.middleware_names.clone() {
            if let Some(middleware) = loader.middleware(&name) {
                middleware.config(self, loader)?;
            }
        }
        let sort_strs: BTreeMap<String, String> = self
            .flags
            .iter()
            .map(|f| (f.key().to_string(), f.sort_str().to_string()))
            .collect();
        for group in &mut self.flag_groups {
            group.sort_flag_keys_by(|key| sort_strs.get(key).cloned().unwrap_or_default());
        }
        self.definition_finished = true;
        Ok(())
    }

    // --- flag resolution ---

    /// Resolve a user-typed flag string. Exact matches across positive and
    /// negative spellings win; otherwise long flags match by unique prefix
    /// unless exact matching is required.
    pub fn resolve_flag(&self, string: &str) -> FlagResolution<'_> {
        let mut exact: Vec<FlagMatch<'_>> = Vec::new();
        for flag in &self.flags {
            for syntax in flag.syntaxes() {
                if syntax.positive_flag() == string {
                    exact.push(FlagMatch {
                        flag,
                        syntax,
                        negated: false,
                    });
                } else if syntax.negative_flag() == Some(string) {
                    exact.push(FlagMatch {
                        flag,
                        syntax,
                        negated: true,
                    });
                }
            }
        }
        match exact.len() {
            1 => return FlagResolution::Unique(exact[0]),
            n if n > 1 => {
                return FlagResolution::Multiple(
                    exact
                        .iter()
                        .map(|m| m.syntax.positive_flag().to_string())
                        .collect(),
                );
            }
            _ => {}
        }

        if self.exact_flag_match_required || !string.starts_with("--") {
            return FlagResolution::NotFound;
        }

        let mut prefix: Vec<FlagMatch<'_>> = Vec::new();
        for flag in &self.flags {
            for syntax in flag.syntaxes() {
                if syntax.style() != FlagStyle::Long {
                    continue;
                }
                if syntax.positive_flag().starts_with(string) {
                    prefix.push(FlagMatch {
                        flag,
                        syntax,
                        negated: false,
                    });
                } else if syntax.negative_flag().is_some_and(|n| n.starts_with(string)) {
                    prefix.push(FlagMatch {
                        flag,
                        syntax,
                        negated: true,
                    });
                }
            }
        }
        match prefix.len() {
            0 => FlagResolution::NotFound,
            1 => FlagResolution::Unique(prefix[0]),
            _ => FlagResolution::Multiple(
                prefix
                    .iter()
                    .map(|m| m.syntax.positive_flag().to_string())
                    .collect(),
            ),
        }
    }

    // --- run preparation ---

    /// Merge included mixin tables into the context (include order, later
    /// wins, parsed data untouched), then run mixin and tool initializers.
    pub fn prepare_context(&self, ctx: &mut Context) {
        let mut capability_table: BTreeMap<String, Value> = BTreeMap::new();
        let mut mixin_inits = Vec::new();
        for name in &self.mixin_names {
            if let Some(mixin) = self.registries.lookup_mixin(name) {
                for (key, value) in &mixin.table {
                    capability_table.insert(key.clone(), value.clone());
                }
                if let Some(init) = mixin.initializer {
                    mixin_inits.push(init);
                }
            }
        }
        for (key, value) in capability_table {
            if ctx.get(&key).is_none() {
                ctx.set(key, value);
            }
        }
        for init in mixin_inits {
            init(ctx);
        }
        for (init, args) in &self.initializers {
            init(ctx, args);
        }
    }

    fn maybe_add_accessor(
        &mut self,
        key: &str,
        add_method: Option<bool>,
    ) -> Result<(), DefinitionError> {
        match add_method {
            Some(false) => Ok(()),
            Some(true) => {
                if key == "run" || key == "initialize" {
                    return Err(DefinitionError::new(
                        DefinitionErrorKind::ReservedAccessor {
                            key: key.to_string(),
                        },
                    ));
                }
                self.accessor_keys.insert(key.to_string());
                Ok(())
            }
            None => {
                let eligible = ACCESSOR_RE.is_match(key)
                    && !key.starts_with('_')
                    && !RESERVED_ACCESSORS.contains(&key)
                    && !self.accessor_keys.contains(key);
                if eligible {
                    self.accessor_keys.insert(key.to_string());
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests;
