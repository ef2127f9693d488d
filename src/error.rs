//! Error taxonomy.
//!
//! Three families with different propagation rules:
//!
//! - [`DefinitionError`] — a tool was declared incorrectly. Raised from the
//!   definition API; the loader attributes it to a source before surfacing.
//! - [`LookupError`] — resolution failed (unreadable source, delegation
//!   cycle, truncation conflict). Raised from `Loader::lookup`.
//! - [`UsageError`] — anything the argument parser detects in user input.
//!   These are collected on the parser, never thrown.

use std::fmt;
use std::path::PathBuf;

/// A defect in a tool definition.
#[derive(Debug)]
pub struct DefinitionError {
    pub kind: DefinitionErrorKind,
    /// Display name of the source the definition came from, when known.
    pub source: Option<String>,
}

#[derive(Debug)]
pub enum DefinitionErrorKind {
    /// A flag syntax string did not match any recognized spelling.
    FlagSyntax { syntax: String },
    /// Spellings of one flag disagree on boolean-vs-value or
    /// required-vs-optional.
    ContradictoryFlagTypes { key: String },
    /// A flag string is already taken and collision reporting is on.
    FlagCollision { key: String, flag: String },
    /// A key was declared twice on the same tool.
    DuplicateKey { key: String },
    /// A positional arg was added after the remaining-args slot.
    ArgAfterRemaining { key: String },
    /// `disable_flags` named a string bound to an active flag.
    DisableActiveFlag { flag: String },
    /// Delegation combined with flags, args, or a run handler.
    DelegateConflict { tool: String, detail: String },
    /// A flag or arg was added while argument parsing is disabled
    /// (or vice versa).
    ParsingDisabledConflict { tool: String },
    /// `enforce_flags_before_args` on a tool with parsing disabled.
    FlagsBeforeArgsConflict { tool: String },
    /// Accessor key rejected (reserved name, or collides without override).
    ReservedAccessor { key: String },
    /// Two same-priority definitions conflicted on a structural field.
    FieldConflict { tool: String, field: String },
    /// A named acceptor was referenced but never registered.
    UnknownAcceptor { name: String },
    /// An acceptor spec could not be built (bad regex, bad range).
    AcceptorSpec { detail: String },
    /// A named completion was referenced but never registered.
    UnknownCompletion { name: String },
    /// A flag group was referenced by name but never added.
    UnknownGroup { name: String },
    /// A mixin was included but never registered.
    UnknownMixin { name: String },
    /// A template was expanded but never registered.
    UnknownTemplate { name: String },
    /// The tool definition was modified after `finish_definition`.
    DefinitionFrozen { tool: String },
    /// A manifest file could not be read or parsed.
    Manifest { path: PathBuf, message: String },
}

impl DefinitionError {
    pub fn new(kind: DefinitionErrorKind) -> Self {
        Self { kind, source: None }
    }

    /// Attribute this error to a source, keeping an existing attribution.
    #[must_use]
    pub fn with_source(mut self, source: &str) -> Self {
        self.source.get_or_insert_with(|| source.to_string());
        self
    }
}

impl From<DefinitionErrorKind> for DefinitionError {
    fn from(kind: DefinitionErrorKind) -> Self {
        Self::new(kind)
    }
}

impl fmt::Display for DefinitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use DefinitionErrorKind as K;
        match &self.kind {
            K::FlagSyntax { syntax } => write!(f, "illegal flag syntax {syntax:?}"),
            K::ContradictoryFlagTypes { key } => {
                write!(f, "flag {key:?} mixes contradictory spellings")
            }
            K::FlagCollision { key, flag } => {
                write!(f, "flag {flag} for {key:?} is already in use")
            }
            K::DuplicateKey { key } => write!(f, "key {key:?} is already defined"),
            K::ArgAfterRemaining { key } => {
                write!(f, "cannot add arg {key:?} after remaining args")
            }
            K::DisableActiveFlag { flag } => {
                write!(f, "cannot disable {flag}: bound to an active flag")
            }
            K::DelegateConflict { tool, detail } => {
                write!(f, "tool {tool:?} cannot delegate: {detail}")
            }
            K::ParsingDisabledConflict { tool } => {
                write!(f, "tool {tool:?} has argument parsing disabled")
            }
            K::FlagsBeforeArgsConflict { tool } => write!(
                f,
                "tool {tool:?} cannot enforce flags-before-args with parsing disabled"
            ),
            K::ReservedAccessor { key } => write!(f, "accessor name {key:?} is reserved"),
            K::FieldConflict { tool, field } => {
                write!(f, "tool {tool:?} redefines {field} at the same priority")
            }
            K::UnknownAcceptor { name } => write!(f, "unknown acceptor {name:?}"),
            K::AcceptorSpec { detail } => write!(f, "invalid acceptor spec: {detail}"),
            K::UnknownCompletion { name } => write!(f, "unknown completion {name:?}"),
            K::UnknownGroup { name } => write!(f, "unknown flag group {name:?}"),
            K::UnknownMixin { name } => write!(f, "unknown mixin {name:?}"),
            K::UnknownTemplate { name } => write!(f, "unknown template {name:?}"),
            K::DefinitionFrozen { tool } => {
                write!(f, "tool {tool:?} can no longer be modified")
            }
            K::Manifest { path, message } => {
                write!(f, "manifest {}: {message}", path.display())
            }
        }?;
        if let Some(source) = &self.source {
            write!(f, " (defined in {source})")?;
        }
        Ok(())
    }
}

impl std::error::Error for DefinitionError {}

/// A failure while resolving an invocation to a tool.
#[derive(Debug)]
pub enum LookupError {
    /// A filesystem source could not be enumerated or read.
    Unreadable { path: PathBuf, message: String },
    /// Delegation followed a cycle of tool names.
    DelegationCycle { chain: Vec<String> },
    /// A delegation target was never defined.
    DelegateNotFound { tool: String, target: String },
    /// `truncate_load_path` fired after lower-priority tools materialized.
    TruncateAfterLoad { priority: i32 },
    /// A git source was registered but no fetcher is installed, or the
    /// fetch failed.
    GitFetch { remote: String, message: String },
    /// A definition error surfaced during lazy loading.
    Definition(DefinitionError),
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreadable { path, message } => {
                write!(f, "cannot read {}: {message}", path.display())
            }
            Self::DelegationCycle { chain } => {
                write!(f, "delegation loop: {}", chain.join(" -> "))
            }
            Self::DelegateNotFound { tool, target } => {
                write!(f, "delegate target {target:?} of tool {tool:?} not found")
            }
            Self::TruncateAfterLoad { priority } => write!(
                f,
                "cannot truncate load path: tools below priority {priority} already loaded"
            ),
            Self::GitFetch { remote, message } => {
                write!(f, "git source {remote}: {message}")
            }
            Self::Definition(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for LookupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Definition(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DefinitionError> for LookupError {
    fn from(e: DefinitionError) -> Self {
        Self::Definition(e)
    }
}

/// A condition detected while parsing user arguments.
///
/// Usage errors accumulate on the parser in detection order; callers read
/// them after `finish` and decide how to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    UnknownFlag {
        flag: String,
        suggestions: Vec<String>,
    },
    AmbiguousFlag {
        flag: String,
        candidates: Vec<String>,
    },
    FlagMissingValue {
        flag: String,
    },
    FlagShouldNotTakeValue {
        flag: String,
        value: String,
    },
    InvalidFlagValue {
        flag: String,
        value: String,
        suggestions: Vec<String>,
    },
    InvalidArgValue {
        arg: String,
        value: String,
        suggestions: Vec<String>,
    },
    MissingRequiredArg {
        arg: String,
    },
    ExtraArguments {
        args: Vec<String>,
    },
    ToolNotFound {
        words: Vec<String>,
        suggestions: Vec<String>,
    },
    GroupConstraint {
        group: String,
        message: String,
    },
}

impl UsageError {
    /// Nearby alternatives, when this error kind carries any.
    pub fn suggestions(&self) -> &[String] {
        match self {
            Self::UnknownFlag { suggestions, .. }
            | Self::InvalidFlagValue { suggestions, .. }
            | Self::InvalidArgValue { suggestions, .. }
            | Self::ToolNotFound { suggestions, .. } => suggestions,
            Self::AmbiguousFlag { candidates, .. } => candidates,
            _ => &[],
        }
    }
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownFlag { flag, .. } => write!(f, "flag {flag:?} is not recognized"),
            Self::AmbiguousFlag { flag, candidates } => write!(
                f,
                "flag prefix {flag:?} is ambiguous: {}",
                candidates.join(", ")
            ),
            Self::FlagMissingValue { flag } => write!(f, "flag {flag:?} is missing a value"),
            Self::FlagShouldNotTakeValue { flag, value } => {
                write!(f, "flag {flag:?} does not take a value ({value:?} given)")
            }
            Self::InvalidFlagValue { flag, value, .. } => {
                write!(f, "unacceptable value {value:?} for flag {flag:?}")
            }
            Self::InvalidArgValue { arg, value, .. } => {
                write!(f, "unacceptable value {value:?} for arg {arg}")
            }
            Self::MissingRequiredArg { arg } => {
                write!(f, "required arg {arg} is missing")
            }
            Self::ExtraArguments { args } => {
                write!(f, "extra arguments: {}", args.join(" "))
            }
            Self::ToolNotFound { words, .. } => {
                write!(f, "tool not found: {:?}", words.join(" "))
            }
            Self::GroupConstraint { message, .. } => f.write_str(message),
        }?;
        let sugg = self.suggestions();
        if !sugg.is_empty() && !matches!(self, Self::AmbiguousFlag { .. }) {
            write!(f, " (did you mean {}?)", sugg.join(", "))?;
        }
        Ok(())
    }
}
