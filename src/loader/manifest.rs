//! The TOML manifest evaluator.
//!
//! A tool manifest declares a tool's contract: descriptions, flags, args,
//! groups, acceptors, policies, an optional Luau run script, and nested
//! sub-tool tables that recurse through the loader. Evaluation translates
//! the parsed manifest into definition API calls, attributing errors to the
//! manifest's path.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::acceptor::AcceptorSpec;
use crate::completion::Completion;
use crate::error::{DefinitionError, DefinitionErrorKind, LookupError};
use crate::flag::{FlagHandler, FlagSpec};
use crate::loader::Loader;
use crate::tool::{ArgSpec, GroupSpec, Tool};

/// Merge policy when a manifest lands on an already-defined tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IfDefined {
    /// Merge into the existing definition; structural conflicts error.
    #[default]
    Append,
    /// Discard the existing definition first.
    Reset,
    /// Skip this manifest entirely when a definition exists.
    Ignore,
}

/// A delegation target: a word list, or a single space-separated string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DelegateTarget {
    Words(Vec<String>),
    Joined(String),
}

impl DelegateTarget {
    fn words(&self) -> Vec<String> {
        match self {
            Self::Words(words) => words.clone(),
            Self::Joined(joined) => joined.split_whitespace().map(str::to_string).collect(),
        }
    }
}

/// An acceptor reference or inline spec.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AcceptorManifest {
    /// A registered name or well-known type token.
    Name(String),
    /// An enumeration of allowed values.
    Values(Vec<String>),
    /// A regex the value must match.
    Pattern { pattern: String },
    /// A numeric range.
    Range {
        min: f64,
        max: f64,
        #[serde(default)]
        integer: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerKind {
    #[default]
    Set,
    Push,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlagManifest {
    pub key: String,
    #[serde(default)]
    pub syntax: Vec<String>,
    pub accept: Option<AcceptorManifest>,
    pub default: Option<toml::Value>,
    #[serde(default)]
    pub handler: HandlerKind,
    pub desc: Option<String>,
    #[serde(default)]
    pub long_desc: Vec<String>,
    pub group: Option<String>,
    pub report_collisions: Option<bool>,
    pub display_name: Option<String>,
    #[serde(default)]
    pub complete_values: Vec<String>,
    pub add_method: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgKindManifest {
    #[default]
    Required,
    Optional,
    Remaining,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArgManifest {
    pub key: String,
    #[serde(default)]
    pub kind: ArgKindManifest,
    pub accept: Option<AcceptorManifest>,
    pub default: Option<toml::Value>,
    pub desc: Option<String>,
    #[serde(default)]
    pub long_desc: Vec<String>,
    pub display_name: Option<String>,
    pub add_method: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKindManifest {
    Base,
    Required,
    ExactlyOne,
    AtMostOne,
    AtLeastOne,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupManifest {
    pub kind: GroupKindManifest,
    pub name: Option<String>,
    pub desc: Option<String>,
    #[serde(default)]
    pub prepend: bool,
}

/// One tool's manifest, possibly carrying nested sub-tool tables.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolManifest {
    pub desc: Option<String>,
    #[serde(default)]
    pub long_desc: Vec<String>,
    #[serde(default)]
    pub flag: Vec<FlagManifest>,
    #[serde(default)]
    pub arg: Vec<ArgManifest>,
    #[serde(default)]
    pub group: Vec<GroupManifest>,
    #[serde(default)]
    pub acceptors: BTreeMap<String, AcceptorManifest>,
    #[serde(default)]
    pub mixins: Vec<String>,
    pub delegate_to: Option<DelegateTarget>,
    #[serde(default)]
    pub disable_argument_parsing: bool,
    #[serde(default)]
    pub enforce_flags_before_args: bool,
    #[serde(default)]
    pub require_exact_flag_match: bool,
    #[serde(default)]
    pub disable_flags: Vec<String>,
    pub context_directory: Option<String>,
    #[serde(default)]
    pub truncate_load_path: bool,
    #[serde(default)]
    pub if_defined: IfDefined,
    /// Luau source run as the tool's handler.
    pub run: Option<String>,
    #[serde(default)]
    pub tool: BTreeMap<String, ToolManifest>,
}

/// Parse manifest text, attributing parse errors to `path`.
pub fn parse_str(content: &str, path: &Path) -> Result<ToolManifest, DefinitionError> {
    toml::from_str(content).map_err(|e| {
        DefinitionError::new(DefinitionErrorKind::Manifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    })
}

/// Read and evaluate a manifest file into `tool`.
pub fn evaluate_file(loader: &mut Loader, tool: &mut Tool, path: &Path) -> Result<(), LookupError> {
    let content = std::fs::read_to_string(path).map_err(|e| LookupError::Unreadable {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let manifest = parse_str(&content, path)?;
    apply(loader, tool, &manifest, &path.display().to_string())
}

/// Apply a parsed manifest to the tool under construction.
pub fn apply(
    loader: &mut Loader,
    tool: &mut Tool,
    manifest: &ToolManifest,
    source_name: &str,
) -> Result<(), LookupError> {
    let attributed = |e: DefinitionError| LookupError::from(e.with_source(source_name));

    match manifest.if_defined {
        IfDefined::Ignore if tool.has_definition() => return Ok(()),
        IfDefined::Reset if tool.has_definition() => tool.reset_definition(),
        _ => {}
    }

    if manifest.truncate_load_path {
        loader.truncate_load_path(tool.priority())?;
    }

    if let Some(desc) = &manifest.desc {
        tool.set_desc(desc.as_str()).map_err(attributed)?;
    }
    if !manifest.long_desc.is_empty() {
        tool.append_long_desc(manifest.long_desc.iter().map(String::as_str))
            .map_err(attributed)?;
    }
    if let Some(dir) = &manifest.context_directory {
        tool.set_context_directory(dir).map_err(attributed)?;
    }

    for (name, spec) in &manifest.acceptors {
        let spec = acceptor_spec(tool, spec).map_err(attributed)?;
        tool.add_acceptor(name, spec, None).map_err(attributed)?;
    }

    for group in &manifest.group {
        let mut spec = GroupSpec::new(match group.kind {
            GroupKindManifest::Base => crate::flag::GroupKind::Base,
            GroupKindManifest::Required => crate::flag::GroupKind::Required,
            GroupKindManifest::ExactlyOne => crate::flag::GroupKind::ExactlyOne,
            GroupKindManifest::AtMostOne => crate::flag::GroupKind::AtMostOne,
            GroupKindManifest::AtLeastOne => crate::flag::GroupKind::AtLeastOne,
        })
        .prepend(group.prepend);
        if let Some(name) = &group.name {
            spec = spec.name(name);
        }
        if let Some(desc) = &group.desc {
            spec = spec.desc(desc.as_str());
        }
        tool.add_flag_group(spec).map_err(attributed)?;
    }

    for flag in &manifest.flag {
        let mut spec = FlagSpec::new(&flag.key).syntaxes(flag.syntax.iter().cloned());
        match &flag.accept {
            Some(AcceptorManifest::Name(name)) => spec = spec.accept_name(name),
            Some(inline) => {
                let built = acceptor_spec(tool, inline)
                    .and_then(|s| s.build(None))
                    .map_err(attributed)?;
                spec = spec.accept(built);
            }
            None => {}
        }
        if let Some(default) = &flag.default {
            spec = spec.default(toml_to_json(default));
        }
        if flag.handler == HandlerKind::Push {
            spec = spec.handler(FlagHandler::Push);
        }
        if let Some(desc) = &flag.desc {
            spec = spec.desc(desc.as_str());
        }
        if !flag.long_desc.is_empty() {
            spec = spec.long_desc(flag.long_desc.iter().map(String::as_str));
        }
        if let Some(group) = &flag.group {
            spec = spec.group(group);
        }
        if let Some(report) = flag.report_collisions {
            spec = spec.report_collisions(report);
        }
        if let Some(name) = &flag.display_name {
            spec = spec.display_name(name);
        }
        if !flag.complete_values.is_empty() {
            spec = spec.complete_values(Completion::values(flag.complete_values.iter().cloned()));
        }
        if let Some(add) = flag.add_method {
            spec = spec.add_method(add);
        }
        tool.add_flag(spec).map_err(attributed)?;
    }

    for arg in &manifest.arg {
        let mut spec = ArgSpec::new(&arg.key);
        match &arg.accept {
            Some(AcceptorManifest::Name(name)) => spec = spec.accept_name(name),
            Some(inline) => {
                let built = acceptor_spec(tool, inline)
                    .and_then(|s| s.build(None))
                    .map_err(attributed)?;
                spec = spec.accept(built);
            }
            None => {}
        }
        if let Some(default) = &arg.default {
            spec = spec.default(toml_to_json(default));
        }
        if let Some(desc) = &arg.desc {
            spec = spec.desc(desc.as_str());
        }
        if !arg.long_desc.is_empty() {
            spec = spec.long_desc(arg.long_desc.iter().map(String::as_str));
        }
        if let Some(name) = &arg.display_name {
            spec = spec.display_name(name);
        }
        if let Some(add) = arg.add_method {
            spec = spec.add_method(add);
        }
        match arg.kind {
            ArgKindManifest::Required => tool.add_required_arg(spec).map_err(attributed)?,
            ArgKindManifest::Optional => tool.add_optional_arg(spec).map_err(attributed)?,
            ArgKindManifest::Remaining => tool.set_remaining_args(spec).map_err(attributed)?,
        }
    }

    for mixin in &manifest.mixins {
        tool.include_mixin(mixin).map_err(attributed)?;
    }
    if !manifest.disable_flags.is_empty() {
        tool.disable_flag(manifest.disable_flags.iter().cloned())
            .map_err(attributed)?;
    }
    if manifest.disable_argument_parsing {
        tool.disable_argument_parsing().map_err(attributed)?;
    }
    if manifest.enforce_flags_before_args {
        tool.enforce_flags_before_args().map_err(attributed)?;
    }
    if manifest.require_exact_flag_match {
        tool.require_exact_flag_match().map_err(attributed)?;
    }
    if let Some(target) = &manifest.delegate_to {
        tool.delegate_to(target.words()).map_err(attributed)?;
    }
    if let Some(script) = &manifest.run {
        install_run_script(tool, script, source_name).map_err(attributed)?;
    }

    // Nested sub-tool tables recurse through the loader at the same
    // priority.
    let priority = tool.priority();
    let parent_words = tool.full_name().to_vec();
    for (word, sub) in &manifest.tool {
        let mut words = parent_words.clone();
        words.push(word.clone());
        loader.activate_tool(&words, priority, |loader, child| {
            apply(loader, child, sub, source_name)
        })?;
    }
    Ok(())
}

#[cfg(feature = "lua")]
fn install_run_script(
    tool: &mut Tool,
    script: &str,
    source_name: &str,
) -> Result<(), DefinitionError> {
    let script = script.to_string();
    let prelude = tool.script_prelude().to_string();
    let label = if tool.is_root() {
        source_name.to_string()
    } else {
        tool.display_name()
    };
    tool.set_run_handler(std::sync::Arc::new(move |ctx| {
        match crate::lua::run_script(&script, &prelude, ctx) {
            Ok(code) => code,
            Err(e) => {
                eprintln!("[tooltree] {label}: {e:#}");
                1
            }
        }
    }))
}

#[cfg(not(feature = "lua"))]
fn install_run_script(
    _tool: &mut Tool,
    _script: &str,
    source_name: &str,
) -> Result<(), DefinitionError> {
    Err(DefinitionError::new(DefinitionErrorKind::Manifest {
        path: std::path::PathBuf::from(source_name),
        message: "run scripts require the \"lua\" feature".to_string(),
    }))
}

/// Resolve an acceptor manifest entry to a buildable spec. Name references
/// resolve through the tool's registry chain (well-known names included).
fn acceptor_spec(tool: &Tool, manifest: &AcceptorManifest) -> Result<AcceptorSpec, DefinitionError> {
    Ok(match manifest {
        AcceptorManifest::Name(name) => {
            let acceptor = tool.lookup_acceptor(name).ok_or_else(|| {
                DefinitionError::new(DefinitionErrorKind::UnknownAcceptor { name: name.clone() })
            })?;
            AcceptorSpec::Ready(acceptor)
        }
        AcceptorManifest::Values(values) => AcceptorSpec::Values(values.clone()),
        AcceptorManifest::Pattern { pattern } => AcceptorSpec::Pattern(pattern.clone()),
        AcceptorManifest::Range { min, max, integer } => AcceptorSpec::Range {
            min: *min,
            max: *max,
            integer: *integer,
        },
    })
}

/// Translate a TOML default into the runtime value model.
fn toml_to_json(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s.clone()),
        toml::Value::Integer(i) => Value::Number((*i).into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(*f).map_or(Value::Null, Value::Number),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(d) => Value::String(d.to_string()),
        toml::Value::Array(items) => Value::Array(items.iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .iter()
                .map(|(k, v)| (k.clone(), toml_to_json(v)))
                .collect(),
        ),
    }
}
