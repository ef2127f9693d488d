//! The argument parser.
//!
//! Drives a single parse of a token vector against a finished tool. Usage
//! errors accumulate in detection order; the parser never fails on user
//! input. `parse` may be called repeatedly; `finish` seals the parser,
//! applies pending-flag defaults, and runs group and required-arg checks.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::Value;

use crate::acceptor::Acceptor;
use crate::context::Context;
use crate::error::UsageError;
use crate::flag::{FlagHandler, FlagResolution, FlagType, ValueType};
use crate::tool::Tool;
use crate::util;

/// Caller-supplied knobs for one parse.
#[derive(Debug, Clone, Default)]
pub struct ParserOptions {
    /// Known subtool simple names one level below the tool, used for
    /// tool-not-found suggestions when a non-runnable tool gets a
    /// positional token.
    pub subtool_names: Vec<String>,
}

/// A flag that consumed its spelling but still awaits a value token.
struct PendingFlag {
    key: String,
    display: String,
    acceptor: Acceptor,
    handler: FlagHandler,
    value_required: bool,
}

pub struct ArgParser {
    tool: Arc<Tool>,
    options: ParserOptions,
    data: BTreeMap<String, Value>,
    errors: Vec<UsageError>,
    parsed_args: Vec<String>,
    unmatched_positional: Vec<String>,
    unmatched_flags: Vec<String>,
    seen_flag_keys: BTreeSet<String>,
    positional_cursor: usize,
    finished: bool,
    flag_parsing_active: bool,
    pending: Option<PendingFlag>,
}

impl ArgParser {
    pub fn new(tool: Arc<Tool>, options: ParserOptions) -> Self {
        let data = tool.default_data().clone();
        Self {
            tool,
            options,
            data,
            errors: Vec::new(),
            parsed_args: Vec::new(),
            unmatched_positional: Vec::new(),
            unmatched_flags: Vec::new(),
            seen_flag_keys: BTreeSet::new(),
            positional_cursor: 0,
            finished: false,
            flag_parsing_active: true,
            pending: None,
        }
    }

    pub fn for_tool(tool: Arc<Tool>) -> Self {
        Self::new(tool, ParserOptions::default())
    }

    /// Consume a batch of tokens. No-op after `finish`.
    pub fn parse<I, S>(&mut self, tokens: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.finished {
            return self;
        }
        let tool = Arc::clone(&self.tool);
        for token in tokens {
            let token = token.into();
            self.parsed_args.push(token.clone());
            if tool.argument_parsing_disabled() {
                continue;
            }
            self.handle_token(&tool, token);
        }
        self
    }

    fn handle_token(&mut self, tool: &Tool, token: String) {
        if let Some(pending) = self.pending.take() {
            if pending.value_required || !token.starts_with('-') {
                self.apply_flag_value(&pending, Some(&token));
                return;
            }
            // Optional value, next token looks like a flag: the flag gets
            // `true` and the token falls through to normal handling.
            self.apply_flag_value(&pending, None);
        }

        if !self.flag_parsing_active || token == "-" || !token.starts_with('-') {
            self.handle_positional(tool, token);
            return;
        }

        if token == "--" {
            self.flag_parsing_active = false;
            return;
        }

        if let Some(rest) = token.strip_prefix("--") {
            self.handle_long_flag(tool, rest, &token);
        } else {
            self.handle_short_cluster(tool, &token);
        }
    }

    fn handle_long_flag(&mut self, tool: &Tool, rest: &str, token: &str) {
        let (name_body, attached) = match rest.split_once('=') {
            Some((name, value)) => (name, Some(value.to_string())),
            None => (rest, None),
        };
        let name = format!("--{name_body}");
        if name_body.is_empty() {
            self.errors.push(UsageError::UnknownFlag {
                flag: "--".to_string(),
                suggestions: Vec::new(),
            });
            self.unmatched_flags.push(token.to_string());
            return;
        }

        match tool.resolve_flag(&name) {
            FlagResolution::NotFound => {
                self.errors.push(UsageError::UnknownFlag {
                    flag: name.clone(),
                    suggestions: self.flag_suggestions(tool, &name),
                });
                self.unmatched_flags.push(name);
            }
            FlagResolution::Multiple(candidates) => {
                self.errors.push(UsageError::AmbiguousFlag {
                    flag: name,
                    candidates,
                });
            }
            FlagResolution::Unique(found) => {
                self.seen_flag_keys.insert(found.flag.key().to_string());
                match found.flag.flag_type() {
                    FlagType::Boolean => {
                        if let Some(value) = attached {
                            self.errors.push(UsageError::FlagShouldNotTakeValue {
                                flag: name,
                                value,
                            });
                        } else {
                            self.store(
                                found.flag.key(),
                                found.flag.handler().clone(),
                                Value::Bool(!found.negated),
                            );
                        }
                    }
                    FlagType::Value => {
                        let pending = PendingFlag {
                            key: found.flag.key().to_string(),
                            display: name,
                            acceptor: found.flag.acceptor().clone(),
                            handler: found.flag.handler().clone(),
                            value_required: found.flag.value_type()
                                == Some(ValueType::Required),
                        };
                        if attached.is_some() {
                            self.apply_flag_value(&pending, attached.as_deref());
                        } else {
                            self.pending = Some(pending);
                        }
                    }
                }
            }
        }
    }

    /// Walk a `-abc` cluster left to right. A value-taking flag consumes
    /// the rest of the cluster as its attached value; an unknown character
    /// ends the walk.
    fn handle_short_cluster(&mut self, tool: &Tool, token: &str) {
        let body: Vec<char> = token.chars().skip(1).collect();
        let mut index = 0;
        while index < body.len() {
            let flag_str = format!("-{}", body[index]);
            match tool.resolve_flag(&flag_str) {
                FlagResolution::NotFound => {
                    self.errors.push(UsageError::UnknownFlag {
                        flag: flag_str.clone(),
                        suggestions: Vec::new(),
                    });
                    self.unmatched_flags.push(flag_str);
                    return;
                }
                FlagResolution::Multiple(candidates) => {
                    self.errors.push(UsageError::AmbiguousFlag {
                        flag: flag_str,
                        candidates,
                    });
                    return;
                }
                FlagResolution::Unique(found) => {
                    self.seen_flag_keys.insert(found.flag.key().to_string());
                    match found.flag.flag_type() {
                        FlagType::Boolean => {
                            self.store(
                                found.flag.key(),
                                found.flag.handler().clone(),
                                Value::Bool(!found.negated),
                            );
                            index += 1;
                        }
                        FlagType::Value => {
                            let pending = PendingFlag {
                                key: found.flag.key().to_string(),
                                display: flag_str,
                                acceptor: found.flag.acceptor().clone(),
                                handler: found.flag.handler().clone(),
                                value_required: found.flag.value_type()
                                    == Some(ValueType::Required),
                            };
                            let remainder: String = body[index + 1..].iter().collect();
                            if remainder.is_empty() {
                                self.pending = Some(pending);
                            } else {
                                self.apply_flag_value(&pending, Some(&remainder));
                            }
                            return;
                        }
                    }
                }
            }
        }
    }

    fn handle_positional(&mut self, tool: &Tool, token: String) {
        if tool.flags_before_args_enforced() {
            self.flag_parsing_active = false;
        }
        if self.positional_cursor < tool.positional_slot_count() {
            let slot_index = self.positional_cursor;
            self.positional_cursor += 1;
            if let Some(slot) = tool.positional_slot(slot_index) {
                match slot.acceptor().accept(&token) {
                    Some(value) => {
                        self.data.insert(slot.key().to_string(), value);
                    }
                    None => {
                        let suggestions = slot.acceptor().suggestions(&token);
                        self.errors.push(UsageError::InvalidArgValue {
                            arg: slot.display_name().to_string(),
                            value: token,
                            suggestions,
                        })
                    }
                }
            }
        } else if let Some(remaining) = tool.remaining_arg() {
            match remaining.acceptor().accept(&token) {
                Some(value) => {
                    let slot = self
                        .data
                        .entry(remaining.key().to_string())
                        .or_insert_with(|| Value::Array(Vec::new()));
                    if let Value::Array(items) = slot {
                        items.push(value);
                    }
                }
                None => {
                    let suggestions = remaining.acceptor().suggestions(&token);
                    self.errors.push(UsageError::InvalidArgValue {
                        arg: remaining.display_name().to_string(),
                        value: token,
                        suggestions,
                    })
                }
            }
        } else {
            self.unmatched_positional.push(token);
        }
    }

    fn apply_flag_value(&mut self, pending: &PendingFlag, text: Option<&str>) {
        let value = match text {
            None => Value::Bool(true),
            Some(text) => match pending.acceptor.accept(text) {
                Some(value) => value,
                None => {
                    self.errors.push(UsageError::InvalidFlagValue {
                        flag: pending.display.clone(),
                        value: text.to_string(),
                        suggestions: pending.acceptor.suggestions(text),
                    });
                    return;
                }
            },
        };
        self.store(&pending.key, pending.handler.clone(), value);
    }

    fn store(&mut self, key: &str, handler: FlagHandler, value: Value) {
        let current = self.data.get(key);
        let stored = handler.apply(value, current);
        self.data.insert(key.to_string(), stored);
    }

    /// Suggestions for an unknown long flag: near misses by edit distance,
    /// plus the positive spelling when a `--no-` negation has no negative
    /// form.
    fn flag_suggestions(&self, tool: &Tool, name: &str) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(positive_body) = name.strip_prefix("--no-") {
            let positive = format!("--{positive_body}");
            if matches!(tool.resolve_flag(&positive), FlagResolution::Unique(_)) {
                out.push(positive);
            }
        }
        for candidate in util::suggestions(name, tool.long_flag_strings()) {
            if !out.contains(&candidate) {
                out.push(candidate);
            }
        }
        out
    }

    /// Seal the parser: resolve a pending flag, check required args, run
    /// group cardinality validation, and coalesce extra-argument errors.
    pub fn finish(&mut self) -> &mut Self {
        if self.finished {
            return self;
        }
        self.finished = true;
        let tool = Arc::clone(&self.tool);

        if let Some(pending) = self.pending.take() {
            if pending.value_required {
                self.errors.push(UsageError::FlagMissingValue {
                    flag: pending.display.clone(),
                });
            } else {
                self.apply_flag_value(&pending, None);
            }
        }

        if tool.argument_parsing_disabled() {
            return self;
        }

        for (index, arg) in tool.required_args().iter().enumerate() {
            if index >= self.positional_cursor {
                self.errors.push(UsageError::MissingRequiredArg {
                    arg: arg.display_name().to_string(),
                });
            }
        }

        if !self.unmatched_positional.is_empty() {
            if tool.is_runnable() {
                self.errors.push(UsageError::ExtraArguments {
                    args: self.unmatched_positional.clone(),
                });
            } else {
                // A namespace got a positional: the user most likely asked
                // for a subtool that does not exist.
                let mut words = tool.full_name().to_vec();
                words.push(self.unmatched_positional[0].clone());
                self.errors.push(UsageError::ToolNotFound {
                    suggestions: util::suggestions(
                        &self.unmatched_positional[0],
                        &self.options.subtool_names,
                    ),
                    words,
                });
            }
        }

        for group in tool.flag_groups() {
            let errors = group.validation_errors(&self.seen_flag_keys, |key| {
                tool.flag(key)
                    .map_or_else(|| key.to_string(), |f| f.display_name().to_string())
            });
            self.errors.extend(errors);
        }
        self
    }

    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn data(&self) -> &BTreeMap<String, Value> {
        &self.data
    }

    pub fn errors(&self) -> &[UsageError] {
        &self.errors
    }

    pub fn parsed_args(&self) -> &[String] {
        &self.parsed_args
    }

    pub fn unmatched_positional(&self) -> &[String] {
        &self.unmatched_positional
    }

    pub fn unmatched_flags(&self) -> &[String] {
        &self.unmatched_flags
    }

    pub fn seen_flag_keys(&self) -> &BTreeSet<String> {
        &self.seen_flag_keys
    }

    /// Convert into the execution context for the tool's run handler.
    /// Implies `finish`.
    pub fn into_context(mut self) -> Context {
        self.finish();
        let args = if self.tool.argument_parsing_disabled() {
            self.parsed_args.clone()
        } else {
            self.unmatched_positional.clone()
        };
        Context::new(
            self.tool.full_name().to_vec(),
            self.data,
            args,
            self.errors,
            self.tool.accessor_keys().clone(),
            self.tool.source_info().cloned(),
            self.tool.context_directory().map(std::path::Path::to_path_buf),
        )
    }
}

#[cfg(test)]
mod tests;
