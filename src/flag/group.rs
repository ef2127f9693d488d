//! Flag groups and their cardinality constraints.

use std::collections::BTreeSet;

use crate::error::UsageError;
use crate::wrap::WrappableText;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupKind {
    /// No constraint.
    #[default]
    Base,
    /// Every contained flag must be set.
    Required,
    ExactlyOne,
    AtMostOne,
    AtLeastOne,
}

/// An ordered collection of flags with a cardinality constraint checked at
/// end of parse. Group 0 on every tool is an implicit base group.
#[derive(Debug, Clone, Default)]
pub struct FlagGroup {
    kind: GroupKind,
    name: Option<String>,
    desc: WrappableText,
    long_desc: Vec<WrappableText>,
    flag_keys: Vec<String>,
}

impl FlagGroup {
    pub fn new(kind: GroupKind, name: Option<String>) -> Self {
        Self {
            kind,
            name,
            ..Self::default()
        }
    }

    pub const fn kind(&self) -> GroupKind {
        self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub const fn desc(&self) -> &WrappableText {
        &self.desc
    }

    pub fn set_desc(&mut self, desc: WrappableText) {
        self.desc = desc;
    }

    pub fn long_desc(&self) -> &[WrappableText] {
        &self.long_desc
    }

    pub fn append_long_desc(&mut self, desc: impl IntoIterator<Item = WrappableText>) {
        self.long_desc.extend(desc);
    }

    pub fn flag_keys(&self) -> &[String] {
        &self.flag_keys
    }

    pub(crate) fn add_flag_key(&mut self, key: impl Into<String>) {
        self.flag_keys.push(key.into());
    }

    pub(crate) fn sort_flag_keys_by<F>(&mut self, sort_key: F)
    where
        F: Fn(&str) -> String,
    {
        self.flag_keys.sort_by_key(|k| sort_key(k));
    }

    /// Display label for constraint messages: the group name, or the
    /// enumerated flag list.
    fn label<F>(&self, flag_label: &F) -> String
    where
        F: Fn(&str) -> String,
    {
        self.name.clone().unwrap_or_else(|| {
            let flags: Vec<String> = self.flag_keys.iter().map(|k| flag_label(k)).collect();
            format!("({})", flags.join(", "))
        })
    }

    /// Check the constraint against the flag keys seen during a parse.
    /// `flag_label` maps a key to its display name for messages.
    pub fn validation_errors<F>(
        &self,
        seen: &BTreeSet<String>,
        flag_label: F,
    ) -> Vec<UsageError>
    where
        F: Fn(&str) -> String,
    {
        let set_count = self.flag_keys.iter().filter(|k| seen.contains(*k)).count();
        let describe = |n: usize| match n {
            0 => "none were provided".to_string(),
            1 => "1 was provided".to_string(),
            n => format!("{n} were provided"),
        };
        match self.kind {
            GroupKind::Base => Vec::new(),
            GroupKind::Required => self
                .flag_keys
                .iter()
                .filter(|k| !seen.contains(*k))
                .map(|k| UsageError::GroupConstraint {
                    group: self.label(&flag_label),
                    message: format!(
                        "flag {} is required in group {}",
                        flag_label(k),
                        self.label(&flag_label)
                    ),
                })
                .collect(),
            GroupKind::ExactlyOne => {
                if set_count == 1 {
                    Vec::new()
                } else {
                    vec![UsageError::GroupConstraint {
                        group: self.label(&flag_label),
                        message: format!(
                            "exactly one flag out of group {} is required, but {}",
                            self.label(&flag_label),
                            describe(set_count)
                        ),
                    }]
                }
            }
            GroupKind::AtMostOne => {
                if set_count <= 1 {
                    Vec::new()
                } else {
                    vec![UsageError::GroupConstraint {
                        group: self.label(&flag_label),
                        message: format!(
                            "at most one flag out of group {} is allowed, but {}",
                            self.label(&flag_label),
                            describe(set_count)
                        ),
                    }]
                }
            }
            GroupKind::AtLeastOne => {
                if set_count >= 1 {
                    Vec::new()
                } else {
                    vec![UsageError::GroupConstraint {
                        group: self.label(&flag_label),
                        message: format!(
                            "at least one flag out of group {} is required, but {}",
                            self.label(&flag_label),
                            describe(set_count)
                        ),
                    }]
                }
            }
        }
    }
}
