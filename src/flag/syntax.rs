//! Flag spelling grammar.
//!
//! A [`FlagSyntax`] is one canonical description of a single spelling of a
//! flag. Spellings carry an optional value label whose bracketing and
//! delimiter determine whether the value is required or optional, attached
//! or detached:
//!
//! ```text
//! -x            --xyz              --[no-]xyz
//! -xLABEL       --xyz=LABEL        --xyz LABEL
//! -x LABEL      --xyz=[LABEL]      --xyz[=LABEL]
//! -x[LABEL]     --xyz [LABEL]      --xyz[ LABEL]
//! -x [LABEL]
//! ```

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{DefinitionError, DefinitionErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagStyle {
    Short,
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagType {
    Boolean,
    Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Required,
    Optional,
}

macro_rules! syntax_re {
    ($name:ident, $pattern:literal) => {
        #[allow(clippy::unwrap_used)] // patterns are checked constants
        static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($pattern).unwrap());
    };
}

syntax_re!(NEGATABLE, r"^--\[no-\]([A-Za-z0-9][\w-]*)$");
syntax_re!(LONG_PLAIN, r"^--([A-Za-z0-9][\w-]*)$");
syntax_re!(LONG_REQ_EQ, r"^--([A-Za-z0-9][\w-]*)=([\w-]+)$");
syntax_re!(LONG_REQ_SP, r"^--([A-Za-z0-9][\w-]*) ([\w-]+)$");
syntax_re!(LONG_OPT_EQ_OUTER, r"^--([A-Za-z0-9][\w-]*)=\[([\w-]+)\]$");
syntax_re!(LONG_OPT_EQ_INNER, r"^--([A-Za-z0-9][\w-]*)\[=([\w-]+)\]$");
syntax_re!(LONG_OPT_SP_OUTER, r"^--([A-Za-z0-9][\w-]*) \[([\w-]+)\]$");
syntax_re!(LONG_OPT_SP_INNER, r"^--([A-Za-z0-9][\w-]*)\[ ([\w-]+)\]$");
syntax_re!(SHORT_PLAIN, r"^-([A-Za-z0-9?])$");
syntax_re!(SHORT_OPT_SP_OUTER, r"^-([A-Za-z0-9?]) \[([\w-]+)\]$");
syntax_re!(SHORT_OPT_SP_INNER, r"^-([A-Za-z0-9?])\[ ([\w-]+)\]$");
syntax_re!(SHORT_OPT_ATTACHED, r"^-([A-Za-z0-9?])\[([\w-]+)\]$");
syntax_re!(SHORT_REQ_SP, r"^-([A-Za-z0-9?]) ([\w-]+)$");
syntax_re!(SHORT_REQ_ATTACHED, r"^-([A-Za-z0-9?])([\w-]+)$");

/// One spelling of a flag, fully parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagSyntax {
    original: String,
    flags: Vec<String>,
    positive_flag: String,
    negative_flag: Option<String>,
    style: FlagStyle,
    flag_type: Option<FlagType>,
    value_type: Option<ValueType>,
    value_delim: String,
    value_label: Option<String>,
    canonical_str: String,
    sort_str: String,
}

impl FlagSyntax {
    /// Parse a spelling string against the grammar.
    pub fn parse(original: &str) -> Result<Self, DefinitionError> {
        let parsed = Self::parse_long(original).or_else(|| Self::parse_short(original));
        parsed.ok_or_else(|| {
            DefinitionError::new(DefinitionErrorKind::FlagSyntax {
                syntax: original.to_string(),
            })
        })
    }

    fn parse_long(original: &str) -> Option<Self> {
        if let Some(caps) = NEGATABLE.captures(original) {
            let name = &caps[1];
            let positive = format!("--{name}");
            let negative = format!("--no-{name}");
            return Some(Self {
                original: original.to_string(),
                flags: vec![positive.clone(), negative.clone()],
                positive_flag: positive,
                negative_flag: Some(negative),
                style: FlagStyle::Long,
                flag_type: Some(FlagType::Boolean),
                value_type: None,
                value_delim: String::new(),
                value_label: None,
                canonical_str: format!("--[no-]{name}"),
                sort_str: name.to_string(),
            });
        }
        if let Some(caps) = LONG_PLAIN.captures(original) {
            return Some(Self::long(original, &caps[1], None, None, ""));
        }
        for (re, value_type, delim) in [
            (&LONG_OPT_EQ_OUTER, ValueType::Optional, "="),
            (&LONG_OPT_EQ_INNER, ValueType::Optional, "="),
            (&LONG_OPT_SP_OUTER, ValueType::Optional, " "),
            (&LONG_OPT_SP_INNER, ValueType::Optional, " "),
            (&LONG_REQ_EQ, ValueType::Required, "="),
            (&LONG_REQ_SP, ValueType::Required, " "),
        ] {
            if let Some(caps) = re.captures(original) {
                return Some(Self::long(
                    original,
                    &caps[1],
                    Some(value_type),
                    Some(caps[2].to_string()),
                    delim,
                ));
            }
        }
        None
    }

    fn parse_short(original: &str) -> Option<Self> {
        if let Some(caps) = SHORT_PLAIN.captures(original) {
            return Some(Self::short(original, &caps[1], None, None, ""));
        }
        for (re, value_type, delim) in [
            (&SHORT_OPT_SP_OUTER, ValueType::Optional, " "),
            (&SHORT_OPT_SP_INNER, ValueType::Optional, " "),
            (&SHORT_OPT_ATTACHED, ValueType::Optional, ""),
            (&SHORT_REQ_SP, ValueType::Required, " "),
            (&SHORT_REQ_ATTACHED, ValueType::Required, ""),
        ] {
            if let Some(caps) = re.captures(original) {
                return Some(Self::short(
                    original,
                    &caps[1],
                    Some(value_type),
                    Some(caps[2].to_string()),
                    delim,
                ));
            }
        }
        None
    }

    fn long(
        original: &str,
        name: &str,
        value_type: Option<ValueType>,
        value_label: Option<String>,
        delim: &str,
    ) -> Self {
        let mut syntax = Self {
            original: original.to_string(),
            flags: vec![format!("--{name}")],
            positive_flag: format!("--{name}"),
            negative_flag: None,
            style: FlagStyle::Long,
            flag_type: value_type.map(|_| FlagType::Value),
            value_type,
            value_delim: delim.to_string(),
            value_label,
            canonical_str: String::new(),
            sort_str: name.to_string(),
        };
        syntax.canonical_str = syntax.render_canonical();
        syntax
    }

    fn short(
        original: &str,
        char_name: &str,
        value_type: Option<ValueType>,
        value_label: Option<String>,
        delim: &str,
    ) -> Self {
        let mut syntax = Self {
            original: original.to_string(),
            flags: vec![format!("-{char_name}")],
            positive_flag: format!("-{char_name}"),
            negative_flag: None,
            style: FlagStyle::Short,
            flag_type: value_type.map(|_| FlagType::Value),
            value_type,
            value_delim: delim.to_string(),
            value_label,
            canonical_str: String::new(),
            sort_str: char_name.to_string(),
        };
        syntax.canonical_str = syntax.render_canonical();
        syntax
    }

    fn render_canonical(&self) -> String {
        match (self.flag_type, &self.value_label) {
            (Some(FlagType::Value), Some(label)) => {
                let optional = self.value_type == Some(ValueType::Optional);
                let body = if optional {
                    format!("[{label}]")
                } else {
                    label.clone()
                };
                match (self.style, self.value_delim.as_str()) {
                    (FlagStyle::Long, " ") | (FlagStyle::Short, " ") => {
                        format!("{} {body}", self.positive_flag)
                    }
                    (FlagStyle::Long, _) => format!("{}={body}", self.positive_flag),
                    (FlagStyle::Short, _) => format!("{}{body}", self.positive_flag),
                }
            }
            _ => {
                if self.negative_flag.is_some() {
                    format!("--[no-]{}", self.sort_str)
                } else {
                    self.positive_flag.clone()
                }
            }
        }
    }

    /// Adopt flag-level type, value kind, label, and delimiter for a
    /// spelling whose own string left them unresolved, and recompute the
    /// canonical form.
    pub(crate) fn configure_canonical(
        &mut self,
        flag_type: FlagType,
        value_type: Option<ValueType>,
        label: &str,
        delim: &str,
    ) {
        if self.flag_type.is_some() {
            return;
        }
        self.flag_type = Some(flag_type);
        if flag_type == FlagType::Value {
            self.value_type = value_type;
            self.value_label = Some(label.to_string());
            // A spaceless delimiter renders as `=` only on long spellings.
            self.value_delim = match (self.style, delim) {
                (FlagStyle::Short, "=") => String::new(),
                (FlagStyle::Long, "") => "=".to_string(),
                _ => delim.to_string(),
            };
        }
        self.canonical_str = self.render_canonical();
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    /// All spellings this syntax binds, including the negative form.
    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    pub fn positive_flag(&self) -> &str {
        &self.positive_flag
    }

    pub fn negative_flag(&self) -> Option<&str> {
        self.negative_flag.as_deref()
    }

    pub const fn style(&self) -> FlagStyle {
        self.style
    }

    pub const fn flag_type(&self) -> Option<FlagType> {
        self.flag_type
    }

    pub const fn value_type(&self) -> Option<ValueType> {
        self.value_type
    }

    pub fn value_delim(&self) -> &str {
        &self.value_delim
    }

    pub fn value_label(&self) -> Option<&str> {
        self.value_label.as_deref()
    }

    pub fn canonical_str(&self) -> &str {
        &self.canonical_str
    }

    pub fn sort_str(&self) -> &str {
        &self.sort_str
    }
}
