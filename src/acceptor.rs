//! Value acceptors.
//!
//! An acceptor validates and converts one textual value. Flags and
//! positional args each carry one; the parser consults it for every value
//! token and reports a usage error when it rejects.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use crate::error::{DefinitionError, DefinitionErrorKind};
use crate::util;

/// A conversion function for simple acceptors. Returning `Err` rejects the
/// value.
pub type SimpleFn = Arc<dyn Fn(&str) -> Result<Value, String> + Send + Sync>;

/// Post-match conversion for pattern acceptors.
pub type ConvertFn = Arc<dyn Fn(&str) -> Value + Send + Sync>;

#[derive(Clone)]
enum AcceptorKind {
    /// Matches any string; converts to the string itself.
    Default,
    Simple(SimpleFn),
    Pattern {
        regex: Regex,
        convert: Option<ConvertFn>,
    },
    Enum(Vec<String>),
    Range {
        min: f64,
        max: f64,
        integer: bool,
    },
}

/// A polymorphic validator/converter for a single textual value.
#[derive(Clone)]
pub struct Acceptor {
    kind: AcceptorKind,
    type_desc: String,
    well_known_spec: Option<String>,
}

impl Default for Acceptor {
    fn default() -> Self {
        Self {
            kind: AcceptorKind::Default,
            type_desc: "string".to_string(),
            well_known_spec: None,
        }
    }
}

// The function variants make a derived Debug impossible; print the
// descriptive fields only.
impl fmt::Debug for Acceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Acceptor")
            .field("type_desc", &self.type_desc)
            .field("well_known_spec", &self.well_known_spec)
            .finish_non_exhaustive()
    }
}

impl Acceptor {
    pub fn simple(func: SimpleFn, type_desc: impl Into<String>) -> Self {
        Self {
            kind: AcceptorKind::Simple(func),
            type_desc: type_desc.into(),
            well_known_spec: None,
        }
    }

    pub fn pattern(regex: Regex, type_desc: impl Into<String>) -> Self {
        Self {
            kind: AcceptorKind::Pattern {
                regex,
                convert: None,
            },
            type_desc: type_desc.into(),
            well_known_spec: None,
        }
    }

    pub fn pattern_with(regex: Regex, convert: ConvertFn, type_desc: impl Into<String>) -> Self {
        Self {
            kind: AcceptorKind::Pattern {
                regex,
                convert: Some(convert),
            },
            type_desc: type_desc.into(),
            well_known_spec: None,
        }
    }

    pub fn of_values<I, S>(values: I, type_desc: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: AcceptorKind::Enum(values.into_iter().map(Into::into).collect()),
            type_desc: type_desc.into(),
            well_known_spec: None,
        }
    }

    pub fn range(min: f64, max: f64, integer: bool, type_desc: impl Into<String>) -> Self {
        Self {
            kind: AcceptorKind::Range { min, max, integer },
            type_desc: type_desc.into(),
            well_known_spec: None,
        }
    }

    /// Human-readable description of the expected value type.
    pub fn type_desc(&self) -> &str {
        &self.type_desc
    }

    /// The well-known name this acceptor was built from, if any.
    pub fn well_known_spec(&self) -> Option<&str> {
        self.well_known_spec.as_deref()
    }

    /// Whether this is the default accept-anything acceptor.
    pub const fn is_default(&self) -> bool {
        matches!(self.kind, AcceptorKind::Default)
    }

    /// Validate and convert `value`. `None` means the value is rejected.
    pub fn accept(&self, value: &str) -> Option<Value> {
        match &self.kind {
            AcceptorKind::Default => Some(Value::String(value.to_string())),
            AcceptorKind::Simple(func) => func(value).ok(),
            AcceptorKind::Pattern { regex, convert } => {
                if !regex.is_match(value) {
                    return None;
                }
                Some(convert.as_ref().map_or_else(
                    || Value::String(value.to_string()),
                    |f| f(value),
                ))
            }
            AcceptorKind::Enum(values) => values
                .iter()
                .find(|v| *v == value)
                .map(|v| Value::String(v.clone())),
            AcceptorKind::Range { min, max, integer } => {
                if *integer {
                    let n = parse_integer(value)?;
                    #[allow(clippy::cast_precision_loss)]
                    let in_range = (n as f64) >= *min && (n as f64) <= *max;
                    in_range.then(|| Value::Number(n.into()))
                } else {
                    let n: f64 = value.parse().ok()?;
                    (n >= *min && n <= *max)
                        .then(|| serde_json::Number::from_f64(n).map(Value::Number))
                        .flatten()
                }
            }
        }
    }

    /// Near-miss candidates for a rejected value (enum acceptors only).
    pub fn suggestions(&self, value: &str) -> Vec<String> {
        match &self.kind {
            AcceptorKind::Enum(values) => util::suggestions(value, values),
            _ => Vec::new(),
        }
    }

    /// The textual forms an enum acceptor matches, for completions.
    pub fn enum_values(&self) -> Option<&[String]> {
        match &self.kind {
            AcceptorKind::Enum(values) => Some(values),
            _ => None,
        }
    }

    /// Look up a built-in acceptor by well-known name.
    pub fn well_known(name: &str) -> Option<Self> {
        let canonical = name.replace('-', "_");
        let kind = match canonical.as_str() {
            "string" => AcceptorKind::Simple(Arc::new(|s: &str| {
                if s.is_empty() {
                    Err("empty string".to_string())
                } else {
                    Ok(Value::String(s.to_string()))
                }
            })),
            "integer" => AcceptorKind::Simple(Arc::new(|s: &str| {
                parse_integer(s)
                    .map(|n| Value::Number(n.into()))
                    .ok_or_else(|| format!("not an integer: {s}"))
            })),
            "decimal_integer" => AcceptorKind::Simple(Arc::new(|s: &str| {
                s.replace('_', "")
                    .parse::<i64>()
                    .map(|n| Value::Number(n.into()))
                    .map_err(|e| e.to_string())
            })),
            "octal_integer" => AcceptorKind::Simple(Arc::new(|s: &str| {
                let digits = s.replace('_', "");
                let digits = digits
                    .strip_prefix("0o")
                    .or_else(|| digits.strip_prefix('0').filter(|r| !r.is_empty()))
                    .unwrap_or(&digits);
                i64::from_str_radix(digits, 8)
                    .map(|n| Value::Number(n.into()))
                    .map_err(|e| e.to_string())
            })),
            "float" => AcceptorKind::Simple(Arc::new(|s: &str| parse_float(s))),
            "rational" => AcceptorKind::Simple(Arc::new(|s: &str| parse_rational(s))),
            "numeric" => AcceptorKind::Simple(Arc::new(|s: &str| {
                if let Some(n) = parse_integer(s) {
                    return Ok(Value::Number(n.into()));
                }
                if s.contains('/') {
                    return parse_rational(s);
                }
                parse_float(s)
            })),
            "boolean" => AcceptorKind::Simple(Arc::new(|s: &str| {
                match s.to_ascii_lowercase().as_str() {
                    "true" | "t" | "yes" | "y" | "1" => Ok(Value::Bool(true)),
                    "false" | "f" | "no" | "n" | "0" => Ok(Value::Bool(false)),
                    _ => Err(format!("not a boolean: {s}")),
                }
            })),
            "array" => AcceptorKind::Simple(Arc::new(|s: &str| {
                let items: Vec<Value> = s
                    .split(',')
                    .filter(|part| !part.is_empty())
                    .map(|part| Value::String(part.to_string()))
                    .collect();
                Ok(Value::Array(items))
            })),
            "regexp" => AcceptorKind::Simple(Arc::new(|s: &str| {
                Regex::new(s)
                    .map(|_| Value::String(s.to_string()))
                    .map_err(|e| e.to_string())
            })),
            _ => return None,
        };
        Some(Self {
            kind,
            type_desc: canonical.replace('_', " "),
            well_known_spec: Some(canonical),
        })
    }
}

/// Integer parsing with `0x`/`0o`/`0b` prefixes, leading-zero octal, and
/// `_` digit separators.
fn parse_integer(s: &str) -> Option<i64> {
    let cleaned = s.replace('_', "");
    let (negative, body) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };
    if body.is_empty() {
        return None;
    }
    let magnitude = if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16)
    } else if let Some(bin) = body.strip_prefix("0b").or_else(|| body.strip_prefix("0B")) {
        i64::from_str_radix(bin, 2)
    } else if let Some(oct) = body.strip_prefix("0o").or_else(|| body.strip_prefix("0O")) {
        i64::from_str_radix(oct, 8)
    } else if body.len() > 1 && body.starts_with('0') {
        i64::from_str_radix(&body[1..], 8)
    } else {
        body.parse::<i64>()
    }
    .ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

fn parse_float(s: &str) -> Result<Value, String> {
    let n: f64 = s.parse().map_err(|_| format!("not a float: {s}"))?;
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .ok_or_else(|| format!("not a finite float: {s}"))
}

/// Parse `a/b` fractions (or plain numbers) into a float value.
fn parse_rational(s: &str) -> Result<Value, String> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.trim().parse().map_err(|_| format!("not a rational: {s}"))?;
        let den: f64 = den.trim().parse().map_err(|_| format!("not a rational: {s}"))?;
        if den == 0.0 {
            return Err(format!("zero denominator: {s}"));
        }
        serde_json::Number::from_f64(num / den)
            .map(Value::Number)
            .ok_or_else(|| format!("not a finite rational: {s}"))
    } else {
        parse_float(s)
    }
}

/// The forms a registered acceptor spec may take.
pub enum AcceptorSpec {
    /// A built-in type token, e.g. `"integer"`.
    WellKnown(String),
    /// An enumeration of textual values.
    Values(Vec<String>),
    /// A regex source string.
    Pattern(String),
    /// A numeric range.
    Range { min: f64, max: f64, integer: bool },
    /// A user-supplied conversion function.
    Function(SimpleFn),
    /// An already-built acceptor.
    Ready(Acceptor),
}

impl AcceptorSpec {
    /// Build the acceptor, applying `type_desc` when given.
    pub fn build(self, type_desc: Option<String>) -> Result<Acceptor, DefinitionError> {
        let mut acceptor = match self {
            Self::WellKnown(name) => Acceptor::well_known(&name).ok_or_else(|| {
                DefinitionError::new(DefinitionErrorKind::UnknownAcceptor { name })
            })?,
            Self::Values(values) => Acceptor::of_values(values, "value"),
            Self::Pattern(source) => {
                let regex = Regex::new(&source).map_err(|e| {
                    DefinitionError::new(DefinitionErrorKind::AcceptorSpec {
                        detail: e.to_string(),
                    })
                })?;
                Acceptor::pattern(regex, source)
            }
            Self::Range { min, max, integer } => {
                if min > max {
                    return Err(DefinitionError::new(DefinitionErrorKind::AcceptorSpec {
                        detail: format!("empty range {min}..{max}"),
                    }));
                }
                Acceptor::range(min, max, integer, format!("{min}..{max}"))
            }
            Self::Function(func) => Acceptor::simple(func, "value"),
            Self::Ready(acceptor) => acceptor,
        };
        if let Some(desc) = type_desc {
            acceptor.type_desc = desc;
        }
        Ok(acceptor)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn default_accepts_anything() {
        let acceptor = Acceptor::default();
        assert_eq!(acceptor.accept("anything"), Some(Value::String("anything".into())));
        assert_eq!(acceptor.accept(""), Some(Value::String(String::new())));
    }

    #[test]
    fn well_known_string_rejects_empty() {
        let acceptor = Acceptor::well_known("string").unwrap();
        assert!(acceptor.accept("x").is_some());
        assert!(acceptor.accept("").is_none());
        assert_eq!(acceptor.well_known_spec(), Some("string"));
    }

    #[test]
    fn integer_handles_radix_prefixes() {
        let acceptor = Acceptor::well_known("integer").unwrap();
        assert_eq!(acceptor.accept("42"), Some(Value::Number(42.into())));
        assert_eq!(acceptor.accept("-0x10"), Some(Value::Number((-16).into())));
        assert_eq!(acceptor.accept("0b101"), Some(Value::Number(5.into())));
        assert_eq!(acceptor.accept("0o17"), Some(Value::Number(15.into())));
        assert_eq!(acceptor.accept("017"), Some(Value::Number(15.into())));
        assert_eq!(acceptor.accept("1_000"), Some(Value::Number(1000.into())));
        assert!(acceptor.accept("12abc").is_none());
    }

    #[test]
    fn decimal_integer_rejects_radix_prefixes() {
        let acceptor = Acceptor::well_known("decimal_integer").unwrap();
        assert_eq!(acceptor.accept("42"), Some(Value::Number(42.into())));
        assert!(acceptor.accept("0x10").is_none());
    }

    #[test]
    fn octal_integer_parses_with_and_without_prefix() {
        let acceptor = Acceptor::well_known("octal-integer").unwrap();
        assert_eq!(acceptor.accept("17"), Some(Value::Number(15.into())));
        assert_eq!(acceptor.accept("0o17"), Some(Value::Number(15.into())));
        assert!(acceptor.accept("19").is_none());
    }

    #[test]
    fn rational_converts_fractions() {
        let acceptor = Acceptor::well_known("rational").unwrap();
        let value = acceptor.accept("3/4").unwrap();
        assert_eq!(value.as_f64(), Some(0.75));
        assert!(acceptor.accept("1/0").is_none());
    }

    #[test]
    fn numeric_prefers_integer_form() {
        let acceptor = Acceptor::well_known("numeric").unwrap();
        assert_eq!(acceptor.accept("7"), Some(Value::Number(7.into())));
        assert_eq!(acceptor.accept("2.5").unwrap().as_f64(), Some(2.5));
        assert_eq!(acceptor.accept("1/2").unwrap().as_f64(), Some(0.5));
        assert!(acceptor.accept("seven").is_none());
    }

    #[test]
    fn boolean_accepts_usual_spellings() {
        let acceptor = Acceptor::well_known("boolean").unwrap();
        assert_eq!(acceptor.accept("Yes"), Some(Value::Bool(true)));
        assert_eq!(acceptor.accept("0"), Some(Value::Bool(false)));
        assert!(acceptor.accept("maybe").is_none());
    }

    #[test]
    fn array_splits_on_commas() {
        let acceptor = Acceptor::well_known("array").unwrap();
        assert_eq!(
            acceptor.accept("a,b,c"),
            Some(serde_json::json!(["a", "b", "c"]))
        );
        assert_eq!(acceptor.accept(""), Some(Value::Array(vec![])));
    }

    #[test]
    fn regexp_validates_compilation() {
        let acceptor = Acceptor::well_known("regexp").unwrap();
        assert_eq!(acceptor.accept("^a+$"), Some(Value::String("^a+$".into())));
        assert!(acceptor.accept("(unclosed").is_none());
    }

    #[test]
    fn enum_matches_and_suggests() {
        let acceptor = Acceptor::of_values(["Robb", "Sansa", "Arya"], "name");
        assert_eq!(acceptor.accept("Arya"), Some(Value::String("Arya".into())));
        assert!(acceptor.accept("Ara").is_none());
        assert_eq!(acceptor.suggestions("Ara"), vec!["Arya".to_string()]);
    }

    #[test]
    fn pattern_matches_and_converts() {
        let regex = Regex::new(r"^\d{4}$").unwrap();
        let acceptor = Acceptor::pattern_with(
            regex,
            Arc::new(|s: &str| Value::Number(s.parse::<i64>().unwrap_or(0).into())),
            "year",
        );
        assert_eq!(acceptor.accept("2024"), Some(Value::Number(2024.into())));
        assert!(acceptor.accept("24").is_none());
    }

    #[test]
    fn range_checks_bounds() {
        let acceptor = Acceptor::range(1.0, 10.0, true, "1..10");
        assert_eq!(acceptor.accept("5"), Some(Value::Number(5.into())));
        assert!(acceptor.accept("11").is_none());
        assert!(acceptor.accept("2.5").is_none());
    }

    #[test]
    fn simple_rejects_via_err() {
        let acceptor = Acceptor::simple(
            Arc::new(|s: &str| {
                if s.starts_with('x') {
                    Ok(Value::String(s.to_string()))
                } else {
                    Err("must start with x".to_string())
                }
            }),
            "x-word",
        );
        assert!(acceptor.accept("xy").is_some());
        assert!(acceptor.accept("yz").is_none());
    }

    #[test]
    fn spec_builds_each_form() {
        assert!(AcceptorSpec::WellKnown("float".into()).build(None).is_ok());
        assert!(AcceptorSpec::WellKnown("bogus".into()).build(None).is_err());
        assert!(AcceptorSpec::Pattern("(bad".into()).build(None).is_err());
        let ranged = AcceptorSpec::Range {
            min: 0.0,
            max: 1.0,
            integer: false,
        }
        .build(Some("fraction".into()))
        .unwrap();
        assert_eq!(ranged.type_desc(), "fraction");
    }
}
