//! Wrappable description text.
//!
//! A [`WrappableText`] is an ordered sequence of fragments. A single-fragment
//! text wraps at whitespace like an ordinary string; a multi-fragment text
//! treats each fragment as unbreakable and wraps only between fragments.
//! ANSI escape sequences do not count toward measured width.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

#[allow(clippy::unwrap_used)] // pattern is a checked constant
static ANSI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("\x1b\\[[0-9;]*m").unwrap());

/// Width of `s` in characters, ignoring ANSI escape sequences.
fn visible_width(s: &str) -> usize {
    ANSI_RE.replace_all(s, "").chars().count()
}

/// A description string carrying wrap hints for later rendering.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WrappableText {
    fragments: Vec<String>,
}

impl WrappableText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            fragments: vec![text.into()],
        }
    }

    pub fn from_fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.iter().all(|f| f.is_empty())
    }

    /// Total visible width when rendered on one line.
    pub fn len(&self) -> usize {
        let joined = self.fragments.iter().filter(|f| !f.is_empty()).count();
        let sep = joined.saturating_sub(1);
        self.fragments.iter().map(|f| visible_width(f)).sum::<usize>() + sep
    }

    /// The unbreakable units this text wraps over.
    fn units(&self) -> Vec<&str> {
        if self.fragments.len() > 1 {
            self.fragments
                .iter()
                .map(String::as_str)
                .filter(|f| !f.is_empty())
                .collect()
        } else {
            self.fragments
                .first()
                .map(|f| f.split_whitespace().collect())
                .unwrap_or_default()
        }
    }

    /// Greedily fit units into lines of at most `width` columns; lines after
    /// the first use `width2` when given. A unit longer than the line width
    /// occupies a line by itself.
    pub fn wrap(&self, width: usize, width2: Option<usize>) -> Vec<String> {
        let units = self.units();
        let mut lines: Vec<String> = Vec::new();
        let mut cur = String::new();
        let mut cur_width = 0usize;

        for unit in units {
            let unit_width = visible_width(unit);
            let limit = if lines.is_empty() {
                width
            } else {
                width2.unwrap_or(width)
            };
            if cur.is_empty() {
                cur.push_str(unit);
                cur_width = unit_width;
            } else if cur_width + 1 + unit_width <= limit {
                cur.push(' ');
                cur.push_str(unit);
                cur_width += 1 + unit_width;
            } else {
                lines.push(std::mem::take(&mut cur));
                cur.push_str(unit);
                cur_width = unit_width;
            }
        }
        if !cur.is_empty() {
            lines.push(cur);
        }
        lines
    }
}

impl fmt::Display for WrappableText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for frag in self.fragments.iter().filter(|f| !f.is_empty()) {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(frag)?;
            first = false;
        }
        Ok(())
    }
}

impl From<&str> for WrappableText {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for WrappableText {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl<S: Into<String>> From<Vec<S>> for WrappableText {
    fn from(fragments: Vec<S>) -> Self {
        Self::from_fragments(fragments)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn wraps_plain_text_at_whitespace() {
        let text = WrappableText::new("the quick brown fox jumps");
        assert_eq!(
            text.wrap(10, None),
            vec!["the quick", "brown fox", "jumps"]
        );
    }

    #[test]
    fn second_width_applies_after_first_line() {
        let text = WrappableText::new("aa bb cc dd ee");
        assert_eq!(text.wrap(5, Some(2)), vec!["aa bb", "cc", "dd", "ee"]);
    }

    #[test]
    fn fragments_do_not_break_internally() {
        let text = WrappableText::from_fragments(["hello ruby", "world"]);
        assert_eq!(text.wrap(10, None), vec!["hello ruby", "world"]);
    }

    #[test]
    fn ansi_escapes_do_not_count_toward_width() {
        let text = WrappableText::new("\x1b[1mbold\x1b[0m word");
        assert_eq!(text.wrap(9, None), vec!["\x1b[1mbold\x1b[0m word"]);
    }

    #[test]
    fn oversized_unit_gets_its_own_line() {
        let text = WrappableText::new("tiny enormousunbreakable tiny");
        assert_eq!(
            text.wrap(8, None),
            vec!["tiny", "enormousunbreakable", "tiny"]
        );
    }

    #[test]
    fn empty_text_wraps_to_nothing() {
        assert!(WrappableText::default().wrap(80, None).is_empty());
        assert!(WrappableText::new("").wrap(80, None).is_empty());
    }

    #[test]
    fn display_joins_fragments() {
        let text = WrappableText::from_fragments(["one", "two"]);
        assert_eq!(text.to_string(), "one two");
        assert_eq!(text.len(), 7);
    }
}
