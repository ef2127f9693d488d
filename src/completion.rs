//! Completion candidate producers.
//!
//! A completion yields candidates for the fragment being typed, given the
//! prefix context that precedes it. Candidates marked `partial` get no word
//! break appended by the shell transport (directories, for example).

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use regex::Regex;

/// One completion candidate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Candidate {
    pub string: String,
    /// `true` means no word break is appended after this candidate.
    pub partial: bool,
}

impl Candidate {
    pub fn new(string: impl Into<String>) -> Self {
        Self {
            string: string.into(),
            partial: false,
        }
    }

    pub fn partial(string: impl Into<String>) -> Self {
        Self {
            string: string.into(),
            partial: true,
        }
    }
}

/// The fragment under completion and its surrounding context.
#[derive(Debug, Clone)]
pub struct CompletionContext {
    /// The partial word being completed.
    pub fragment: String,
    /// Everything on the line before the fragment.
    pub fragment_prefix: String,
    /// Working directory for filesystem completions.
    pub cwd: Option<PathBuf>,
}

impl CompletionContext {
    pub fn new(fragment: impl Into<String>, fragment_prefix: impl Into<String>) -> Self {
        Self {
            fragment: fragment.into(),
            fragment_prefix: fragment_prefix.into(),
            cwd: None,
        }
    }

    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

pub type CompletionFn = Arc<dyn Fn(&CompletionContext) -> Vec<Candidate> + Send + Sync>;

/// A polymorphic producer of completion candidates.
#[derive(Clone, Default)]
pub enum Completion {
    /// Always yields no candidates.
    #[default]
    Empty,
    /// Yields every value beginning with the fragment. When
    /// `prefix_constraint` is set and does not match the fragment prefix,
    /// yields nothing.
    Values {
        values: Vec<String>,
        prefix_constraint: Option<Regex>,
    },
    /// Yields filesystem entries matching the fragment as a glob prefix.
    /// Directories come back as partial candidates.
    FileSystem {
        cwd: Option<PathBuf>,
        include_files: bool,
        include_dirs: bool,
    },
    /// User-supplied candidate producer.
    Function(CompletionFn),
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Completion::Empty"),
            Self::Values { values, .. } => {
                write!(f, "Completion::Values({} values)", values.len())
            }
            Self::FileSystem { .. } => f.write_str("Completion::FileSystem"),
            Self::Function(_) => f.write_str("Completion::Function"),
        }
    }
}

impl Completion {
    pub fn values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Values {
            values: values.into_iter().map(Into::into).collect(),
            prefix_constraint: None,
        }
    }

    pub fn file_system() -> Self {
        Self::FileSystem {
            cwd: None,
            include_files: true,
            include_dirs: true,
        }
    }

    /// Produce candidates for `ctx`, sorted and deduplicated.
    pub fn candidates(&self, ctx: &CompletionContext) -> Vec<Candidate> {
        let mut out = match self {
            Self::Empty => Vec::new(),
            Self::Values {
                values,
                prefix_constraint,
            } => {
                if let Some(constraint) = prefix_constraint
                    && !constraint.is_match(&ctx.fragment_prefix)
                {
                    return Vec::new();
                }
                values
                    .iter()
                    .filter(|v| v.starts_with(&ctx.fragment))
                    .map(Candidate::new)
                    .collect()
            }
            Self::FileSystem {
                cwd,
                include_files,
                include_dirs,
            } => {
                let base = cwd
                    .clone()
                    .or_else(|| ctx.cwd.clone())
                    .or_else(|| std::env::current_dir().ok());
                base.map_or_else(Vec::new, |base| {
                    file_system_candidates(&base, &ctx.fragment, *include_files, *include_dirs)
                })
            }
            Self::Function(func) => func(ctx),
        };
        out.sort();
        out.dedup();
        out
    }
}

/// Expand the fragment as a glob prefix under `base` and classify matches.
fn file_system_candidates(
    base: &std::path::Path,
    fragment: &str,
    include_files: bool,
    include_dirs: bool,
) -> Vec<Candidate> {
    let pattern = format!("{}*", base.join(fragment).display());
    let Ok(paths) = glob::glob(&pattern) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for path in paths.flatten() {
        let Ok(relative) = path.strip_prefix(base) else {
            continue;
        };
        let text = relative.to_string_lossy().into_owned();
        if path.is_dir() {
            if include_dirs {
                out.push(Candidate::partial(format!("{text}/")));
            }
        } else if include_files {
            out.push(Candidate::new(text));
        }
    }
    out
}
