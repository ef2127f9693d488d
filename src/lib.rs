//! tooltree — a framework for composable, hierarchical command-line tool
//! suites.
//!
//! Tools are declared in TOML manifest files laid out on the filesystem
//! (or in memory, or in a fetched git tree). The [`loader::Loader`]
//! discovers them lazily under priority rules and resolves an invocation
//! to exactly one [`tool::Tool`]; the [`parser::ArgParser`] consumes the
//! remaining arguments against that tool's declared interface and produces
//! a [`context::Context`] for its run handler.
//!
//! ```no_run
//! use tooltree::loader::Loader;
//! use tooltree::parser::ArgParser;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut loader = Loader::new();
//! for root in tooltree::loader::default_search_roots() {
//!     loader.add_path(root, false);
//! }
//! let args: Vec<String> = std::env::args().skip(1).collect();
//! let (tool, remaining) = loader.lookup(&args)?;
//! let mut parser = ArgParser::for_tool(tool.clone());
//! parser.parse(remaining);
//! let mut ctx = parser.into_context();
//! if let Some(handler) = tool.run_handler() {
//!     tool.prepare_context(&mut ctx);
//!     std::process::exit(handler(&mut ctx));
//! }
//! # Ok(())
//! # }
//! ```

pub mod acceptor;
pub mod completion;
pub mod context;
pub mod error;
pub mod flag;
pub mod loader;
#[cfg(feature = "lua")]
pub mod lua;
pub mod parser;
pub mod source_info;
pub mod tool;
pub mod util;
pub mod wrap;

pub use serde_json::Value;
