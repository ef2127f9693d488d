use std::sync::Arc;

use include_dir::{Dir, include_dir};
use tracing_subscriber::EnvFilter;

use tooltree::loader::{self, Loader};
use tooltree::parser::{ArgParser, ParserOptions};

static BUILTINS: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/builtins");

fn or_exit(r: anyhow::Result<i32>) -> i32 {
    r.unwrap_or_else(|e| {
        eprintln!("[tooltree] error: {e:#}");
        1
    })
}

fn main() {
    let filter = EnvFilter::try_from_env("TOOLTREE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    std::process::exit(or_exit(run(&args)));
}

fn run(args: &[String]) -> anyhow::Result<i32> {
    let mut loader = Loader::new();
    // Highest priority first: project-local, user-level, embedded builtins.
    for root in loader::default_search_roots() {
        loader.add_path(root, false);
    }
    loader.add_embedded(&BUILTINS, "builtins", false);

    let (tool, remaining) = loader.lookup(args).map_err(anyhow::Error::new)?;
    let subtools = loader
        .list_subtools(tool.full_name(), false, false)
        .map_err(anyhow::Error::new)?;
    let subtool_names: Vec<String> = subtools
        .iter()
        .filter_map(|t| t.simple_name().map(str::to_string))
        .collect();

    let mut parser = ArgParser::new(Arc::clone(&tool), ParserOptions { subtool_names });
    parser.parse(remaining);
    let mut ctx = parser.into_context();

    if !ctx.usage_errors().is_empty() {
        if let Some(handler) = tool.usage_error_handler() {
            tool.prepare_context(&mut ctx);
            return Ok(handler(&mut ctx));
        }
        for error in ctx.usage_errors() {
            eprintln!("[tooltree] {error}");
        }
        return Ok(2);
    }

    if let Some(handler) = tool.run_handler() {
        tool.prepare_context(&mut ctx);
        return Ok(handler(&mut ctx));
    }

    // A namespace: show what lives beneath it.
    let display = if tool.is_root() {
        "tooltree".to_string()
    } else {
        tool.display_name()
    };
    if !tool.desc().is_empty() {
        println!("{}", tool.desc());
    }
    if subtools.is_empty() {
        println!("{display} has no subtools");
    } else {
        println!("Subtools of {display}:");
        for sub in &subtools {
            let desc = sub.desc().to_string();
            if desc.is_empty() {
                println!("  {}", sub.simple_name().unwrap_or_default());
            } else {
                println!("  {}  {desc}", sub.simple_name().unwrap_or_default());
            }
        }
    }
    Ok(0)
}
