//! Sandboxed Luau run handlers.
//!
//! A manifest's `run` script executes in a fresh Luau VM with instruction
//! and memory limits. The parsed context is exposed as globals:
//!
//! - `ctx` — table of parsed data values keyed by flag/arg key
//! - `args` — leftover positional tokens (1-indexed)
//! - `tool_name` — the tool's display name
//! - `tooltree` — `{ version = "..." }`
//!
//! The script's return value becomes the exit code: an integer is used
//! directly, `nil` means success.

use anyhow::Context as _;
use mlua::Lua;
use serde_json::Value;

use crate::context::Context;

/// Default instruction limit for sandboxed execution (1 million
/// instructions).
const DEFAULT_INSTRUCTION_LIMIT: u32 = 1_000_000;

/// Default memory limit for sandboxed execution (16 MB).
const DEFAULT_MEMORY_LIMIT: usize = 16 * 1024 * 1024;

/// Sandboxed Luau execution limits.
pub struct SandboxLimits {
    /// Maximum number of Luau instructions before termination.
    pub instruction_limit: u32,
    /// Maximum memory in bytes the Luau VM may allocate.
    pub memory_limit: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            instruction_limit: DEFAULT_INSTRUCTION_LIMIT,
            memory_limit: DEFAULT_MEMORY_LIMIT,
        }
    }
}

/// Run a tool's Luau script with default limits. `prelude` holds library
/// code gathered from `.preload` files up the tool's directory chain.
pub fn run_script(script: &str, prelude: &str, ctx: &Context) -> anyhow::Result<i32> {
    run_script_limited(script, prelude, ctx, &SandboxLimits::default())
}

pub fn run_script_limited(
    script: &str,
    prelude: &str,
    ctx: &Context,
    limits: &SandboxLimits,
) -> anyhow::Result<i32> {
    // mlua's Luau VM sandboxes by default: os, io, package, etc. are nil.
    let lua = Lua::new();
    let _ = lua.set_memory_limit(limits.memory_limit);

    // Per-invocation counter; the interrupt handler runs synchronously on
    // the VM's single thread, so Relaxed ordering is safe.
    let counter = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
    let instruction_limit = limits.instruction_limit;
    lua.set_interrupt(move |_lua| {
        // The Luau interrupt fires roughly every ~1000 VM instructions.
        let calls = counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        if calls.saturating_mul(1000) >= instruction_limit {
            return Ok(mlua::VmState::Yield);
        }
        Ok(mlua::VmState::Continue)
    });

    let data_table = lua.create_table().context("create ctx table")?;
    for (key, value) in ctx.data() {
        data_table
            .set(key.as_str(), json_to_lua(&lua, value)?)
            .with_context(|| format!("set ctx[{key:?}]"))?;
    }
    lua.globals().set("ctx", data_table).context("set ctx global")?;

    let args_table = lua.create_table().context("create args table")?;
    for (i, arg) in ctx.args().iter().enumerate() {
        args_table
            .set(i + 1, arg.as_str())
            .with_context(|| format!("set args[{}]", i + 1))?;
    }
    lua.globals().set("args", args_table).context("set args global")?;

    lua.globals()
        .set("tool_name", ctx.tool_name().join(" "))
        .context("set tool_name global")?;

    let meta = lua.create_table().context("create tooltree table")?;
    meta.set("version", env!("CARGO_PKG_VERSION"))
        .context("set tooltree.version")?;
    lua.globals().set("tooltree", meta).context("set tooltree global")?;

    let source = if prelude.is_empty() {
        script.to_string()
    } else {
        format!("{prelude}\n{script}")
    };
    let value: mlua::Value = lua
        .load(&source)
        .eval()
        .context("sandboxed run script execution")?;

    match value {
        mlua::Value::Nil => Ok(0),
        mlua::Value::Integer(code) => Ok(i32::try_from(code).unwrap_or(1)),
        mlua::Value::Number(code) => Ok(code as i32),
        other => Err(anyhow::anyhow!(
            "run script must return an integer or nil, got {}",
            other.type_name()
        )),
    }
}

fn json_to_lua(lua: &Lua, value: &Value) -> anyhow::Result<mlua::Value> {
    Ok(match value {
        Value::Null => mlua::Value::Nil,
        Value::Bool(b) => mlua::Value::Boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                mlua::Value::Integer(i)
            } else {
                mlua::Value::Number(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => mlua::Value::String(lua.create_string(s)?),
        Value::Array(items) => {
            let table = lua.create_table()?;
            for (i, item) in items.iter().enumerate() {
                table.set(i + 1, json_to_lua(lua, item)?)?;
            }
            mlua::Value::Table(table)
        }
        Value::Object(map) => {
            let table = lua.create_table()?;
            for (key, item) in map {
                table.set(key.as_str(), json_to_lua(lua, item)?)?;
            }
            mlua::Value::Table(table)
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::{BTreeMap, BTreeSet};

    /// Tiny limits for tests; the Luau VM needs ~512 KB for its own
    /// baseline allocations.
    fn test_limits() -> SandboxLimits {
        SandboxLimits {
            instruction_limit: 100_000,
            memory_limit: 512 * 1024,
        }
    }

    fn ctx_with(data: BTreeMap<String, serde_json::Value>, args: Vec<String>) -> Context {
        Context::new(
            vec!["greet".to_string()],
            data,
            args,
            vec![],
            BTreeSet::new(),
            None,
            None,
        )
    }

    #[test]
    fn nil_return_is_success() {
        let ctx = ctx_with(BTreeMap::new(), vec![]);
        assert_eq!(run_script_limited("return nil", "", &ctx, &test_limits()).unwrap(), 0);
    }

    #[test]
    fn integer_return_is_exit_code() {
        let ctx = ctx_with(BTreeMap::new(), vec![]);
        assert_eq!(run_script_limited("return 3", "", &ctx, &test_limits()).unwrap(), 3);
    }

    #[test]
    fn ctx_values_are_visible() {
        let mut data = BTreeMap::new();
        data.insert("count".to_string(), json!(2));
        data.insert("verbose".to_string(), json!(true));
        let ctx = ctx_with(data, vec![]);
        let script = "if ctx.verbose and ctx.count == 2 then return 0 else return 1 end";
        assert_eq!(run_script_limited(script, "", &ctx, &test_limits()).unwrap(), 0);
    }

    #[test]
    fn args_and_tool_name_are_visible() {
        let ctx = ctx_with(BTreeMap::new(), vec!["x".to_string(), "y".to_string()]);
        let script = r#"if args[2] == "y" and tool_name == "greet" then return 0 end return 1"#;
        assert_eq!(run_script_limited(script, "", &ctx, &test_limits()).unwrap(), 0);
    }

    #[test]
    fn prelude_defines_helpers() {
        let ctx = ctx_with(BTreeMap::new(), vec![]);
        let prelude = "local function double(n) return n * 2 end\nhelpers = { double = double }";
        let script = "return helpers.double(2) - 4";
        assert_eq!(
            run_script_limited(script, prelude, &ctx, &test_limits()).unwrap(),
            0
        );
    }

    #[test]
    fn os_blocked_by_sandbox() {
        let ctx = ctx_with(BTreeMap::new(), vec![]);
        let result = run_script_limited(r#"return os.execute("id")"#, "", &ctx, &test_limits());
        assert!(result.is_err());
    }

    #[test]
    fn infinite_loop_is_terminated() {
        let ctx = ctx_with(BTreeMap::new(), vec![]);
        let limits = SandboxLimits {
            instruction_limit: 1_000,
            memory_limit: 128 * 1024,
        };
        let result = run_script_limited("while true do end", "", &ctx, &limits);
        assert!(result.is_err(), "infinite loop should be terminated");
    }
}
