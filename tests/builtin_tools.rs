#![allow(clippy::unwrap_used, clippy::expect_used)]

//! The embedded builtin tree follows the same discovery protocol as
//! filesystem sources and always yields to user definitions.

use std::fs;

use include_dir::{Dir, include_dir};
use tooltree::loader::Loader;

static BUILTINS: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/builtins");

fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

#[test]
fn system_namespace_comes_from_embedded_index() {
    let mut loader = Loader::new();
    loader.add_embedded(&BUILTINS, "builtins", false);

    let (tool, _) = loader.lookup(&args(&["system"])).unwrap();
    assert_eq!(tool.desc().to_string(), "Built-in tooltree utilities");
}

#[cfg(feature = "lua")]
#[test]
fn system_version_is_runnable() {
    let mut loader = Loader::new();
    loader.add_embedded(&BUILTINS, "builtins", false);

    let (tool, remaining) = loader.lookup(&args(&["system", "version"])).unwrap();
    assert_eq!(tool.full_name(), ["system", "version"]);
    assert!(remaining.is_empty());
    assert!(tool.is_runnable());
}

#[test]
fn path_sources_shadow_builtins() {
    let tmp = tempfile::tempdir().unwrap();
    fs::create_dir_all(tmp.path().join("system")).unwrap();
    fs::write(
        tmp.path().join("system/version.toml"),
        r#"desc = "overridden version tool""#,
    )
    .unwrap();

    // Mirrors the binary's registration order: paths first, builtins last,
    // all low priority.
    let mut loader = Loader::new();
    loader.add_path(tmp.path(), false);
    loader.add_embedded(&BUILTINS, "builtins", false);

    let (tool, _) = loader.lookup(&args(&["system", "version"])).unwrap();
    assert_eq!(tool.desc().to_string(), "overridden version tool");
}

// Listing loads the whole builtin subtree, run scripts included.
#[cfg(feature = "lua")]
#[test]
fn listing_includes_builtin_tools() {
    let mut loader = Loader::new();
    loader.add_embedded(&BUILTINS, "builtins", false);

    let names: Vec<String> = loader
        .list_subtools(&[], true, false)
        .unwrap()
        .iter()
        .map(|t| t.display_name())
        .collect();
    assert!(names.contains(&"system".to_string()));
    assert!(names.contains(&"system version".to_string()));
}
