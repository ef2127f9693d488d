#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use serde_json::json;

use super::*;
use crate::error::DefinitionErrorKind;
use crate::flag::{FlagResolution, FlagSpec};
use crate::loader::Loader;

fn tool() -> Tool {
    Tool::new(vec!["demo".to_string()], 0)
}

// --- keys, accessors, defaults ---

#[test]
fn duplicate_key_rejected_across_flags_and_args() {
    let mut t = tool();
    t.add_flag(FlagSpec::new("input").syntax("-i VALUE")).unwrap();
    let err = t.add_required_arg(ArgSpec::new("input")).unwrap_err();
    assert!(matches!(err.kind, DefinitionErrorKind::DuplicateKey { .. }));
}

#[test]
fn flag_default_lands_in_default_data() {
    let mut t = tool();
    t.add_flag(FlagSpec::new("level").syntax("--level=NUM").default(json!(3)))
        .unwrap();
    assert_eq!(t.default_data()["level"], json!(3));
}

#[test]
fn accessor_rules() {
    let mut t = tool();
    t.add_flag(FlagSpec::new("verbose").syntax("-v")).unwrap();
    assert!(t.accessor_keys().contains("verbose"));

    // Leading underscore and reserved names never become accessors.
    t.add_flag(FlagSpec::new("_internal").syntax("-x")).unwrap();
    assert!(!t.accessor_keys().contains("_internal"));
    t.add_flag(FlagSpec::new("options").syntax("-o")).unwrap();
    assert!(!t.accessor_keys().contains("options"));

    // Forcing works, except for run/initialize.
    t.static_value("options2", json!(1)).unwrap();
    assert!(t.accessor_keys().contains("options2"));
    let err = t.static_value("run", json!(1)).unwrap_err();
    assert!(matches!(err.kind, DefinitionErrorKind::ReservedAccessor { .. }));
}

// --- used flags and disabling ---

#[test]
fn used_flags_cover_negative_spellings() {
    let mut t = tool();
    t.add_flag(FlagSpec::new("color").syntax("--[no-]color")).unwrap();
    assert!(t.used_flags().contains("--color"));
    assert!(t.used_flags().contains("--no-color"));
}

#[test]
fn disable_flag_reserves_and_conflicts() {
    let mut t = tool();
    t.disable_flag(["-x"]).unwrap();
    // A later flag wanting -x collides.
    let err = t.add_flag(FlagSpec::new("x").syntax("-x")).unwrap_err();
    assert!(matches!(err.kind, DefinitionErrorKind::FlagCollision { .. }));

    t.add_flag(FlagSpec::new("v").syntax("-v")).unwrap();
    let err = t.disable_flag(["-v"]).unwrap_err();
    assert!(matches!(err.kind, DefinitionErrorKind::DisableActiveFlag { .. }));
}

#[test]
fn colliding_flag_drops_spelling_silently_when_configured() {
    let mut t = tool();
    t.add_flag(FlagSpec::new("verbose").syntax("-v")).unwrap();
    t.add_flag(
        FlagSpec::new("version")
            .syntaxes(["-v", "--version"])
            .report_collisions(false),
    )
    .unwrap();
    let flag = t.flag("version").unwrap();
    assert_eq!(flag.syntaxes().len(), 1);

    // Effective flag strings stay pairwise disjoint.
    let mut all: Vec<&str> = t.flags().iter().flat_map(|f| f.effective_flags()).collect();
    let before = all.len();
    all.sort_unstable();
    all.dedup();
    assert_eq!(before, all.len());
}

// --- delegation and parsing policies ---

#[test]
fn delegate_excludes_flags_args_and_handler() {
    let mut t = tool();
    t.delegate_to(vec!["other".to_string()]).unwrap();
    assert!(t.add_flag(FlagSpec::new("a").syntax("-a")).is_err());
    assert!(t.add_required_arg(ArgSpec::new("x")).is_err());
    assert!(t.set_run_handler(Arc::new(|_| 0)).is_err());

    let mut t2 = tool();
    t2.add_flag(FlagSpec::new("a").syntax("-a")).unwrap();
    assert!(t2.delegate_to(vec!["other".to_string()]).is_err());
}

#[test]
fn disabled_parsing_excludes_flags_and_args() {
    let mut t = tool();
    t.disable_argument_parsing().unwrap();
    assert!(t.add_flag(FlagSpec::new("a").syntax("-a")).is_err());
    assert!(t.enforce_flags_before_args().is_err());

    let mut t2 = tool();
    t2.add_flag(FlagSpec::new("a").syntax("-a")).unwrap();
    assert!(t2.disable_argument_parsing().is_err());
}

#[test]
fn arg_after_remaining_rejected() {
    let mut t = tool();
    t.set_remaining_args(ArgSpec::new("rest")).unwrap();
    let err = t.add_optional_arg(ArgSpec::new("late")).unwrap_err();
    assert!(matches!(err.kind, DefinitionErrorKind::ArgAfterRemaining { .. }));
}

// --- resolution ---

#[test]
fn resolve_flag_exact_prefix_ambiguous() {
    let mut t = tool();
    t.add_flag(FlagSpec::new("ab").syntax("--ab")).unwrap();
    t.add_flag(FlagSpec::new("abc").syntax("--abc")).unwrap();
    t.add_flag(FlagSpec::new("abd").syntax("--abd")).unwrap();

    assert!(matches!(t.resolve_flag("--ab"), FlagResolution::Unique(m) if m.flag.key() == "ab"));
    assert!(matches!(t.resolve_flag("--abc"), FlagResolution::Unique(_)));
    // "--a" prefixes three flags.
    assert!(matches!(t.resolve_flag("--a"), FlagResolution::Multiple(c) if c.len() == 3));
    assert!(matches!(t.resolve_flag("--zz"), FlagResolution::NotFound));
    // Short flags never match by prefix.
    assert!(matches!(t.resolve_flag("-a"), FlagResolution::NotFound));
}

#[test]
fn resolve_flag_negative_spelling() {
    let mut t = tool();
    t.add_flag(FlagSpec::new("color").syntax("--[no-]color")).unwrap();
    assert!(matches!(
        t.resolve_flag("--no-color"),
        FlagResolution::Unique(m) if m.negated
    ));
    assert!(matches!(
        t.resolve_flag("--color"),
        FlagResolution::Unique(m) if !m.negated
    ));
}

#[test]
fn exact_match_required_skips_prefix_step() {
    let mut t = tool();
    t.add_flag(FlagSpec::new("verbose").syntax("--verbose")).unwrap();
    t.require_exact_flag_match().unwrap();
    assert!(matches!(t.resolve_flag("--verb"), FlagResolution::NotFound));
    assert!(matches!(t.resolve_flag("--verbose"), FlagResolution::Unique(_)));
}

// --- registries, mixins, templates ---

#[test]
fn registry_lookup_walks_ancestry() {
    let mut parent = Tool::new(vec!["ns".to_string()], 0);
    parent
        .add_acceptor("port", crate::acceptor::AcceptorSpec::Range {
            min: 1.0,
            max: 65535.0,
            integer: true,
        }, None)
        .unwrap();
    let inheritance = Inheritance::of(&parent);
    let child = Tool::new_child(vec!["ns".to_string(), "serve".to_string()], 0, &inheritance);
    assert!(child.lookup_acceptor("port").is_some());
    // Well-known names resolve as a fallback.
    assert!(child.lookup_acceptor("integer").is_some());
    assert!(child.lookup_acceptor("bogus").is_none());
}

#[test]
fn nearest_registration_wins() {
    let mut parent = Tool::new(vec!["ns".to_string()], 0);
    parent
        .add_acceptor("mode", crate::acceptor::AcceptorSpec::Values(vec!["slow".into()]), None)
        .unwrap();
    let inheritance = Inheritance::of(&parent);
    let mut child = Tool::new_child(vec!["ns".to_string(), "x".to_string()], 0, &inheritance);
    child
        .add_acceptor("mode", crate::acceptor::AcceptorSpec::Values(vec!["fast".into()]), None)
        .unwrap();
    let acceptor = child.lookup_acceptor("mode").unwrap();
    assert!(acceptor.accept("fast").is_some());
    assert!(acceptor.accept("slow").is_none());
}

#[test]
fn mixin_tables_merge_later_wins() {
    let mut t = tool();
    let mut first = Mixin::default();
    first.table.insert("region".to_string(), json!("us-east"));
    first.table.insert("retries".to_string(), json!(1));
    let mut second = Mixin::default();
    second.table.insert("region".to_string(), json!("eu-west"));
    t.add_mixin("defaults", first).unwrap();
    t.add_mixin("overrides", second).unwrap();
    t.include_mixin("defaults").unwrap();
    t.include_mixin("overrides").unwrap();

    let mut ctx = crate::context::Context::default();
    t.prepare_context(&mut ctx);
    assert_eq!(ctx.get("region"), Some(&json!("eu-west")));
    assert_eq!(ctx.get("retries"), Some(&json!(1)));

    assert!(t.include_mixin("missing").is_err());
}

#[test]
fn parsed_data_shadows_mixin_table() {
    let mut t = tool();
    let mut mixin = Mixin::default();
    mixin.table.insert("region".to_string(), json!("us-east"));
    t.add_mixin("defaults", mixin).unwrap();
    t.include_mixin("defaults").unwrap();

    let mut ctx = crate::context::Context::default();
    ctx.set("region", json!("from-args"));
    t.prepare_context(&mut ctx);
    assert_eq!(ctx.get("region"), Some(&json!("from-args")));
}

#[test]
fn template_expansion_mutates_tool() {
    let mut t = tool();
    t.add_template(
        "with-verbose",
        Arc::new(|tool, args| {
            let key = args.as_str().unwrap_or("verbose").to_string();
            tool.add_flag(FlagSpec::new(key).syntax("-v"))
        }),
    )
    .unwrap();
    t.expand_template("with-verbose", &json!("chatty")).unwrap();
    assert!(t.flag("chatty").is_some());
    assert!(t.expand_template("missing", &json!(null)).is_err());
}

// --- handlers ---

#[test]
fn most_recently_set_handler_wins() {
    let mut t = tool();
    t.set_interrupt_handler(Arc::new(|_| 10)).unwrap();
    t.set_interrupt_handler(Arc::new(|_| 20)).unwrap();
    let mut ctx = crate::context::Context::default();
    let handler = t.interrupt_handler().unwrap();
    assert_eq!(handler(&mut ctx), 20);
}

#[test]
fn run_handler_redefinition_conflicts_at_same_priority() {
    let mut t = tool();
    t.set_run_handler(Arc::new(|_| 0)).unwrap();
    let err = t.set_run_handler(Arc::new(|_| 1)).unwrap_err();
    assert!(matches!(err.kind, DefinitionErrorKind::FieldConflict { .. }));
}

#[test]
fn desc_conflict_only_at_same_priority() {
    let mut t = tool();
    t.set_desc("first").unwrap();
    assert!(t.set_desc("again").is_err());

    // A higher-priority pass may replace it.
    t.set_priority(5);
    t.set_desc("higher").unwrap();
    assert_eq!(t.desc().to_string(), "higher");

    // A lower-priority pass is ignored, not an error.
    t.set_priority(-5);
    t.set_desc("lower").unwrap();
    assert_eq!(t.desc().to_string(), "higher");
}

// --- finish ---

#[test]
fn finish_definition_sorts_groups_and_freezes() {
    let loader = Loader::new();
    let mut t = tool();
    t.add_flag(FlagSpec::new("zeta").syntax("--zeta")).unwrap();
    t.add_flag(FlagSpec::new("alpha").syntax("--alpha")).unwrap();
    t.finish_definition(&loader).unwrap();

    assert!(t.definition_finished());
    assert_eq!(t.flag_groups()[0].flag_keys(), ["alpha", "zeta"]);

    // Frozen: definition calls now fail; finishing again is fine.
    assert!(t.add_flag(FlagSpec::new("late").syntax("--late")).is_err());
    t.finish_definition(&loader).unwrap();
}

#[test]
fn middleware_config_hook_runs_at_finish() {
    struct AddsVerbose;
    impl crate::loader::Middleware for AddsVerbose {
        fn config(&self, tool: &mut Tool, _loader: &Loader) -> Result<(), DefinitionError> {
            tool.add_flag(FlagSpec::new("verbose").syntax("--verbose"))
        }
    }
    let mut loader = Loader::new();
    loader.add_middleware("verbosity", Arc::new(AddsVerbose));
    let mut t = tool();
    t.use_middleware("verbosity").unwrap();
    t.finish_definition(&loader).unwrap();
    assert!(t.flag("verbose").is_some());
}
