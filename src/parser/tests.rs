#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use serde_json::{Value, json};

use super::*;
use crate::acceptor::AcceptorSpec;
use crate::flag::FlagSpec;
use crate::tool::{ArgSpec, GroupSpec, Tool};

fn tool(build: impl FnOnce(&mut Tool)) -> Arc<Tool> {
    let mut t = Tool::new(vec!["foo".to_string()], 0);
    build(&mut t);
    Arc::new(t)
}

fn runnable(build: impl FnOnce(&mut Tool)) -> Arc<Tool> {
    tool(|t| {
        t.set_run_handler(Arc::new(|_ctx| 0)).unwrap();
        build(t);
    })
}

fn counter_handler() -> FlagHandler {
    FlagHandler::Custom(Arc::new(|_new, cur| json!(cur.as_i64().unwrap_or(0) + 1)))
}

// --- basic flags ---

#[test]
fn boolean_flag_sets_true() {
    let t = tool(|t| {
        t.add_flag(FlagSpec::new("a").syntaxes(["-a", "--aa"])).unwrap();
    });
    let mut parser = ArgParser::for_tool(Arc::clone(&t));
    parser.parse(["--aa"]).finish();
    assert_eq!(parser.data()["a"], json!(true));
    assert!(parser.errors().is_empty());

    let mut parser = ArgParser::for_tool(t);
    parser.parse(Vec::<String>::new()).finish();
    assert_eq!(parser.data()["a"], Value::Null);
    assert!(parser.errors().is_empty());
}

#[test]
fn parsed_args_records_every_token() {
    let t = tool(|t| {
        t.add_flag(FlagSpec::new("a").syntax("-a")).unwrap();
    });
    let mut parser = ArgParser::for_tool(t);
    parser.parse(["-a", "--bogus", "stray"]).finish();
    assert_eq!(parser.parsed_args(), ["-a", "--bogus", "stray"]);
}

#[test]
fn squashed_short_cluster_with_value() {
    let t = tool(|t| {
        t.add_flag(
            FlagSpec::new("a")
                .syntax("-a")
                .default(json!(0))
                .handler(counter_handler()),
        )
        .unwrap();
        t.add_flag(FlagSpec::new("b").syntax("-b VALUE")).unwrap();
    });
    let mut parser = ArgParser::for_tool(t);
    parser.parse(["-aaba", "-a"]).finish();
    assert!(parser.errors().is_empty(), "{:?}", parser.errors());
    assert_eq!(parser.data()["a"], json!(3));
    assert_eq!(parser.data()["b"], json!("a"));
}

#[test]
fn short_value_flag_takes_next_token() {
    let t = tool(|t| {
        t.add_flag(FlagSpec::new("b").syntax("-b VALUE")).unwrap();
    });
    let mut parser = ArgParser::for_tool(t);
    parser.parse(["-b", "--looks-like-a-flag"]).finish();
    // A required value consumes the next token unconditionally.
    assert_eq!(parser.data()["b"], json!("--looks-like-a-flag"));
    assert!(parser.errors().is_empty());
}

#[test]
fn unknown_short_char_ends_cluster() {
    let t = tool(|t| {
        t.add_flag(FlagSpec::new("a").syntax("-a")).unwrap();
    });
    let mut parser = ArgParser::for_tool(t);
    parser.parse(["-az"]).finish();
    assert_eq!(parser.data()["a"], json!(true));
    assert!(matches!(
        &parser.errors()[0],
        UsageError::UnknownFlag { flag, .. } if flag == "-z"
    ));
}

// --- prefix and exact matching ---

#[test]
fn exact_match_beats_prefix() {
    let t = tool(|t| {
        t.add_flag(FlagSpec::new("ab").syntax("--ab")).unwrap();
        t.add_flag(FlagSpec::new("abc").syntax("--abc")).unwrap();
    });
    let mut parser = ArgParser::for_tool(t);
    parser.parse(["--ab"]).finish();
    assert!(parser.errors().is_empty());
    assert_eq!(parser.data()["ab"], json!(true));
    assert_eq!(parser.data()["abc"], Value::Null);
}

#[test]
fn unique_prefix_resolves() {
    let t = tool(|t| {
        t.add_flag(FlagSpec::new("verbose").syntax("--verbose")).unwrap();
    });
    let mut parser = ArgParser::for_tool(t);
    parser.parse(["--verb"]).finish();
    assert!(parser.errors().is_empty());
    assert_eq!(parser.data()["verbose"], json!(true));
}

#[test]
fn exact_match_required_rejects_prefix_with_suggestion() {
    let t = tool(|t| {
        t.add_flag(FlagSpec::new("abcde").syntax("--abcde")).unwrap();
        t.require_exact_flag_match().unwrap();
    });
    let mut parser = ArgParser::for_tool(t);
    parser.parse(["--abcd"]).finish();
    match &parser.errors()[0] {
        UsageError::UnknownFlag { flag, suggestions } => {
            assert_eq!(flag, "--abcd");
            assert_eq!(suggestions, &["--abcde".to_string()]);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn ambiguous_prefix_reports_candidates() {
    let t = tool(|t| {
        t.add_flag(FlagSpec::new("abc").syntax("--abc")).unwrap();
        t.add_flag(FlagSpec::new("abd").syntax("--abd")).unwrap();
    });
    let mut parser = ArgParser::for_tool(t);
    parser.parse(["--ab"]).finish();
    match &parser.errors()[0] {
        UsageError::AmbiguousFlag { flag, candidates } => {
            assert_eq!(flag, "--ab");
            assert_eq!(candidates, &["--abc".to_string(), "--abd".to_string()]);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

// --- values ---

#[test]
fn long_flag_attached_and_detached_values() {
    let t = tool(|t| {
        t.add_flag(FlagSpec::new("name").syntax("--name=VALUE")).unwrap();
    });
    let mut parser = ArgParser::for_tool(Arc::clone(&t));
    parser.parse(["--name=ruby"]).finish();
    assert_eq!(parser.data()["name"], json!("ruby"));

    let mut parser = ArgParser::for_tool(t);
    parser.parse(["--name", "rust"]).finish();
    assert_eq!(parser.data()["name"], json!("rust"));
}

#[test]
fn optional_value_defaults_to_true_before_flag() {
    let t = tool(|t| {
        t.add_flag(FlagSpec::new("color").syntax("--color=[WHEN]")).unwrap();
        t.add_flag(FlagSpec::new("verbose").syntax("--verbose")).unwrap();
    });
    let mut parser = ArgParser::for_tool(Arc::clone(&t));
    parser.parse(["--color", "--verbose"]).finish();
    assert_eq!(parser.data()["color"], json!(true));
    assert_eq!(parser.data()["verbose"], json!(true));

    let mut parser = ArgParser::for_tool(t);
    parser.parse(["--color", "auto"]).finish();
    assert_eq!(parser.data()["color"], json!("auto"));
}

#[test]
fn optional_value_pending_at_finish_becomes_true() {
    let t = tool(|t| {
        t.add_flag(FlagSpec::new("color").syntax("--color=[WHEN]")).unwrap();
    });
    let mut parser = ArgParser::for_tool(t);
    parser.parse(["--color"]).finish();
    assert_eq!(parser.data()["color"], json!(true));
    assert!(parser.errors().is_empty());
}

#[test]
fn required_value_missing_at_finish() {
    let t = tool(|t| {
        t.add_flag(FlagSpec::new("name").syntax("--name=VALUE")).unwrap();
    });
    let mut parser = ArgParser::for_tool(t);
    parser.parse(["--name"]).finish();
    assert!(matches!(
        &parser.errors()[0],
        UsageError::FlagMissingValue { flag } if flag == "--name"
    ));
}

#[test]
fn boolean_flag_rejects_attached_value() {
    let t = tool(|t| {
        t.add_flag(FlagSpec::new("a").syntax("--aa")).unwrap();
    });
    let mut parser = ArgParser::for_tool(t);
    parser.parse(["--aa=yes"]).finish();
    assert!(matches!(
        &parser.errors()[0],
        UsageError::FlagShouldNotTakeValue { flag, value } if flag == "--aa" && value == "yes"
    ));
    assert_eq!(parser.data()["a"], Value::Null);
}

#[test]
fn invalid_flag_value_reports_and_keeps_data() {
    let t = tool(|t| {
        t.add_flag(
            FlagSpec::new("level")
                .syntax("--level=NUM")
                .accept(crate::acceptor::Acceptor::well_known("integer").unwrap())
                .default(json!(1)),
        )
        .unwrap();
    });
    let mut parser = ArgParser::for_tool(t);
    parser.parse(["--level=high"]).finish();
    assert!(matches!(
        &parser.errors()[0],
        UsageError::InvalidFlagValue { flag, value, .. } if flag == "--level" && value == "high"
    ));
    assert_eq!(parser.data()["level"], json!(1));
}

// --- negation ---

#[test]
fn negatable_boolean_sets_false() {
    let t = tool(|t| {
        t.add_flag(FlagSpec::new("color").syntax("--[no-]color")).unwrap();
    });
    let mut parser = ArgParser::for_tool(Arc::clone(&t));
    parser.parse(["--no-color"]).finish();
    assert_eq!(parser.data()["color"], json!(false));

    let mut parser = ArgParser::for_tool(t);
    parser.parse(["--color"]).finish();
    assert_eq!(parser.data()["color"], json!(true));
}

#[test]
fn unknown_negation_suggests_positive_form() {
    let t = tool(|t| {
        t.add_flag(FlagSpec::new("color").syntax("--color")).unwrap();
    });
    let mut parser = ArgParser::for_tool(t);
    parser.parse(["--no-color"]).finish();
    match &parser.errors()[0] {
        UsageError::UnknownFlag { flag, suggestions } => {
            assert_eq!(flag, "--no-color");
            assert_eq!(suggestions[0], "--color");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

// --- end of flags, lone dash ---

#[test]
fn double_dash_ends_flag_parsing() {
    let t = runnable(|t| {
        t.add_flag(FlagSpec::new("a").syntax("-a")).unwrap();
        t.add_optional_arg(ArgSpec::new("first")).unwrap();
        t.add_optional_arg(ArgSpec::new("second")).unwrap();
    });
    let mut parser = ArgParser::for_tool(t);
    parser.parse(["--", "-a", "plain"]).finish();
    assert_eq!(parser.data()["first"], json!("-a"));
    assert_eq!(parser.data()["second"], json!("plain"));
    assert_eq!(parser.data()["a"], Value::Null);
}

#[test]
fn single_dash_is_positional() {
    let t = runnable(|t| {
        t.add_optional_arg(ArgSpec::new("input")).unwrap();
    });
    let mut parser = ArgParser::for_tool(t);
    parser.parse(["-"]).finish();
    assert_eq!(parser.data()["input"], json!("-"));
    assert!(parser.errors().is_empty());
}

#[test]
fn bare_double_dash_equals_is_unknown_flag() {
    let t = tool(|_t| {});
    let mut parser = ArgParser::for_tool(t);
    parser.parse(["--=x"]).finish();
    assert!(matches!(
        &parser.errors()[0],
        UsageError::UnknownFlag { flag, .. } if flag == "--"
    ));
}

// --- positionals ---

#[test]
fn positional_order_required_then_optional_then_remaining() {
    let t = runnable(|t| {
        t.add_required_arg(ArgSpec::new("src")).unwrap();
        t.add_optional_arg(ArgSpec::new("dest")).unwrap();
        t.set_remaining_args(ArgSpec::new("extras")).unwrap();
    });
    let mut parser = ArgParser::for_tool(t);
    parser.parse(["a", "b", "c", "d"]).finish();
    assert_eq!(parser.data()["src"], json!("a"));
    assert_eq!(parser.data()["dest"], json!("b"));
    assert_eq!(parser.data()["extras"], json!(["c", "d"]));
    assert!(parser.errors().is_empty());
}

#[test]
fn missing_required_arg_reported_by_display_name() {
    let t = runnable(|t| {
        t.add_required_arg(ArgSpec::new("src-file")).unwrap();
    });
    let mut parser = ArgParser::for_tool(t);
    parser.parse(Vec::<String>::new()).finish();
    assert!(matches!(
        &parser.errors()[0],
        UsageError::MissingRequiredArg { arg } if arg == "SRC_FILE"
    ));
}

#[test]
fn extra_arguments_coalesce_on_runnable_tool() {
    let t = runnable(|t| {
        t.add_optional_arg(ArgSpec::new("only")).unwrap();
    });
    let mut parser = ArgParser::for_tool(t);
    parser.parse(["one", "two", "three"]).finish();
    assert!(matches!(
        &parser.errors()[0],
        UsageError::ExtraArguments { args } if args == &["two".to_string(), "three".to_string()]
    ));
}

#[test]
fn unmatched_positional_on_namespace_becomes_tool_not_found() {
    let t = tool(|_t| {});
    let mut parser = ArgParser::new(
        t,
        ParserOptions {
            subtool_names: vec!["build".to_string(), "deploy".to_string()],
        },
    );
    parser.parse(["biuld".to_string()]).finish();
    match &parser.errors()[0] {
        UsageError::ToolNotFound { words, suggestions } => {
            assert_eq!(words, &["foo".to_string(), "biuld".to_string()]);
            assert_eq!(suggestions, &["build".to_string()]);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn enum_arg_suggests_near_miss() {
    let t = runnable(|t| {
        t.add_acceptor(
            "name",
            AcceptorSpec::Values(vec![
                "Robb".to_string(),
                "Sansa".to_string(),
                "Arya".to_string(),
            ]),
            None,
        )
        .unwrap();
        t.add_required_arg(ArgSpec::new("who").accept_name("name")).unwrap();
    });
    let mut parser = ArgParser::for_tool(t);
    parser.parse(["Ara"]).finish();
    match &parser.errors()[0] {
        UsageError::InvalidArgValue {
            arg,
            value,
            suggestions,
        } => {
            assert_eq!(arg, "WHO");
            assert_eq!(value, "Ara");
            assert_eq!(suggestions, &["Arya".to_string()]);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

// --- groups ---

#[test]
fn exactly_one_group_validation() {
    let t = || {
        tool(|t| {
            t.add_flag_group(GroupSpec::exactly_one_required().name("choice")).unwrap();
            t.add_flag(FlagSpec::new("a").syntax("-a").group("choice")).unwrap();
            t.add_flag(FlagSpec::new("b").syntax("-b").group("choice")).unwrap();
        })
    };

    let mut parser = ArgParser::for_tool(t());
    parser.parse(Vec::<String>::new()).finish();
    assert!(parser.errors()[0].to_string().contains("none were provided"));

    let mut parser = ArgParser::for_tool(t());
    parser.parse(["-a", "-b"]).finish();
    assert!(parser.errors()[0].to_string().contains("2 were provided"));

    let mut parser = ArgParser::for_tool(t());
    parser.parse(["-a"]).finish();
    assert!(parser.errors().is_empty());
}

#[test]
fn required_group_names_missing_flags() {
    let t = tool(|t| {
        t.add_flag_group(GroupSpec::all_required().name("creds")).unwrap();
        t.add_flag(FlagSpec::new("user").syntax("--user=NAME").group("creds")).unwrap();
        t.add_flag(FlagSpec::new("pass").syntax("--pass=WORD").group("creds")).unwrap();
    });
    let mut parser = ArgParser::for_tool(t);
    parser.parse(["--user=admin"]).finish();
    assert_eq!(parser.errors().len(), 1);
    assert!(parser.errors()[0].to_string().contains("--pass"));
}

// --- policies ---

#[test]
fn flags_before_args_reclassifies_later_flags() {
    let t = runnable(|t| {
        t.add_flag(FlagSpec::new("a").syntax("-a")).unwrap();
        t.enforce_flags_before_args().unwrap();
        t.set_remaining_args(ArgSpec::new("rest")).unwrap();
    });
    let mut parser = ArgParser::for_tool(t);
    parser.parse(["-a", "positional", "-a"]).finish();
    assert!(parser.errors().is_empty());
    assert_eq!(parser.data()["a"], json!(true));
    assert_eq!(parser.data()["rest"], json!(["positional", "-a"]));
}

#[test]
fn disabled_parsing_passes_tokens_through() {
    let t = tool(|t| {
        t.disable_argument_parsing().unwrap();
    });
    let mut parser = ArgParser::for_tool(t);
    parser.parse(["--whatever", "-x", "plain"]).finish();
    assert!(parser.errors().is_empty());
    assert!(parser.data().is_empty());
    assert_eq!(parser.parsed_args(), ["--whatever", "-x", "plain"]);
}

#[test]
fn push_handler_collects_repeats() {
    let t = tool(|t| {
        t.add_flag(
            FlagSpec::new("include")
                .syntax("-I VALUE")
                .handler(FlagHandler::Push),
        )
        .unwrap();
    });
    let mut parser = ArgParser::for_tool(t);
    parser.parse(["-Ifoo", "-I", "bar"]).finish();
    assert_eq!(parser.data()["include"], json!(["foo", "bar"]));
}

#[test]
fn parse_after_finish_is_ignored() {
    let t = tool(|t| {
        t.add_flag(FlagSpec::new("a").syntax("-a")).unwrap();
    });
    let mut parser = ArgParser::for_tool(t);
    parser.parse(["-a"]).finish();
    parser.parse(["-a"]);
    assert_eq!(parser.parsed_args(), ["-a"]);
}

#[test]
fn into_context_carries_data_and_accessors() {
    let t = runnable(|t| {
        t.add_flag(FlagSpec::new("verbose").syntax("-v")).unwrap();
        t.add_optional_arg(ArgSpec::new("target")).unwrap();
    });
    let mut parser = ArgParser::for_tool(t);
    parser.parse(["-v", "prod"]);
    let ctx = parser.into_context();
    assert_eq!(ctx.tool_name(), &["foo".to_string()]);
    assert_eq!(ctx.fetch("verbose"), Some(&json!(true)));
    assert_eq!(ctx.fetch("target"), Some(&json!("prod")));
    assert!(ctx.usage_errors().is_empty());
}
