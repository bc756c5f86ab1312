// tests/config_errors.rs

use std::io::Write;

use tempfile::NamedTempFile;

use launchdag::config::{StepKind, load_and_validate};
use launchdag::errors::LaunchdagError;
use launchdag::types::{FailurePolicy, LinkMode};
use launchdag_test_utils::{ConfigFileBuilder, StepConfigBuilder};

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn test_full_config_loads_with_defaults() {
    let file = write_config(
        r#"
[scheduler]
failure_policy = "abort"

[install]
link_mode = "copy"

[step.dirs]
kind = "prepare"
dirs = ["game/mods"]

[step.mods]
kind = "sync"
source = "cache"
target = "game/mods"
exclude = ["**/*.tmp"]
prune = true
after = ["dirs"]

[step.game]
kind = "launch"
cmd = "echo started"
ready_on_stdout = "started"
after = ["mods"]
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg.scheduler().concurrency_limit, 4);
    assert_eq!(cfg.scheduler().tick_interval_ms, 50);
    assert_eq!(cfg.scheduler().report_every, 20);
    assert_eq!(cfg.scheduler().failure_policy, FailurePolicy::Abort);
    assert_eq!(cfg.install().link_mode, LinkMode::Copy);

    let mods = cfg.step("mods").unwrap();
    assert_eq!(mods.kind, StepKind::Sync);
    assert_eq!(mods.include, vec!["**/*".to_string()]);
    assert!(mods.prune);

    // Relative paths resolve against the config file's directory.
    let dir = file.path().parent().unwrap();
    assert_eq!(cfg.install_root(), dir);
    assert_eq!(cfg.resolve("game"), dir.join("game"));
}

#[test]
fn test_plan_cycle_returns_structured_error() {
    let file = write_config(
        r#"
[step.a]
kind = "prepare"
dirs = ["a"]
after = ["b"]

[step.b]
kind = "prepare"
dirs = ["b"]
after = ["a"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(LaunchdagError::PlanCycle(msg)) => {
            assert!(msg.contains("cycle detected"));
            assert!(msg.contains('a') || msg.contains('b'));
        }
        Err(e) => panic!("Expected PlanCycle error, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_unknown_dependency_is_step_not_found() {
    let result = ConfigFileBuilder::new()
        .with_step("game", StepConfigBuilder::launch("run").after("ghost").build())
        .try_build();

    match result {
        Err(LaunchdagError::StepNotFound(msg)) => assert!(msg.contains("ghost")),
        other => panic!("Expected StepNotFound, got: {:?}", other),
    }
}

#[test]
fn test_self_dependency_is_rejected() {
    let result = ConfigFileBuilder::new()
        .with_step("game", StepConfigBuilder::launch("run").after("game").build())
        .try_build();
    assert!(matches!(result, Err(LaunchdagError::ConfigError(_))));
}

#[test]
fn test_empty_config_is_rejected() {
    let file = write_config("[scheduler]\nconcurrency_limit = 2\n");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(LaunchdagError::ConfigError(_))
    ));
}

#[test]
fn test_zero_limits_are_rejected() {
    let zero_limit = ConfigFileBuilder::new()
        .concurrency(0)
        .with_step("dirs", StepConfigBuilder::prepare(&["x"]).build())
        .try_build();
    assert!(matches!(zero_limit, Err(LaunchdagError::ConfigError(_))));

    let zero_tick = ConfigFileBuilder::new()
        .tick_ms(0)
        .with_step("dirs", StepConfigBuilder::prepare(&["x"]).build())
        .try_build();
    assert!(matches!(zero_tick, Err(LaunchdagError::ConfigError(_))));
}

#[test]
fn test_kind_specific_keys_are_required() {
    let cases = vec![
        StepConfigBuilder::prepare(&[]).build(),
        {
            let mut s = StepConfigBuilder::verify("x").build();
            s.file = None;
            s
        },
        {
            let mut s = StepConfigBuilder::sync("a", "b").build();
            s.target = None;
            s
        },
        StepConfigBuilder::launch("   ").build(),
    ];

    for step in cases {
        let kind = step.kind;
        let result = ConfigFileBuilder::new().with_step("s", step).try_build();
        assert!(
            matches!(result, Err(LaunchdagError::ConfigError(_))),
            "{kind:?} accepted without its required key"
        );
    }
}

#[test]
fn test_patterns_and_digests_are_checked() {
    let bad_regex = ConfigFileBuilder::new()
        .with_step("game", StepConfigBuilder::launch("run").ready_on_stdout("(").build())
        .try_build();
    assert!(matches!(bad_regex, Err(LaunchdagError::ConfigError(_))));

    let bad_glob = ConfigFileBuilder::new()
        .with_step("mods", StepConfigBuilder::sync("a", "b").include("a/{b").build())
        .try_build();
    assert!(matches!(bad_glob, Err(LaunchdagError::ConfigError(_))));

    let bad_digest = ConfigFileBuilder::new()
        .with_step("check", StepConfigBuilder::verify("game.bin").blake3("abc").build())
        .try_build();
    assert!(matches!(bad_digest, Err(LaunchdagError::ConfigError(_))));
}

#[test]
fn test_unknown_kind_is_a_toml_error() {
    let file = write_config("[step.x]\nkind = \"download\"\n");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(LaunchdagError::TomlError(_))
    ));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        load_and_validate(dir.path().join("Launchdag.toml")),
        Err(LaunchdagError::IoError(_))
    ));
}
