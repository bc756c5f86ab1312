mod common;
use crate::common::{init_tracing, with_timeout};

use std::fs;
use std::path::Path;
use std::time::Duration;

use tokio::sync::mpsc;

use launchdag::cli::CliArgs;
use launchdag::config::load_and_validate;
use launchdag::dag::{NodeState, TaskManager};
use launchdag::engine::{DriveOutcome, Driver, DriverOptions};
use launchdag::steps::build_plan;
use launchdag_test_utils::{ConfigFileBuilder, StepConfigBuilder};

fn args_for(config: &Path) -> CliArgs {
    CliArgs {
        config: config.to_string_lossy().into_owned(),
        log_level: None,
        dry_run: false,
        concurrency: None,
        tick_ms: Some(5),
        failure_policy: None,
        link_mode: None,
    }
}

fn seed_cache(root: &Path) {
    fs::create_dir_all(root.join("cache/sub")).unwrap();
    fs::write(root.join("cache/a.jar"), b"alpha").unwrap();
    fs::write(root.join("cache/sub/b.jar"), b"beta").unwrap();
    fs::write(root.join("cache/notes.tmp"), b"skip me").unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn full_pipeline_deploys_prunes_and_launches() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    seed_cache(root);

    // Pre-existing install: one stale file, one up-to-date file.
    fs::create_dir_all(root.join("game/mods")).unwrap();
    fs::write(root.join("game/mods/stale.jar"), b"old").unwrap();
    fs::write(root.join("game/mods/a.jar"), b"alpha").unwrap();

    let config = root.join("Launchdag.toml");
    fs::write(
        &config,
        r#"
[scheduler]
concurrency_limit = 2

[step.dirs]
kind = "prepare"
dirs = ["game/mods", "game/logs"]

[step.mods]
kind = "sync"
source = "cache"
target = "game/mods"
exclude = ["**/*.tmp"]
prune = true
after = ["dirs"]

[step.game]
kind = "launch"
cmd = "echo booting; echo launched > logs/started.txt; echo game ready"
cwd = "game"
ready_on_stdout = "ready$"
after = ["mods"]
"#,
    )
    .unwrap();

    with_timeout(launchdag::run(args_for(&config))).await.unwrap();

    assert!(root.join("game/logs").is_dir());
    assert_eq!(fs::read(root.join("game/mods/a.jar")).unwrap(), b"alpha");
    assert_eq!(fs::read(root.join("game/mods/sub/b.jar")).unwrap(), b"beta");
    assert!(!root.join("game/mods/notes.tmp").exists());
    assert!(!root.join("game/mods/stale.jar").exists());

    // The launch step only finishes once "game ready" is printed, which
    // happens after the marker file is written.
    assert_eq!(
        fs::read_to_string(root.join("game/logs/started.txt")).unwrap().trim(),
        "launched"
    );
    let game_log = fs::read_to_string(root.join("logs/game.stdout.log")).unwrap();
    assert!(game_log.contains("game ready"));
}

#[tokio::test]
async fn sync_children_are_generated_per_changed_file() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    seed_cache(root);

    let cfg = ConfigFileBuilder::new()
        .install_root(root)
        .with_step(
            "mods",
            StepConfigBuilder::sync("cache", "install").exclude("**/*.tmp").build(),
        )
        .build();

    let plan = build_plan(&cfg).unwrap();
    let sync_id = plan.id_of("mods").unwrap();

    let mut manager = TaskManager::new(1);
    manager.submit_all(plan.into_nodes());
    let (_tx, rx) = mpsc::channel(1);
    let mut driver = Driver::new(
        manager,
        rx,
        DriverOptions {
            tick_interval: Duration::from_millis(5),
            ..DriverOptions::default()
        },
    );
    let summary = with_timeout(driver.run()).await;
    assert_eq!(summary.outcome, DriveOutcome::Completed);

    let manager = driver.into_manager();
    let children = manager.forest().get(sync_id).unwrap().children().to_vec();
    assert_eq!(children.len(), 2);
    let mut labels: Vec<String> = children
        .iter()
        .map(|id| manager.view(*id).unwrap().label)
        .collect();
    labels.sort();
    assert_eq!(labels, vec!["deploy a.jar", "deploy sub/b.jar"]);
    for child in children {
        assert_eq!(manager.state(child), Some(NodeState::Finalized));
        assert_eq!(manager.generation(child), 1);
    }
    assert_eq!(fs::read(root.join("install/sub/b.jar")).unwrap(), b"beta");
}

#[tokio::test]
async fn verify_mismatch_fails_the_run() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::write(root.join("game.bin"), b"payload").unwrap();
    let wrong = blake3::hash(b"something else").to_hex().to_string();

    let config = root.join("Launchdag.toml");
    fs::write(
        &config,
        format!(
            r#"
[step.check]
kind = "verify"
file = "game.bin"
blake3 = "{wrong}"

[step.after_check]
kind = "prepare"
dirs = ["never"]
after = ["check"]
"#
        ),
    )
    .unwrap();

    let err = with_timeout(launchdag::run(args_for(&config))).await.unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("stalled"), "unexpected error: {msg}");
    assert!(!root.join("never").exists());
}

#[tokio::test]
async fn verify_accepts_matching_digest() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::write(root.join("game.bin"), b"payload").unwrap();
    let digest = blake3::hash(b"payload").to_hex().to_string().to_uppercase();

    let cfg = ConfigFileBuilder::new()
        .install_root(root)
        .with_step("check", StepConfigBuilder::verify("game.bin").blake3(&digest).build())
        .build();

    let mut manager = TaskManager::new(1);
    manager.submit_all(build_plan(&cfg).unwrap().into_nodes());
    let (_tx, rx) = mpsc::channel(1);
    let mut driver = Driver::new(manager, rx, DriverOptions::default());
    let summary = with_timeout(driver.run()).await;
    assert_eq!(summary.outcome, DriveOutcome::Completed);
    assert_eq!(driver.manager().overall_progress(), 1.0);
}

#[tokio::test]
async fn dry_run_executes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("Launchdag.toml");
    fs::write(
        &config,
        "[step.dirs]\nkind = \"prepare\"\ndirs = [\"created\"]\n",
    )
    .unwrap();

    let mut args = args_for(&config);
    args.dry_run = true;
    launchdag::run(args).await.unwrap();
    assert!(!dir.path().join("created").exists());

    // Loading is unaffected by the dry run.
    assert!(load_and_validate(&config).is_ok());
}

#[tokio::test]
async fn cli_overrides_are_validated() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("Launchdag.toml");
    fs::write(
        &config,
        "[step.dirs]\nkind = \"prepare\"\ndirs = [\"created\"]\n",
    )
    .unwrap();

    let mut args = args_for(&config);
    args.concurrency = Some(0);
    assert!(launchdag::run(args).await.is_err());
    assert!(!dir.path().join("created").exists());
}

#[test]
fn plan_applies_kind_slot_defaults_and_overrides() {
    let cfg = ConfigFileBuilder::new()
        .install_root("/tmp/launchdag-slots")
        .with_step("dirs", StepConfigBuilder::prepare(&["mods"]).build())
        .with_step(
            "check",
            StepConfigBuilder::verify("game.jar").after("dirs").build(),
        )
        .with_step(
            "mods",
            StepConfigBuilder::sync("cache", "mods")
                .after("dirs")
                .takes_slot(false)
                .build(),
        )
        .with_step(
            "play",
            StepConfigBuilder::launch("true")
                .after("check")
                .after("mods")
                .build(),
        )
        .build();

    let plan = build_plan(&cfg).unwrap();
    let slot_of = |name: &str| {
        let id = plan.id_of(name).unwrap();
        plan.nodes().iter().find(|n| n.id() == id).unwrap().takes_slot()
    };

    assert!(!slot_of("dirs"));
    assert!(slot_of("check"));
    assert!(!slot_of("mods"), "explicit takes_slot = false wins");
    assert!(!slot_of("play"));
}

#[test]
fn plan_orders_dependencies_before_dependents() {
    let cfg = ConfigFileBuilder::new()
        .install_root("/tmp/launchdag-order")
        .with_step("a-play", StepConfigBuilder::launch("true").after("z-mods").build())
        .with_step(
            "z-mods",
            StepConfigBuilder::sync("cache", "mods").after("m-dirs").build(),
        )
        .with_step("m-dirs", StepConfigBuilder::prepare(&["mods"]).build())
        .build();

    let plan = build_plan(&cfg).unwrap();
    let position = |name: &str| {
        let id = plan.id_of(name).unwrap();
        plan.nodes().iter().position(|n| n.id() == id).unwrap()
    };

    assert!(position("m-dirs") < position("z-mods"));
    assert!(position("z-mods") < position("a-play"));
}
