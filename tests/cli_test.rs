//! Integration tests for the packageless CLI
//!
//! Covers argument parsing for every verb and dispatch through the command driver.

mod common;

use clap::Parser;
use common::*;
use packageless::cli::{version_line, Cli, CliContext, CommandDriver, Commands};
use packageless::engine::{EngineCall, InMemoryEngine};
use packageless::error::{EngineOperation, PimError};
use std::path::PathBuf;
use std::process::{Command, Output};

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).expect("Failed to parse arguments")
}

#[test]
fn test_parse_install() {
    let cli = parse(&["packageless", "install", "python", "node:16"]);
    assert_eq!(
        cli.command,
        Commands::Install {
            packages: vec!["python".to_string(), "node:16".to_string()]
        }
    );
    assert!(!cli.verbose);
    assert!(!cli.quiet);
}

#[test]
fn test_install_requires_a_package() {
    assert!(Cli::try_parse_from(["packageless", "install"]).is_err());
    assert!(Cli::try_parse_from(["packageless", "uninstall"]).is_err());
}

#[test]
fn test_parse_uninstall() {
    let cli = parse(&["packageless", "uninstall", "python"]);
    assert_eq!(
        cli.command,
        Commands::Uninstall {
            packages: vec!["python".to_string()]
        }
    );
}

#[test]
fn test_parse_upgrade_and_update_without_packages() {
    let cli = parse(&["packageless", "upgrade"]);
    assert_eq!(cli.command, Commands::Upgrade { packages: vec![] });

    let cli = parse(&["packageless", "update"]);
    assert_eq!(cli.command, Commands::Update { packages: vec![] });
}

#[test]
fn test_parse_run_with_trailing_args() {
    let cli = parse(&["packageless", "run", "python", "--", "-c", "print(1)"]);
    assert_eq!(
        cli.command,
        Commands::Run {
            package: "python".to_string(),
            args: vec!["-c".to_string(), "print(1)".to_string()],
        }
    );

    let cli = parse(&["packageless", "run", "node:16", "script.js"]);
    assert_eq!(
        cli.command,
        Commands::Run {
            package: "node:16".to_string(),
            args: vec!["script.js".to_string()],
        }
    );
}

#[test]
fn test_parse_global_flags() {
    let cli = parse(&["packageless", "--config", "/etc/packageless.hcl", "-v", "version"]);
    assert_eq!(cli.command, Commands::Version);
    assert!(cli.verbose);
    assert_eq!(cli.config, Some(PathBuf::from("/etc/packageless.hcl")));
}

#[test]
fn test_unknown_verb() {
    assert!(Cli::try_parse_from(["packageless", "frobnicate"]).is_err());
}

#[test]
fn test_version_line() {
    assert_eq!(version_line(), format!("Packageless Version: v{}", packageless::VERSION));
}

#[test]
fn test_cli_context() {
    let context = CliContext::new(true, false);
    assert!(context.verbose);
    assert!(!context.quiet);

    let quiet = CliContext::quiet();
    assert!(quiet.quiet);
    assert!(quiet.spinner("pulling").is_none());
}

#[test]
fn test_batch_stops_at_first_failure() {
    let fixture = Fixture::new();
    fixture.cache("python", PYTHON);
    fixture.cache("node", NODE);
    let engine = InMemoryEngine::new();
    let driver = CommandDriver::new(CliContext::quiet(), fixture.orchestrator(&engine));

    let command = Commands::Install {
        packages: vec!["python".to_string(), "ruby".to_string(), "node".to_string()],
    };
    let err = driver.execute(&command).unwrap_err();

    assert!(matches!(err, PimError::Fetch(_)));
    assert!(engine.has_image("packageless/python"));
    assert!(!engine
        .calls()
        .contains(&EngineCall::ImageExists("packageless/node".to_string())));
}

#[test]
fn test_run_failure_exit_is_an_error() {
    let fixture = Fixture::new();
    fixture.cache("python", PYTHON);
    let engine = InMemoryEngine::new()
        .with_image("packageless/python")
        .with_exit_code(3);
    let driver = CommandDriver::new(CliContext::quiet(), fixture.orchestrator(&engine));

    let err = driver
        .execute(&Commands::Run {
            package: "python".to_string(),
            args: vec![],
        })
        .unwrap_err();

    match err {
        PimError::Engine(e) => {
            assert_eq!(e.operation, EngineOperation::RunContainer);
            assert!(e.message.contains('3'));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_update_all_through_driver() {
    let fixture = Fixture::new();
    fixture.cache("python", PYTHON);
    fixture.serve("python", PYTHON);
    let engine = InMemoryEngine::new();
    let driver = CommandDriver::new(CliContext::quiet(), fixture.orchestrator(&engine));

    driver.execute(&Commands::Update { packages: vec![] }).unwrap();

    assert_eq!(fixture.requests(), vec![format!("{}python.hcl", REPOSITORY)]);
}

#[test]
fn test_version_through_driver() {
    let fixture = Fixture::new();
    let engine = InMemoryEngine::new();
    let driver = CommandDriver::new(CliContext::quiet(), fixture.orchestrator(&engine));

    driver.execute(&Commands::Version).unwrap();

    assert!(engine.calls().is_empty());
}

fn packageless(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_packageless"))
        .args(args)
        .env_remove("PACKAGELESS_CONFIG")
        .output()
        .expect("Failed to run packageless")
}

#[test]
fn test_usage_errors_exit_with_one_on_stdout() {
    let output = packageless(&["install"]);
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("required"), "stdout: {}", stdout);

    let output = packageless(&["frobnicate"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(!output.stdout.is_empty());
}

#[test]
fn test_help_exits_cleanly() {
    let output = packageless(&["--help"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("install"));
}
