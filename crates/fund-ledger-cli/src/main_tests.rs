// fund-ledger-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Helpers Tests
// Description: Unit tests for argument parsing and config validation.
// Purpose: Ensure commands parse as documented and bad config fails closed.
// Dependencies: fund-ledger-cli main helpers, tempfile
// ============================================================================

//! ## Overview
//! Exercises clap parsing for both subcommands and runs `config validate`
//! against temporary config files.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use fund_ledger_config::FundLedgerConfig;
use tempfile::TempDir;

use super::Cli;
use super::Commands;
use super::ConfigCommand;
use super::ConfigValidateCommand;
use super::LogFormat;
use super::command_config_validate;
use super::config_summary;

// ============================================================================
// SECTION: Parsing
// ============================================================================

#[test]
fn serve_defaults_to_json_logs() {
    let cli = Cli::try_parse_from(["fund-ledger", "serve"]).unwrap();
    let Commands::Serve(command) = cli.command else {
        panic!("expected serve command");
    };
    assert_eq!(command.log_format, LogFormat::Json);
    assert!(command.config.is_none());
}

#[test]
fn serve_accepts_config_and_text_logs() {
    let cli = Cli::try_parse_from([
        "fund-ledger",
        "serve",
        "--config",
        "/etc/fund-ledger.toml",
        "--log-format",
        "text",
    ])
    .unwrap();
    let Commands::Serve(command) = cli.command else {
        panic!("expected serve command");
    };
    assert_eq!(command.log_format, LogFormat::Text);
    assert_eq!(command.config, Some(PathBuf::from("/etc/fund-ledger.toml")));
}

#[test]
fn config_validate_parses() {
    let cli = Cli::try_parse_from(["fund-ledger", "config", "validate", "--config", "x.toml"])
        .unwrap();
    let Commands::Config {
        command: ConfigCommand::Validate(command),
    } = cli.command
    else {
        panic!("expected config validate command");
    };
    assert_eq!(command.config, Some(PathBuf::from("x.toml")));
}

#[test]
fn unknown_log_format_is_rejected() {
    assert!(Cli::try_parse_from(["fund-ledger", "serve", "--log-format", "xml"]).is_err());
}

// ============================================================================
// SECTION: Config Validation
// ============================================================================

#[test]
fn config_validate_accepts_valid_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fund-ledger.toml");
    fs::write(&path, "[server]\napi_key = \"k3y\"\nport = 9100\n").unwrap();
    let result = command_config_validate(&ConfigValidateCommand {
        config: Some(path),
    });
    assert!(result.is_ok());
}

#[test]
fn config_validate_rejects_invalid_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fund-ledger.toml");
    fs::write(&path, "[server]\nmax_upload_bytes = 0\n").unwrap();
    let err = command_config_validate(&ConfigValidateCommand {
        config: Some(path),
    })
    .unwrap_err();
    assert!(err.to_string().contains("max_upload_bytes"), "{err}");
}

#[test]
fn summary_lists_listen_address_and_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fund-ledger.toml");
    fs::write(&path, "[server]\nport = 9100\n\n[store]\npath = \"ledger.db\"\n").unwrap();
    let config = FundLedgerConfig::load_with_env(Some(&path), |_: &str| None).unwrap();
    let summary = config_summary(&config);
    assert!(summary.contains(&"listen: 0.0.0.0:9100".to_string()));
    assert!(summary.contains(&"store: ledger.db".to_string()));
}
