//! Config loading and validation tests for fund-ledger-config.
// fund-ledger-config/tests/load_validation.rs
// =============================================================================
// Module: Config Load and Validation Tests
// Description: Validate defaults, file loading, env overrides, and limits.
// Purpose: Ensure configuration fails closed on bad input.
// =============================================================================

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use fund_ledger_config::AuditSinkKind;
use fund_ledger_config::ConfigError;
use fund_ledger_config::DEFAULT_API_KEY;
use fund_ledger_config::FundLedgerConfig;
use fund_ledger_store_sqlite::SqliteStoreMode;
use tempfile::TempDir;

type TestResult = Result<(), String>;

fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> =
        pairs.iter().map(|(key, value)| ((*key).to_string(), (*value).to_string())).collect();
    move |key: &str| map.get(key).cloned()
}

fn write_config(dir: &TempDir, body: &str) -> Result<std::path::PathBuf, String> {
    let path = dir.path().join("fund-ledger.toml");
    fs::write(&path, body).map_err(|err| err.to_string())?;
    Ok(path)
}

fn assert_invalid<T>(result: Result<T, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config".to_string()),
    }
}

fn parse(body: &str) -> Result<FundLedgerConfig, String> {
    toml::from_str(body).map_err(|err| err.to_string())
}

#[test]
fn defaults_match_deployment_contract() -> TestResult {
    let config = FundLedgerConfig::load_with_env(None, env_of(&[])).map_err(|err| err.to_string())?;
    if config.server.port != 8089 {
        return Err(format!("unexpected default port {}", config.server.port));
    }
    if config.store.path != Path::new("./funds.db") {
        return Err(format!("unexpected default path {}", config.store.path.display()));
    }
    if config.server.max_upload_bytes != 512 * 1024 {
        return Err("unexpected default upload cap".to_string());
    }
    if !config.uses_default_api_key() {
        return Err("default api key should be the placeholder".to_string());
    }
    Ok(())
}

#[test]
fn env_overrides_replace_defaults() -> TestResult {
    let env = env_of(&[("API_KEY", "s3cret"), ("PORT", "9000"), ("DB_PATH", "/tmp/ledger.db")]);
    let config = FundLedgerConfig::load_with_env(None, env).map_err(|err| err.to_string())?;
    if config.server.api_key != "s3cret" || config.uses_default_api_key() {
        return Err("API_KEY override not applied".to_string());
    }
    if config.server.port != 9000 {
        return Err("PORT override not applied".to_string());
    }
    if config.store.path != Path::new("/tmp/ledger.db") {
        return Err("DB_PATH override not applied".to_string());
    }
    Ok(())
}

#[test]
fn empty_env_values_are_ignored() -> TestResult {
    let env = env_of(&[("API_KEY", ""), ("PORT", "")]);
    let config = FundLedgerConfig::load_with_env(None, env).map_err(|err| err.to_string())?;
    if config.server.api_key != DEFAULT_API_KEY || config.server.port != 8089 {
        return Err("empty env values should not override defaults".to_string());
    }
    Ok(())
}

#[test]
fn env_overrides_win_over_file() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = write_config(
        &dir,
        "[server]\nport = 7000\napi_key = \"from-file\"\n\n[store]\npath = \"file.db\"\n",
    )?;
    let config = FundLedgerConfig::load_with_env(Some(&path), env_of(&[("PORT", "7100")]))
        .map_err(|err| err.to_string())?;
    if config.server.port != 7100 {
        return Err("PORT should override the file".to_string());
    }
    if config.server.api_key != "from-file" {
        return Err("file api key should survive".to_string());
    }
    if config.store.path != Path::new("file.db") {
        return Err("file store path should survive".to_string());
    }
    Ok(())
}

#[test]
fn config_env_var_selects_file() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = write_config(&dir, "[store]\njournal_mode = \"delete\"\n")?;
    let path_text = path.to_string_lossy().into_owned();
    let config = FundLedgerConfig::load_with_env(None, env_of(&[("FUND_LEDGER_CONFIG", path_text.as_str())]))
        .map_err(|err| err.to_string())?;
    if config.store.journal_mode != SqliteStoreMode::Delete {
        return Err("config file selected by env var was not loaded".to_string());
    }
    Ok(())
}

#[test]
fn explicit_missing_file_fails() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let missing = dir.path().join("absent.toml");
    assert_invalid(FundLedgerConfig::load_with_env(Some(&missing), env_of(&[])), "config io error")
}

#[test]
fn unknown_fields_are_rejected() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = write_config(&dir, "[server]\nlisten = \"0.0.0.0\"\n")?;
    assert_invalid(FundLedgerConfig::load_with_env(Some(&path), env_of(&[])), "config parse error")
}

#[test]
fn bad_port_override_is_rejected() -> TestResult {
    assert_invalid(FundLedgerConfig::load_with_env(None, env_of(&[("PORT", "http")])), "PORT")
}

#[test]
fn empty_api_key_is_rejected() -> TestResult {
    let config = parse("[server]\napi_key = \"  \"\n")?;
    assert_invalid(config.validate(), "server.api_key must be non-empty")
}

#[test]
fn zero_upload_cap_is_rejected() -> TestResult {
    let config = parse("[server]\nmax_upload_bytes = 0\n")?;
    assert_invalid(config.validate(), "server.max_upload_bytes must be greater than zero")
}

#[test]
fn bind_must_be_an_ip_address() -> TestResult {
    let config = parse("[server]\nbind = \"localhost\"\n")?;
    assert_invalid(config.validate(), "server.bind")?;
    let config = parse("[server]\nbind = \"::1\"\nport = 8090\n")?;
    let addr = config.server.socket_addr().map_err(|err| err.to_string())?;
    if addr.to_string() != "[::1]:8090" {
        return Err(format!("unexpected socket address {addr}"));
    }
    Ok(())
}

#[test]
fn request_timeout_must_be_in_range() -> TestResult {
    let config = parse("[server]\nrequest_timeout_ms = 10\n")?;
    assert_invalid(config.validate(), "server.request_timeout_ms out of range")
}

#[test]
fn file_audit_sink_requires_path() -> TestResult {
    let config = parse("[server.audit]\nsink = \"file\"\n")?;
    assert_invalid(config.validate(), "server.audit.path is required")?;
    let config = parse("[server.audit]\nsink = \"file\"\npath = \"audit.jsonl\"\n")?;
    config.validate().map_err(|err| err.to_string())?;
    if config.server.audit.sink != AuditSinkKind::File {
        return Err("audit sink not parsed".to_string());
    }
    Ok(())
}

#[test]
fn empty_store_path_is_rejected() -> TestResult {
    let config = parse("[store]\npath = \"\"\n")?;
    assert_invalid(config.validate(), "store.path must be non-empty")
}

#[test]
fn sqlite_config_carries_store_tuning() -> TestResult {
    let config = parse("[store]\npath = \"ledger.db\"\nbusy_timeout_ms = 250\n")?;
    let sqlite = config.store.sqlite_config();
    if sqlite.path != Path::new("ledger.db") || sqlite.busy_timeout_ms != 250 {
        return Err("sqlite config does not mirror store config".to_string());
    }
    Ok(())
}
