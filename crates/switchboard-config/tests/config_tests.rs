// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Switchboard configuration system.

use std::io::Write;

use serial_test::serial;
use switchboard_config::diagnostic::ConfigError;
use switchboard_config::model::SwitchboardConfig;
use switchboard_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};

/// Every known section and key deserializes.
#[test]
fn full_toml_deserializes() {
    let toml = r#"
[service]
log_level = "debug"

[server]
host = "0.0.0.0"
port = 8080
bearer_token = "s3cret"

[storage]
sessions_dir = "/var/lib/switchboard/sessions"

[session]
max_retries = 3
backoff_base_ms = 1000
backoff_jitter_ms = 0
backoff_cap_ms = 60000
send_pacing_ms = 250
default_jid_domain = "c.us"

[rate_limit]
hourly_limit = 50
daily_limit = 400

[webhook]
timeout_secs = 5

[transport]
bridge_url = "wss://engine.internal:9000"
request_timeout_secs = 15
"#;

    let config = load_and_validate_str(toml).expect("valid config");
    assert_eq!(config.service.log_level, "debug");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.bearer_token.as_deref(), Some("s3cret"));
    assert_eq!(config.storage.sessions_dir, "/var/lib/switchboard/sessions");
    assert_eq!(config.session.max_retries, 3);
    assert_eq!(config.session.backoff_jitter_ms, 0);
    assert_eq!(config.session.send_pacing().as_millis(), 250);
    assert_eq!(config.session.default_jid_domain, "c.us");
    assert_eq!(config.rate_limit.hourly_limit, 50);
    assert_eq!(config.rate_limit.daily_limit, 400);
    assert_eq!(config.webhook.timeout_secs, 5);
    assert_eq!(config.transport.bridge_url, "wss://engine.internal:9000");
}

/// An empty document yields the documented defaults.
#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("empty TOML is valid");
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 3000);
    assert!(config.server.bearer_token.is_none());
    assert_eq!(config.session.max_retries, 5);
    assert_eq!(config.session.backoff_base_ms, 5_000);
    assert_eq!(config.session.backoff_jitter_ms, 2_000);
    assert_eq!(config.session.backoff_cap_ms, 300_000);
    assert_eq!(config.session.send_pacing_ms, 1_000);
    assert_eq!(config.rate_limit.hourly_limit, 200);
    assert_eq!(config.rate_limit.daily_limit, 1_000);
    assert!(config.storage.sessions_dir.ends_with("sessions"));
}

#[test]
fn partial_section_keeps_other_defaults() {
    let config = load_config_from_str("[session]\nmax_retries = 9\n").unwrap();
    assert_eq!(config.session.max_retries, 9);
    assert_eq!(config.session.backoff_base_ms, 5_000);
}

/// A misspelled key is reported with a suggestion and a source span.
#[test]
fn typo_produces_unknown_key_with_suggestion() {
    let toml = "[session]\nmax_retires = 3\n";
    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "max_retires");
            assert_eq!(suggestion.as_deref(), Some("max_retries"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_section_is_rejected() {
    let errors = load_and_validate_str("[metrics]\nenabled = true\n").unwrap_err();
    assert!(matches!(errors[0], ConfigError::UnknownKey { .. }));
}

#[test]
fn wrong_type_is_reported() {
    let errors = load_and_validate_str("[server]\nport = \"eighty\"\n").unwrap_err();
    assert!(
        matches!(&errors[0], ConfigError::InvalidType { key, .. } if key.contains("port")),
        "got {:?}",
        errors[0]
    );
}

#[test]
fn validation_runs_after_parse() {
    let errors = load_and_validate_str("[server]\nhost = \"0.0.0.0\"\n").unwrap_err();
    assert!(matches!(errors[0], ConfigError::Validation { .. }));
}

#[test]
fn defaults_serialize_back_to_toml() {
    let rendered = toml::to_string_pretty(&SwitchboardConfig::default()).unwrap();
    let reparsed = load_and_validate_str(&rendered).expect("rendered defaults reload");
    assert_eq!(reparsed.session.max_retries, 5);
}

/// Environment variables override values read from the file.
#[test]
#[serial]
fn env_overrides_file_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("switchboard.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "[rate_limit]\nhourly_limit = 20\ndaily_limit = 100").unwrap();

    // SAFETY: tests touching the process environment are serialized.
    unsafe { std::env::set_var("SWITCHBOARD_RATE_LIMIT_HOURLY_LIMIT", "40") };
    let result = load_and_validate_path(&path);
    unsafe { std::env::remove_var("SWITCHBOARD_RATE_LIMIT_HOURLY_LIMIT") };

    let config = result.expect("valid config");
    assert_eq!(config.rate_limit.hourly_limit, 40);
    assert_eq!(config.rate_limit.daily_limit, 100);
}

#[test]
#[serial]
fn file_typo_suggests_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("switchboard.toml");
    std::fs::write(&path, "[webhook]\ntimeout = 5\n").unwrap();

    let errors = load_and_validate_path(&path).unwrap_err();
    match &errors[0] {
        ConfigError::UnknownKey { suggestion, .. } => {
            assert_eq!(suggestion.as_deref(), Some("timeout_secs"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}
