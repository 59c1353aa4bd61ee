//! Config loading and defaults integration tests

use std::path::PathBuf;

use engagement_bot::{Config, ConfigError};

#[test]
fn test_minimal_config_uses_defaults() {
    let toml_str = r#"
[bot]
token = "123456:test-token"
admin_id = 42
group_id = -1001234567890
"#;

    let config = Config::from_toml(toml_str).expect("valid TOML");

    assert_eq!(config.bot.admin_id, 42);
    assert_eq!(config.bot.group_id, -1_001_234_567_890);
    assert_eq!(config.storage.db_path, PathBuf::from("bot_data.db"));
    assert_eq!(config.policy.short_points, 1);
    assert_eq!(config.policy.long_points, 10);
    assert_eq!(config.policy.long_min_duration_secs, 300);
    assert_eq!(config.policy.long_cooldown_days, 3);
    assert_eq!(config.policy.daily_short_target, 3);
    assert_eq!(config.broadcast.delay_ms, 50);
    assert_eq!(config.transport.poll_timeout_secs, 30);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_with_all_fields() {
    let toml_str = r#"
[bot]
token = "123456:test-token"
admin_id = 7
group_id = -100200

[storage]
db_path = "/var/lib/engagement-bot/ledger.db"

[policy]
short_points = 2
long_points = 20
long_min_duration_secs = 600
long_cooldown_days = 7
daily_short_target = 5

[broadcast]
delay_ms = 0

[transport]
api_base_url = "http://localhost:8081"
poll_timeout_secs = 10
"#;

    let config = Config::from_toml(toml_str).expect("valid TOML");

    assert_eq!(
        config.storage.db_path,
        PathBuf::from("/var/lib/engagement-bot/ledger.db")
    );
    assert_eq!(config.policy.short_points, 2);
    assert_eq!(config.policy.long_cooldown_days, 7);
    assert_eq!(config.policy.daily_short_target, 5);
    assert!(config.broadcast.delay().is_zero());
    assert_eq!(config.transport.api_base_url, "http://localhost:8081");
    assert!(config.validate().is_ok());
}

#[test]
fn test_invalid_toml_is_parse_error() {
    let result = Config::from_toml("[bot\ntoken = ");
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load(&dir.path().join("absent.toml")).unwrap();
    assert!(config.bot.token.is_empty());
    assert!(config.validate().is_err());
}

#[test]
fn test_save_and_load_roundtrip_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engagement-bot.toml");

    let mut config = Config::default();
    config.bot.token = "abc:def".to_string();
    config.bot.admin_id = 99;
    config.policy.long_cooldown_days = 5;
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.bot.token, "abc:def");
    assert_eq!(loaded.bot.admin_id, 99);
    assert_eq!(loaded.policy.long_cooldown_days, 5);
}
