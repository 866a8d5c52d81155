use corewarden::core::config::Config;
use corewarden::core::optimizer::{Rule, RuleAction, RuleCondition, RuleScope};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_config_default() {
    let config = Config::default();
    assert_eq!(config.refresh_secs, 3);
    assert!(!config.governor_enabled);
    assert_eq!(config.rules.len(), 2);
    assert!(config.policy.whitelist.is_empty());
    assert!(config.last_profile.is_none());
}

#[test]
fn test_config_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("config.json");

    let mut config = Config::default();
    config.governor_enabled = true;
    config.policy.eco_cpu_threshold = 20.0;
    config.policy.whitelist.insert("Teams.exe");
    config.last_profile = Some("Gaming".to_string());
    let rule = Rule::new(
        "*helper*",
        RuleScope::Background,
        RuleCondition::CpuAbove(15.0),
        RuleAction::EcoThrottle,
    )
    .unwrap();
    config.rules.add(rule);
    config.save_to(&path).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert!(loaded.governor_enabled);
    assert_eq!(loaded.policy.eco_cpu_threshold, 20.0);
    assert!(loaded.policy.whitelist.contains("teams.exe"));
    assert_eq!(loaded.last_profile.as_deref(), Some("Gaming"));
    assert_eq!(loaded.rules, config.rules);
}

#[test]
fn test_config_missing_or_empty_file_gives_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");

    let missing = Config::load_from(&path).unwrap();
    assert_eq!(missing.refresh_secs, 3);

    fs::write(&path, "   \n").unwrap();
    let empty = Config::load_from(&path).unwrap();
    assert_eq!(empty.rules.len(), 2);
}

#[test]
fn test_config_corrupt_file_gives_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, "{ not json").unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.refresh_secs, 3);
    assert!(!config.governor_enabled);
}

#[test]
fn test_config_partial_file_fills_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, r#"{ "refresh_secs": 60, "governor_enabled": true }"#).unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.refresh_secs, 10);
    assert!(config.governor_enabled);
    assert_eq!(config.rules_interval_secs, 5);
}

#[test]
fn test_engine_settings_follow_config() {
    let mut config = Config::default();
    config.rule_cooldown_secs = 5;
    config.effects.delay_ms = 500;
    config.set_refresh_secs(0);

    let settings = config.engine_settings();
    assert_eq!(settings.rule_cooldown.as_secs(), 5);
    assert_eq!(settings.effects.delay_ms, 500);
    assert_eq!(config.cadence().sample.as_secs(), 1);
}
