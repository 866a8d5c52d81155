use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::optimizer::{
    AdvisorThresholds, Cadence, EffectsConfig, EngineSettings, ExecutorConfig, GovernorPolicy,
    HealthConfig, RuleSet,
};

const MIN_REFRESH_SECS: u64 = 1;
const MAX_REFRESH_SECS: u64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sampling interval, clamped to 1..=10 seconds
    pub refresh_secs: u64,
    pub rules_interval_secs: u64,
    pub governor_interval_secs: u64,
    pub rule_cooldown_secs: u64,
    pub governor_enabled: bool,
    pub health: HealthConfig,
    pub effects: EffectsConfig,
    pub executor: ExecutorConfig,
    pub thresholds: AdvisorThresholds,
    /// Governor thresholds and the user whitelist
    pub policy: GovernorPolicy,
    pub rules: RuleSet,
    pub last_profile: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refresh_secs: 3,
            rules_interval_secs: 5,
            governor_interval_secs: 5,
            rule_cooldown_secs: 60,
            governor_enabled: false,
            health: HealthConfig::default(),
            effects: EffectsConfig::default(),
            executor: ExecutorConfig::default(),
            thresholds: AdvisorThresholds::default(),
            policy: GovernorPolicy::default(),
            rules: RuleSet::default(),
            last_profile: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    /// Load from an explicit path. A missing, empty or unreadable-as-JSON
    /// file yields the defaults.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Config::default());
        }

        let data = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        if data.trim().is_empty() {
            return Ok(Config::default());
        }

        let mut config: Config = serde_json::from_str(&data).unwrap_or_else(|e| {
            log::warn!(
                "Config file {:?} is invalid ({}), using defaults",
                config_path,
                e
            );
            Config::default()
        });
        config.refresh_secs = config.refresh_secs.clamp(MIN_REFRESH_SECS, MAX_REFRESH_SECS);
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let data =
            serde_json::to_string_pretty(self).with_context(|| "Failed to serialize config")?;

        fs::write(config_path, data)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    pub fn get_config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Where the effects history is kept between sessions
    pub fn get_effects_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("effects.json"))
    }

    /// Where revert baselines are kept between invocations
    pub fn get_journal_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("journal.json"))
    }

    fn config_dir() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().with_context(|| "Could not determine config directory")?;

        Ok(config_dir.join("corewarden"))
    }

    pub fn set_refresh_secs(&mut self, secs: u64) {
        self.refresh_secs = secs.clamp(MIN_REFRESH_SECS, MAX_REFRESH_SECS);
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs.clamp(MIN_REFRESH_SECS, MAX_REFRESH_SECS))
    }

    pub fn cadence(&self) -> Cadence {
        Cadence {
            sample: self.refresh_interval(),
            rules: Duration::from_secs(self.rules_interval_secs.max(1)),
            governor: Duration::from_secs(self.governor_interval_secs.max(1)),
            ..Cadence::default()
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            health: self.health.clone(),
            effects: self.effects.clone(),
            executor: self.executor.clone(),
            policy: self.policy.clone(),
            rules: self.rules.clone(),
            thresholds: self.thresholds.clone(),
            governor_enabled: self.governor_enabled,
            rule_cooldown: Duration::from_secs(self.rule_cooldown_secs),
        }
    }
}
