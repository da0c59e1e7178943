//! Configuration management for tunekit
//!
//! Provides TOML-based configuration with defaults and validation.
//! Location: ~/.tunekit/config.toml

use crate::actions::kinds::expand_path;
use crate::actions::ActionSpec;
use crate::errors::{Result, TuneError};
use crate::network::NetworkSettings;
use crate::pipeline::catalog::default_action_specs;
use crate::profiler::probe::default_system_path;
use crate::profiler::ProfilerSettings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound accepted for `network.ping_count`
const MAX_PING_COUNT: u32 = 20;

/// Slack on top of the one-second echo interval for process start and the last reply
const PING_ROUND_MARGIN_SEC: u64 = 2;

/// Complete configuration for tunekit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub profiler: ProfilerConfig,
    pub network: NetworkSettings,
    pub telemetry: TelemetryConfig,
    /// Action overrides, layered over the built-in definitions
    pub actions: BTreeMap<String, ActionSpec>,
}

/// Pipeline defaults; CLI flags can only turn these on
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub aggressive: bool,
    pub create_restore_point: bool,
    pub default_timeout_sec: u64,
}

/// Profiler tuning and the path whose volume is measured
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilerConfig {
    pub system_path: Option<String>,
    #[serde(flatten)]
    pub scoring: ProfilerSettings,
}

/// Telemetry display configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub default_verbosity: String,
    pub show_progress_bars: bool,
    pub color_output: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            aggressive: false,
            create_restore_point: false,
            default_timeout_sec: 30,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            default_verbosity: "normal".to_string(),
            show_progress_bars: true,
            color_output: true,
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            Self::load_from_file(&config_path)
        } else {
            Self::load_default()
        }
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| TuneError::ConfigError(format!("Failed to read config: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| TuneError::ConfigError(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load default configuration from standard location or use built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Some(config_path) = Self::default_path() {
            if config_path.exists() {
                return Self::load_from_file(&config_path);
            }
        }

        Ok(Config::default())
    }

    /// `~/.tunekit/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".tunekit").join("config.toml"))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.default_timeout_sec == 0 {
            return Err(TuneError::ConfigError(
                "pipeline.default_timeout_sec must be greater than 0".to_string(),
            ));
        }

        let scoring = &self.profiler.scoring;
        if scoring.core_weight < 0.0 || scoring.ram_weight < 0.0 || scoring.ssd_bonus < 0.0 {
            return Err(TuneError::ConfigError(
                "profiler weights must not be negative".to_string(),
            ));
        }

        if scoring.balanced_threshold >= scoring.enthusiast_threshold {
            return Err(TuneError::ConfigError(
                "profiler.balanced_threshold must be less than enthusiast_threshold".to_string(),
            ));
        }

        let network = &self.network;
        if network.ping_count == 0 || network.ping_count > MAX_PING_COUNT {
            return Err(TuneError::ConfigError(format!(
                "network.ping_count must be between 1 and {}",
                MAX_PING_COUNT
            )));
        }

        if network.targets.is_empty() {
            return Err(TuneError::ConfigError(
                "network.targets must not be empty".to_string(),
            ));
        }

        if network.ping_timeout_sec == 0 || network.probe_timeout_sec == 0 || network.transfer_sec == 0 {
            return Err(TuneError::ConfigError(
                "network timeouts must be greater than 0".to_string(),
            ));
        }

        // Echoes go out one second apart, so a round needs (count - 1)s plus margin
        let round_secs = u64::from(network.ping_count - 1) + PING_ROUND_MARGIN_SEC;
        if round_secs > network.ping_timeout_sec {
            return Err(TuneError::ConfigError(format!(
                "network.ping_count {} needs network.ping_timeout_sec of at least {}",
                network.ping_count, round_secs
            )));
        }

        match self.telemetry.default_verbosity.as_str() {
            "quiet" | "normal" | "verbose" | "very_verbose" => {}
            _ => {
                return Err(TuneError::ConfigError(format!(
                    "Invalid verbosity level: {}",
                    self.telemetry.default_verbosity
                )))
            }
        }

        for (id, spec) in &self.actions {
            if spec.timeout(self.default_timeout()).is_zero() {
                return Err(TuneError::ConfigError(format!(
                    "actions.{}: timeout must be greater than 0",
                    id
                )));
            }
            if let ActionSpec::Commands { steps, .. } = spec {
                if steps.iter().any(|s| s.program.trim().is_empty() || s.timeout_sec == 0) {
                    return Err(TuneError::ConfigError(format!(
                        "actions.{}: every step needs a program and a non-zero timeout",
                        id
                    )));
                }
            }
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| TuneError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| TuneError::ConfigError(format!("Failed to create config dir: {}", e)))?;
        }

        std::fs::write(path, contents)
            .map_err(|e| TuneError::ConfigError(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Built-in action definitions with configured ones layered on top
    pub fn action_specs(&self) -> BTreeMap<String, ActionSpec> {
        let mut specs = default_action_specs();
        specs.extend(self.actions.iter().map(|(id, spec)| (id.clone(), spec.clone())));
        specs
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.default_timeout_sec)
    }

    /// Path whose volume is used for the free-space reading
    pub fn system_path(&self) -> PathBuf {
        self.profiler
            .system_path
            .as_deref()
            .map(expand_path)
            .unwrap_or_else(default_system_path)
    }
}
