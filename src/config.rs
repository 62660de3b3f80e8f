use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use looprun::CompletionCriteria;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub executor: ExecutorConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Shell command run once per iteration
    pub command: String,
    /// Per-invocation timeout in milliseconds (0 = unlimited)
    pub command_timeout_ms: u64,
    /// Stdout marker that counts as a completion confirmation
    pub completion_marker: Option<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            command: "otto ci".to_string(),
            command_timeout_ms: 300000,
            completion_marker: None,
        }
    }
}

/// Stop thresholds. Zero means unlimited for every numeric field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_iterations: u32,
    pub timeout_ms: u64,
    pub max_tokens: u64,
    pub max_cost: f64,
    pub max_endless: u32,
    pub max_consecutive_failures: u32,
    pub required_confirmations: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10000,
            timeout_ms: 0,
            max_tokens: 0,
            max_cost: 0.0,
            max_endless: 0,
            max_consecutive_failures: 0,
            required_confirmations: 1,
        }
    }
}

impl LimitsConfig {
    /// Build runtime criteria from the configured thresholds
    pub fn criteria(&self) -> CompletionCriteria {
        CompletionCriteria::default()
            .with_max_iterations(self.max_iterations)
            .with_timeout(Duration::from_millis(self.timeout_ms))
            .with_max_tokens(self.max_tokens)
            .with_max_cost(self.max_cost)
            .with_max_endless(self.max_endless)
            .with_max_consecutive_failures(self.max_consecutive_failures)
            .with_required_confirmations(self.required_confirmations)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            executor: ExecutorConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}
