use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::adaptation::AdaptationConfig;
use crate::logging::LogConfig;
use crate::planning::PlanningConfig;
use crate::training_load::TrainingLoadConfig;

/// Engine configuration, one TOML table per concern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Configuration metadata
    pub metadata: ConfigMetadata,

    /// Fitness/fatigue model constants
    pub load: TrainingLoadConfig,

    /// Phase split, volume progression and session settings
    pub planning: PlanningConfig,

    /// Redistribution and adjustment thresholds
    pub adaptation: AdaptationConfig,

    /// Logging output
    pub logging: LogConfig,
}

/// Configuration metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigMetadata {
    /// Configuration format version
    pub version: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl Default for ConfigMetadata {
    fn default() -> Self {
        let now = Utc::now();
        ConfigMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            metadata: ConfigMetadata::default(),
            load: TrainingLoadConfig::default(),
            planning: PlanningConfig::default(),
            adaptation: AdaptationConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: EngineConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.metadata.updated_at = Utc::now();

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".peakplan")
            .join("config.toml")
    }

    /// Load from the default path, falling back to defaults when absent or unreadable
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();

        match Self::load_from_file(&config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!(path = %config_path.display(), error = %e, "Using default configuration");
                Self::default()
            }
        }
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.load.ctl_time_constant == 0 || self.load.atl_time_constant == 0 {
            anyhow::bail!("load time constants must be positive");
        }
        if self.planning.min_lead_weeks == 0 {
            anyhow::bail!("planning.min_lead_weeks must be at least 1");
        }
        if self.planning.build_fraction + self.planning.peak_fraction >= rust_decimal::Decimal::ONE {
            anyhow::bail!("planning.build_fraction + planning.peak_fraction must leave room for base");
        }
        if self.adaptation.redistribution_cap < rust_decimal::Decimal::ZERO {
            anyhow::bail!("adaptation.redistribution_cap cannot be negative");
        }
        Ok(())
    }
}
