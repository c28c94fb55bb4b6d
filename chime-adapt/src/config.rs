use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::profile::{
    ConnectionHealthOverrides, MeetingProfile, ProfileRegistry, DEFAULT_PROFILE_ID,
};
use crate::quality::UnmeasuredBitrate;
use crate::tier::{TierBandwidthCaps, TierSettings, VideoQualityTier};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub adapter: AdapterSettings,
    /// Id of the active meeting profile
    pub profile: String,
    /// Overrides merged onto the active profile's connection health policy
    pub connection_health: ConnectionHealthOverrides,
    /// Extra profiles, replacing built-ins with the same id
    pub profiles: Vec<MeetingProfile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            adapter: AdapterSettings::default(),
            profile: DEFAULT_PROFILE_ID.to_string(),
            connection_health: ConnectionHealthOverrides::default(),
            profiles: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

/// Adapter knobs that do not depend on the meeting profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterSettings {
    /// Minimum time between two applied adjustments
    pub cooldown_ms: u64,
    pub unmeasured_bitrate: UnmeasuredBitrate,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            cooldown_ms: 5_000,
            unmeasured_bitrate: UnmeasuredBitrate::default(),
        }
    }
}

/// Everything the adapter reads on each metric report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterConfig {
    pub cooldown_ms: u64,
    pub frame_rate: u32,
    pub bandwidth_caps: TierBandwidthCaps,
    pub uplink_ceiling_kbps: Option<u32>,
    pub unmeasured_bitrate: UnmeasuredBitrate,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        MeetingProfile::custom().adapter_config(&AdapterSettings::default())
    }
}

impl AdapterConfig {
    /// Command parameters for a tier under this configuration
    #[must_use]
    pub fn settings_for(&self, tier: VideoQualityTier) -> TierSettings {
        let (width, height) = tier.resolution();
        let cap = self.bandwidth_caps.cap_for(tier);
        TierSettings {
            tier,
            width,
            height,
            frame_rate: self.frame_rate,
            max_bandwidth_kbps: self.uplink_ceiling_kbps.map_or(cap, |ceiling| cap.min(ceiling)),
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> std::result::Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        // Load config file if provided
        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // Override with environment variables (CHIME_ADAPT_ADAPTER__COOLDOWN_MS, etc.)
        builder = builder.add_source(
            Environment::with_prefix("CHIME_ADAPT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from environment variables only
    pub fn from_env() -> std::result::Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> std::result::Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// Built-in profiles plus the ones declared in this configuration
    #[must_use]
    pub fn registry(&self) -> ProfileRegistry {
        let mut registry = ProfileRegistry::builtin();
        for profile in &self.profiles {
            registry.register(profile.clone());
        }
        registry
    }

    /// The selected profile with connection health overrides applied
    pub fn active_profile(&self) -> Result<MeetingProfile> {
        let registry = self.registry();
        let profile = registry.resolve(&self.profile)?;
        Ok(profile.clone().with_overrides(&self.connection_health))
    }

    /// Adapter configuration for the selected profile
    pub fn adapter_config(&self) -> Result<AdapterConfig> {
        Ok(self.active_profile()?.adapter_config(&self.adapter))
    }

    /// Check the configuration, collecting every problem found
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if crate::logging::parse_log_level(&self.logging.level).is_err() {
            errors.push(format!("logging.level: unknown level '{}'", self.logging.level));
        }
        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            errors.push(format!(
                "logging.format: expected 'json' or 'pretty', got '{}'",
                self.logging.format
            ));
        }
        if self.adapter.cooldown_ms == 0 {
            errors.push("adapter.cooldown_ms must be positive".to_string());
        }

        match self.active_profile() {
            Ok(profile) => errors.extend(profile.validate()),
            Err(e) => errors.push(format!("profile: {e}")),
        }
        for profile in &self.profiles {
            if profile.id != self.profile {
                errors.extend(profile.validate());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
