//! Meeting profiles
//!
//! A profile bundles everything a deployment tunes per meeting: the bandwidth
//! cap of each video tier, an optional uplink ceiling, reconnect timing and the
//! connection health policy handed to the media engine.

use crate::config::{AdapterConfig, AdapterSettings};
use crate::error::{Error, Result};
use crate::tier::TierBandwidthCaps;
use serde::{Deserialize, Serialize};

pub const CUSTOM_PROFILE_ID: &str = "meeting-config-custom";
pub const CP_PROFILE_ID: &str = "meeting-config-cp";
pub const DEFAULT_PROFILE_ID: &str = CUSTOM_PROFILE_ID;

/// Frame rate used for every tier unless a profile says otherwise
pub const DEFAULT_FRAME_RATE: u32 = 15;

/// Reconnect timing passed to the media engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub reconnect_timeout_ms: u64,
    pub fixed_wait_ms: u64,
    pub short_backoff_ms: u64,
    pub long_backoff_ms: u64,
    pub connection_timeout_ms: u64,
    /// 0 disables presence timeouts
    pub attendee_presence_timeout_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            reconnect_timeout_ms: 120_000,
            fixed_wait_ms: 0,
            short_backoff_ms: 1_000,
            long_backoff_ms: 5_000,
            connection_timeout_ms: 15_000,
            attendee_presence_timeout_ms: 0,
        }
    }
}

/// Connection health policy with the media engine's stock defaults
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionHealthPolicy {
    pub connection_unhealthy_threshold: u32,
    pub connection_wait_time_ms: u64,
    pub no_signal_threshold_time_ms: u64,
    pub cooldown_time_ms: u64,
    pub maximum_times_to_warn: u32,
    pub good_signal_time_ms: u64,
    pub one_bar_weak_signal_time_ms: u64,
    pub two_bars_time_ms: u64,
    pub three_bars_time_ms: u64,
    pub four_bars_time_ms: u64,
    pub five_bars_time_ms: u64,
    pub zero_bars_no_signal_time_ms: u64,
    /// Fraction of lost packets (0.0 - 1.0) counted as a missed sample
    pub fractional_loss: f64,
    pub packets_expected: u32,
    pub past_samples_to_consider: u32,
    pub missed_pongs_lower_threshold: u32,
    pub missed_pongs_upper_threshold: u32,
    pub sending_audio_failure_initial_wait_time_ms: u64,
    pub sending_audio_failure_samples_to_consider: u32,
}

impl Default for ConnectionHealthPolicy {
    fn default() -> Self {
        Self {
            connection_unhealthy_threshold: 25,
            connection_wait_time_ms: 10_000,
            no_signal_threshold_time_ms: 10_000,
            cooldown_time_ms: 60_000,
            maximum_times_to_warn: 2,
            good_signal_time_ms: 15_000,
            one_bar_weak_signal_time_ms: 5_000,
            two_bars_time_ms: 5_000,
            three_bars_time_ms: 10_000,
            four_bars_time_ms: 20_000,
            five_bars_time_ms: 60_000,
            zero_bars_no_signal_time_ms: 5_000,
            fractional_loss: 0.5,
            packets_expected: 50,
            past_samples_to_consider: 15,
            missed_pongs_lower_threshold: 1,
            missed_pongs_upper_threshold: 4,
            sending_audio_failure_initial_wait_time_ms: 3_000,
            sending_audio_failure_samples_to_consider: 2,
        }
    }
}

impl ConnectionHealthPolicy {
    /// Collect every problem instead of stopping at the first
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !(0.0..=1.0).contains(&self.fractional_loss) {
            errors.push(format!(
                "connection_health.fractional_loss must be within 0.0..=1.0, got {}",
                self.fractional_loss
            ));
        }
        if self.missed_pongs_lower_threshold > self.missed_pongs_upper_threshold {
            errors.push(format!(
                "connection_health.missed_pongs_lower_threshold ({}) exceeds missed_pongs_upper_threshold ({})",
                self.missed_pongs_lower_threshold, self.missed_pongs_upper_threshold
            ));
        }
        if self.past_samples_to_consider == 0 {
            errors.push(
                "connection_health.past_samples_to_consider must be at least 1".to_string(),
            );
        }
        if self.packets_expected == 0 {
            errors.push("connection_health.packets_expected must be at least 1".to_string());
        }
        errors
    }
}

/// User overrides for a connection health policy; unset fields keep the base value
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionHealthOverrides {
    pub connection_unhealthy_threshold: Option<u32>,
    pub connection_wait_time_ms: Option<u64>,
    pub no_signal_threshold_time_ms: Option<u64>,
    pub cooldown_time_ms: Option<u64>,
    pub maximum_times_to_warn: Option<u32>,
    pub good_signal_time_ms: Option<u64>,
    pub one_bar_weak_signal_time_ms: Option<u64>,
    pub two_bars_time_ms: Option<u64>,
    pub three_bars_time_ms: Option<u64>,
    pub four_bars_time_ms: Option<u64>,
    pub five_bars_time_ms: Option<u64>,
    pub zero_bars_no_signal_time_ms: Option<u64>,
    pub fractional_loss: Option<f64>,
    pub packets_expected: Option<u32>,
    pub past_samples_to_consider: Option<u32>,
    pub missed_pongs_lower_threshold: Option<u32>,
    pub missed_pongs_upper_threshold: Option<u32>,
    pub sending_audio_failure_initial_wait_time_ms: Option<u64>,
    pub sending_audio_failure_samples_to_consider: Option<u32>,
}

impl ConnectionHealthOverrides {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    #[must_use]
    pub fn apply_to(&self, base: &ConnectionHealthPolicy) -> ConnectionHealthPolicy {
        ConnectionHealthPolicy {
            connection_unhealthy_threshold: self
                .connection_unhealthy_threshold
                .unwrap_or(base.connection_unhealthy_threshold),
            connection_wait_time_ms: self
                .connection_wait_time_ms
                .unwrap_or(base.connection_wait_time_ms),
            no_signal_threshold_time_ms: self
                .no_signal_threshold_time_ms
                .unwrap_or(base.no_signal_threshold_time_ms),
            cooldown_time_ms: self.cooldown_time_ms.unwrap_or(base.cooldown_time_ms),
            maximum_times_to_warn: self.maximum_times_to_warn.unwrap_or(base.maximum_times_to_warn),
            good_signal_time_ms: self.good_signal_time_ms.unwrap_or(base.good_signal_time_ms),
            one_bar_weak_signal_time_ms: self
                .one_bar_weak_signal_time_ms
                .unwrap_or(base.one_bar_weak_signal_time_ms),
            two_bars_time_ms: self.two_bars_time_ms.unwrap_or(base.two_bars_time_ms),
            three_bars_time_ms: self.three_bars_time_ms.unwrap_or(base.three_bars_time_ms),
            four_bars_time_ms: self.four_bars_time_ms.unwrap_or(base.four_bars_time_ms),
            five_bars_time_ms: self.five_bars_time_ms.unwrap_or(base.five_bars_time_ms),
            zero_bars_no_signal_time_ms: self
                .zero_bars_no_signal_time_ms
                .unwrap_or(base.zero_bars_no_signal_time_ms),
            fractional_loss: self.fractional_loss.unwrap_or(base.fractional_loss),
            packets_expected: self.packets_expected.unwrap_or(base.packets_expected),
            past_samples_to_consider: self
                .past_samples_to_consider
                .unwrap_or(base.past_samples_to_consider),
            missed_pongs_lower_threshold: self
                .missed_pongs_lower_threshold
                .unwrap_or(base.missed_pongs_lower_threshold),
            missed_pongs_upper_threshold: self
                .missed_pongs_upper_threshold
                .unwrap_or(base.missed_pongs_upper_threshold),
            sending_audio_failure_initial_wait_time_ms: self
                .sending_audio_failure_initial_wait_time_ms
                .unwrap_or(base.sending_audio_failure_initial_wait_time_ms),
            sending_audio_failure_samples_to_consider: self
                .sending_audio_failure_samples_to_consider
                .unwrap_or(base.sending_audio_failure_samples_to_consider),
        }
    }
}

/// Per-deployment meeting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
    #[serde(default)]
    pub bandwidth_caps: TierBandwidthCaps,
    /// Ideal maximum uplink bandwidth; every tier cap is clamped to it
    #[serde(default)]
    pub uplink_ceiling_kbps: Option<u32>,
    /// Show the last frame instead of a black tile while video is paused
    #[serde(default)]
    pub keep_last_frame_when_paused: bool,
    #[serde(default)]
    pub reconnect: ReconnectPolicy,
    #[serde(default)]
    pub connection_health: ConnectionHealthPolicy,
}

const fn default_frame_rate() -> u32 {
    DEFAULT_FRAME_RATE
}

impl MeetingProfile {
    /// Baseline profile used by the app
    #[must_use]
    pub fn custom() -> Self {
        Self {
            id: CUSTOM_PROFILE_ID.to_string(),
            name: "Custom".to_string(),
            description: "Custom config used by the app".to_string(),
            frame_rate: DEFAULT_FRAME_RATE,
            bandwidth_caps: TierBandwidthCaps::default(),
            uplink_ceiling_kbps: None,
            keep_last_frame_when_paused: false,
            reconnect: ReconnectPolicy::default(),
            connection_health: ConnectionHealthPolicy::default(),
        }
    }

    /// Stability-tuned profile: roomier caps, longer reconnects, quicker unhealthy detection
    #[must_use]
    pub fn cp() -> Self {
        Self {
            id: CP_PROFILE_ID.to_string(),
            name: "CP".to_string(),
            description: "Config used by CP".to_string(),
            frame_rate: DEFAULT_FRAME_RATE,
            bandwidth_caps: TierBandwidthCaps::new(400, 600, 1000, 1200),
            uplink_ceiling_kbps: Some(1200),
            keep_last_frame_when_paused: true,
            reconnect: ReconnectPolicy {
                reconnect_timeout_ms: 120_000,
                fixed_wait_ms: 2_000,
                short_backoff_ms: 1_000,
                long_backoff_ms: 5_000,
                connection_timeout_ms: 20_000,
                attendee_presence_timeout_ms: 30_000,
            },
            connection_health: ConnectionHealthPolicy {
                connection_unhealthy_threshold: 15,
                ..ConnectionHealthPolicy::default()
            },
        }
    }

    /// Same profile with connection health overrides applied
    #[must_use]
    pub fn with_overrides(mut self, overrides: &ConnectionHealthOverrides) -> Self {
        self.connection_health = overrides.apply_to(&self.connection_health);
        self
    }

    /// Adapter configuration for this profile
    #[must_use]
    pub fn adapter_config(&self, settings: &AdapterSettings) -> AdapterConfig {
        AdapterConfig {
            cooldown_ms: settings.cooldown_ms,
            frame_rate: self.frame_rate,
            bandwidth_caps: self.bandwidth_caps,
            uplink_ceiling_kbps: self.uplink_ceiling_kbps,
            unmeasured_bitrate: settings.unmeasured_bitrate,
        }
    }

    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.frame_rate == 0 {
            errors.push(format!("profile {}: frame_rate must be positive", self.id));
        }
        if !self.bandwidth_caps.is_monotonic() {
            errors.push(format!(
                "profile {}: bandwidth caps must be positive and non-decreasing from 180p to 720p",
                self.id
            ));
        }
        if self.uplink_ceiling_kbps == Some(0) {
            errors.push(format!("profile {}: uplink_ceiling_kbps must be positive", self.id));
        }
        errors.extend(
            self.connection_health
                .validate()
                .into_iter()
                .map(|e| format!("profile {}: {e}", self.id)),
        );
        errors
    }
}

/// Lookup of meeting profiles by id
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: Vec<MeetingProfile>,
}

impl ProfileRegistry {
    /// Registry holding the built-in profiles
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            profiles: vec![MeetingProfile::custom(), MeetingProfile::cp()],
        }
    }

    /// Add a profile, replacing any profile with the same id
    pub fn register(&mut self, profile: MeetingProfile) {
        if let Some(existing) = self.profiles.iter_mut().find(|p| p.id == profile.id) {
            *existing = profile;
        } else {
            self.profiles.push(profile);
        }
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&MeetingProfile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    pub fn resolve(&self, id: &str) -> Result<&MeetingProfile> {
        self.get(id).ok_or_else(|| Error::UnknownProfile(id.to_string()))
    }

    #[must_use]
    pub fn default_profile(&self) -> Option<&MeetingProfile> {
        self.get(DEFAULT_PROFILE_ID)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MeetingProfile> {
        self.profiles.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tier::VideoQualityTier;

    #[test]
    fn test_builtin_registry() {
        let registry = ProfileRegistry::builtin();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.default_profile().unwrap().id, CUSTOM_PROFILE_ID);
        assert_eq!(registry.resolve(CP_PROFILE_ID).unwrap().name, "CP");
        assert!(matches!(
            registry.resolve("meeting-config-missing"),
            Err(Error::UnknownProfile(_))
        ));
    }

    #[test]
    fn test_builtin_profiles_are_valid() {
        for profile in ProfileRegistry::builtin().iter() {
            assert!(profile.validate().is_empty(), "{:?}", profile.validate());
        }
    }

    #[test]
    fn test_profiles_differ_in_caps() {
        let custom = MeetingProfile::custom();
        let cp = MeetingProfile::cp();
        assert_ne!(custom.bandwidth_caps, cp.bandwidth_caps);
        assert_eq!(cp.bandwidth_caps.cap_for(VideoQualityTier::P180), 400);
        assert_eq!(cp.reconnect.fixed_wait_ms, 2_000);
        assert_eq!(cp.connection_health.connection_unhealthy_threshold, 15);
        assert_eq!(cp.connection_health.cooldown_time_ms, 60_000);
    }

    #[test]
    fn test_register_replaces_by_id() {
        let mut registry = ProfileRegistry::builtin();
        let mut low = MeetingProfile::custom();
        low.id = "meeting-config-low".to_string();
        low.uplink_ceiling_kbps = Some(150);
        registry.register(low);
        assert_eq!(registry.len(), 3);

        let mut replacement = MeetingProfile::custom();
        replacement.description = "replaced".to_string();
        registry.register(replacement);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.default_profile().unwrap().description, "replaced");
    }

    #[test]
    fn test_overrides_only_touch_defined_fields() {
        let overrides = ConnectionHealthOverrides {
            connection_unhealthy_threshold: Some(40),
            fractional_loss: Some(0.3),
            ..ConnectionHealthOverrides::default()
        };
        assert!(!overrides.is_empty());
        assert!(ConnectionHealthOverrides::default().is_empty());

        let profile = MeetingProfile::cp().with_overrides(&overrides);
        assert_eq!(profile.connection_health.connection_unhealthy_threshold, 40);
        assert!((profile.connection_health.fractional_loss - 0.3).abs() < f64::EPSILON);
        assert_eq!(profile.connection_health.packets_expected, 50);
        assert_eq!(profile.connection_health.missed_pongs_upper_threshold, 4);
    }

    #[test]
    fn test_invalid_health_policy() {
        let policy = ConnectionHealthPolicy {
            fractional_loss: 1.5,
            missed_pongs_lower_threshold: 5,
            missed_pongs_upper_threshold: 2,
            ..ConnectionHealthPolicy::default()
        };
        assert_eq!(policy.validate().len(), 2);
    }

    #[test]
    fn test_adapter_config_from_profile() {
        let settings = AdapterSettings {
            cooldown_ms: 3_000,
            ..AdapterSettings::default()
        };
        let config = MeetingProfile::cp().adapter_config(&settings);
        assert_eq!(config.cooldown_ms, 3_000);
        assert_eq!(config.frame_rate, 15);
        assert_eq!(config.uplink_ceiling_kbps, Some(1200));
        assert_eq!(config.bandwidth_caps, TierBandwidthCaps::new(400, 600, 1000, 1200));
    }

    #[test]
    fn test_overrides_deserialize_partially() {
        let overrides: ConnectionHealthOverrides =
            serde_json::from_str(r#"{"cooldown_time_ms": 30000}"#).unwrap();
        assert_eq!(overrides.cooldown_time_ms, Some(30_000));
        assert_eq!(overrides.packets_expected, None);
    }
}
