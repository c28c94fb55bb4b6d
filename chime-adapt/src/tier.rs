//! Outgoing video quality tiers
//!
//! Each tier fixes the capture/encode resolution. Frame rate and the
//! outgoing bandwidth cap come from the active configuration so deployments
//! can tune them per profile.

use crate::quality::NetworkQuality;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outgoing video quality tier, ordered by resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VideoQualityTier {
    #[serde(rename = "180p")]
    P180,
    #[serde(rename = "360p")]
    P360,
    #[serde(rename = "540p")]
    P540,
    #[serde(rename = "720p")]
    P720,
}

impl VideoQualityTier {
    pub const ALL: [Self; 4] = [Self::P180, Self::P360, Self::P540, Self::P720];

    /// Target tier for a network quality class
    ///
    /// Good and Excellent share 720p; there is no tier between 540p and 720p.
    #[must_use]
    pub const fn for_quality(quality: NetworkQuality) -> Self {
        match quality {
            NetworkQuality::Critical => Self::P180,
            NetworkQuality::Poor => Self::P360,
            NetworkQuality::Fair => Self::P540,
            NetworkQuality::Good | NetworkQuality::Excellent => Self::P720,
        }
    }

    /// Capture/encode resolution (width, height)
    #[must_use]
    pub const fn resolution(&self) -> (u32, u32) {
        match self {
            Self::P180 => (320, 180),
            Self::P360 => (640, 360),
            Self::P540 => (960, 540),
            Self::P720 => (1280, 720),
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::P180 => "180p",
            Self::P360 => "360p",
            Self::P540 => "540p",
            Self::P720 => "720p",
        }
    }
}

impl fmt::Display for VideoQualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maximum outgoing video bandwidth per tier (kbps)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierBandwidthCaps {
    pub p180_kbps: u32,
    pub p360_kbps: u32,
    pub p540_kbps: u32,
    pub p720_kbps: u32,
}

impl TierBandwidthCaps {
    #[must_use]
    pub const fn new(p180_kbps: u32, p360_kbps: u32, p540_kbps: u32, p720_kbps: u32) -> Self {
        Self {
            p180_kbps,
            p360_kbps,
            p540_kbps,
            p720_kbps,
        }
    }

    #[must_use]
    pub const fn cap_for(&self, tier: VideoQualityTier) -> u32 {
        match tier {
            VideoQualityTier::P180 => self.p180_kbps,
            VideoQualityTier::P360 => self.p360_kbps,
            VideoQualityTier::P540 => self.p540_kbps,
            VideoQualityTier::P720 => self.p720_kbps,
        }
    }

    /// True when caps never decrease as resolution goes up
    #[must_use]
    pub fn is_monotonic(&self) -> bool {
        self.p180_kbps > 0
            && self.p180_kbps <= self.p360_kbps
            && self.p360_kbps <= self.p540_kbps
            && self.p540_kbps <= self.p720_kbps
    }
}

impl Default for TierBandwidthCaps {
    fn default() -> Self {
        Self::new(300, 500, 800, 1200)
    }
}

/// Concrete parameters of the two commands issued for a tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSettings {
    pub tier: VideoQualityTier,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub max_bandwidth_kbps: u32,
}

impl fmt::Display for TierSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}x{}@{}fps, {}kbps)",
            self.tier, self.width, self.height, self.frame_rate, self.max_bandwidth_kbps
        )
    }
}
