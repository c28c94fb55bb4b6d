//! Network quality classification
//!
//! Converts one metric report into a discrete [`NetworkQuality`] class in two
//! stages: a coarse bandwidth gate, then a score refined by packet loss.
//!
//! ## Bandwidth score (upload kbps)
//! - 1: < 300
//! - 2: 300 - 500 (inclusive)
//! - 3: above 500, up to and including 800
//! - 4: above 800, below 1200
//! - 5: 1200 and up
//!
//! ## Packet loss penalty (audio loss %)
//! - 3: > 5%
//! - 2: > 3%
//! - 1: > 1%
//! - 0: otherwise, or unmeasured
//!
//! ## Class
//! - upload < 300kbps: always Critical
//! - upload 300 - 500kbps: Poor, or Critical when loss drags the score below 2
//! - above 500kbps: final score 5/4/3/2/1 maps to Excellent/Good/Fair/Poor/Critical
//!
//! Packet loss can pull the class down inside a bandwidth band but never lifts
//! it above the band's ceiling.

use crate::metrics::{MetricReport, UplinkMetrics};
use serde::{Deserialize, Serialize};
use std::fmt;

const CRITICAL_BELOW_KBPS: f64 = 300.0;
const POOR_UP_TO_KBPS: f64 = 500.0;
const FAIR_UP_TO_KBPS: f64 = 800.0;
const EXCELLENT_FROM_KBPS: f64 = 1200.0;

/// Discrete network health, ordered worst to best
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkQuality {
    Critical,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl NetworkQuality {
    pub const ALL: [Self; 5] = [
        Self::Critical,
        Self::Poor,
        Self::Fair,
        Self::Good,
        Self::Excellent,
    ];

    /// Class for a final score above the 500kbps gate
    #[must_use]
    pub const fn from_score(score: u8) -> Self {
        match score {
            5.. => Self::Excellent,
            4 => Self::Good,
            3 => Self::Fair,
            2 => Self::Poor,
            _ => Self::Critical,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Poor => "poor",
            Self::Fair => "fair",
            Self::Good => "good",
            Self::Excellent => "excellent",
        }
    }
}

impl fmt::Display for NetworkQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How to classify a report whose outgoing bitrate was not measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnmeasuredBitrate {
    /// Treat as the worst bandwidth band
    #[default]
    Critical,
    /// Treat as the best bandwidth band; only packet loss can downgrade
    Healthy,
}

/// Intermediate and final values of one classification
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    /// Upload bandwidth in kbps, `NaN` when unmeasured
    pub upload_kbps: f64,
    pub bandwidth_score: u8,
    pub loss_penalty: u8,
    pub final_score: u8,
    pub quality: NetworkQuality,
}

/// Classify a metric report
pub fn assess_report(
    report: &(impl MetricReport + ?Sized),
    unmeasured: UnmeasuredBitrate,
) -> QualityAssessment {
    assess(UplinkMetrics::from_report(report), unmeasured)
}

/// Classify uplink metrics
///
/// Total over every `f64` input, including `NaN` and infinities.
#[must_use]
pub fn assess(metrics: UplinkMetrics, unmeasured: UnmeasuredBitrate) -> QualityAssessment {
    let upload_kbps = metrics.outgoing_bitrate_bps / 1000.0;
    let loss_penalty = packet_loss_penalty(metrics.audio_packet_loss_percent);

    if upload_kbps.is_nan() {
        let bandwidth_score = match unmeasured {
            UnmeasuredBitrate::Critical => 1,
            UnmeasuredBitrate::Healthy => 5,
        };
        let final_score = combine(bandwidth_score, loss_penalty);
        let quality = match unmeasured {
            UnmeasuredBitrate::Critical => NetworkQuality::Critical,
            UnmeasuredBitrate::Healthy => NetworkQuality::from_score(final_score),
        };
        return QualityAssessment {
            upload_kbps,
            bandwidth_score,
            loss_penalty,
            final_score,
            quality,
        };
    }

    let bandwidth_score = bandwidth_score(upload_kbps);
    let final_score = combine(bandwidth_score, loss_penalty);

    let quality = if upload_kbps < CRITICAL_BELOW_KBPS {
        NetworkQuality::Critical
    } else if upload_kbps <= POOR_UP_TO_KBPS {
        if final_score >= 2 {
            NetworkQuality::Poor
        } else {
            NetworkQuality::Critical
        }
    } else {
        NetworkQuality::from_score(final_score)
    };

    QualityAssessment {
        upload_kbps,
        bandwidth_score,
        loss_penalty,
        final_score,
        quality,
    }
}

/// Shorthand for [`assess`] returning only the class
#[must_use]
pub fn classify(outgoing_bitrate_bps: f64, audio_packet_loss_percent: f64) -> NetworkQuality {
    assess(
        UplinkMetrics {
            outgoing_bitrate_bps,
            audio_packet_loss_percent,
        },
        UnmeasuredBitrate::default(),
    )
    .quality
}

/// Bandwidth score 1-5 for a measured upload rate in kbps
#[must_use]
pub fn bandwidth_score(upload_kbps: f64) -> u8 {
    if upload_kbps < CRITICAL_BELOW_KBPS {
        1
    } else if upload_kbps <= POOR_UP_TO_KBPS {
        2
    } else if upload_kbps <= FAIR_UP_TO_KBPS {
        3
    } else if upload_kbps < EXCELLENT_FROM_KBPS {
        4
    } else {
        5
    }
}

/// Score penalty for audio packet loss
#[must_use]
pub fn packet_loss_penalty(loss_percent: f64) -> u8 {
    if loss_percent.is_nan() {
        0
    } else if loss_percent > 5.0 {
        3
    } else if loss_percent > 3.0 {
        2
    } else if loss_percent > 1.0 {
        1
    } else {
        0
    }
}

fn combine(bandwidth_score: u8, loss_penalty: u8) -> u8 {
    bandwidth_score.saturating_sub(loss_penalty).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uplink(bps: f64, loss: f64) -> UplinkMetrics {
        UplinkMetrics {
            outgoing_bitrate_bps: bps,
            audio_packet_loss_percent: loss,
        }
    }

    #[test]
    fn test_bandwidth_score_boundaries() {
        assert_eq!(bandwidth_score(0.0), 1);
        assert_eq!(bandwidth_score(299.999), 1);
        assert_eq!(bandwidth_score(300.0), 2);
        assert_eq!(bandwidth_score(500.0), 2);
        assert_eq!(bandwidth_score(500.001), 3);
        assert_eq!(bandwidth_score(800.0), 3);
        assert_eq!(bandwidth_score(800.001), 4);
        assert_eq!(bandwidth_score(1199.999), 4);
        assert_eq!(bandwidth_score(1200.0), 5);
        assert_eq!(bandwidth_score(f64::INFINITY), 5);
    }

    #[test]
    fn test_packet_loss_penalty_boundaries() {
        assert_eq!(packet_loss_penalty(0.0), 0);
        assert_eq!(packet_loss_penalty(1.0), 0);
        assert_eq!(packet_loss_penalty(1.01), 1);
        assert_eq!(packet_loss_penalty(3.0), 1);
        assert_eq!(packet_loss_penalty(3.5), 2);
        assert_eq!(packet_loss_penalty(5.0), 2);
        assert_eq!(packet_loss_penalty(5.01), 3);
        assert_eq!(packet_loss_penalty(100.0), 3);
        assert_eq!(packet_loss_penalty(f64::NAN), 0);
        assert_eq!(packet_loss_penalty(-4.0), 0);
    }

    #[test]
    fn test_below_300kbps_is_always_critical() {
        for bps in [0.0, 1.0, 150_000.0, 250_000.0, 299_999.0] {
            for loss in [0.0, 2.0, 4.0, 50.0, f64::NAN] {
                assert_eq!(classify(bps, loss), NetworkQuality::Critical, "bps={bps} loss={loss}");
            }
        }
    }

    #[test]
    fn test_300_to_500kbps_without_loss_is_poor() {
        for bps in [300_000.0, 350_000.0, 420_000.0, 500_000.0] {
            assert_eq!(classify(bps, 0.0), NetworkQuality::Poor, "bps={bps}");
        }
    }

    #[test]
    fn test_poor_band_drops_to_critical_on_loss() {
        assert_eq!(classify(400_000.0, 1.5), NetworkQuality::Critical);
        assert_eq!(classify(400_000.0, 1.0), NetworkQuality::Poor);
    }

    #[test]
    fn test_score_mapping_above_500kbps() {
        assert_eq!(classify(600_000.0, 0.0), NetworkQuality::Fair);
        assert_eq!(classify(800_000.0, 0.0), NetworkQuality::Fair);
        assert_eq!(classify(900_000.0, 0.0), NetworkQuality::Good);
        assert_eq!(classify(1_200_000.0, 0.0), NetworkQuality::Excellent);
        assert_eq!(classify(1_300_000.0, 2.0), NetworkQuality::Good);
        assert_eq!(classify(1_300_000.0, 4.0), NetworkQuality::Fair);
        assert_eq!(classify(600_000.0, 2.0), NetworkQuality::Poor);
    }

    #[test]
    fn test_heavy_loss_overrides_good_bandwidth() {
        let assessment = assess(uplink(1_000_000.0, 6.0), UnmeasuredBitrate::Critical);
        assert_eq!(assessment.upload_kbps, 1000.0);
        assert_eq!(assessment.bandwidth_score, 4);
        assert_eq!(assessment.loss_penalty, 3);
        assert_eq!(assessment.final_score, 1);
        assert_eq!(assessment.quality, NetworkQuality::Critical);
    }

    #[test]
    fn test_heavy_loss_drops_at_least_one_step() {
        let mut bps = 0.0;
        while bps <= 2_000_000.0 {
            let clean = classify(bps, 0.0);
            let lossy = classify(bps, 6.0);
            if clean == NetworkQuality::Critical {
                assert_eq!(lossy, NetworkQuality::Critical);
            } else {
                assert!(lossy < clean, "bps={bps} clean={clean} lossy={lossy}");
            }
            bps += 25_000.0;
        }
    }

    #[test]
    fn test_non_positive_bitrate_is_critical() {
        assert_eq!(classify(0.0, 0.0), NetworkQuality::Critical);
        assert_eq!(classify(-5_000.0, 0.0), NetworkQuality::Critical);
        assert_eq!(classify(f64::NEG_INFINITY, 0.0), NetworkQuality::Critical);
    }

    #[test]
    fn test_infinite_inputs() {
        assert_eq!(classify(f64::INFINITY, 0.0), NetworkQuality::Excellent);
        assert_eq!(classify(f64::INFINITY, f64::INFINITY), NetworkQuality::Poor);
    }

    #[test]
    fn test_unmeasured_bitrate_policy() {
        let critical = assess(uplink(f64::NAN, f64::NAN), UnmeasuredBitrate::Critical);
        assert_eq!(critical.quality, NetworkQuality::Critical);
        assert_eq!(critical.bandwidth_score, 1);
        assert_eq!(critical.final_score, 1);
        assert!(critical.upload_kbps.is_nan());

        let healthy = assess(uplink(f64::NAN, f64::NAN), UnmeasuredBitrate::Healthy);
        assert_eq!(healthy.quality, NetworkQuality::Excellent);

        let healthy_lossy = assess(uplink(f64::NAN, 4.0), UnmeasuredBitrate::Healthy);
        assert_eq!(healthy_lossy.quality, NetworkQuality::Fair);
    }

    #[test]
    fn test_quality_order() {
        assert!(NetworkQuality::Critical < NetworkQuality::Poor);
        assert!(NetworkQuality::Poor < NetworkQuality::Fair);
        assert!(NetworkQuality::Fair < NetworkQuality::Good);
        assert!(NetworkQuality::Good < NetworkQuality::Excellent);
    }

    #[test]
    fn test_quality_serde_lowercase() {
        let json = serde_json::to_string(&NetworkQuality::Excellent).unwrap();
        assert_eq!(json, "\"excellent\"");
        let policy: UnmeasuredBitrate = serde_json::from_str("\"healthy\"").unwrap();
        assert_eq!(policy, UnmeasuredBitrate::Healthy);
    }
}
