//! Metric reports delivered by the media engine
//!
//! A report is a lookup-by-name view over one reporting cycle. Metrics the
//! engine could not measure read as `NaN`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Estimated available uplink bandwidth, bits per second
pub const AVAILABLE_OUTGOING_BITRATE: &str = "availableOutgoingBitrate";

/// Outgoing audio packet loss, percent (0-100)
pub const AUDIO_PACKET_LOSS_PERCENT: &str = "audioPacketLossPercent";

/// One reporting cycle's snapshot of connection-quality observables
pub trait MetricReport {
    /// Value of the named metric, `NaN` when unavailable
    fn observable_metric_value(&self, name: &str) -> f64;
}

/// Map-backed metric report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    values: HashMap<String, f64>,
}

impl MetricSnapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot carrying the two metrics the classifier reads
    #[must_use]
    pub fn uplink(available_outgoing_bitrate_bps: f64, audio_packet_loss_percent: f64) -> Self {
        Self::new()
            .with(AVAILABLE_OUTGOING_BITRATE, available_outgoing_bitrate_bps)
            .with(AUDIO_PACKET_LOSS_PERCENT, audio_packet_loss_percent)
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }
}

impl MetricReport for MetricSnapshot {
    fn observable_metric_value(&self, name: &str) -> f64 {
        self.values.get(name).copied().unwrap_or(f64::NAN)
    }
}

/// Uplink observables extracted from a report
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UplinkMetrics {
    pub outgoing_bitrate_bps: f64,
    pub audio_packet_loss_percent: f64,
}

impl UplinkMetrics {
    pub fn from_report(report: &(impl MetricReport + ?Sized)) -> Self {
        Self {
            outgoing_bitrate_bps: report.observable_metric_value(AVAILABLE_OUTGOING_BITRATE),
            audio_packet_loss_percent: report.observable_metric_value(AUDIO_PACKET_LOSS_PERCENT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_metric_reads_nan() {
        let report = MetricSnapshot::new().with(AVAILABLE_OUTGOING_BITRATE, 1_000_000.0);
        assert_eq!(report.observable_metric_value(AVAILABLE_OUTGOING_BITRATE), 1_000_000.0);
        assert!(report.observable_metric_value(AUDIO_PACKET_LOSS_PERCENT).is_nan());
        assert!(report.observable_metric_value("rttMs").is_nan());
    }

    #[test]
    fn test_uplink_metrics_from_report() {
        let report = MetricSnapshot::uplink(750_000.0, 2.5);
        let uplink = UplinkMetrics::from_report(&report);
        assert_eq!(uplink.outgoing_bitrate_bps, 750_000.0);
        assert_eq!(uplink.audio_packet_loss_percent, 2.5);
    }
}
