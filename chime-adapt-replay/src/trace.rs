//! JSON-lines metric traces
//!
//! One object per line:
//! `{"at_ms": 0, "available_outgoing_bitrate": 1200000, "audio_packet_loss_percent": 0.5}`.
//! Missing or `null` metrics are replayed as unmeasured. An optional
//! `"connected"` flag attaches or detaches the media session at that point.
//! Blank lines and lines starting with `#` are ignored.

use anyhow::{bail, Context, Result};
use chime_adapt::{MetricSnapshot, AUDIO_PACKET_LOSS_PERCENT, AVAILABLE_OUTGOING_BITRATE};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Milliseconds since the start of the trace
    pub at_ms: u64,
    #[serde(default)]
    pub available_outgoing_bitrate: Option<f64>,
    #[serde(default)]
    pub audio_packet_loss_percent: Option<f64>,
    #[serde(default)]
    pub connected: Option<bool>,
}

impl TraceEntry {
    pub fn to_snapshot(&self) -> MetricSnapshot {
        let mut snapshot = MetricSnapshot::new();
        if let Some(bitrate) = self.available_outgoing_bitrate {
            snapshot.insert(AVAILABLE_OUTGOING_BITRATE, bitrate);
        }
        if let Some(loss) = self.audio_packet_loss_percent {
            snapshot.insert(AUDIO_PACKET_LOSS_PERCENT, loss);
        }
        snapshot
    }
}

/// Tracks whether the media session is attached while a trace is replayed.
///
/// `connect_at_ms` attaches the session once, the first time the trace reaches
/// that time. An explicit `connected` flag on an entry always wins and stays in
/// effect until another entry changes it.
#[derive(Debug, Clone)]
pub struct ConnectionSchedule {
    connect_at_ms: Option<u64>,
    attached: bool,
}

impl ConnectionSchedule {
    pub fn new(connect_at_ms: Option<u64>) -> Self {
        Self {
            connect_at_ms,
            attached: connect_at_ms.is_none(),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Attached state in effect for `entry`
    pub fn advance(&mut self, entry: &TraceEntry) -> bool {
        if let Some(connect_at) = self.connect_at_ms {
            if entry.at_ms >= connect_at {
                self.connect_at_ms = None;
                self.attached = true;
            }
        }
        if let Some(connected) = entry.connected {
            self.attached = connected;
        }
        self.attached
    }
}

/// Parse a trace, requiring timestamps in non-decreasing order
pub fn parse_trace(input: &str) -> Result<Vec<TraceEntry>> {
    let mut entries: Vec<TraceEntry> = Vec::new();

    for (index, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let entry: TraceEntry = serde_json::from_str(line)
            .with_context(|| format!("trace line {}: invalid entry", index + 1))?;

        if let Some(last) = entries.last() {
            if entry.at_ms < last.at_ms {
                bail!(
                    "trace line {}: at_ms {} goes back in time (previous {})",
                    index + 1,
                    entry.at_ms,
                    last.at_ms
                );
            }
        }
        entries.push(entry);
    }

    Ok(entries)
}
