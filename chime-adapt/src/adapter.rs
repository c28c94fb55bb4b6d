//! Network-quality video adapter
//!
//! Subscribed to a metrics source, the adapter classifies every report and,
//! at most once per cooldown interval, moves the outgoing video to the tier
//! matching the current network quality.
//!
//! Classification always runs so statistics and logs reflect every report;
//! the cooldown only gates the commands sent to the media session. A pass that
//! could not reach the session does not count as an adjustment, so the next
//! report is free to try again.

use crate::clock::Clock;
use crate::config::AdapterConfig;
use crate::cooldown::{CooldownGate, GateDecision};
use crate::error::{Error, Result};
use crate::metrics::MetricReport;
use crate::quality::{assess_report, NetworkQuality, QualityAssessment};
use crate::session::{MediaSession, MetricsObserver, SessionSlot};
use crate::tier::{TierSettings, VideoQualityTier};
use crate::types::SessionId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// What one metric report led to
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AdjustmentOutcome {
    /// Both commands were accepted by the media session
    Applied {
        assessment: QualityAssessment,
        settings: TierSettings,
    },
    /// Inside the cooldown window; nothing was sent
    CoolingDown {
        assessment: QualityAssessment,
        remaining_ms: u64,
    },
    /// No media session connected yet
    SessionUnavailable { assessment: QualityAssessment },
    /// The media session rejected a command
    CommandFailed {
        assessment: QualityAssessment,
        settings: TierSettings,
    },
}

impl AdjustmentOutcome {
    #[must_use]
    pub const fn assessment(&self) -> &QualityAssessment {
        match self {
            Self::Applied { assessment, .. }
            | Self::CoolingDown { assessment, .. }
            | Self::SessionUnavailable { assessment }
            | Self::CommandFailed { assessment, .. } => assessment,
        }
    }

    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Adapter statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdapterStats {
    pub session_id: String,
    pub reports_received: u64,
    pub adjustments_applied: u64,
    pub suppressed_by_cooldown: u64,
    pub skipped_no_session: u64,
    pub failed_commands: u64,
    pub last_quality: Option<NetworkQuality>,
    pub last_applied: Option<TierSettings>,
    pub last_adjustment_ms: Option<u64>,
}

#[derive(Default)]
struct AdapterCounters {
    reports_received: AtomicU64,
    adjustments_applied: AtomicU64,
    suppressed_by_cooldown: AtomicU64,
    skipped_no_session: AtomicU64,
    failed_commands: AtomicU64,
}

/// Adaptive video quality controller for one call
pub struct QualityAdapter {
    session_id: SessionId,
    config: watch::Receiver<AdapterConfig>,
    clock: Arc<dyn Clock>,
    session: SessionSlot,
    gate: CooldownGate,
    counters: AdapterCounters,
    last_quality: RwLock<Option<NetworkQuality>>,
    last_applied: RwLock<Option<TierSettings>>,
}

impl QualityAdapter {
    /// Create an adapter with no media session attached
    ///
    /// `config` is re-read on every report, so publishing a new value on the
    /// sender side takes effect without rebuilding the adapter.
    pub fn new(
        session_id: SessionId,
        config: watch::Receiver<AdapterConfig>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            session_id,
            config,
            clock,
            session: SessionSlot::new(),
            gate: CooldownGate::new(),
            counters: AdapterCounters::default(),
            last_quality: RwLock::new(None),
            last_applied: RwLock::new(None),
        }
    }

    /// Share an existing session slot with the adapter
    #[must_use]
    pub fn with_session_slot(mut self, slot: SessionSlot) -> Self {
        self.session = slot;
        self
    }

    #[must_use]
    pub const fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    #[must_use]
    pub const fn session(&self) -> &SessionSlot {
        &self.session
    }

    pub fn attach_session(&self, session: Arc<dyn MediaSession>) {
        info!(session_id = %self.session_id, "Media session attached");
        self.session.attach(session);
    }

    pub fn detach_session(&self) -> Option<Arc<dyn MediaSession>> {
        let previous = self.session.detach();
        if previous.is_some() {
            info!(session_id = %self.session_id, "Media session detached");
        }
        previous
    }

    /// Current configuration snapshot
    #[must_use]
    pub fn config(&self) -> AdapterConfig {
        *self.config.borrow()
    }

    /// Classify a report and adjust video quality if the cooldown allows
    pub fn on_report(&self, report: &dyn MetricReport) -> AdjustmentOutcome {
        self.counters.reports_received.fetch_add(1, Ordering::Relaxed);

        let config = self.config();
        let assessment = assess_report(report, config.unmeasured_bitrate);
        *self.last_quality.write() = Some(assessment.quality);

        debug!(
            session_id = %self.session_id,
            upload_kbps = assessment.upload_kbps,
            bandwidth_score = assessment.bandwidth_score,
            loss_penalty = assessment.loss_penalty,
            final_score = assessment.final_score,
            quality = %assessment.quality,
            "Network quality assessed"
        );

        let Some(session) = self.session.current() else {
            self.counters.skipped_no_session.fetch_add(1, Ordering::Relaxed);
            debug!(
                session_id = %self.session_id,
                "Media session not connected, skipping adjustment"
            );
            return AdjustmentOutcome::SessionUnavailable { assessment };
        };

        let now = self.clock.now_ms();
        let previous = match self.gate.try_acquire(now, config.cooldown_ms) {
            GateDecision::Open { previous } => previous,
            GateDecision::Closed { remaining_ms } => {
                self.counters.suppressed_by_cooldown.fetch_add(1, Ordering::Relaxed);
                debug!(
                    session_id = %self.session_id,
                    remaining_ms,
                    quality = %assessment.quality,
                    "Adjustment suppressed by cooldown"
                );
                return AdjustmentOutcome::CoolingDown {
                    assessment,
                    remaining_ms,
                };
            }
        };

        let settings = config.settings_for(VideoQualityTier::for_quality(assessment.quality));
        match send_commands(session.as_ref(), &settings) {
            Ok(()) => {
                self.counters.adjustments_applied.fetch_add(1, Ordering::Relaxed);
                let old = self.last_applied.write().replace(settings);
                info!(
                    session_id = %self.session_id,
                    quality = %assessment.quality,
                    old_tier = ?old.map(|s| s.tier),
                    new_tier = %settings.tier,
                    max_bandwidth_kbps = settings.max_bandwidth_kbps,
                    "Video quality adjusted"
                );
                AdjustmentOutcome::Applied {
                    assessment,
                    settings,
                }
            }
            Err(Error::SessionUnavailable) => {
                self.gate.rollback(now, previous);
                self.counters.skipped_no_session.fetch_add(1, Ordering::Relaxed);
                debug!(
                    session_id = %self.session_id,
                    "Media session went away, skipping adjustment"
                );
                AdjustmentOutcome::SessionUnavailable { assessment }
            }
            Err(e) => {
                self.gate.rollback(now, previous);
                self.counters.failed_commands.fetch_add(1, Ordering::Relaxed);
                warn!(
                    session_id = %self.session_id,
                    tier = %settings.tier,
                    error = %e,
                    "Failed to apply video quality"
                );
                AdjustmentOutcome::CommandFailed {
                    assessment,
                    settings,
                }
            }
        }
    }

    /// Send a tier to the media session right away, bypassing the cooldown
    pub fn apply_tier(&self, tier: VideoQualityTier) -> Result<TierSettings> {
        let session = self.session.current().ok_or(Error::SessionUnavailable)?;
        let settings = self.config().settings_for(tier);
        send_commands(session.as_ref(), &settings)?;
        *self.last_applied.write() = Some(settings);
        info!(session_id = %self.session_id, tier = %tier, "Video quality set");
        Ok(settings)
    }

    #[must_use]
    pub fn stats(&self) -> AdapterStats {
        AdapterStats {
            session_id: self.session_id.as_str().to_string(),
            reports_received: self.counters.reports_received.load(Ordering::Relaxed),
            adjustments_applied: self.counters.adjustments_applied.load(Ordering::Relaxed),
            suppressed_by_cooldown: self.counters.suppressed_by_cooldown.load(Ordering::Relaxed),
            skipped_no_session: self.counters.skipped_no_session.load(Ordering::Relaxed),
            failed_commands: self.counters.failed_commands.load(Ordering::Relaxed),
            last_quality: *self.last_quality.read(),
            last_applied: *self.last_applied.read(),
            last_adjustment_ms: self.gate.last_adjustment_ms(),
        }
    }
}

impl MetricsObserver for QualityAdapter {
    fn on_metrics_received(&self, report: &dyn MetricReport) {
        self.on_report(report);
    }
}

fn send_commands(session: &dyn MediaSession, settings: &TierSettings) -> Result<()> {
    session.set_encode_resolution_and_framerate(
        settings.width,
        settings.height,
        settings.frame_rate,
    )?;
    session.set_max_outgoing_bandwidth_kbps(settings.max_bandwidth_kbps)
}
