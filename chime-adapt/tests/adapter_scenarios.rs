//! End-to-end adapter scenarios
//!
//! Drives the adapter through a metrics hub against a recording media session.
//!
//! Run with: cargo test --test adapter_scenarios

use chime_adapt::{
    AdapterConfig, AdjustmentOutcome, Config, ManualClock, MediaSession, MetricSnapshot,
    MetricsHub, MetricsSource, NetworkQuality, QualityAdapter, Result, SessionId, Subscription,
    VideoQualityTier,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    EncodeResolution { width: u32, height: u32, frame_rate: u32 },
    MaxBandwidth { kbps: u32 },
}

#[derive(Default)]
struct RecordingSession {
    commands: Mutex<Vec<Command>>,
}

impl RecordingSession {
    fn commands(&self) -> Vec<Command> {
        self.commands.lock().clone()
    }
}

impl MediaSession for RecordingSession {
    fn set_encode_resolution_and_framerate(
        &self,
        width: u32,
        height: u32,
        frame_rate: u32,
    ) -> Result<()> {
        self.commands.lock().push(Command::EncodeResolution {
            width,
            height,
            frame_rate,
        });
        Ok(())
    }

    fn set_max_outgoing_bandwidth_kbps(&self, kbps: u32) -> Result<()> {
        self.commands.lock().push(Command::MaxBandwidth { kbps });
        Ok(())
    }
}

struct Harness {
    clock: Arc<ManualClock>,
    session: Arc<RecordingSession>,
    adapter: Arc<QualityAdapter>,
    config_tx: watch::Sender<AdapterConfig>,
}

fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new(1_000_000));
    let session = Arc::new(RecordingSession::default());
    let (config_tx, config_rx) = watch::channel(AdapterConfig::default());
    let adapter = Arc::new(QualityAdapter::new(
        SessionId::from("scenario"),
        config_rx,
        clock.clone(),
    ));
    adapter.attach_session(session.clone());
    Harness {
        clock,
        session,
        adapter,
        config_tx,
    }
}

fn applied_tier(outcome: &AdjustmentOutcome) -> Option<VideoQualityTier> {
    match outcome {
        AdjustmentOutcome::Applied { settings, .. } => Some(settings.tier),
        _ => None,
    }
}

#[test]
fn test_low_bitrate_selects_180p() {
    let h = harness();
    let outcome = h.adapter.on_report(&MetricSnapshot::uplink(250_000.0, 0.0));

    assert_eq!(outcome.assessment().quality, NetworkQuality::Critical);
    assert_eq!(applied_tier(&outcome), Some(VideoQualityTier::P180));
    assert_eq!(
        h.session.commands(),
        vec![
            Command::EncodeResolution {
                width: 320,
                height: 180,
                frame_rate: 15
            },
            Command::MaxBandwidth { kbps: 300 },
        ]
    );
}

#[test]
fn test_heavy_loss_overrides_good_bandwidth() {
    let h = harness();
    let outcome = h.adapter.on_report(&MetricSnapshot::uplink(1_000_000.0, 6.0));

    let assessment = outcome.assessment();
    assert_eq!(assessment.bandwidth_score, 4);
    assert_eq!(assessment.loss_penalty, 3);
    assert_eq!(assessment.final_score, 1);
    assert_eq!(assessment.quality, NetworkQuality::Critical);
    assert_eq!(applied_tier(&outcome), Some(VideoQualityTier::P180));
}

#[test]
fn test_high_bitrate_selects_720p() {
    let h = harness();
    let outcome = h.adapter.on_report(&MetricSnapshot::uplink(1_300_000.0, 0.0));

    assert_eq!(outcome.assessment().final_score, 5);
    assert_eq!(outcome.assessment().quality, NetworkQuality::Excellent);
    assert_eq!(applied_tier(&outcome), Some(VideoQualityTier::P720));
    assert_eq!(
        h.session.commands(),
        vec![
            Command::EncodeResolution {
                width: 1280,
                height: 720,
                frame_rate: 15
            },
            Command::MaxBandwidth { kbps: 1200 },
        ]
    );
}

#[test]
fn test_improving_bitrate_within_cooldown_is_suppressed() {
    let h = harness();
    let first = h.adapter.on_report(&MetricSnapshot::uplink(350_000.0, 0.0));
    h.clock.advance(2_000);
    let second = h.adapter.on_report(&MetricSnapshot::uplink(1_300_000.0, 0.0));

    assert_eq!(applied_tier(&first), Some(VideoQualityTier::P360));
    assert!(matches!(second, AdjustmentOutcome::CoolingDown { .. }));
    assert_eq!(second.assessment().quality, NetworkQuality::Excellent);
    assert_eq!(h.session.commands().len(), 2);
}

#[test]
fn test_debounce_then_second_adjustment_after_interval() {
    let h = harness();
    let report = MetricSnapshot::uplink(600_000.0, 0.0);

    assert!(h.adapter.on_report(&report).is_applied());
    h.clock.advance(4_999);
    assert!(!h.adapter.on_report(&report).is_applied());
    h.clock.advance(2);
    assert!(h.adapter.on_report(&report).is_applied());

    let stats = h.adapter.stats();
    assert_eq!(stats.reports_received, 3);
    assert_eq!(stats.adjustments_applied, 2);
    assert_eq!(stats.suppressed_by_cooldown, 1);
    assert_eq!(stats.last_adjustment_ms, Some(1_005_001));
}

#[test]
fn test_same_tier_twice_issues_identical_commands() {
    let h = harness();
    let report = MetricSnapshot::uplink(900_000.0, 0.0);

    assert!(h.adapter.on_report(&report).is_applied());
    h.clock.advance(6_000);
    assert!(h.adapter.on_report(&report).is_applied());

    let commands = h.session.commands();
    assert_eq!(commands.len(), 4);
    assert_eq!(commands[..2], commands[2..]);
}

#[test]
fn test_cooldown_resets_even_when_tier_unchanged() {
    let h = harness();
    let report = MetricSnapshot::uplink(900_000.0, 0.0);

    assert!(h.adapter.on_report(&report).is_applied());
    h.clock.advance(6_000);
    assert!(h.adapter.on_report(&report).is_applied());
    h.clock.advance(3_000);
    // A different tier is due, but the unchanged pass above restarted the window
    assert!(!h.adapter.on_report(&MetricSnapshot::uplink(100_000.0, 0.0)).is_applied());
}

#[test]
fn test_adapter_driven_through_hub_subscription() {
    let h = harness();
    let hub = Arc::new(MetricsHub::new());
    let subscription = Subscription::attach(hub.clone(), h.adapter.clone()).unwrap();

    assert_eq!(hub.publish(&MetricSnapshot::uplink(450_000.0, 0.0)), 1);
    assert_eq!(h.adapter.stats().adjustments_applied, 1);

    drop(subscription);
    h.clock.advance(10_000);
    assert_eq!(hub.publish(&MetricSnapshot::uplink(1_300_000.0, 0.0)), 0);
    assert_eq!(h.adapter.stats().reports_received, 1);
}

#[test]
fn test_session_end_tears_down_subscription() {
    let h = harness();
    let hub = Arc::new(MetricsHub::new());
    let subscription = Subscription::attach(hub.clone(), h.adapter.clone()).unwrap();
    let id = subscription.id().cloned().unwrap();

    hub.close();
    assert!(hub.unsubscribe(&id).is_err());
    // Guard drop after the hub is gone only logs
    drop(subscription);
    assert_eq!(hub.observer_count(), 0);
}

#[test]
fn test_profile_switch_changes_caps() {
    let h = harness();
    assert!(h.adapter.on_report(&MetricSnapshot::uplink(250_000.0, 0.0)).is_applied());

    let cp = Config {
        profile: chime_adapt::profile::CP_PROFILE_ID.to_string(),
        ..Config::default()
    };
    h.config_tx.send_replace(cp.adapter_config().unwrap());
    h.clock.advance(5_001);
    assert!(h.adapter.on_report(&MetricSnapshot::uplink(250_000.0, 0.0)).is_applied());

    let commands = h.session.commands();
    assert_eq!(commands[1], Command::MaxBandwidth { kbps: 300 });
    assert_eq!(commands[3], Command::MaxBandwidth { kbps: 400 });
}

#[test]
fn test_overlapping_callbacks_adjust_once() {
    let h = harness();
    let threads: Vec<_> = (0..8)
        .map(|_| {
            let adapter = Arc::clone(&h.adapter);
            std::thread::spawn(move || {
                adapter
                    .on_report(&MetricSnapshot::uplink(700_000.0, 0.0))
                    .is_applied()
            })
        })
        .collect();

    let applied = threads
        .into_iter()
        .map(|t| t.join().unwrap())
        .filter(|applied| *applied)
        .count();
    assert_eq!(applied, 1);
    assert_eq!(h.session.commands().len(), 2);
    assert_eq!(h.adapter.stats().suppressed_by_cooldown, 7);
}
