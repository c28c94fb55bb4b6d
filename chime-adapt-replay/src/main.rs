mod trace;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

use chime_adapt::{
    logging, Config, ManualClock, MediaSession, MetricsHub, QualityAdapter, SessionId,
    Subscription,
};

/// Replay a recorded metrics trace through the adaptive video quality controller
#[derive(Debug, Parser)]
#[command(name = "chime-adapt-replay", version)]
struct Cli {
    /// JSON-lines metric trace
    trace: PathBuf,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, env = "CHIME_ADAPT_CONFIG_PATH")]
    config: Option<String>,

    /// Meeting profile id, overriding the configuration
    #[arg(short, long)]
    profile: Option<String>,

    /// Cooldown between adjustments in milliseconds, overriding the configuration
    #[arg(long)]
    cooldown_ms: Option<u64>,

    /// Attach the media session only once the trace reaches this time
    #[arg(long)]
    connect_at_ms: Option<u64>,

    /// Sleep between reports according to the trace timestamps
    #[arg(long)]
    realtime: bool,
}

/// Media session that only logs the commands it receives
#[derive(Default)]
struct LoggingSession {
    commands: AtomicU64,
}

impl MediaSession for LoggingSession {
    fn set_encode_resolution_and_framerate(
        &self,
        width: u32,
        height: u32,
        frame_rate: u32,
    ) -> chime_adapt::Result<()> {
        self.commands.fetch_add(1, Ordering::Relaxed);
        info!(width, height, frame_rate, "setEncodeResolutionAndFramerate");
        Ok(())
    }

    fn set_max_outgoing_bandwidth_kbps(&self, kbps: u32) -> chime_adapt::Result<()> {
        self.commands.fetch_add(1, Ordering::Relaxed);
        info!(kbps, "setMaxOutgoingBandwidthKbps");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration, command line wins
    let mut config =
        Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(profile) = &cli.profile {
        config.profile.clone_from(profile);
    }
    if let Some(cooldown_ms) = cli.cooldown_ms {
        config.adapter.cooldown_ms = cooldown_ms;
    }

    if let Err(errors) = config.validate() {
        for e in &errors {
            eprintln!("Config validation error: {e}");
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s)",
            errors.len()
        ));
    }

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;

    let profile = config.active_profile()?;
    info!(
        profile = %profile.id,
        name = %profile.name,
        cooldown_ms = config.adapter.cooldown_ms,
        uplink_ceiling_kbps = ?profile.uplink_ceiling_kbps,
        keep_last_frame_when_paused = profile.keep_last_frame_when_paused,
        reconnect_timeout_ms = profile.reconnect.reconnect_timeout_ms,
        connection_unhealthy_threshold = profile.connection_health.connection_unhealthy_threshold,
        "Meeting profile selected"
    );

    // 3. Load the trace
    let raw = tokio::fs::read_to_string(&cli.trace)
        .await
        .with_context(|| format!("Failed to read trace {}", cli.trace.display()))?;
    let entries = trace::parse_trace(&raw)?;
    info!(entries = entries.len(), trace = %cli.trace.display(), "Trace loaded");

    // 4. Wire the adapter to an in-process metrics hub
    let clock = Arc::new(ManualClock::new(0));
    let (_config_tx, config_rx) = watch::channel(profile.adapter_config(&config.adapter));
    let adapter = Arc::new(QualityAdapter::new(
        SessionId::generate(),
        config_rx,
        clock.clone(),
    ));
    let session = Arc::new(LoggingSession::default());

    let hub = Arc::new(MetricsHub::new());
    let subscription = Subscription::attach(hub.clone(), adapter.clone())?;

    let mut schedule = trace::ConnectionSchedule::new(cli.connect_at_ms);
    let mut attached = schedule.is_attached();
    if attached {
        adapter.attach_session(session.clone());
    }

    // 5. Replay
    let mut previous_at = entries.first().map_or(0, |e| e.at_ms);
    for entry in &entries {
        if cli.realtime {
            let delay = Duration::from_millis(entry.at_ms - previous_at);
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                _ = tokio::signal::ctrl_c() => {
                    warn!("Interrupted, stopping replay");
                    break;
                }
            }
        }
        previous_at = entry.at_ms;
        clock.set(entry.at_ms);

        let next = schedule.advance(entry);
        if next != attached {
            if next {
                adapter.attach_session(session.clone());
            } else {
                adapter.detach_session();
            }
            attached = next;
        }

        hub.publish(&entry.to_snapshot());
    }

    // 6. Tear down and report
    if let Err(e) = subscription.close() {
        warn!(error = %e, "Failed to unsubscribe adapter");
    }
    hub.close();

    let stats = adapter.stats();
    info!(
        reports = stats.reports_received,
        applied = stats.adjustments_applied,
        commands = session.commands.load(Ordering::Relaxed),
        "Replay finished"
    );
    println!("{}", serde_json::to_string_pretty(&stats)?);

    Ok(())
}
