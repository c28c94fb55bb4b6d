//! Adaptive video quality for Chime SDK meetings
//!
//! Samples uplink metrics reported by the media engine, classifies network
//! quality and moves the outgoing video between resolution/bitrate tiers,
//! at most once per cooldown interval.
//!
//! ## Architecture
//!
//! - **`QualityAdapter`**: per-call controller; a `MetricsObserver`
//! - **`NetworkQuality`**: five-step classification of one metric report
//! - **`VideoQualityTier`**: 180p/360p/540p/720p targets
//! - **`CooldownGate`**: fixed-interval debounce between adjustments
//! - **`MeetingProfile`**: per-deployment caps, reconnect and health policy
//!
//! ## Usage
//!
//! ```rust,ignore
//! use chime_adapt::{
//!     AdapterConfig, MetricsHub, QualityAdapter, SessionId, Subscription, SystemClock,
//! };
//! use std::sync::Arc;
//! use tokio::sync::watch;
//!
//! let (config_tx, config_rx) = watch::channel(AdapterConfig::default());
//! let clock = Arc::new(SystemClock::new());
//! let adapter = Arc::new(QualityAdapter::new(SessionId::generate(), config_rx, clock));
//! adapter.attach_session(media_session);
//!
//! let hub = Arc::new(MetricsHub::new());
//! let _subscription = Subscription::attach(hub.clone(), adapter.clone())?;
//! hub.publish(&report);
//! ```

pub mod adapter;
pub mod clock;
pub mod config;
pub mod cooldown;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod profile;
pub mod quality;
pub mod session;
pub mod tier;
pub mod types;

pub use adapter::{AdapterStats, AdjustmentOutcome, QualityAdapter};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AdapterConfig, AdapterSettings, Config, LoggingConfig};
pub use cooldown::{CooldownGate, GateDecision};
pub use error::{Error, Result};
pub use metrics::{
    MetricReport, MetricSnapshot, UplinkMetrics, AUDIO_PACKET_LOSS_PERCENT,
    AVAILABLE_OUTGOING_BITRATE,
};
pub use profile::{
    ConnectionHealthOverrides, ConnectionHealthPolicy, MeetingProfile, ProfileRegistry,
    ReconnectPolicy,
};
pub use quality::{assess, classify, NetworkQuality, QualityAssessment, UnmeasuredBitrate};
pub use session::{
    MediaSession, MetricsHub, MetricsObserver, MetricsSource, SessionSlot, Subscription,
};
pub use tier::{TierBandwidthCaps, TierSettings, VideoQualityTier};
pub use types::{SessionId, SubscriptionId};
