//! Contracts with the external media engine
//!
//! - **`MetricsSource`**: delivers metric reports to registered observers
//! - **`MediaSession`**: accepts capture/encode and bandwidth commands
//! - **`Subscription`**: scoped registration, released on close or drop
//! - **`MetricsHub`**: in-process metrics source for engine glue and replay
//! - **`SessionSlot`**: media session that may not be connected yet

use crate::error::{Error, Result};
use crate::metrics::MetricReport;
use crate::types::SubscriptionId;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Receives one callback per reporting cycle
pub trait MetricsObserver: Send + Sync {
    fn on_metrics_received(&self, report: &dyn MetricReport);
}

/// Something observers can register with
pub trait MetricsSource: Send + Sync {
    fn subscribe(&self, observer: Arc<dyn MetricsObserver>) -> Result<SubscriptionId>;

    fn unsubscribe(&self, id: &SubscriptionId) -> Result<()>;
}

/// Outgoing video controls of a connected media session
///
/// Both commands are idempotent.
#[cfg_attr(test, mockall::automock)]
pub trait MediaSession: Send + Sync {
    fn set_encode_resolution_and_framerate(
        &self,
        width: u32,
        height: u32,
        frame_rate: u32,
    ) -> Result<()>;

    fn set_max_outgoing_bandwidth_kbps(&self, kbps: u32) -> Result<()>;
}

/// Registration of one observer, released exactly once
pub struct Subscription {
    source: Arc<dyn MetricsSource>,
    id: Option<SubscriptionId>,
}

impl Subscription {
    pub fn attach(
        source: Arc<dyn MetricsSource>,
        observer: Arc<dyn MetricsObserver>,
    ) -> Result<Self> {
        let id = source.subscribe(observer)?;
        debug!(subscription_id = %id, "Metrics observer subscribed");
        Ok(Self {
            source,
            id: Some(id),
        })
    }

    #[must_use]
    pub fn id(&self) -> Option<&SubscriptionId> {
        self.id.as_ref()
    }

    /// Unsubscribe now and report the outcome
    pub fn close(mut self) -> Result<()> {
        match self.id.take() {
            Some(id) => self.source.unsubscribe(&id),
            None => Ok(()),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            if let Err(e) = self.source.unsubscribe(&id) {
                warn!(subscription_id = %id, error = %e, "Failed to unsubscribe metrics observer");
            } else {
                debug!(subscription_id = %id, "Metrics observer unsubscribed");
            }
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Fan-out of metric reports to subscribed observers
pub struct MetricsHub {
    observers: DashMap<SubscriptionId, Arc<dyn MetricsObserver>>,
    closed: AtomicBool,
}

impl MetricsHub {
    #[must_use]
    pub fn new() -> Self {
        Self {
            observers: DashMap::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Deliver a report to every observer, returns how many received it
    pub fn publish(&self, report: &dyn MetricReport) -> usize {
        if self.is_closed() {
            return 0;
        }

        // Snapshot first so observers may unsubscribe from inside the callback
        let observers: Vec<Arc<dyn MetricsObserver>> =
            self.observers.iter().map(|entry| Arc::clone(entry.value())).collect();

        for observer in &observers {
            observer.on_metrics_received(report);
        }
        observers.len()
    }

    /// End of session: drop all observers and refuse new ones
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.observers.clear();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

impl Default for MetricsHub {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSource for MetricsHub {
    fn subscribe(&self, observer: Arc<dyn MetricsObserver>) -> Result<SubscriptionId> {
        if self.is_closed() {
            return Err(Error::SourceClosed);
        }
        let id = SubscriptionId::generate();
        self.observers.insert(id.clone(), observer);

        // A concurrent close may have cleared the map before this insert landed
        if self.is_closed() {
            self.observers.remove(&id);
            return Err(Error::SourceClosed);
        }
        Ok(id)
    }

    fn unsubscribe(&self, id: &SubscriptionId) -> Result<()> {
        if self.observers.remove(id).is_some() {
            Ok(())
        } else if self.is_closed() {
            Err(Error::SourceClosed)
        } else {
            Err(Error::UnknownSubscription(id.clone()))
        }
    }
}

/// Media session handle that is empty until the call connects
#[derive(Clone, Default)]
pub struct SessionSlot {
    inner: Arc<RwLock<Option<Arc<dyn MediaSession>>>>,
}

impl SessionSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_session(session: Arc<dyn MediaSession>) -> Self {
        let slot = Self::new();
        slot.attach(session);
        slot
    }

    pub fn attach(&self, session: Arc<dyn MediaSession>) {
        *self.inner.write() = Some(session);
    }

    pub fn detach(&self) -> Option<Arc<dyn MediaSession>> {
        self.inner.write().take()
    }

    #[must_use]
    pub fn current(&self) -> Option<Arc<dyn MediaSession>> {
        self.inner.read().clone()
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.inner.read().is_some()
    }
}

impl fmt::Debug for SessionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSlot")
            .field("attached", &self.is_attached())
            .finish()
    }
}
