//! Heading tracking service.
//!
//! Owns the provider cascade for one activation session: asks for the
//! platform permission (once per activation), starts the highest-priority
//! supported provider, feeds its events through the estimator, and publishes
//! smoothed headings on a watch channel. A provider error downgrades to the
//! next kind; exhausting all kinds surfaces an error state instead of a
//! heading.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::estimator::HeadingEstimator;
use super::provider::{
    next_provider, select_provider, Capabilities, ProviderKind, SensorError, SensorEvent,
    SensorProvider,
};

/// Outcome of a platform permission prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionDecision {
    Granted,
    Denied,
}

/// Platform permission prompt for orientation access.
///
/// Asked exactly once per activation attempt; a denial is terminal for the
/// session. Platforms without gating simply compose the tracker without one.
pub trait PermissionGate: Send + Sync {
    fn request(&self) -> BoxFuture<'_, PermissionDecision>;
}

/// Source of the current screen rotation angle (0/90/180/270, best-effort).
pub trait ScreenRotation: Send + Sync {
    fn angle(&self) -> f64;
}

/// Fixed screen rotation, for platforms without a rotation API and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedRotation(pub f64);

impl ScreenRotation for FixedRotation {
    fn angle(&self) -> f64 {
        self.0
    }
}

/// Support/permission/provider state visible to the UI.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrientationStatus {
    /// At least one provider is available on this platform.
    pub supported: bool,
    /// Outcome of the permission prompt, `None` until asked.
    pub permission_granted: Option<bool>,
    /// The provider currently delivering samples.
    pub provider: Option<ProviderKind>,
    pub error: Option<String>,
}

/// The heading tracking service.
///
/// Constructed once with the platform's available providers; activation and
/// deactivation are driven by the UI toggle through [`HeadingTracker::start`]
/// and [`HeadingTracker::stop`].
pub struct HeadingTracker {
    providers: Arc<tokio::sync::Mutex<Vec<Box<dyn SensorProvider>>>>,
    capabilities: Capabilities,
    gate: Option<Arc<dyn PermissionGate>>,
    rotation: Arc<dyn ScreenRotation>,
    status: Arc<parking_lot::Mutex<OrientationStatus>>,
    heading_tx: watch::Sender<Option<f64>>,
    session: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl HeadingTracker {
    /// Builds the tracker over the platform's probed providers.
    pub fn new(providers: Vec<Box<dyn SensorProvider>>, rotation: Arc<dyn ScreenRotation>) -> Self {
        let capabilities = probe(&providers);
        let (heading_tx, _) = watch::channel(None);
        Self {
            providers: Arc::new(tokio::sync::Mutex::new(providers)),
            capabilities,
            gate: None,
            rotation,
            status: Arc::new(parking_lot::Mutex::new(OrientationStatus::default())),
            heading_tx,
            session: parking_lot::Mutex::new(None),
        }
    }

    /// Adds a permission gate for platforms that require one.
    pub fn with_permission_gate(mut self, gate: Arc<dyn PermissionGate>) -> Self {
        self.capabilities.requires_permission = true;
        self.gate = Some(gate);
        self
    }

    /// The capability probe result this tracker was built from.
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Receiver for published headings; `None` while inactive or errored.
    pub fn subscribe(&self) -> watch::Receiver<Option<f64>> {
        self.heading_tx.subscribe()
    }

    /// Current support/permission/provider state.
    pub fn status(&self) -> OrientationStatus {
        self.status.lock().clone()
    }

    /// Activates tracking. Already-active trackers return `Ok` unchanged;
    /// restart requires [`HeadingTracker::stop`] first.
    pub async fn start(&self) -> Result<(), SensorError> {
        if self.session.lock().is_some() {
            return Ok(());
        }

        if select_provider(&self.capabilities).is_none() {
            let message = "device exposes no orientation or motion sensors".to_string();
            let mut status = self.status.lock();
            status.supported = false;
            status.error = Some(message.clone());
            return Err(SensorError::Unsupported(message));
        }
        self.status.lock().supported = true;

        if let Some(gate) = &self.gate {
            match gate.request().await {
                PermissionDecision::Granted => {
                    self.status.lock().permission_granted = Some(true);
                }
                PermissionDecision::Denied => {
                    let mut status = self.status.lock();
                    status.permission_granted = Some(false);
                    status.error = Some("orientation permission denied".to_string());
                    return Err(SensorError::PermissionDenied);
                }
            }
        }

        let handle = tokio::spawn(run_session(
            Arc::clone(&self.providers),
            self.capabilities,
            Arc::clone(&self.status),
            Arc::clone(&self.rotation),
            self.heading_tx.clone(),
        ));
        *self.session.lock() = Some(handle);
        Ok(())
    }

    /// Deactivates tracking: detaches all provider subscriptions, resets the
    /// smoothing memory, and clears the published heading. Support and
    /// permission flags survive. Idempotent.
    pub async fn stop(&self) {
        let handle = self.session.lock().take();
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
        }

        let mut providers = self.providers.lock().await;
        for provider in providers.iter_mut() {
            provider.stop();
        }
        drop(providers);

        let mut status = self.status.lock();
        status.provider = None;
        status.error = None;
        drop(status);

        self.heading_tx.send_replace(None);
    }
}

/// Derives the capability probe from the providers actually present.
fn probe(providers: &[Box<dyn SensorProvider>]) -> Capabilities {
    let mut capabilities = Capabilities::default();
    for provider in providers {
        match provider.kind() {
            ProviderKind::AbsoluteOrientation => capabilities.absolute_orientation = true,
            ProviderKind::TiltCompensatedMagnetometer => {
                capabilities.accelerometer = true;
                capabilities.magnetometer = true;
            }
            ProviderKind::OrientationEvents => capabilities.orientation_events = true,
        }
    }
    capabilities
}

/// One activation session: runs the cascade until stop or exhaustion.
async fn run_session(
    providers: Arc<tokio::sync::Mutex<Vec<Box<dyn SensorProvider>>>>,
    capabilities: Capabilities,
    status: Arc<parking_lot::Mutex<OrientationStatus>>,
    rotation: Arc<dyn ScreenRotation>,
    heading_tx: watch::Sender<Option<f64>>,
) {
    // Held for the whole session; stop() aborts the task to release it.
    let mut providers = providers.lock_owned().await;

    let mut active = select_provider(&capabilities);
    let mut last_error = String::new();

    while let Some(kind) = active {
        // Fresh channel per provider so a downgrade drops stale events.
        let (tx, mut rx) = mpsc::unbounded_channel();
        let started = providers
            .iter_mut()
            .find(|provider| provider.kind() == kind)
            .map(|provider| provider.start(tx))
            .unwrap_or_else(|| Err(SensorError::StartFailed("provider missing".to_string())));

        if let Err(error) = started {
            warn!(provider = kind.describe(), %error, "provider failed to start");
            last_error = error.to_string();
            active = next_provider(&capabilities, kind);
            continue;
        }

        info!(provider = kind.describe(), "heading provider active");
        {
            let mut status = status.lock();
            status.provider = Some(kind);
            status.error = None;
        }
        let mut estimator = HeadingEstimator::new(kind);

        let failure = loop {
            match rx.recv().await {
                Some(SensorEvent::Error(message)) => break message,
                Some(event) => {
                    estimator.set_screen_angle(rotation.angle());
                    if let Some(heading) = estimator.handle(&event) {
                        heading_tx.send_replace(Some(heading));
                    }
                }
                // Provider dropped its sender without an error event;
                // treat it like a runtime failure.
                None => break "event stream closed".to_string(),
            }
        };

        warn!(provider = kind.describe(), error = %failure, "provider errored, downgrading");
        if let Some(provider) = providers.iter_mut().find(|p| p.kind() == kind) {
            provider.stop();
        }
        last_error = failure;
        active = next_provider(&capabilities, kind);
    }

    {
        let mut status = status.lock();
        status.provider = None;
        status.error = Some(format!("all orientation providers failed: {}", last_error));
    }
    heading_tx.send_replace(None);
}
