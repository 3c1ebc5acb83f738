//! Sensor providers: sample types, fusion math, capability probing.
//!
//! A provider is one strategy for turning platform sensor callbacks into
//! [`SensorEvent`]s. Exactly one provider is active at a time; selection is a
//! pure function from the capability probe to the highest-priority supported
//! kind, and a runtime error downgrades to the next kind in priority order.

use thiserror::Error;
use tokio::sync::mpsc;

use super::angles::normalize_degrees;

/// Provider strategies, in fallback priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Platform absolute-orientation sensor delivering quaternions.
    AbsoluteOrientation,
    /// Paired accelerometer + magnetometer with tilt compensation.
    TiltCompensatedMagnetometer,
    /// Euler-angle orientation events.
    OrientationEvents,
}

impl ProviderKind {
    /// Priority order: each kind is tried only when the previous one is
    /// unavailable or errored at runtime.
    pub const PRIORITY: [ProviderKind; 3] = [
        ProviderKind::AbsoluteOrientation,
        ProviderKind::TiltCompensatedMagnetometer,
        ProviderKind::OrientationEvents,
    ];

    pub fn describe(&self) -> &'static str {
        match self {
            ProviderKind::AbsoluteOrientation => "absolute orientation sensor",
            ProviderKind::TiltCompensatedMagnetometer => "tilt-compensated magnetometer",
            ProviderKind::OrientationEvents => "orientation events",
        }
    }
}

/// Result of probing the platform for sensor support.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub absolute_orientation: bool,
    pub accelerometer: bool,
    pub magnetometer: bool,
    pub orientation_events: bool,
    /// The platform gates orientation behind an explicit user permission.
    pub requires_permission: bool,
}

impl Capabilities {
    /// Whether the probe results support `kind`.
    pub fn supports(&self, kind: ProviderKind) -> bool {
        match kind {
            ProviderKind::AbsoluteOrientation => self.absolute_orientation,
            ProviderKind::TiltCompensatedMagnetometer => self.accelerometer && self.magnetometer,
            ProviderKind::OrientationEvents => self.orientation_events,
        }
    }
}

/// Highest-priority provider kind the probe supports.
pub fn select_provider(capabilities: &Capabilities) -> Option<ProviderKind> {
    ProviderKind::PRIORITY
        .into_iter()
        .find(|kind| capabilities.supports(*kind))
}

/// Next supported kind strictly after `failed` in priority order.
pub fn next_provider(capabilities: &Capabilities, failed: ProviderKind) -> Option<ProviderKind> {
    ProviderKind::PRIORITY
        .into_iter()
        .skip_while(|kind| *kind != failed)
        .skip(1)
        .find(|kind| capabilities.supports(*kind))
}

/// Errors of the heading subsystem.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SensorError {
    /// The platform exposes no orientation provider at all.
    #[error("no orientation provider available: {0}")]
    Unsupported(String),
    /// The user denied the orientation permission; terminal for the session.
    #[error("orientation permission denied")]
    PermissionDenied,
    /// Every provider errored at runtime.
    #[error("all orientation providers failed, last: {0}")]
    Exhausted(String),
    /// A provider could not start its subscriptions.
    #[error("provider failed to start: {0}")]
    StartFailed(String),
}

/// A 3-axis sensor reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Unit vector, or `None` for a (near-)zero reading.
    pub fn normalized(&self) -> Option<Vector3> {
        let magnitude = self.magnitude();
        if magnitude < 1e-9 {
            return None;
        }
        Some(Vector3 {
            x: self.x / magnitude,
            y: self.y / magnitude,
            z: self.z / magnitude,
        })
    }
}

/// One quaternion sample from the absolute orientation sensor.
///
/// Platforms disagree on component ordering (scalar first vs last), so the
/// ordering is detected per sample: the component with magnitude above 0.5
/// is taken as the scalar `w`, the larger one winning when both qualify and
/// ties falling back to scalar-last, the common mobile layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuaternionSample {
    pub components: [f64; 4],
}

impl QuaternionSample {
    pub fn new(components: [f64; 4]) -> Self {
        Self { components }
    }

    fn scalar_first(&self) -> bool {
        let head = self.components[0].abs();
        let tail = self.components[3].abs();
        head > 0.5 && head > tail
    }

    /// Compass heading in degrees before screen correction.
    pub fn heading_degrees(&self) -> f64 {
        let [a, b, c, d] = self.components;
        let (w, x, y, z) = if self.scalar_first() {
            (a, b, c, d)
        } else {
            (d, a, b, c)
        };
        let yaw = (2.0 * (w * z + x * y)).atan2(1.0 - 2.0 * (y * y + z * z));
        normalize_degrees(360.0 - yaw.to_degrees())
    }
}

/// Tilt-compensated compass heading from paired accelerometer and
/// magnetometer readings, in degrees before screen correction.
///
/// Returns `None` when the gravity vector is degenerate.
pub fn tilt_compensated_heading(accel: Vector3, mag: Vector3) -> Option<f64> {
    let gravity = accel.normalized()?;

    let roll = gravity.y.atan2(gravity.z);
    let pitch = (-gravity.x).atan2((gravity.y * gravity.y + gravity.z * gravity.z).sqrt());

    let (sin_roll, cos_roll) = roll.sin_cos();
    let (sin_pitch, cos_pitch) = pitch.sin_cos();

    let xh = mag.x * cos_pitch + mag.y * sin_roll * sin_pitch + mag.z * cos_roll * sin_pitch;
    let yh = mag.y * cos_roll - mag.z * sin_roll;

    Some(normalize_degrees((-yh).atan2(xh).to_degrees()))
}

/// One Euler-angle orientation event.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OrientationSample {
    /// Rotation about the screen normal, degrees.
    pub alpha: Option<f64>,
    /// Front-back tilt, degrees.
    pub beta: Option<f64>,
    /// Left-right tilt, degrees.
    pub gamma: Option<f64>,
    /// Whether the angles are earth-referenced rather than arbitrary.
    pub absolute: bool,
    /// Vendor-supplied compass value, already corrected for screen rotation.
    pub compass_heading: Option<f64>,
}

/// Heading derived from an orientation event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrientationHeading {
    /// Vendor-corrected value; screen correction must not be re-applied.
    Corrected(f64),
    /// Computed from Euler angles; still needs screen correction.
    Computed(f64),
}

/// Derives a heading from one orientation event.
///
/// Priority: the vendor compass value when present; else the full
/// rotation-matrix conversion when the frame is absolute and all three
/// angles are present; else the naive `360 − α` fallback.
pub fn heading_from_orientation(sample: &OrientationSample) -> Option<OrientationHeading> {
    if let Some(vendor) = sample.compass_heading {
        return Some(OrientationHeading::Corrected(normalize_degrees(vendor)));
    }
    if sample.absolute {
        if let (Some(alpha), Some(beta), Some(gamma)) = (sample.alpha, sample.beta, sample.gamma) {
            if let Some(heading) = euler_to_compass(alpha, beta, gamma) {
                return Some(OrientationHeading::Computed(heading));
            }
        }
    }
    sample
        .alpha
        .map(|alpha| OrientationHeading::Computed(normalize_degrees(360.0 - alpha)))
}

/// Spherical-to-compass conversion from full Euler angles.
///
/// Returns `None` in the degenerate flat case (both rotation-matrix
/// components zero), which callers resolve with the naive fallback.
fn euler_to_compass(alpha_deg: f64, beta_deg: f64, gamma_deg: f64) -> Option<f64> {
    let alpha = alpha_deg.to_radians();
    let beta = beta_deg.to_radians();
    let gamma = gamma_deg.to_radians();

    let ra = -alpha.cos() * gamma.sin() - alpha.sin() * beta.sin() * gamma.cos();
    let rb = -alpha.sin() * gamma.sin() + alpha.cos() * beta.sin() * gamma.cos();

    if ra == 0.0 && rb == 0.0 {
        return None;
    }

    let mut heading = (ra / rb).atan();
    if rb < 0.0 {
        heading += std::f64::consts::PI;
    } else if ra < 0.0 {
        heading += 2.0 * std::f64::consts::PI;
    }
    Some(normalize_degrees(heading.to_degrees()))
}

/// Raw events delivered by the active provider.
#[derive(Debug, Clone)]
pub enum SensorEvent {
    Quaternion(QuaternionSample),
    Accelerometer(Vector3),
    Magnetometer(Vector3),
    Orientation(OrientationSample),
    /// Runtime failure of the active provider, triggering fallback.
    Error(String),
}

/// Uniform capability interface over concrete providers.
///
/// `start` wires platform callbacks to the event channel; `stop` detaches
/// them and must be idempotent.
pub trait SensorProvider: Send {
    fn kind(&self) -> ProviderKind;

    fn start(&mut self, events: mpsc::UnboundedSender<SensorEvent>) -> Result<(), SensorError>;

    fn stop(&mut self);
}
