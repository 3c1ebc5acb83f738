//! Per-event heading state machine.
//!
//! Consumes raw events from the single active provider and produces
//! normalized, smoothed headings. Events belonging to a different provider
//! kind are ignored; a tilt-compensated emission is suppressed until both
//! the accelerometer and magnetometer have delivered a sample.

use super::angles::{apply_screen_angle, HeadingSmoother};
use super::provider::{
    heading_from_orientation, tilt_compensated_heading, OrientationHeading, ProviderKind,
    SensorEvent, Vector3,
};

/// Fuses events from one provider into smoothed compass headings.
#[derive(Debug)]
pub struct HeadingEstimator {
    provider: ProviderKind,
    screen_angle: f64,
    accel: Option<Vector3>,
    mag: Option<Vector3>,
    smoother: HeadingSmoother,
}

impl HeadingEstimator {
    pub fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            screen_angle: 0.0,
            accel: None,
            mag: None,
            smoother: HeadingSmoother::new(),
        }
    }

    /// The provider this estimator consumes.
    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    /// Updates the screen rotation angle applied to computed headings.
    pub fn set_screen_angle(&mut self, angle: f64) {
        self.screen_angle = angle;
    }

    /// Switches to a new provider, clearing all per-provider state.
    pub fn switch_provider(&mut self, provider: ProviderKind) {
        self.provider = provider;
        self.reset();
    }

    /// Clears raw samples and smoothing memory; the next emission is
    /// unsmoothed, as after a fresh activation.
    pub fn reset(&mut self) {
        self.accel = None;
        self.mag = None;
        self.smoother.reset();
    }

    /// Last emitted heading, if any.
    pub fn current(&self) -> Option<f64> {
        self.smoother.current()
    }

    /// Feeds one event; returns a smoothed heading when the event produced
    /// an emission.
    pub fn handle(&mut self, event: &SensorEvent) -> Option<f64> {
        match (self.provider, event) {
            (ProviderKind::AbsoluteOrientation, SensorEvent::Quaternion(sample)) => {
                Some(self.emit_corrected(sample.heading_degrees()))
            }
            (ProviderKind::TiltCompensatedMagnetometer, SensorEvent::Accelerometer(v)) => {
                self.accel = Some(*v);
                self.emit_magnetic()
            }
            (ProviderKind::TiltCompensatedMagnetometer, SensorEvent::Magnetometer(v)) => {
                self.mag = Some(*v);
                self.emit_magnetic()
            }
            (ProviderKind::OrientationEvents, SensorEvent::Orientation(sample)) => {
                match heading_from_orientation(sample)? {
                    // vendor value is already screen-corrected
                    OrientationHeading::Corrected(heading) => Some(self.smoother.smooth(heading)),
                    OrientationHeading::Computed(heading) => Some(self.emit_corrected(heading)),
                }
            }
            _ => None,
        }
    }

    /// Recomputes the magnetic heading when both axes are fresh enough to
    /// pair; a missing axis suppresses emission.
    fn emit_magnetic(&mut self) -> Option<f64> {
        let accel = self.accel?;
        let mag = self.mag?;
        let heading = tilt_compensated_heading(accel, mag)?;
        Some(self.emit_corrected(heading))
    }

    fn emit_corrected(&mut self, raw: f64) -> f64 {
        let corrected = apply_screen_angle(raw, self.screen_angle);
        self.smoother.smooth(corrected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heading::provider::{OrientationSample, QuaternionSample};

    const EPS: f64 = 1e-6;

    #[test]
    fn test_quaternion_stream_emits_heading() {
        let mut estimator = HeadingEstimator::new(ProviderKind::AbsoluteOrientation);
        let heading = estimator
            .handle(&SensorEvent::Quaternion(QuaternionSample::new([
                0.0, 0.0, 0.0, 1.0,
            ])))
            .expect("quaternion should emit");
        assert!(heading.abs() < EPS);
    }

    #[test]
    fn test_cross_provider_events_ignored() {
        let mut estimator = HeadingEstimator::new(ProviderKind::AbsoluteOrientation);
        assert!(estimator
            .handle(&SensorEvent::Accelerometer(Vector3::new(0.0, 0.0, 1.0)))
            .is_none());
        assert!(estimator
            .handle(&SensorEvent::Orientation(OrientationSample::default()))
            .is_none());
    }

    #[test]
    fn test_magnetic_pairing_suppresses_until_both_axes() {
        let mut estimator = HeadingEstimator::new(ProviderKind::TiltCompensatedMagnetometer);
        assert!(estimator
            .handle(&SensorEvent::Accelerometer(Vector3::new(0.0, 0.0, 1.0)))
            .is_none());

        let heading = estimator
            .handle(&SensorEvent::Magnetometer(Vector3::new(30.0, 0.0, -40.0)))
            .expect("pair complete");
        assert!(heading.abs() < EPS);
    }

    #[test]
    fn test_magnetic_recomputes_on_either_axis() {
        let mut estimator = HeadingEstimator::new(ProviderKind::TiltCompensatedMagnetometer);
        estimator.handle(&SensorEvent::Accelerometer(Vector3::new(0.0, 0.0, 1.0)));
        estimator.handle(&SensorEvent::Magnetometer(Vector3::new(30.0, 0.0, -40.0)));

        // A fresh accelerometer sample alone re-emits with the kept field.
        assert!(estimator
            .handle(&SensorEvent::Accelerometer(Vector3::new(0.0, 0.0, 1.0)))
            .is_some());
    }

    #[test]
    fn test_screen_angle_applied_to_computed_headings() {
        let mut estimator = HeadingEstimator::new(ProviderKind::AbsoluteOrientation);
        estimator.set_screen_angle(90.0);
        let heading = estimator
            .handle(&SensorEvent::Quaternion(QuaternionSample::new([
                0.0, 0.0, 0.0, 1.0,
            ])))
            .expect("should emit");
        assert!((heading - 90.0).abs() < EPS);
    }

    #[test]
    fn test_screen_angle_not_reapplied_to_vendor_value() {
        let mut estimator = HeadingEstimator::new(ProviderKind::OrientationEvents);
        estimator.set_screen_angle(90.0);
        let sample = OrientationSample {
            compass_heading: Some(42.0),
            ..OrientationSample::default()
        };
        let heading = estimator
            .handle(&SensorEvent::Orientation(sample))
            .expect("vendor value emits");
        assert!((heading - 42.0).abs() < EPS, "got {}", heading);
    }

    #[test]
    fn test_first_emission_unsmoothed_then_filtered() {
        let mut estimator = HeadingEstimator::new(ProviderKind::OrientationEvents);
        let at = |alpha: f64| {
            SensorEvent::Orientation(OrientationSample {
                alpha: Some(alpha),
                ..OrientationSample::default()
            })
        };

        // naive fallback: heading = 360 - alpha
        assert!((estimator.handle(&at(260.0)).unwrap() - 100.0).abs() < EPS);
        // second sample: 100 + 0.2 * 50 = 110
        assert!((estimator.handle(&at(210.0)).unwrap() - 110.0).abs() < EPS);
    }

    #[test]
    fn test_reset_clears_samples_and_memory() {
        let mut estimator = HeadingEstimator::new(ProviderKind::TiltCompensatedMagnetometer);
        estimator.handle(&SensorEvent::Accelerometer(Vector3::new(0.0, 0.0, 1.0)));
        estimator.handle(&SensorEvent::Magnetometer(Vector3::new(30.0, 0.0, -40.0)));
        assert!(estimator.current().is_some());

        estimator.reset();
        assert!(estimator.current().is_none());
        // pairing must be rebuilt from scratch
        assert!(estimator
            .handle(&SensorEvent::Magnetometer(Vector3::new(30.0, 0.0, -40.0)))
            .is_none());
    }

    #[test]
    fn test_switch_provider_changes_accepted_events() {
        let mut estimator = HeadingEstimator::new(ProviderKind::AbsoluteOrientation);
        estimator.switch_provider(ProviderKind::OrientationEvents);
        assert!(estimator
            .handle(&SensorEvent::Quaternion(QuaternionSample::new([
                0.0, 0.0, 0.0, 1.0,
            ])))
            .is_none());
        assert!(estimator
            .handle(&SensorEvent::Orientation(OrientationSample {
                alpha: Some(0.0),
                ..OrientationSample::default()
            }))
            .is_some());
    }
}
