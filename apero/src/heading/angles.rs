//! Circular angle arithmetic and smoothing.
//!
//! Headings are circular quantities: 359° and 1° are two degrees apart, not
//! 358. Everything here works on the shortest arc so a heading indicator
//! never swings the long way around the dial.

/// Smoothing factor of the exponential filter.
pub const SMOOTHING_FACTOR: f64 = 0.2;

/// Normalizes an angle in degrees into [0, 360).
#[inline]
pub fn normalize_degrees(degrees: f64) -> f64 {
    let normalized = degrees.rem_euclid(360.0);
    // rem_euclid of e.g. -1e-13 yields exactly 360.0 after rounding
    if normalized >= 360.0 {
        0.0
    } else {
        normalized
    }
}

/// Shortest signed arc from `from` to `to`, in (-180, 180].
#[inline]
pub fn shortest_delta(from: f64, to: f64) -> f64 {
    (to - from + 540.0).rem_euclid(360.0) - 180.0
}

/// Adds the screen rotation angle and re-normalizes.
#[inline]
pub fn apply_screen_angle(heading: f64, screen_angle: f64) -> f64 {
    normalize_degrees(heading + screen_angle)
}

/// Exponential smoothing over the shortest arc.
///
/// The first sample after construction or [`HeadingSmoother::reset`] passes
/// through unsmoothed; later samples move the output a fixed fraction of the
/// shortest delta toward the raw value, never across the wrap the long way.
#[derive(Debug, Clone)]
pub struct HeadingSmoother {
    factor: f64,
    last: Option<f64>,
}

impl Default for HeadingSmoother {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadingSmoother {
    pub fn new() -> Self {
        Self {
            factor: SMOOTHING_FACTOR,
            last: None,
        }
    }

    /// Smoother with a custom factor in (0, 1].
    pub fn with_factor(factor: f64) -> Self {
        Self { factor, last: None }
    }

    /// Feeds one raw heading, returning the smoothed value.
    pub fn smooth(&mut self, raw: f64) -> f64 {
        let raw = normalize_degrees(raw);
        let smoothed = match self.last {
            None => raw,
            Some(previous) => {
                normalize_degrees(previous + self.factor * shortest_delta(previous, raw))
            }
        };
        self.last = Some(smoothed);
        smoothed
    }

    /// Forgets the smoothing memory; the next sample passes through as-is.
    pub fn reset(&mut self) {
        self.last = None;
    }

    /// Last emitted value, if any.
    pub fn current(&self) -> Option<f64> {
        self.last
    }
}
