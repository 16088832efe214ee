//! Zoom factor handling
//!
//! Zoom values arrive as raw floats from the UI. They are clamped and
//! quantized to hundredths before they are used, so that `1.0`, `1.001` and
//! `0.999` all address the same cached render and produce the same image.

use std::fmt;

/// A clamped zoom factor quantized to two decimal places.
///
/// Stored as an integer number of hundredths so it can be hashed and compared
/// exactly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Zoom {
    hundredths: u32,
}

impl Default for Zoom {
    fn default() -> Self {
        Self::ACTUAL_SIZE
    }
}

impl Zoom {
    /// Natural page size (no scaling)
    pub const ACTUAL_SIZE: Zoom = Zoom { hundredths: 100 };
    /// Zoom in rate multiplier per step - 20%
    pub const ZOOM_IN_RATE: f32 = 1.2;
    /// Zoom out rate multiplier per step - 20%
    pub const ZOOM_OUT_RATE: f32 = 0.8;
    /// Minimum allowed zoom factor
    pub const MIN_SCALE: f32 = 0.05;
    /// Maximum allowed zoom factor
    pub const MAX_SCALE: f32 = 10.0;

    /// Clamp and quantize a raw zoom factor
    #[must_use]
    pub fn new(factor: f32) -> Self {
        let clamped = Self::clamp_factor(factor);
        Self {
            hundredths: (clamped * 100.0).round() as u32,
        }
    }

    /// The quantized factor as a float
    #[must_use]
    pub fn factor(self) -> f32 {
        self.hundredths as f32 / 100.0
    }

    #[must_use]
    pub fn is_identity(self) -> bool {
        self == Self::ACTUAL_SIZE
    }

    /// Next zoom level up
    #[must_use]
    pub fn zoom_in(self) -> Self {
        Self::new(self.factor() * Self::ZOOM_IN_RATE)
    }

    /// Next zoom level down
    #[must_use]
    pub fn zoom_out(self) -> Self {
        Self::new(self.factor() * Self::ZOOM_OUT_RATE)
    }

    /// Clamp factor to valid range, handling NaN/Inf
    pub fn clamp_factor(factor: f32) -> f32 {
        if !factor.is_finite() {
            1.0
        } else {
            factor.clamp(Self::MIN_SCALE, Self::MAX_SCALE)
        }
    }
}

impl From<f32> for Zoom {
    fn from(factor: f32) -> Self {
        Self::new(factor)
    }
}

impl fmt::Display for Zoom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.factor())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantizes_to_hundredths() {
        assert_eq!(Zoom::new(1.0), Zoom::new(1.004));
        assert_eq!(Zoom::new(1.0), Zoom::new(0.996));
        assert_ne!(Zoom::new(1.0), Zoom::new(1.01));
        assert_eq!(Zoom::new(1.256).to_string(), "1.26");
    }

    #[test]
    fn clamps_out_of_range_and_non_finite() {
        assert_eq!(Zoom::new(f32::NAN), Zoom::ACTUAL_SIZE);
        assert_eq!(Zoom::new(f32::INFINITY), Zoom::ACTUAL_SIZE);
        assert_eq!(Zoom::new(0.0).factor(), Zoom::MIN_SCALE);
        assert_eq!(Zoom::new(-3.0).factor(), Zoom::MIN_SCALE);
        assert_eq!(Zoom::new(500.0).factor(), Zoom::MAX_SCALE);
    }

    #[test]
    fn step_helpers_follow_rates() {
        let zoom = Zoom::ACTUAL_SIZE;
        assert_eq!(zoom.zoom_in().to_string(), "1.20");
        assert_eq!(zoom.zoom_out().to_string(), "0.80");
        assert_eq!(zoom.zoom_in().zoom_in().to_string(), "1.44");
        assert!(zoom.is_identity());
        assert!(!zoom.zoom_in().is_identity());
    }
}
