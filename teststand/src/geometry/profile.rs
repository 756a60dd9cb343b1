//! Revolution profile shared by every shell of the enclosure.
//!
//! A profile is an ordered list of control points from the apex of the
//! photocathode dome down to its closing point. Each point gives a height
//! fraction in [0, 1], strictly ascending, and a radius fraction in [0, 1],
//! weakly descending. Only the final point has radius fraction 0, which
//! closes every derived solid of revolution to a point on the axis.

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// One control point of a [`Profile`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfilePoint {
    /// Fraction of the shell height measured from the apex
    pub height_fraction: f64,
    /// Fraction of the base radius at this height
    pub radius_fraction: f64,
}

impl ProfilePoint {
    pub const fn new(height_fraction: f64, radius_fraction: f64) -> Self {
        Self {
            height_fraction,
            radius_fraction,
        }
    }
}

/// Ordered control points of a closed revolution profile
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    points: Vec<ProfilePoint>,
}

/// Radius fractions of the 10" hemispherical photocathode, apex to closure
const HEMISPHERICAL_RADII: [f64; 11] = [1.0, 0.98, 0.95, 0.9, 0.85, 0.7, 0.6, 0.5, 0.4, 0.25, 0.0];

impl Profile {
    /// Create a validated profile.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::InvalidProfile`] if there are fewer than two
    /// points, any fraction is outside [0, 1] or not finite, height fractions
    /// are not strictly ascending, radius fractions are not weakly descending,
    /// the last radius fraction is not 0, or an earlier point already closes.
    pub fn new(points: Vec<ProfilePoint>) -> Result<Self, ConfigurationError> {
        let invalid = |reason: String| Err(ConfigurationError::InvalidProfile(reason));

        if points.len() < 2 {
            return invalid(format!(
                "need at least 2 control points, got {}",
                points.len()
            ));
        }

        for (index, point) in points.iter().enumerate() {
            for (label, value) in [
                ("height", point.height_fraction),
                ("radius", point.radius_fraction),
            ] {
                if !(0.0..=1.0).contains(&value) {
                    return invalid(format!(
                        "{label} fraction {value} at point {index} is outside [0, 1]"
                    ));
                }
            }
        }

        for (index, pair) in points.windows(2).enumerate() {
            if pair[1].height_fraction <= pair[0].height_fraction {
                return invalid(format!(
                    "height fractions must be strictly ascending (point {})",
                    index + 1
                ));
            }
            if pair[1].radius_fraction > pair[0].radius_fraction {
                return invalid(format!(
                    "radius fractions must be weakly descending (point {})",
                    index + 1
                ));
            }
        }

        let last = points.len() - 1;
        if points[last].radius_fraction != 0.0 {
            return invalid("last radius fraction must be 0 to close the solid".to_string());
        }
        if let Some(index) = points[..last]
            .iter()
            .position(|point| point.radius_fraction == 0.0)
        {
            return invalid(format!(
                "profile closes early at point {index}, only the last point may have radius 0"
            ));
        }

        Ok(Self { points })
    }

    /// Build from `(height_fraction, radius_fraction)` pairs.
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Result<Self, ConfigurationError> {
        Self::new(
            pairs
                .iter()
                .map(|&(height, radius)| ProfilePoint::new(height, radius))
                .collect(),
        )
    }

    /// The 11-point hemispherical photocathode profile, evenly spaced in height.
    pub fn hemispherical() -> Self {
        let last = HEMISPHERICAL_RADII.len() - 1;
        let points = HEMISPHERICAL_RADII
            .iter()
            .enumerate()
            .map(|(i, &radius)| ProfilePoint::new(i as f64 / last as f64, radius))
            .collect();
        Self { points }
    }

    /// Control points, apex first.
    pub fn points(&self) -> &[ProfilePoint] {
        &self.points
    }

    /// Number of control points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false; a valid profile has at least two points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Index of the closing point.
    pub fn terminal_index(&self) -> usize {
        self.points.len() - 1
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::hemispherical()
    }
}
