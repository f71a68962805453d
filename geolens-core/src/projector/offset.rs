//! Distance-based vertical offset
//!
//! Farther targets are drawn higher on screen. Beyond a threshold distance
//! each meter lifts the marker by `multiplier` pixels.

use serde::{Deserialize, Serialize};

use crate::config::ProjectorConfig;

/// Margin kept free at the top of the band in automatic mode
pub const AUTOMATIC_TOP_MARGIN: f64 = 30.0;

/// How threshold and multiplier are chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DistanceOffsetMode {
    /// Both taken from configuration
    Manual,
    /// Threshold is the nearest active distance; the multiplier makes the
    /// farthest active target reach the top of the available band
    Automatic,
    /// Threshold is the nearest active distance, multiplier from configuration
    AutomaticOffsetMinDistance,
}

impl Default for DistanceOffsetMode {
    fn default() -> Self {
        DistanceOffsetMode::Automatic
    }
}

/// Resolved offset parameters
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DistanceOffset {
    pub threshold: f64,
    pub multiplier: f64,
}

impl DistanceOffset {
    /// Solve the parameters for the active distance range.
    ///
    /// `band` is the pixel height available above the bottom border.
    pub fn solve(config: &ProjectorConfig, min_distance: f64, max_distance: f64, band: f64) -> Self {
        match config.distance_offset_mode {
            DistanceOffsetMode::Manual => DistanceOffset {
                threshold: config.distance_offset_threshold,
                multiplier: config.distance_offset_multiplier,
            },
            DistanceOffsetMode::AutomaticOffsetMinDistance => DistanceOffset {
                threshold: min_distance,
                multiplier: config.distance_offset_multiplier,
            },
            DistanceOffsetMode::Automatic => {
                let range = max_distance - min_distance;
                let usable = (band - AUTOMATIC_TOP_MARGIN).max(0.0);
                DistanceOffset {
                    threshold: min_distance,
                    multiplier: if range > 0.0 { usable / range } else { 0.0 },
                }
            }
        }
    }

    /// Upward offset in pixels for a target at `distance`
    pub fn offset(&self, distance: f64) -> f64 {
        if distance > self.threshold {
            (distance - self.threshold) * self.multiplier
        } else {
            0.0
        }
    }
}
