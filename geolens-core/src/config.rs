//! Engine Configuration
//!
//! All tunables of the engine in one serializable tree. Every field has a
//! default, so a partial JSON document (or `{}`) is a valid configuration.
//!
//! ```json
//! {
//!   "tracker": { "reloadDistanceFilter": 100.0 },
//!   "projector": { "maxVisibleAnnotations": 50, "distanceOffsetMode": "automatic" },
//!   "stacking": { "policy": "fade" }
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::GeolensError;
use crate::orientation::HeadingSource;
use crate::projector::DistanceOffsetMode;
use crate::stacking::StackingPolicy;

/// Hard ceiling on visible markers; stacking cost grows at least quadratically
pub const MAX_VISIBLE_ANNOTATIONS_CEILING: usize = 500;

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeolensConfig {
    pub tracker: TrackerConfig,
    pub orientation: OrientationConfig,
    pub projector: ProjectorConfig,
    pub stacking: StackingConfig,
}

/// Location filtering and report timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackerConfig {
    /// Fixes with a worse (larger) horizontal accuracy in meters are dropped
    pub minimum_location_horizontal_accuracy: f64,
    /// Fixes older than this many seconds are dropped
    pub minimum_location_age: f64,
    /// Meters the user must move before a new fix is accepted
    pub user_distance_filter: f64,
    /// Meters from the reload baseline before a full reload is reported
    pub reload_distance_filter: f64,
    /// Debounce window for location reports
    pub report_interval_ms: u64,
    /// Cadence of the location-search watchdog
    pub location_search_interval_ms: u64,
    /// Start the location-search watchdog when tracking starts
    pub location_search_watchdog: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            minimum_location_horizontal_accuracy: 500.0,
            minimum_location_age: 30.0,
            user_distance_filter: 15.0,
            reload_distance_filter: 75.0,
            report_interval_ms: 5_000,
            location_search_interval_ms: 5_000,
            location_search_watchdog: true,
        }
    }
}

/// Heading and pitch estimation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrientationConfig {
    pub heading_source: HeadingSource,
    /// Weight of a new heading sample, (0, 1]
    pub heading_filter_factor: f64,
    /// Weight of a new pitch sample, (0, 1]
    pub pitch_filter_factor: f64,
    /// Heading jumps larger than this snap instead of smoothing; 0 disables
    pub heading_snap_threshold: f64,
    /// Compass readings with a worse accuracy (degrees) are dropped
    pub max_compass_accuracy: f64,
}

impl Default for OrientationConfig {
    fn default() -> Self {
        OrientationConfig {
            heading_source: HeadingSource::Attitude,
            heading_filter_factor: 0.05,
            pitch_filter_factor: 0.05,
            heading_snap_threshold: 90.0,
            max_compass_accuracy: 30.0,
        }
    }
}

/// Visibility filters and vertical placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectorConfig {
    pub max_visible_annotations: usize,
    /// Meters; 0 means unlimited
    pub max_distance: f64,
    /// Stack levels above this deactivate the target; 0 means unlimited
    pub max_vertical_level: usize,
    pub distance_offset_mode: DistanceOffsetMode,
    /// Meters; used by manual mode
    pub distance_offset_threshold: f64,
    /// Pixels per meter; used by manual and min-distance modes
    pub distance_offset_multiplier: f64,
    /// Fraction of the viewport height where the nearest markers sit, (0, 1]
    pub bottom_border: f64,
    /// Use the flat-earth bearing instead of the great-circle one
    pub approximate_bearing: bool,
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        ProjectorConfig {
            max_visible_annotations: 100,
            max_distance: 0.0,
            max_vertical_level: 5,
            distance_offset_mode: DistanceOffsetMode::Automatic,
            distance_offset_threshold: 0.0,
            distance_offset_multiplier: 0.1,
            bottom_border: 0.55,
            approximate_bearing: false,
        }
    }
}

/// Overlap resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StackingConfig {
    pub policy: StackingPolicy,
    /// Vertical gap in pixels between stacked markers
    pub gap: f64,
}

impl Default for StackingConfig {
    fn default() -> Self {
        StackingConfig {
            policy: StackingPolicy::Displace,
            gap: 5.0,
        }
    }
}

fn check_factor(field: &'static str, value: f64) -> Result<(), GeolensError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(GeolensError::invalid(field, format!("{} is not in (0, 1]", value)))
    }
}

fn check_non_negative(field: &'static str, value: f64) -> Result<(), GeolensError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(GeolensError::invalid(field, format!("{} is negative or not finite", value)))
    }
}

impl GeolensConfig {
    /// Parse a JSON document and validate it
    pub fn from_json(json: &str) -> Result<Self, GeolensError> {
        let config: GeolensConfig = serde_json::from_str(json)?;
        config.validated()
    }

    /// Check every value, clamping the visible-marker count to its ceiling
    pub fn validated(mut self) -> Result<Self, GeolensError> {
        let t = &self.tracker;
        check_non_negative(
            "tracker.minimumLocationHorizontalAccuracy",
            t.minimum_location_horizontal_accuracy,
        )?;
        check_non_negative("tracker.minimumLocationAge", t.minimum_location_age)?;
        check_non_negative("tracker.userDistanceFilter", t.user_distance_filter)?;
        check_non_negative("tracker.reloadDistanceFilter", t.reload_distance_filter)?;
        if t.report_interval_ms == 0 {
            return Err(GeolensError::invalid("tracker.reportIntervalMs", "must be non-zero"));
        }
        if t.location_search_interval_ms == 0 {
            return Err(GeolensError::invalid(
                "tracker.locationSearchIntervalMs",
                "must be non-zero",
            ));
        }

        let o = &self.orientation;
        check_factor("orientation.headingFilterFactor", o.heading_filter_factor)?;
        check_factor("orientation.pitchFilterFactor", o.pitch_filter_factor)?;
        check_non_negative("orientation.headingSnapThreshold", o.heading_snap_threshold)?;
        check_non_negative("orientation.maxCompassAccuracy", o.max_compass_accuracy)?;

        let p = &mut self.projector;
        check_non_negative("projector.maxDistance", p.max_distance)?;
        check_non_negative("projector.distanceOffsetThreshold", p.distance_offset_threshold)?;
        check_non_negative("projector.distanceOffsetMultiplier", p.distance_offset_multiplier)?;
        check_factor("projector.bottomBorder", p.bottom_border)?;
        if p.max_visible_annotations > MAX_VISIBLE_ANNOTATIONS_CEILING {
            log::warn!(
                "maxVisibleAnnotations {} exceeds ceiling, clamping to {}",
                p.max_visible_annotations,
                MAX_VISIBLE_ANNOTATIONS_CEILING
            );
            p.max_visible_annotations = MAX_VISIBLE_ANNOTATIONS_CEILING;
        }

        check_non_negative("stacking.gap", self.stacking.gap)?;

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_is_default() {
        let config = GeolensConfig::from_json("{}").unwrap();
        assert_eq!(config, GeolensConfig::default());
    }

    #[test]
    fn test_partial_json() {
        let config = GeolensConfig::from_json(
            r#"{
                "tracker": { "reloadDistanceFilter": 120.0 },
                "projector": { "maxDistance": 2000.0, "distanceOffsetMode": "manual" },
                "stacking": { "policy": "fade" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.tracker.reload_distance_filter, 120.0);
        assert_eq!(config.tracker.report_interval_ms, 5_000);
        assert_eq!(config.projector.max_distance, 2000.0);
        assert_eq!(config.projector.distance_offset_mode, DistanceOffsetMode::Manual);
        assert_eq!(config.stacking.policy, StackingPolicy::Fade);
        assert_eq!(config.stacking.gap, 5.0);
    }

    #[test]
    fn test_visible_count_is_clamped() {
        let config =
            GeolensConfig::from_json(r#"{ "projector": { "maxVisibleAnnotations": 10000 } }"#)
                .unwrap();
        assert_eq!(
            config.projector.max_visible_annotations,
            MAX_VISIBLE_ANNOTATIONS_CEILING
        );
    }

    #[test]
    fn test_invalid_factor_rejected() {
        let err = GeolensConfig::from_json(r#"{ "orientation": { "headingFilterFactor": 0.0 } }"#)
            .unwrap_err();
        match err {
            GeolensError::InvalidConfig { field, .. } => {
                assert_eq!(field, "orientation.headingFilterFactor")
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(
            GeolensConfig::from_json("{ not json"),
            Err(GeolensError::Config(_))
        ));
    }

    #[test]
    fn test_roundtrip_uses_camel_case() {
        let json = serde_json::to_value(GeolensConfig::default()).unwrap();
        assert_eq!(json["projector"]["bottomBorder"], 0.55);
        assert_eq!(json["tracker"]["locationSearchWatchdog"], true);
        assert_eq!(json["orientation"]["headingSource"], "attitude");
    }
}
