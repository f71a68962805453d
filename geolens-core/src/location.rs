//! Geographic Primitives
//!
//! Coordinates, located fixes and great-circle distance. Bearings live in
//! [`crate::angle`] next to the rest of the angle arithmetic.

use serde::{Deserialize, Serialize};

/// Mean earth radius in meters (IUGG)
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// A latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoCoordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        GeoCoordinate {
            latitude,
            longitude,
        }
    }

    /// Check that latitude and longitude are finite and inside their ranges
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Great-circle distance to `other` in meters (haversine)
    pub fn distance_to(&self, other: &GeoCoordinate) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let delta_lat = (other.latitude - self.latitude).to_radians();
        let delta_lon = (other.longitude - self.longitude).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().min(1.0).asin();

        EARTH_RADIUS_M * c
    }
}

/// A coordinate with optional altitude (meters above sea level)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoLocation {
    pub coordinate: GeoCoordinate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
}

impl GeoLocation {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        GeoLocation {
            coordinate: GeoCoordinate::new(latitude, longitude),
            altitude: None,
        }
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    pub fn distance_to(&self, other: &GeoLocation) -> f64 {
        self.coordinate.distance_to(&other.coordinate)
    }
}

/// A raw fix as delivered by the location source
///
/// `horizontal_accuracy` follows the usual platform convention: radius of
/// uncertainty in meters, negative when the fix is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationFix {
    pub location: GeoLocation,
    pub horizontal_accuracy: f64,
    /// Time the fix was taken (milliseconds, same clock as the engine)
    pub timestamp_ms: u64,
}

impl LocationFix {
    pub fn new(location: GeoLocation, horizontal_accuracy: f64, timestamp_ms: u64) -> Self {
        LocationFix {
            location,
            horizontal_accuracy,
            timestamp_ms,
        }
    }

    /// Age of the fix relative to `now_ms`, zero for fixes from the future
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.timestamp_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_north() {
        let a = GeoCoordinate::new(45.0, 18.0);
        let b = GeoCoordinate::new(45.001, 18.0);
        let d = a.distance_to(&b);
        assert!((d - 111.2).abs() < 0.5, "distance {}", d);
    }

    #[test]
    fn test_distance_east_shrinks_with_latitude() {
        let a = GeoCoordinate::new(45.0, 18.0);
        let b = GeoCoordinate::new(45.0, 18.001);
        let d = a.distance_to(&b);
        assert!((d - 78.6).abs() < 0.5, "distance {}", d);
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        let a = GeoCoordinate::new(-33.9, 151.2);
        assert_eq!(a.distance_to(&a), 0.0);
    }

    #[test]
    fn test_coordinate_validity() {
        assert!(GeoCoordinate::new(45.0, 18.0).is_valid());
        assert!(!GeoCoordinate::new(91.0, 18.0).is_valid());
        assert!(!GeoCoordinate::new(45.0, f64::NAN).is_valid());
    }

    #[test]
    fn test_fix_age() {
        let fix = LocationFix::new(GeoLocation::new(0.0, 0.0), 5.0, 1_000);
        assert_eq!(fix.age_ms(3_500), 2_500);
        assert_eq!(fix.age_ms(500), 0);
    }
}
