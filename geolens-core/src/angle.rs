//! Angle Arithmetic
//!
//! Pure helpers for compass angles. Every heading-relative comparison in the
//! crate goes through [`shortest_delta`] so that the 0°/360° seam never
//! produces a spurious large difference.
//!
//! | Function               | Range        |
//! |------------------------|--------------|
//! | [`normalize`]          | [0, 360)     |
//! | [`normalize_signed`]   | (-180, 180]  |
//! | [`shortest_delta`]     | (-180, 180]  |
//! | [`bearing`]            | [0, 360)     |

use crate::location::GeoCoordinate;

/// Latitude/longitude distortion used by the flat-earth bearing.
///
/// Equal to `1 / cos(41.7°)`; the approximation is exact at that latitude
/// and degrades slowly away from it.
pub const LAT_LON_FACTOR: f64 = 1.33975031663;

/// Wrap any angle into [0, 360)
pub fn normalize(degrees: f64) -> f64 {
    let wrapped = ((degrees % 360.0) + 360.0) % 360.0;
    // -1e-17 % 360 + 360 rounds to exactly 360
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Wrap any angle into (-180, 180]
pub fn normalize_signed(degrees: f64) -> f64 {
    let n = normalize(degrees);
    if n > 180.0 {
        n - 360.0
    } else {
        n
    }
}

/// Signed minimal rotation from `b` to `a`, in (-180, 180]
///
/// `shortest_delta(350.0, 10.0)` is `-20.0`, not `340.0`.
pub fn shortest_delta(a: f64, b: f64) -> f64 {
    normalize_signed(a - b)
}

/// Exponential moving average of `new` over `previous`.
///
/// With `circular` set, `new` is unwrapped by ±360 when it is more than 180°
/// away from `previous`, so the filtered value moves through the short side
/// of the seam; the result is then normalized into [0, 360).
///
/// `factor` is the weight of the new sample and is clamped to (0, 1];
/// a factor of 1 returns `new` unchanged.
pub fn exponential_filter(new: f64, previous: f64, factor: f64, circular: bool) -> f64 {
    if factor >= 1.0 || factor.is_nan() || !previous.is_finite() {
        return if circular { normalize(new) } else { new };
    }
    let factor = factor.max(f64::EPSILON);

    let mut target = new;
    if circular {
        let jump = new - previous;
        if jump > 180.0 {
            target -= 360.0;
        } else if jump < -180.0 {
            target += 360.0;
        }
    }

    let filtered = previous + (target - previous) * factor;
    if circular {
        normalize(filtered)
    } else {
        filtered
    }
}

/// Initial bearing from `from` to `to`, degrees clockwise from north in [0, 360).
///
/// The precise variant is the great-circle initial bearing. The approximate
/// variant treats the earth as flat and corrects longitude with
/// [`LAT_LON_FACTOR`], which is exact only near 41.7° latitude. Elsewhere the
/// error grows with the latitude difference and peaks on diagonal bearings:
/// at 45° it reaches about 1.6° near north-east, while bearings within 20° of
/// a cardinal direction stay under a degree. Identical points have bearing 0.
pub fn bearing(from: &GeoCoordinate, to: &GeoCoordinate, approximate: bool) -> f64 {
    if from == to {
        return 0.0;
    }

    let degrees = if approximate {
        let delta_lat = to.latitude - from.latitude;
        let delta_lon = to.longitude - from.longitude;
        delta_lon.atan2(delta_lat * LAT_LON_FACTOR).to_degrees()
    } else {
        let lat1 = from.latitude.to_radians();
        let lat2 = to.latitude.to_radians();
        let delta_lon = (to.longitude - from.longitude).to_radians();

        let x = delta_lon.sin() * lat2.cos();
        let y = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lon.cos();
        x.atan2(y).to_degrees()
    };

    normalize(degrees)
}
