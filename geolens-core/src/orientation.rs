//! Orientation Estimation
//!
//! Turns raw motion samples (gravity vector and attitude quaternion) into a
//! smoothed pitch and heading for the current interface orientation.
//!
//! # Coordinate frames
//!
//! - Device frame: x to the right of the screen, y to the top of the screen,
//!   z out of the screen towards the user (portrait, home position). The
//!   camera looks along -z.
//! - World frame: x east, y north, z up. The attitude quaternion rotates
//!   device vectors into the world frame.
//!
//! # Heading from attitude
//!
//! Platform compass headings degrade once the device is pitched past the
//! vertical and react strongly to roll. Instead the heading is derived from
//! the attitude directly: the interface "up" and "right" vectors are rotated
//! into the world, "up" is then rotated about "right" until it lies on the
//! horizon in the camera direction, and the heading is the compass angle of
//! that horizontal vector. This stays continuous through ±90° pitch.

use nalgebra::{Matrix3, Rotation3, Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::angle::{exponential_filter, normalize, normalize_signed, shortest_delta};
use crate::config::OrientationConfig;

/// Rotation of the user interface relative to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InterfaceOrientation {
    Portrait,
    PortraitUpsideDown,
    /// Screen top is the device's +x edge
    LandscapeLeft,
    /// Screen top is the device's -x edge
    LandscapeRight,
}

impl Default for InterfaceOrientation {
    fn default() -> Self {
        InterfaceOrientation::Portrait
    }
}

impl InterfaceOrientation {
    /// Screen-up and screen-right unit vectors in device coordinates
    pub fn reference_vectors(&self) -> (Vector3<f64>, Vector3<f64>) {
        match self {
            InterfaceOrientation::Portrait => (Vector3::y(), Vector3::x()),
            InterfaceOrientation::PortraitUpsideDown => (-Vector3::y(), -Vector3::x()),
            InterfaceOrientation::LandscapeLeft => (Vector3::x(), -Vector3::y()),
            InterfaceOrientation::LandscapeRight => (-Vector3::x(), Vector3::y()),
        }
    }

    pub fn is_landscape(&self) -> bool {
        matches!(
            self,
            InterfaceOrientation::LandscapeLeft | InterfaceOrientation::LandscapeRight
        )
    }
}

/// Where the heading comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HeadingSource {
    /// Derived from the attitude quaternion (stable at any pitch)
    Attitude,
    /// Taken from compass readings
    Compass,
}

impl Default for HeadingSource {
    fn default() -> Self {
        HeadingSource::Attitude
    }
}

/// One sample from the motion source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    /// Gravity in device coordinates (any unit, direction matters)
    pub gravity: Vector3<f64>,
    /// Device to world (east/north/up) rotation
    pub attitude: UnitQuaternion<f64>,
}

impl MotionSample {
    /// Sample of a device held in `orientation` with the camera pointing at
    /// `heading` and tilted up by `pitch`, without roll
    pub fn from_pose(orientation: InterfaceOrientation, heading: f64, pitch: f64) -> Self {
        let (up, right) = orientation.reference_vectors();
        let device = Matrix3::<f64>::from_columns(&[right, up, Vector3::z()]);
        // Level, facing north: right -> east, up -> up, back -> south
        let world = Matrix3::<f64>::from_columns(&[Vector3::x(), Vector3::z(), -Vector3::y()]);
        let level_north =
            UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(world * device.transpose()));

        let yaw = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), -heading.to_radians());
        let tilt = UnitQuaternion::from_axis_angle(&Unit::new_normalize(right), pitch.to_radians());
        let attitude = yaw * level_north * tilt;
        MotionSample {
            gravity: attitude.inverse_transform_vector(&Vector3::new(0.0, 0.0, -9.81)),
            attitude,
        }
    }
}

/// One reading from a compass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompassReading {
    /// Degrees clockwise from true north
    pub true_heading: f64,
    /// Maximum deviation in degrees, negative when invalid
    pub accuracy: f64,
}

/// Filtered pitch and heading estimator
#[derive(Debug, Clone)]
pub struct OrientationEstimator {
    orientation: InterfaceOrientation,
    config: OrientationConfig,
    raw_pitch: Option<f64>,
    raw_heading: Option<f64>,
    pitch: Option<f64>,
    heading: Option<f64>,
}

impl OrientationEstimator {
    pub fn new(config: &OrientationConfig) -> Self {
        OrientationEstimator {
            orientation: InterfaceOrientation::default(),
            config: config.clone(),
            raw_pitch: None,
            raw_heading: None,
            pitch: None,
            heading: None,
        }
    }

    /// Forget all samples so the next ones snap instead of animating in
    pub fn reset(&mut self) {
        self.raw_pitch = None;
        self.raw_heading = None;
        self.pitch = None;
        self.heading = None;
    }

    /// Change the reference frame used for subsequent samples
    pub fn set_orientation(&mut self, orientation: InterfaceOrientation) {
        if self.orientation != orientation {
            log::debug!("Interface orientation {:?} -> {:?}", self.orientation, orientation);
            self.orientation = orientation;
        }
    }

    pub fn orientation(&self) -> InterfaceOrientation {
        self.orientation
    }

    pub fn heading_source(&self) -> HeadingSource {
        self.config.heading_source
    }

    /// Filtered pitch in degrees, 0 = level, positive = looking up
    pub fn pitch(&self) -> Option<f64> {
        self.pitch
    }

    /// Filtered heading in degrees [0, 360)
    pub fn heading(&self) -> Option<f64> {
        self.heading
    }

    pub fn raw_pitch(&self) -> Option<f64> {
        self.raw_pitch
    }

    pub fn raw_heading(&self) -> Option<f64> {
        self.raw_heading
    }

    /// Pitch in degrees from a gravity vector in device coordinates.
    ///
    /// Result is in (-180, 180]: level is 0, straight up is 90, straight
    /// down is -90 (rather than 270).
    pub fn compute_pitch(&self, gravity: &Vector3<f64>) -> f64 {
        let g = gravity;
        let radians = match self.orientation {
            InterfaceOrientation::Portrait => g.y.atan2(g.z),
            InterfaceOrientation::PortraitUpsideDown => (-g.y).atan2(g.z),
            InterfaceOrientation::LandscapeLeft => g.x.atan2(g.z),
            InterfaceOrientation::LandscapeRight => (-g.x).atan2(g.z),
        };
        normalize_signed(radians.to_degrees() + 90.0)
    }

    /// Heading in degrees [0, 360) of the camera direction.
    ///
    /// Returns `None` when the camera direction cannot be laid on the
    /// horizon (degenerate attitude); callers keep the previous heading.
    pub fn compute_heading(
        attitude: &UnitQuaternion<f64>,
        pitch: f64,
        orientation: InterfaceOrientation,
    ) -> Option<f64> {
        let (up, right) = orientation.reference_vectors();
        let world_up = attitude.transform_vector(&up);
        let world_right = attitude.transform_vector(&right);

        // Up rotated by -90° about right is the camera direction; a further
        // -pitch brings it down onto the horizon.
        let axis = Unit::try_new(world_right, 1e-9)?;
        let to_horizon = UnitQuaternion::from_axis_angle(&axis, -(pitch + 90.0).to_radians());
        let horizon = to_horizon.transform_vector(&world_up);

        if horizon.x.hypot(horizon.y) < 1e-6 {
            return None;
        }
        Some(normalize(horizon.x.atan2(horizon.y).to_degrees()))
    }

    /// Smooth a raw heading; the first sample and large jumps snap
    pub fn filter_heading(&mut self, raw: f64) -> f64 {
        self.raw_heading = Some(raw);
        let filtered = match self.heading {
            None => normalize(raw),
            Some(previous) => {
                let threshold = self.config.heading_snap_threshold;
                let factor = if threshold > 0.0 && shortest_delta(raw, previous).abs() > threshold
                {
                    1.0
                } else {
                    self.config.heading_filter_factor
                };
                exponential_filter(raw, previous, factor, true)
            }
        };
        self.heading = Some(filtered);
        filtered
    }

    /// Smooth a raw pitch; the first sample snaps
    pub fn filter_pitch(&mut self, raw: f64) -> f64 {
        self.raw_pitch = Some(raw);
        let filtered = match self.pitch {
            None => raw,
            Some(previous) => {
                exponential_filter(raw, previous, self.config.pitch_filter_factor, false)
            }
        };
        self.pitch = Some(filtered);
        filtered
    }

    /// Feed one motion sample. Returns true if pitch (and heading, when
    /// derived from attitude) were updated.
    pub fn update(&mut self, sample: &MotionSample) -> bool {
        let g = &sample.gravity;
        if !(g.x.is_finite() && g.y.is_finite() && g.z.is_finite()) || g.norm() < 1e-6 {
            log::trace!("Dropping motion sample with unusable gravity {:?}", g);
            return false;
        }

        let raw_pitch = self.compute_pitch(g);
        self.filter_pitch(raw_pitch);

        if self.config.heading_source == HeadingSource::Attitude {
            match Self::compute_heading(&sample.attitude, raw_pitch, self.orientation) {
                Some(raw_heading) => {
                    self.filter_heading(raw_heading);
                }
                None => log::trace!("Degenerate attitude, keeping heading {:?}", self.heading),
            }
        }
        true
    }

    /// Feed a compass reading. Ignored unless the heading source is the
    /// compass; readings with invalid or poor accuracy are dropped.
    pub fn update_compass(&mut self, reading: &CompassReading) -> Option<f64> {
        if self.config.heading_source != HeadingSource::Compass {
            return None;
        }
        if reading.accuracy < 0.0
            || reading.accuracy > self.config.max_compass_accuracy
            || !reading.true_heading.is_finite()
        {
            log::debug!(
                "Dropping compass reading {:.1} with accuracy {:.1}",
                reading.true_heading,
                reading.accuracy
            );
            return None;
        }
        Some(self.filter_heading(reading.true_heading))
    }
}
