//! Device Status
//!
//! The snapshot every projection runs against: where the camera points,
//! how wide it sees, how many pixels a degree is, and where the user is.
//! Sensors write into it at tick boundaries; the projector only reads it.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::angle::{normalize, normalize_signed};
use crate::location::GeoLocation;
use crate::orientation::InterfaceOrientation;

bitflags! {
    /// Fields of [`DeviceStatus`] that have received a real value
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StatusFields: u8 {
        const HEADING = 1 << 0;
        const PITCH = 1 << 1;
        const LOCATION = 1 << 2;
        const VIEWPORT = 1 << 3;
    }
}

/// Size of the camera view in pixels (points)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Viewport { width, height }
    }

    pub fn center_x(&self) -> f64 {
        self.width / 2.0
    }

    fn is_valid(&self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.width.is_finite() && self.height.is_finite()
    }
}

/// Current heading, pitch, field of view and user location
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceStatus {
    heading: f64,
    pitch: f64,
    horizontal_fov: f64,
    vertical_fov: f64,
    horizontal_ppd: f64,
    vertical_ppd: f64,
    viewport: Viewport,
    user_location: Option<GeoLocation>,
    populated: StatusFields,
}

impl DeviceStatus {
    pub fn new() -> Self {
        DeviceStatus::default()
    }

    /// All fields populated; no projection runs before this holds
    pub fn is_ready(&self) -> bool {
        self.populated.is_all() && self.user_location.is_some()
    }

    pub fn populated(&self) -> StatusFields {
        self.populated
    }

    /// Compass heading of the camera, [0, 360)
    pub fn heading(&self) -> f64 {
        self.heading
    }

    /// Camera pitch, 0 = level, positive = up
    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    pub fn horizontal_fov(&self) -> f64 {
        self.horizontal_fov
    }

    pub fn vertical_fov(&self) -> f64 {
        self.vertical_fov
    }

    /// Horizontal pixels per degree
    pub fn horizontal_ppd(&self) -> f64 {
        self.horizontal_ppd
    }

    /// Vertical pixels per degree
    pub fn vertical_ppd(&self) -> f64 {
        self.vertical_ppd
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn user_location(&self) -> Option<&GeoLocation> {
        self.user_location.as_ref()
    }

    pub fn set_heading(&mut self, heading: f64) {
        if heading.is_finite() {
            self.heading = normalize(heading);
            self.populated |= StatusFields::HEADING;
        }
    }

    pub fn set_pitch(&mut self, pitch: f64) {
        if pitch.is_finite() {
            self.pitch = normalize_signed(pitch);
            self.populated |= StatusFields::PITCH;
        }
    }

    pub fn set_user_location(&mut self, location: GeoLocation) {
        self.user_location = Some(location);
        self.populated |= StatusFields::LOCATION;
    }

    /// Forget the user location; the status is not ready until the next fix
    pub fn clear_user_location(&mut self) {
        self.user_location = None;
        self.populated.remove(StatusFields::LOCATION);
    }

    /// Set the viewport with explicit horizontal and vertical fields of view.
    ///
    /// Returns false (and leaves the status untouched) for empty viewports or
    /// fields of view outside (0, 360].
    pub fn set_field_of_view(&mut self, viewport: Viewport, horizontal_fov: f64, vertical_fov: f64) -> bool {
        let fov_ok = |fov: f64| fov > 0.0 && fov <= 360.0;
        if !viewport.is_valid() || !fov_ok(horizontal_fov) || !fov_ok(vertical_fov) {
            log::debug!(
                "Ignoring viewport {:?} with fov {:.1}x{:.1}",
                viewport,
                horizontal_fov,
                vertical_fov
            );
            return false;
        }

        self.viewport = viewport;
        self.horizontal_fov = horizontal_fov;
        self.vertical_fov = vertical_fov;
        self.horizontal_ppd = viewport.width / horizontal_fov;
        self.vertical_ppd = viewport.height / vertical_fov;
        self.populated |= StatusFields::VIEWPORT;
        true
    }

    /// Set the viewport from the camera's field of view along its long side.
    ///
    /// The camera sensor is landscape: in landscape interfaces its long side
    /// is the screen width, in portrait the screen height. The other field
    /// of view follows from the viewport aspect ratio.
    pub fn set_viewport(
        &mut self,
        viewport: Viewport,
        camera_fov: f64,
        orientation: InterfaceOrientation,
    ) -> bool {
        if !viewport.is_valid() || !(camera_fov > 0.0 && camera_fov < 180.0) {
            log::debug!("Ignoring viewport {:?} with camera fov {:.1}", viewport, camera_fov);
            return false;
        }

        let half_tan = (camera_fov.to_radians() / 2.0).tan();
        let (horizontal, vertical) = if orientation.is_landscape() {
            let vertical = 2.0 * (half_tan * viewport.height / viewport.width).atan();
            (camera_fov, vertical.to_degrees())
        } else {
            let horizontal = 2.0 * (half_tan * viewport.width / viewport.height).atan();
            (horizontal.to_degrees(), camera_fov)
        };
        self.set_field_of_view(viewport, horizontal, vertical)
    }
}
