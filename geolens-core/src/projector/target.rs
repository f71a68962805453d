//! Targets

use serde::{Deserialize, Serialize};

use crate::location::GeoLocation;

/// Opaque caller-chosen target identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(pub u64);

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A geo-located point of interest
///
/// Only `id`, `title` and `location` come from the caller; the remaining
/// fields are recomputed by the projector on every full reload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub id: TargetId,
    pub title: String,
    pub location: GeoLocation,
    #[serde(skip)]
    pub(crate) distance_from_user: f64,
    #[serde(skip)]
    pub(crate) azimuth: f64,
    #[serde(skip)]
    pub(crate) vertical_level: usize,
    #[serde(skip)]
    pub(crate) active: bool,
}

impl Target {
    pub fn new(id: u64, title: impl Into<String>, location: GeoLocation) -> Self {
        Target {
            id: TargetId(id),
            title: title.into(),
            location,
            distance_from_user: 0.0,
            azimuth: 0.0,
            vertical_level: 0,
            active: false,
        }
    }

    /// Meters from the user at the last full reload
    pub fn distance_from_user(&self) -> f64 {
        self.distance_from_user
    }

    /// Bearing from the user, [0, 360)
    pub fn azimuth(&self) -> f64 {
        self.azimuth
    }

    /// Stack level assigned by the last stacking pass
    pub fn vertical_level(&self) -> usize {
        self.vertical_level
    }

    /// Passed the visibility filters at the last full reload
    pub fn is_active(&self) -> bool {
        self.active
    }
}
