//! Scenario files
//!
//! A scenario is a JSON document with the engine configuration, the screen,
//! the targets and a time-ordered list of sensor events:
//!
//! ```json
//! {
//!   "viewport": { "width": 390, "height": 844, "cameraFov": 60 },
//!   "targets": [ { "id": 1, "title": "Summit", "latitude": 46.38, "longitude": 13.84 } ],
//!   "events": [
//!     { "atMs": 0, "type": "pose", "heading": 10, "pitch": 5 },
//!     { "atMs": 200, "type": "fix", "latitude": 46.35, "longitude": 13.80, "accuracy": 8 }
//!   ],
//!   "durationMs": 10000
//! }
//! ```

use std::path::Path;

use anyhow::{bail, Context};
use geolens_core::location::GeoLocation;
use geolens_core::orientation::{InterfaceOrientation, MotionSample};
use geolens_core::{GeolensConfig, Target, Viewport};
use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

fn default_tick_ms() -> u64 {
    16
}

fn default_accuracy() -> f64 {
    10.0
}

/// Screen size and camera field of view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportSpec {
    pub width: f64,
    pub height: f64,
    /// Camera field of view along the long side, degrees
    #[serde(default)]
    pub camera_fov: Option<f64>,
    /// Explicit fields of view; both must be given to take effect
    #[serde(default)]
    pub horizontal_fov: Option<f64>,
    #[serde(default)]
    pub vertical_fov: Option<f64>,
}

impl ViewportSpec {
    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSpec {
    pub id: u64,
    pub title: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: Option<f64>,
}

impl TargetSpec {
    pub fn to_target(&self) -> Target {
        let mut location = GeoLocation::new(self.latitude, self.longitude);
        location.altitude = self.altitude;
        Target::new(self.id, self.title.clone(), location)
    }
}

/// Something that happens at a point in scenario time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ScenarioEvent {
    /// Device held in the current interface orientation, no roll
    Pose {
        heading: f64,
        #[serde(default)]
        pitch: f64,
    },
    /// Raw motion sample; attitude as [w, x, y, z]
    Motion { gravity: [f64; 3], attitude: [f64; 4] },
    #[serde(rename_all = "camelCase")]
    Fix {
        latitude: f64,
        longitude: f64,
        #[serde(default = "default_accuracy")]
        accuracy: f64,
        /// How old the fix already is when delivered
        #[serde(default)]
        age_ms: u64,
    },
    #[serde(rename_all = "camelCase")]
    Compass { true_heading: f64, accuracy: f64 },
    Orientation { orientation: InterfaceOrientation },
    Targets { targets: Vec<TargetSpec> },
    Stop,
}

impl ScenarioEvent {
    /// Motion sample for pose and motion events
    pub fn motion_sample(&self, orientation: InterfaceOrientation) -> Option<MotionSample> {
        match self {
            ScenarioEvent::Pose { heading, pitch } => {
                Some(MotionSample::from_pose(orientation, *heading, *pitch))
            }
            ScenarioEvent::Motion { gravity, attitude } => {
                let [w, x, y, z] = *attitude;
                Some(MotionSample {
                    gravity: Vector3::new(gravity[0], gravity[1], gravity[2]),
                    attitude: UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z)),
                })
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimedEvent {
    pub at_ms: u64,
    #[serde(flatten)]
    pub event: ScenarioEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    #[serde(default)]
    pub config: GeolensConfig,
    pub viewport: ViewportSpec,
    #[serde(default)]
    pub orientation: InterfaceOrientation,
    #[serde(default = "default_true")]
    pub motion_available: bool,
    #[serde(default = "default_true")]
    pub location_available: bool,
    #[serde(default)]
    pub targets: Vec<TargetSpec>,
    #[serde(default)]
    pub events: Vec<TimedEvent>,
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Defaults to one second past the last event
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

impl Scenario {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let mut scenario: Scenario = serde_json::from_str(json).context("Invalid scenario JSON")?;
        if scenario.tick_ms == 0 {
            bail!("tickMs must be non-zero");
        }
        scenario.events.sort_by_key(|e| e.at_ms);
        Ok(scenario)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read scenario {}", path.display()))?;
        let scenario = Scenario::from_json(&json)
            .with_context(|| format!("Cannot load scenario {}", path.display()))?;
        log::debug!(
            "Loaded {} with {} targets and {} events",
            path.display(),
            scenario.targets.len(),
            scenario.events.len()
        );
        Ok(scenario)
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
            .unwrap_or_else(|| self.events.last().map_or(0, |e| e.at_ms) + 1_000)
    }

    pub fn initial_targets(&self) -> Vec<Target> {
        self.targets.iter().map(TargetSpec::to_target).collect()
    }
}
