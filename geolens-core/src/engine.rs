//! Engine
//!
//! Wires the orientation estimator, location tracker, projector and stacker
//! into one poll-driven pipeline.
//!
//! The engine owns no threads and reads no clock. The caller drives it from
//! its display-refresh loop:
//!
//! ```rust,ignore
//! let mut engine = Engine::new(GeolensConfig::default())?;
//! engine.set_viewport(Viewport::new(390.0, 844.0), 60.0);
//! engine.set_targets(targets, &mut factory);
//! engine.start(now_ms(), &motion, &mut location)?;
//!
//! loop {
//!     // Location fixes arrive from the platform callback
//!     engine.handle_location_fix(&fix, now_ms());
//!
//!     for event in engine.tick(now_ms(), &mut motion, &mut factory, &mut surface) {
//!         // EngineEvent::LocationSearch -> tell the user we are still looking
//!     }
//! }
//! ```
//!
//! Each tick:
//!
//! 1. samples the motion source and updates heading and pitch,
//! 2. polls the tracker's timers and applies location reports,
//! 3. services the single coalesced reload, stacking after full recomputes,
//! 4. renders every active marker for the current heading and pitch.

use crate::config::GeolensConfig;
use crate::device::{DeviceStatus, Viewport};
use crate::error::{Capability, GeolensError};
use crate::location::LocationFix;
use crate::marker::{RenderSurface, ViewFactory};
use crate::orientation::{
    CompassReading, HeadingSource, InterfaceOrientation, MotionSample, OrientationEstimator,
};
use crate::projector::{AnnotationProjector, ReloadKind, ReloadOutcome, ReloadQueue, Target};
use crate::stacking::{StackingContext, StackingStrategy};
use crate::tracker::{FixOutcome, GeoTracker, TrackerEvent};

/// Device motion (gravity and attitude) provider
pub trait MotionSource {
    fn is_available(&self) -> bool;

    /// Latest sample, `None` if nothing new arrived since the last call
    fn sample(&mut self) -> Option<MotionSample>;
}

/// Platform location service. Fixes are pushed through
/// [`Engine::handle_location_fix`].
pub trait LocationSource {
    fn start_updates(&mut self) -> Result<(), GeolensError>;
    fn stop_updates(&mut self);
}

/// Notifications returned from [`Engine::tick`]
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// No usable fix yet; repeats every location-search interval
    LocationSearch { elapsed_ms: u64, fix_received: bool },
    /// A reload was serviced
    Reloaded(ReloadOutcome),
}

/// The projection and layout pipeline
pub struct Engine {
    config: GeolensConfig,
    status: DeviceStatus,
    orientation: OrientationEstimator,
    tracker: GeoTracker,
    projector: AnnotationProjector,
    stacker: Box<dyn StackingStrategy>,
    reloads: ReloadQueue,
    running: bool,
}

impl Engine {
    pub fn new(config: GeolensConfig) -> Result<Self, GeolensError> {
        let config = config.validated()?;
        log::debug!(
            "Engine using {} stacking, heading from {:?}",
            config.stacking.policy.strategy().name(),
            config.orientation.heading_source
        );
        Ok(Engine {
            status: DeviceStatus::new(),
            orientation: OrientationEstimator::new(&config.orientation),
            tracker: GeoTracker::new(&config.tracker),
            projector: AnnotationProjector::new(&config.projector),
            stacker: config.stacking.policy.strategy(),
            reloads: ReloadQueue::new(),
            running: false,
            config,
        })
    }

    pub fn config(&self) -> &GeolensConfig {
        &self.config
    }

    pub fn status(&self) -> &DeviceStatus {
        &self.status
    }

    pub fn projector(&self) -> &AnnotationProjector {
        &self.projector
    }

    pub fn projector_mut(&mut self) -> &mut AnnotationProjector {
        &mut self.projector
    }

    pub fn tracker(&self) -> &GeoTracker {
        &self.tracker
    }

    pub fn orientation(&self) -> &OrientationEstimator {
        &self.orientation
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Reload waiting for the next tick
    pub fn pending_reload(&self) -> Option<ReloadKind> {
        self.reloads.pending()
    }

    /// Start sensors and tracking.
    ///
    /// Fails with [`GeolensError::CapabilityUnavailable`] if motion is not
    /// available, or with whatever the location source reports.
    pub fn start<M, L>(&mut self, now_ms: u64, motion: &M, location: &mut L) -> Result<(), GeolensError>
    where
        M: MotionSource + ?Sized,
        L: LocationSource + ?Sized,
    {
        if self.running {
            return Ok(());
        }
        if !motion.is_available() {
            return Err(GeolensError::CapabilityUnavailable(
                Capability::Motion,
                "no device motion available".to_string(),
            ));
        }
        location.start_updates()?;

        self.orientation.reset();
        self.tracker.start(now_ms);
        // A new session projects from its own first fix
        self.status.clear_user_location();
        self.projector.invalidate();
        self.running = true;
        log::info!("Engine started");
        Ok(())
    }

    /// Stop tracking; no timer fires and no sample is consumed afterwards
    pub fn stop<L: LocationSource + ?Sized>(&mut self, location: &mut L) {
        if !self.running {
            return;
        }
        location.stop_updates();
        self.tracker.stop();
        self.running = false;
        log::info!("Engine stopped");
    }

    /// Set the viewport from the camera field of view (long side)
    pub fn set_viewport(&mut self, viewport: Viewport, camera_fov: f64) -> bool {
        let orientation = self.orientation.orientation();
        let changed = self.status.set_viewport(viewport, camera_fov, orientation);
        if changed {
            self.projector.invalidate();
            self.reloads.request(ReloadKind::HeadingChanged);
        }
        changed
    }

    /// Set the viewport with explicit fields of view
    pub fn set_field_of_view(&mut self, viewport: Viewport, horizontal_fov: f64, vertical_fov: f64) -> bool {
        let changed = self.status.set_field_of_view(viewport, horizontal_fov, vertical_fov);
        if changed {
            self.projector.invalidate();
            self.reloads.request(ReloadKind::HeadingChanged);
        }
        changed
    }

    /// Change the interface orientation. Callers normally follow up with
    /// [`Engine::set_viewport`] for the rotated screen.
    pub fn set_interface_orientation(&mut self, orientation: InterfaceOrientation) {
        if self.orientation.orientation() != orientation {
            self.orientation.set_orientation(orientation);
            // Filters would otherwise sweep from the old frame's values
            self.orientation.reset();
        }
    }

    /// Replace the target list
    pub fn set_targets<F: ViewFactory + ?Sized>(&mut self, targets: Vec<Target>, factory: &mut F) {
        self.projector.set_targets(targets, factory);
        self.reloads.request(ReloadKind::AnnotationsChanged);
    }

    /// Feed a raw location fix
    pub fn handle_location_fix(&mut self, fix: &LocationFix, now_ms: u64) -> FixOutcome {
        self.tracker.handle_fix(fix, now_ms)
    }

    /// Feed a compass reading; used only with [`HeadingSource::Compass`]
    pub fn handle_compass(&mut self, reading: &CompassReading) {
        if !self.running {
            return;
        }
        if let Some(heading) = self.orientation.update_compass(reading) {
            self.status.set_heading(heading);
            self.reloads.request(ReloadKind::HeadingChanged);
        }
    }

    fn sample_motion<M: MotionSource + ?Sized>(&mut self, motion: &mut M) {
        let Some(sample) = motion.sample() else {
            return;
        };
        if !self.orientation.update(&sample) {
            return;
        }
        if let Some(pitch) = self.orientation.pitch() {
            self.status.set_pitch(pitch);
        }
        if self.orientation.heading_source() == HeadingSource::Attitude {
            if let Some(heading) = self.orientation.heading() {
                self.status.set_heading(heading);
            }
        }
        self.reloads.request(ReloadKind::HeadingChanged);
    }

    fn apply_tracker_event(&mut self, event: TrackerEvent, events: &mut Vec<EngineEvent>) {
        match event {
            TrackerEvent::ReloadLocation(location) => {
                self.status.set_user_location(location);
                self.reloads.request(ReloadKind::ReloadLocationChanged);
            }
            TrackerEvent::UserLocation(location) => {
                self.status.set_user_location(location);
                self.reloads.request(ReloadKind::UserLocationChanged);
            }
            TrackerEvent::LocationSearch {
                elapsed_ms,
                fix_received,
            } => events.push(EngineEvent::LocationSearch {
                elapsed_ms,
                fix_received,
            }),
        }
    }

    /// Run one frame of the pipeline
    pub fn tick<M, F, S>(&mut self, now_ms: u64, motion: &mut M, factory: &mut F, surface: &mut S) -> Vec<EngineEvent>
    where
        M: MotionSource + ?Sized,
        F: ViewFactory + ?Sized,
        S: RenderSurface + ?Sized,
    {
        let mut events = Vec::new();
        if self.running {
            self.sample_motion(motion);
            for event in self.tracker.poll(now_ms) {
                self.apply_tracker_event(event, &mut events);
            }
        }

        // The request stays queued until the status is ready
        if self.status.is_ready() {
            if let Some(kind) = self.reloads.take() {
                if let Some(mut outcome) = self.projector.reload(kind, &self.status, factory) {
                    if outcome.recomputed {
                        let context = StackingContext::new(&self.status, self.config.stacking.gap);
                        self.projector.stack(self.stacker.as_ref(), &context);
                        let capped = self.projector.enforce_vertical_level(factory);
                        outcome.active -= capped;
                        outcome.released += capped;
                    }
                    events.push(EngineEvent::Reloaded(outcome));
                }
            }
        }

        self.projector.render(&self.status, surface);
        events
    }
}
