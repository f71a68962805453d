//! Location Tracking
//!
//! Filters raw location fixes and turns them into a low-rate stream of
//! reload events for the projector.
//!
//! GPS delivers fixes in bursts, and every reload that recomputes distances
//! also re-runs the stacking pass. The tracker therefore:
//!
//! - drops inaccurate, stale and barely-moved fixes,
//! - reports at most once per report interval (5 s by default),
//! - distinguishes a *reload* (user moved past the reload distance from the
//!   last reload baseline) from a lighter *refresh*,
//! - runs a location-search watchdog that reports elapsed time every 5 s
//!   until the first fix is accepted.
//!
//! ```text
//!            start()                       stop()
//! Stopped ───────────▶ Tracking ──────────────────▶ Stopped
//!                      (timers armed)      (all timers cancelled)
//! ```
//!
//! The tracker never reads a clock; every call takes `now_ms` from the owner.

mod scheduler;

pub use scheduler::{Scheduler, TaskHandle};

use crate::config::TrackerConfig;
use crate::location::{GeoLocation, LocationFix};

/// Tracker state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Stopped,
    Tracking,
}

impl Default for TrackerState {
    fn default() -> Self {
        TrackerState::Stopped
    }
}

/// Timers owned by the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackerTimer {
    Report,
    LocationSearch,
}

/// Notifications produced by [`GeoTracker::poll`]
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    /// User moved past the reload distance; the baseline is now `location`
    ReloadLocation(GeoLocation),
    /// User moved, but not far enough for a full reload
    UserLocation(GeoLocation),
    /// Still no usable fix after `elapsed_ms`
    LocationSearch { elapsed_ms: u64, fix_received: bool },
}

/// Why a fix was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NotTracking,
    InvalidCoordinate,
    Inaccurate,
    Stale,
    NotMoved,
}

/// Result of [`GeoTracker::handle_fix`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixOutcome {
    Accepted,
    Rejected(RejectReason),
}

/// Location filter, report debouncer and search watchdog
#[derive(Debug, Clone)]
pub struct GeoTracker {
    config: TrackerConfig,
    state: TrackerState,
    scheduler: Scheduler<TrackerTimer>,
    report_task: Option<TaskHandle<TrackerTimer>>,
    search_task: Option<TaskHandle<TrackerTimer>>,
    search_started_ms: u64,
    user_location: Option<GeoLocation>,
    user_location_ms: Option<u64>,
    reload_location: Option<GeoLocation>,
    fix_received: bool,
    pending: Vec<TrackerEvent>,
}

impl GeoTracker {
    pub fn new(config: &TrackerConfig) -> Self {
        GeoTracker {
            config: config.clone(),
            state: TrackerState::Stopped,
            scheduler: Scheduler::new(),
            report_task: None,
            search_task: None,
            search_started_ms: 0,
            user_location: None,
            user_location_ms: None,
            reload_location: None,
            fix_received: false,
            pending: Vec::new(),
        }
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn is_tracking(&self) -> bool {
        self.state == TrackerState::Tracking
    }

    /// Last accepted location
    pub fn user_location(&self) -> Option<&GeoLocation> {
        self.user_location.as_ref()
    }

    /// Time the last accepted fix arrived
    pub fn user_location_ms(&self) -> Option<u64> {
        self.user_location_ms
    }

    /// Location of the last full reload
    pub fn reload_location(&self) -> Option<&GeoLocation> {
        self.reload_location.as_ref()
    }

    /// Start tracking, discarding everything learned in a previous run
    pub fn start(&mut self, now_ms: u64) {
        if self.is_tracking() {
            self.stop();
        }

        self.user_location = None;
        self.user_location_ms = None;
        self.reload_location = None;
        self.fix_received = false;
        self.pending.clear();
        self.state = TrackerState::Tracking;

        if self.config.location_search_watchdog {
            self.search_started_ms = now_ms;
            self.search_task = Some(self.scheduler.schedule_repeating(
                TrackerTimer::LocationSearch,
                now_ms,
                self.config.location_search_interval_ms,
            ));
        }
        log::info!("Location tracking started");
    }

    /// Stop tracking; no timer fires after this returns
    pub fn stop(&mut self) {
        if !self.is_tracking() {
            return;
        }
        self.scheduler.cancel_all();
        self.report_task = None;
        self.search_task = None;
        self.pending.clear();
        self.state = TrackerState::Stopped;
        log::info!("Location tracking stopped");
    }

    fn check_fix(&self, fix: &LocationFix, now_ms: u64) -> Result<(), RejectReason> {
        if !fix.location.coordinate.is_valid() {
            return Err(RejectReason::InvalidCoordinate);
        }
        if fix.horizontal_accuracy < 0.0
            || fix.horizontal_accuracy > self.config.minimum_location_horizontal_accuracy
        {
            return Err(RejectReason::Inaccurate);
        }
        let max_age_ms = (self.config.minimum_location_age * 1000.0) as u64;
        if fix.age_ms(now_ms) > max_age_ms {
            return Err(RejectReason::Stale);
        }
        if let Some(previous) = &self.user_location {
            if previous.distance_to(&fix.location) < self.config.user_distance_filter {
                return Err(RejectReason::NotMoved);
            }
        }
        Ok(())
    }

    /// Offer a raw fix to the tracker. Rejections are silent apart from a
    /// debug log line.
    pub fn handle_fix(&mut self, fix: &LocationFix, now_ms: u64) -> FixOutcome {
        if !self.is_tracking() {
            return FixOutcome::Rejected(RejectReason::NotTracking);
        }
        self.fix_received = true;

        if let Err(reason) = self.check_fix(fix, now_ms) {
            log::debug!(
                "Dropping fix {:.6},{:.6} (accuracy {:.1} m, age {} ms): {:?}",
                fix.location.coordinate.latitude,
                fix.location.coordinate.longitude,
                fix.horizontal_accuracy,
                fix.age_ms(now_ms),
                reason
            );
            return FixOutcome::Rejected(reason);
        }

        self.user_location = Some(fix.location);
        self.user_location_ms = Some(now_ms);

        if let Some(task) = self.search_task.take() {
            self.scheduler.cancel(task);
            log::debug!(
                "Location acquired after {} ms",
                now_ms.saturating_sub(self.search_started_ms)
            );
        }

        if self.reload_location.is_none() {
            // First fix is the reload baseline and is reported right away
            self.reload_location = Some(fix.location);
            self.pending.push(TrackerEvent::ReloadLocation(fix.location));
        } else if self.report_task.is_none() {
            self.report_task = Some(self.scheduler.schedule_once(
                TrackerTimer::Report,
                now_ms,
                self.config.report_interval_ms,
            ));
        }
        FixOutcome::Accepted
    }

    fn report(&mut self) -> Option<TrackerEvent> {
        let user = self.user_location?;
        let baseline = self.reload_location?;

        let moved = baseline.distance_to(&user);
        if moved > self.config.reload_distance_filter {
            log::debug!("Moved {:.0} m from reload baseline, reloading", moved);
            self.reload_location = Some(user);
            Some(TrackerEvent::ReloadLocation(user))
        } else {
            log::trace!("Moved {:.0} m from reload baseline, refreshing", moved);
            Some(TrackerEvent::UserLocation(user))
        }
    }

    /// Fire due timers and collect events
    pub fn poll(&mut self, now_ms: u64) -> Vec<TrackerEvent> {
        let mut events = std::mem::take(&mut self.pending);
        if !self.is_tracking() {
            return events;
        }

        for handle in self.scheduler.poll(now_ms) {
            match handle.kind {
                TrackerTimer::Report => {
                    self.report_task = None;
                    events.extend(self.report());
                }
                TrackerTimer::LocationSearch => {
                    let elapsed_ms = now_ms.saturating_sub(self.search_started_ms);
                    log::debug!(
                        "No location after {} ms (fix received: {})",
                        elapsed_ms,
                        self.fix_received
                    );
                    events.push(TrackerEvent::LocationSearch {
                        elapsed_ms,
                        fix_received: self.fix_received,
                    });
                }
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> GeoTracker {
        GeoTracker::new(&TrackerConfig::default())
    }

    fn fix(lat: f64, lon: f64, accuracy: f64, timestamp_ms: u64) -> LocationFix {
        LocationFix::new(GeoLocation::new(lat, lon), accuracy, timestamp_ms)
    }

    #[test]
    fn test_fix_ignored_when_stopped() {
        let mut t = tracker();
        assert_eq!(
            t.handle_fix(&fix(45.0, 18.0, 5.0, 0), 0),
            FixOutcome::Rejected(RejectReason::NotTracking)
        );
    }

    #[test]
    fn test_first_fix_is_reload_baseline() {
        let mut t = tracker();
        t.start(0);
        assert_eq!(t.handle_fix(&fix(45.0, 18.0, 5.0, 100), 100), FixOutcome::Accepted);
        let events = t.poll(100);
        assert_eq!(events, vec![TrackerEvent::ReloadLocation(GeoLocation::new(45.0, 18.0))]);
        assert_eq!(t.reload_location(), Some(&GeoLocation::new(45.0, 18.0)));
    }

    #[test]
    fn test_rejections() {
        let mut t = tracker();
        t.start(0);
        assert_eq!(
            t.handle_fix(&fix(45.0, 18.0, 900.0, 0), 0),
            FixOutcome::Rejected(RejectReason::Inaccurate)
        );
        assert_eq!(
            t.handle_fix(&fix(45.0, 18.0, -1.0, 0), 0),
            FixOutcome::Rejected(RejectReason::Inaccurate)
        );
        assert_eq!(
            t.handle_fix(&fix(45.0, 18.0, 5.0, 0), 60_000),
            FixOutcome::Rejected(RejectReason::Stale)
        );
        assert_eq!(
            t.handle_fix(&fix(95.0, 18.0, 5.0, 0), 0),
            FixOutcome::Rejected(RejectReason::InvalidCoordinate)
        );
        assert!(t.user_location().is_none());

        t.handle_fix(&fix(45.0, 18.0, 5.0, 0), 0);
        // About 11 m north, below the 15 m user distance filter
        assert_eq!(
            t.handle_fix(&fix(45.0001, 18.0, 5.0, 10), 10),
            FixOutcome::Rejected(RejectReason::NotMoved)
        );
    }

    #[test]
    fn test_reports_are_debounced() {
        let mut t = tracker();
        t.start(0);
        t.handle_fix(&fix(45.0, 18.0, 5.0, 0), 0);
        assert_eq!(t.poll(0).len(), 1);

        // Burst of fixes ~22 m apart, all within one window
        t.handle_fix(&fix(45.0002, 18.0, 5.0, 1_000), 1_000);
        t.handle_fix(&fix(45.0004, 18.0, 5.0, 1_200), 1_200);
        t.handle_fix(&fix(45.0006, 18.0, 5.0, 1_400), 1_400);
        assert!(t.poll(5_999).is_empty());

        let events = t.poll(6_000);
        assert_eq!(
            events,
            vec![TrackerEvent::UserLocation(GeoLocation::new(45.0006, 18.0))]
        );
        assert!(t.poll(20_000).is_empty());
    }

    #[test]
    fn test_reload_after_reload_distance() {
        let mut t = tracker();
        t.start(0);
        t.handle_fix(&fix(45.0, 18.0, 5.0, 0), 0);
        t.poll(0);

        // ~111 m north, beyond the 75 m reload distance
        t.handle_fix(&fix(45.001, 18.0, 5.0, 1_000), 1_000);
        let events = t.poll(6_000);
        assert_eq!(
            events,
            vec![TrackerEvent::ReloadLocation(GeoLocation::new(45.001, 18.0))]
        );
        assert_eq!(t.reload_location(), Some(&GeoLocation::new(45.001, 18.0)));
    }

    #[test]
    fn test_location_search_watchdog() {
        let mut t = tracker();
        t.start(1_000);
        assert!(t.poll(5_999).is_empty());
        assert_eq!(
            t.poll(6_000),
            vec![TrackerEvent::LocationSearch {
                elapsed_ms: 5_000,
                fix_received: false
            }]
        );

        t.handle_fix(&fix(45.0, 18.0, 5_000.0, 7_000), 7_000);
        assert_eq!(
            t.poll(11_000),
            vec![TrackerEvent::LocationSearch {
                elapsed_ms: 10_000,
                fix_received: true
            }]
        );

        // Accepted fix ends the search
        t.handle_fix(&fix(45.0, 18.0, 5.0, 12_000), 12_000);
        let events = t.poll(30_000);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], TrackerEvent::ReloadLocation(_)));
    }

    #[test]
    fn test_stop_cancels_everything() {
        let mut t = tracker();
        t.start(0);
        t.handle_fix(&fix(45.0, 18.0, 5.0, 0), 0);
        t.handle_fix(&fix(45.001, 18.0, 5.0, 100), 100);
        t.stop();
        assert_eq!(t.state(), TrackerState::Stopped);
        assert!(t.poll(60_000).is_empty());
    }

    #[test]
    fn test_restart_resets_state() {
        let mut t = tracker();
        t.start(0);
        t.handle_fix(&fix(45.0, 18.0, 5.0, 0), 0);
        t.start(10_000);
        assert!(t.user_location().is_none());
        assert!(t.reload_location().is_none());
        assert!(t.poll(10_000).is_empty());
    }
}
