//! Annotation Projection
//!
//! Turns the target list and the current [`DeviceStatus`] into positioned
//! marker views.
//!
//! # Pipeline
//!
//! A reload runs in two tiers:
//!
//! - **Full recompute** (every [`ReloadKind`] except `HeadingChanged`, or
//!   after the target list changed): distance and azimuth for every target
//!   from one user-location sample, stable sort by distance, visibility
//!   filter, view creation/release, distance-offset parameters, nominal
//!   positions, content refresh.
//! - **Every reload and every render**: frames follow the current heading
//!   and pitch. Heading moves a marker by
//!   `shortest_delta(azimuth, heading) × horizontal ppd`, pitch by
//!   `pitch × vertical ppd`.
//!
//! Stack offsets from [`crate::stacking`] are added at render time, so a
//! heading-only reload reuses the last stacking result.
//!
//! Views are kept in a side table keyed by [`TargetId`]; targets never own
//! their views.

mod offset;
mod reload;
mod target;

pub use offset::{DistanceOffset, DistanceOffsetMode, AUTOMATIC_TOP_MARGIN};
pub use reload::{ReloadKind, ReloadQueue};
pub use target::{Target, TargetId};

use std::collections::{HashMap, HashSet};

use crate::angle::{bearing, shortest_delta};
use crate::config::ProjectorConfig;
use crate::device::DeviceStatus;
use crate::marker::{MarkerView, RenderSurface, ViewFactory};
use crate::stacking::{StackingContext, StackingStrategy};

/// Caller-supplied distance → upward pixel offset
pub type DistanceOffsetFn = Box<dyn Fn(f64) -> f64>;

/// Summary of one serviced reload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadOutcome {
    pub kind: ReloadKind,
    /// Distances and azimuths were recomputed
    pub recomputed: bool,
    pub active: usize,
    pub created: usize,
    pub released: usize,
}

/// Target list, view side table and layout
pub struct AnnotationProjector {
    config: ProjectorConfig,
    targets: Vec<Target>,
    views: HashMap<TargetId, MarkerView>,
    /// Targets whose derived fields are current; differs from
    /// `targets.len()` after the list changed
    computed: usize,
    offset: DistanceOffset,
    offset_fn: Option<DistanceOffsetFn>,
    pending_detach: Vec<TargetId>,
}

impl AnnotationProjector {
    pub fn new(config: &ProjectorConfig) -> Self {
        AnnotationProjector {
            config: config.clone(),
            targets: Vec::new(),
            views: HashMap::new(),
            computed: 0,
            offset: DistanceOffset::default(),
            offset_fn: None,
            pending_detach: Vec::new(),
        }
    }

    pub fn config(&self) -> &ProjectorConfig {
        &self.config
    }

    /// Targets, nearest first after the last full recompute
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn target(&self, id: &TargetId) -> Option<&Target> {
        self.targets.iter().find(|t| t.id == *id)
    }

    pub fn view(&self, id: &TargetId) -> Option<&MarkerView> {
        self.views.get(id)
    }

    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    pub fn active_count(&self) -> usize {
        self.targets.iter().filter(|t| t.active).count()
    }

    pub fn distance_offset(&self) -> DistanceOffset {
        self.offset
    }

    /// Force a full recompute on the next reload, e.g. after the viewport
    /// changed and nominal positions are stale
    pub fn invalidate(&mut self) {
        self.computed = usize::MAX;
    }

    /// Replace the automatic/manual distance offset with a function of
    /// distance. `None` restores the configured mode.
    pub fn set_distance_offset_fn(&mut self, offset_fn: Option<DistanceOffsetFn>) {
        self.offset_fn = offset_fn;
        // Nominal positions depend on it
        self.computed = usize::MAX;
    }

    fn release_view<F: ViewFactory + ?Sized>(&mut self, id: &TargetId, factory: &mut F) -> bool {
        match self.views.remove(id) {
            Some(view) => {
                if view.attached {
                    self.pending_detach.push(*id);
                }
                factory.recycle_view(id, view);
                true
            }
            None => false,
        }
    }

    /// Replace the target list. Views of targets that disappeared go back
    /// to the factory; the next reload recomputes everything.
    pub fn set_targets<F: ViewFactory + ?Sized>(&mut self, targets: Vec<Target>, factory: &mut F) {
        let mut seen = HashSet::with_capacity(targets.len());
        let mut unique = Vec::with_capacity(targets.len());
        for mut target in targets {
            if !target.location.coordinate.is_valid() {
                log::warn!(
                    "Ignoring target {} with invalid coordinate {:?}",
                    target.id,
                    target.location.coordinate
                );
                continue;
            }
            if !seen.insert(target.id) {
                log::warn!("Ignoring duplicate target {}", target.id);
                continue;
            }
            target.active = false;
            unique.push(target);
        }

        let stale: Vec<TargetId> = self
            .views
            .keys()
            .filter(|id| !seen.contains(*id))
            .copied()
            .collect();
        for id in &stale {
            self.release_view(id, factory);
        }

        log::debug!("Target list replaced: {} targets, {} views released", unique.len(), stale.len());
        self.targets = unique;
        self.computed = usize::MAX;
    }

    /// Service a reload. Returns `None` while the device status is not ready.
    pub fn reload<F: ViewFactory + ?Sized>(
        &mut self,
        kind: ReloadKind,
        status: &DeviceStatus,
        factory: &mut F,
    ) -> Option<ReloadOutcome> {
        if !status.is_ready() {
            log::trace!("Skipping {:?} reload, device status not ready", kind);
            return None;
        }

        let structural = self.computed != self.targets.len();
        let mut outcome = ReloadOutcome {
            kind,
            recomputed: false,
            active: 0,
            created: 0,
            released: 0,
        };

        if kind.is_full_recompute() || structural {
            self.recompute_distances(status)?;
            let (created, released) = self.apply_visibility(factory);
            self.solve_offset(status);
            self.layout_nominal(status);
            for target in self.targets.iter().filter(|t| t.active) {
                if let Some(view) = self.views.get(&target.id) {
                    factory.refresh_content(target, view);
                }
            }
            outcome.recomputed = true;
            outcome.created = created;
            outcome.released = released;
        }

        self.update_frames(status);
        outcome.active = self.active_count();
        log::debug!("Reload {:?}: {:?}", kind, outcome);
        Some(outcome)
    }

    fn recompute_distances(&mut self, status: &DeviceStatus) -> Option<()> {
        // One sample for both distance and azimuth
        let user = *status.user_location()?;
        let approximate = self.config.approximate_bearing;

        for target in self.targets.iter_mut() {
            target.distance_from_user = user.distance_to(&target.location);
            target.azimuth = bearing(&user.coordinate, &target.location.coordinate, approximate);
        }
        self.targets
            .sort_by(|a, b| a.distance_from_user.total_cmp(&b.distance_from_user));
        self.computed = self.targets.len();
        Some(())
    }

    /// Mark the nearest targets active and reconcile views. Returns
    /// (created, released).
    fn apply_visibility<F: ViewFactory + ?Sized>(&mut self, factory: &mut F) -> (usize, usize) {
        let max_count = self.config.max_visible_annotations;
        let max_distance = self.config.max_distance;

        let mut count = 0;
        for target in self.targets.iter_mut() {
            let in_range = max_distance <= 0.0 || target.distance_from_user <= max_distance;
            target.active = count < max_count && in_range;
            if target.active {
                count += 1;
            }
        }

        let inactive: Vec<TargetId> = self
            .targets
            .iter()
            .filter(|t| !t.active && self.views.contains_key(&t.id))
            .map(|t| t.id)
            .collect();
        let mut released = 0;
        for id in &inactive {
            if self.release_view(id, factory) {
                released += 1;
            }
        }

        let mut created = 0;
        for target in self.targets.iter().filter(|t| t.active) {
            if self.views.contains_key(&target.id) {
                continue;
            }
            if let Some(view) = factory.make_view(target) {
                self.views.insert(target.id, view);
                created += 1;
            }
        }
        (created, released)
    }

    fn solve_offset(&mut self, status: &DeviceStatus) {
        let mut active = self.targets.iter().filter(|t| t.active);
        let Some(nearest) = active.next() else {
            self.offset = DistanceOffset::default();
            return;
        };
        let farthest = active.last().unwrap_or(nearest);

        let band = status.viewport().height * self.config.bottom_border;
        self.offset = DistanceOffset::solve(
            &self.config,
            nearest.distance_from_user,
            farthest.distance_from_user,
            band,
        );
        log::trace!(
            "Distance offset {:?} for {:.0}..{:.0} m",
            self.offset,
            nearest.distance_from_user,
            farthest.distance_from_user
        );
    }

    fn layout_nominal(&mut self, status: &DeviceStatus) {
        let viewport = status.viewport();
        let center_x = viewport.center_x();
        let bottom_y = viewport.height * self.config.bottom_border;

        for target in self.targets.iter().filter(|t| t.active) {
            let Some(view) = self.views.get_mut(&target.id) else {
                continue;
            };
            let distance_offset = match &self.offset_fn {
                Some(offset_fn) => offset_fn(target.distance_from_user),
                None => self.offset.offset(target.distance_from_user),
            };
            let (anchor_x, anchor_y) = view.center_anchor;
            view.nominal_x = center_x - view.width * anchor_x;
            view.nominal_y = bottom_y - view.height * anchor_y - distance_offset;
        }
    }

    /// Move every frame to the current heading and pitch
    fn update_frames(&mut self, status: &DeviceStatus) {
        let heading = status.heading();
        let pitch_y = status.pitch() * status.vertical_ppd();
        let ppd = status.horizontal_ppd();

        for target in self.targets.iter().filter(|t| t.active) {
            if let Some(view) = self.views.get_mut(&target.id) {
                view.frame.x = view.nominal_x + shortest_delta(target.azimuth, heading) * ppd;
                view.frame.y = view.nominal_y + pitch_y;
                view.frame.width = view.width;
                view.frame.height = view.height;
            }
        }
    }

    /// Run a stacking strategy over every view, nearest target first on ties
    pub fn stack(&mut self, strategy: &dyn StackingStrategy, context: &StackingContext) {
        let rank: HashMap<TargetId, usize> = self
            .targets
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id, i))
            .collect();

        let mut entries: Vec<(&TargetId, &mut MarkerView)> = self.views.iter_mut().collect();
        entries.sort_by_key(|(id, _)| rank.get(*id).copied().unwrap_or(usize::MAX));
        let mut markers: Vec<&mut MarkerView> = entries.into_iter().map(|(_, view)| view).collect();
        strategy.resolve(&mut markers, context);

        for target in self.targets.iter_mut() {
            target.vertical_level = self.views.get(&target.id).map_or(0, |v| v.vertical_level);
        }
    }

    /// Deactivate targets stacked above the configured maximum level.
    /// Returns how many were deactivated.
    pub fn enforce_vertical_level<F: ViewFactory + ?Sized>(&mut self, factory: &mut F) -> usize {
        let max_level = self.config.max_vertical_level;
        if max_level == 0 {
            return 0;
        }

        let over: Vec<TargetId> = self
            .targets
            .iter()
            .filter(|t| t.active && t.vertical_level > max_level)
            .map(|t| t.id)
            .collect();
        for id in &over {
            if let Some(target) = self.targets.iter_mut().find(|t| t.id == *id) {
                target.active = false;
            }
            self.release_view(id, factory);
        }
        if !over.is_empty() {
            log::debug!("{} targets above vertical level {} deactivated", over.len(), max_level);
        }
        over.len()
    }

    /// Place every active marker for the current heading and pitch.
    ///
    /// Markers within ± horizontal field of view of the heading are attached
    /// and placed; the rest are detached.
    pub fn render<S: RenderSurface + ?Sized>(&mut self, status: &DeviceStatus, surface: &mut S) {
        for id in self.pending_detach.drain(..) {
            surface.detach(&id);
        }
        if !status.is_ready() {
            return;
        }

        self.update_frames(status);
        let heading = status.heading();
        let fov = status.horizontal_fov();

        for target in self.targets.iter().filter(|t| t.active) {
            let Some(view) = self.views.get_mut(&target.id) else {
                continue;
            };
            let in_view = shortest_delta(target.azimuth, heading).abs() <= fov;
            if in_view {
                if !view.attached {
                    surface.attach(&target.id);
                    view.attached = true;
                }
                surface.place(&target.id, view.display_frame(), view.hidden);
            } else if view.attached {
                surface.detach(&target.id);
                view.attached = false;
            }
        }
    }

    /// Release every view and forget the targets
    pub fn clear<F: ViewFactory + ?Sized>(&mut self, factory: &mut F) {
        let ids: Vec<TargetId> = self.views.keys().copied().collect();
        for id in &ids {
            self.release_view(id, factory);
        }
        self.targets.clear();
        self.computed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Viewport;
    use crate::location::GeoLocation;
    use crate::marker::Rect;
    use crate::stacking::DisplaceStacker;

    #[derive(Default)]
    struct Factory {
        made: Vec<TargetId>,
        recycled: Vec<TargetId>,
        refreshed: usize,
    }

    impl ViewFactory for Factory {
        fn make_view(&mut self, target: &Target) -> Option<MarkerView> {
            self.made.push(target.id);
            Some(MarkerView::new(100.0, 40.0))
        }

        fn recycle_view(&mut self, id: &TargetId, _view: MarkerView) {
            self.recycled.push(*id);
        }

        fn refresh_content(&mut self, _target: &Target, _view: &MarkerView) {
            self.refreshed += 1;
        }
    }

    #[derive(Default)]
    struct Surface {
        attached: HashSet<TargetId>,
        placed: HashMap<TargetId, Rect>,
    }

    impl RenderSurface for Surface {
        fn attach(&mut self, id: &TargetId) {
            self.attached.insert(*id);
        }

        fn detach(&mut self, id: &TargetId) {
            self.attached.remove(id);
            self.placed.remove(id);
        }

        fn place(&mut self, id: &TargetId, frame: Rect, _hidden: bool) {
            self.placed.insert(*id, frame);
        }
    }

    fn ready_status(heading: f64) -> DeviceStatus {
        let mut status = DeviceStatus::new();
        status.set_heading(heading);
        status.set_pitch(0.0);
        status.set_field_of_view(Viewport::new(400.0, 600.0), 40.0, 60.0);
        status.set_user_location(GeoLocation::new(45.0, 18.0));
        status
    }

    /// Targets due north of the user at increasing distances
    fn northern_targets(count: u64) -> Vec<Target> {
        (0..count)
            .map(|i| {
                // Shuffle so sorting matters
                let rank = (i * 7) % count;
                Target::new(i, format!("T{}", i), GeoLocation::new(45.0 + 0.001 * (rank + 1) as f64, 18.0))
            })
            .collect()
    }

    #[test]
    fn test_not_ready_is_noop() {
        let mut projector = AnnotationProjector::new(&ProjectorConfig::default());
        let mut factory = Factory::default();
        projector.set_targets(northern_targets(3), &mut factory);
        let outcome = projector.reload(ReloadKind::AnnotationsChanged, &DeviceStatus::new(), &mut factory);
        assert!(outcome.is_none());
        assert_eq!(projector.view_count(), 0);
    }

    #[test]
    fn test_sorted_by_distance() {
        let mut projector = AnnotationProjector::new(&ProjectorConfig::default());
        let mut factory = Factory::default();
        projector.set_targets(northern_targets(10), &mut factory);
        projector.reload(ReloadKind::AnnotationsChanged, &ready_status(0.0), &mut factory);

        let distances: Vec<f64> = projector.targets().iter().map(|t| t.distance_from_user()).collect();
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));
        assert!(projector.targets().iter().all(|t| t.azimuth() < 1e-6 || t.azimuth() > 359.99));
    }

    #[test]
    fn test_visibility_keeps_nearest() {
        let config = ProjectorConfig {
            max_visible_annotations: 4,
            ..Default::default()
        };
        let mut projector = AnnotationProjector::new(&config);
        let mut factory = Factory::default();
        projector.set_targets(northern_targets(10), &mut factory);
        let outcome = projector
            .reload(ReloadKind::AnnotationsChanged, &ready_status(0.0), &mut factory)
            .unwrap();

        assert_eq!(outcome.active, 4);
        assert_eq!(outcome.created, 4);
        assert_eq!(factory.refreshed, 4);
        let active: Vec<bool> = projector.targets().iter().map(|t| t.is_active()).collect();
        assert_eq!(active, [true, true, true, true, false, false, false, false, false, false]);
    }

    #[test]
    fn test_max_distance_excludes_before_cap() {
        let config = ProjectorConfig {
            max_visible_annotations: 8,
            max_distance: 350.0,
            ..Default::default()
        };
        let mut projector = AnnotationProjector::new(&config);
        let mut factory = Factory::default();
        projector.set_targets(northern_targets(10), &mut factory);
        let outcome = projector
            .reload(ReloadKind::AnnotationsChanged, &ready_status(0.0), &mut factory)
            .unwrap();

        // 111, 222 and 333 m are in range
        assert_eq!(outcome.active, 3);
        assert!(projector
            .targets()
            .iter()
            .filter(|t| t.is_active())
            .all(|t| t.distance_from_user() <= 350.0));
    }

    #[test]
    fn test_invalid_coordinates_dropped() {
        let mut projector = AnnotationProjector::new(&ProjectorConfig::default());
        let mut factory = Factory::default();
        let mut targets = northern_targets(2);
        targets.push(Target::new(7, "nan", GeoLocation::new(f64::NAN, 18.0)));
        targets.push(Target::new(8, "off the map", GeoLocation::new(45.0, 181.0)));
        projector.set_targets(targets, &mut factory);
        assert_eq!(projector.targets().len(), 2);
        assert!(projector.target(&TargetId(7)).is_none());

        let outcome = projector
            .reload(ReloadKind::AnnotationsChanged, &ready_status(0.0), &mut factory)
            .unwrap();
        assert_eq!(outcome.active, 2);

        // The automatic offset still spans the valid markers
        let bottom_y = 600.0 * 0.55;
        let nearest = projector.view(&projector.targets()[0].id).unwrap();
        let farthest = projector.view(&projector.targets()[1].id).unwrap();
        assert!((nearest.nominal_y - (bottom_y - 20.0)).abs() < 1e-6);
        assert!((farthest.nominal_y - (bottom_y - 20.0 - (bottom_y - 30.0))).abs() < 1e-6);
    }

    #[test]
    fn test_views_reused_and_released() {
        let mut projector = AnnotationProjector::new(&ProjectorConfig::default());
        let mut factory = Factory::default();
        let status = ready_status(0.0);
        projector.set_targets(northern_targets(3), &mut factory);
        projector.reload(ReloadKind::AnnotationsChanged, &status, &mut factory);
        assert_eq!(factory.made.len(), 3);

        projector.reload(ReloadKind::UserLocationChanged, &status, &mut factory);
        assert_eq!(factory.made.len(), 3);

        let mut fewer = northern_targets(3);
        fewer.remove(0);
        projector.set_targets(fewer, &mut factory);
        assert_eq!(factory.recycled, vec![TargetId(0)]);
        assert_eq!(projector.view_count(), 2);
    }

    #[test]
    fn test_heading_reload_does_not_recompute() {
        let mut projector = AnnotationProjector::new(&ProjectorConfig::default());
        let mut factory = Factory::default();
        projector.set_targets(northern_targets(3), &mut factory);
        projector.reload(ReloadKind::AnnotationsChanged, &ready_status(0.0), &mut factory);

        let outcome = projector
            .reload(ReloadKind::HeadingChanged, &ready_status(10.0), &mut factory)
            .unwrap();
        assert!(!outcome.recomputed);
        assert_eq!(factory.refreshed, 3);

        let view = projector.view(&TargetId(0)).unwrap();
        assert!((view.frame.x - (view.nominal_x - 100.0)).abs() < 1e-6);
    }

    #[test]
    fn test_list_change_forces_recompute() {
        let mut projector = AnnotationProjector::new(&ProjectorConfig::default());
        let mut factory = Factory::default();
        projector.set_targets(northern_targets(3), &mut factory);
        let outcome = projector
            .reload(ReloadKind::HeadingChanged, &ready_status(0.0), &mut factory)
            .unwrap();
        assert!(outcome.recomputed);
    }

    #[test]
    fn test_automatic_offset_spreads_vertically() {
        let mut projector = AnnotationProjector::new(&ProjectorConfig::default());
        let mut factory = Factory::default();
        projector.set_targets(northern_targets(5), &mut factory);
        projector.reload(ReloadKind::AnnotationsChanged, &ready_status(0.0), &mut factory);

        let bottom_y = 600.0 * 0.55;
        let nearest = projector.view(&projector.targets()[0].id).unwrap();
        let farthest = projector.view(&projector.targets()[4].id).unwrap();
        assert!((nearest.nominal_y - (bottom_y - 20.0)).abs() < 1e-6);
        assert!((farthest.nominal_y - (bottom_y - 20.0 - (bottom_y - 30.0))).abs() < 1e-6);
    }

    #[test]
    fn test_custom_offset_fn() {
        let mut projector = AnnotationProjector::new(&ProjectorConfig::default());
        let mut factory = Factory::default();
        projector.set_distance_offset_fn(Some(Box::new(|_| 7.0)));
        projector.set_targets(northern_targets(2), &mut factory);
        projector.reload(ReloadKind::AnnotationsChanged, &ready_status(0.0), &mut factory);
        for target in projector.targets() {
            let view = projector.view(&target.id).unwrap();
            assert!((view.nominal_y - (330.0 - 20.0 - 7.0)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_render_attaches_only_within_fov() {
        let mut projector = AnnotationProjector::new(&ProjectorConfig::default());
        let mut factory = Factory::default();
        let mut surface = Surface::default();
        projector.set_targets(
            vec![
                Target::new(1, "north", GeoLocation::new(45.001, 18.0)),
                Target::new(2, "south", GeoLocation::new(44.999, 18.0)),
            ],
            &mut factory,
        );
        let status = ready_status(0.0);
        projector.reload(ReloadKind::AnnotationsChanged, &status, &mut factory);
        projector.render(&status, &mut surface);
        assert!(surface.attached.contains(&TargetId(1)));
        assert!(!surface.attached.contains(&TargetId(2)));

        let status = ready_status(180.0);
        projector.render(&status, &mut surface);
        assert!(!surface.attached.contains(&TargetId(1)));
        assert!(surface.attached.contains(&TargetId(2)));
    }

    #[test]
    fn test_released_view_is_detached() {
        let mut projector = AnnotationProjector::new(&ProjectorConfig::default());
        let mut factory = Factory::default();
        let mut surface = Surface::default();
        let status = ready_status(0.0);
        projector.set_targets(northern_targets(2), &mut factory);
        projector.reload(ReloadKind::AnnotationsChanged, &status, &mut factory);
        projector.render(&status, &mut surface);
        assert_eq!(surface.attached.len(), 2);

        projector.clear(&mut factory);
        projector.render(&status, &mut surface);
        assert!(surface.attached.is_empty());
    }

    #[test]
    fn test_vertical_level_cap() {
        let config = ProjectorConfig {
            max_vertical_level: 2,
            distance_offset_mode: DistanceOffsetMode::Manual,
            distance_offset_multiplier: 0.0,
            ..Default::default()
        };
        let mut projector = AnnotationProjector::new(&config);
        let mut factory = Factory::default();
        let status = ready_status(0.0);
        // Same spot on screen for all of them
        projector.set_targets(northern_targets(5), &mut factory);
        projector.reload(ReloadKind::AnnotationsChanged, &status, &mut factory);
        projector.stack(&DisplaceStacker, &StackingContext::new(&status, 5.0));

        let levels: Vec<usize> = projector.targets().iter().map(|t| t.vertical_level()).collect();
        assert_eq!(levels, [0, 1, 2, 3, 4]);

        assert_eq!(projector.enforce_vertical_level(&mut factory), 2);
        assert_eq!(projector.active_count(), 3);
        assert_eq!(projector.view_count(), 3);
    }
}
