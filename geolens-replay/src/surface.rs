//! Headless view factory and render surface
//!
//! Stand-ins for a real presentation layer: views are sized from the target
//! title the way a one-line label would be, and placements are recorded
//! instead of drawn.

use std::collections::BTreeMap;

use geolens_core::marker::{MarkerView, Rect, RenderSurface, ViewFactory};
use geolens_core::{Target, TargetId};
use serde::Serialize;

/// Label metrics in points
const CHAR_WIDTH: f64 = 7.0;
const PADDING: f64 = 12.0;
const LABEL_HEIGHT: f64 = 24.0;

/// Makes label-sized views anchored at their bottom center
#[derive(Debug, Default)]
pub struct LabelFactory {
    created: usize,
    recycled: usize,
}

impl LabelFactory {
    pub fn new() -> Self {
        LabelFactory::default()
    }

    /// Views handed out and not yet returned
    pub fn live(&self) -> usize {
        self.created - self.recycled
    }
}

impl ViewFactory for LabelFactory {
    fn make_view(&mut self, target: &Target) -> Option<MarkerView> {
        self.created += 1;
        let width = PADDING + CHAR_WIDTH * target.title.chars().count() as f64;
        Some(MarkerView::new(width, LABEL_HEIGHT).with_anchor(0.5, 1.0))
    }

    fn recycle_view(&mut self, id: &TargetId, _view: MarkerView) {
        log::trace!("View of {} recycled", id);
        self.recycled += 1;
    }

    fn refresh_content(&mut self, target: &Target, _view: &MarkerView) {
        log::trace!(
            "{} {:?} now {:.0} m at {:.1}°",
            target.id,
            target.title,
            target.distance_from_user(),
            target.azimuth()
        );
    }
}

/// Last placement of one marker
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Placement {
    pub frame: Rect,
    pub hidden: bool,
}

/// Records the current placement of every attached marker
#[derive(Debug, Default)]
pub struct RecordingSurface {
    placements: BTreeMap<TargetId, Option<Placement>>,
    changed: bool,
}

impl RecordingSurface {
    pub fn new() -> Self {
        RecordingSurface::default()
    }

    /// Attached markers that have been placed, ordered by id
    pub fn placements(&self) -> impl Iterator<Item = (&TargetId, &Placement)> {
        self.placements
            .iter()
            .filter_map(|(id, placement)| placement.as_ref().map(|p| (id, p)))
    }

    pub fn attached(&self) -> usize {
        self.placements.len()
    }

    /// Whether anything moved since the last call
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }
}

impl RenderSurface for RecordingSurface {
    fn attach(&mut self, id: &TargetId) {
        self.placements.insert(*id, None);
        self.changed = true;
    }

    fn detach(&mut self, id: &TargetId) {
        if self.placements.remove(id).is_some() {
            self.changed = true;
        }
    }

    fn place(&mut self, id: &TargetId, frame: Rect, hidden: bool) {
        let placement = Some(Placement { frame, hidden });
        let slot = self.placements.entry(*id).or_insert(None);
        if *slot != placement {
            *slot = placement;
            self.changed = true;
        }
    }
}
