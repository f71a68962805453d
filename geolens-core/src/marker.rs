//! Marker Views
//!
//! Screen-space state of one on-screen marker, and the two traits through
//! which the presentation layer supplies views and receives placements.
//! The core never decides what a marker looks like, only its size (given by
//! the factory) and where it goes.

use serde::{Deserialize, Serialize};

use crate::projector::{Target, TargetId};

/// Axis-aligned rectangle, y growing downwards
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    /// True if the interiors overlap; touching edges do not intersect
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.max_x()
            && other.x < self.max_x()
            && self.y < other.max_y()
            && other.y < self.max_y()
    }

    pub fn offset(&self, dx: f64, dy: f64) -> Rect {
        Rect {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }
}

/// Layout state of one marker
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerView {
    /// Marker size in pixels
    pub width: f64,
    pub height: f64,
    /// Fraction of the size that sits on the projected point
    /// (0.5, 0.5 centers the marker, 0.5, 1.0 puts the bottom edge on it)
    pub center_anchor: (f64, f64),
    /// Position before heading, pitch and stacking are applied
    pub nominal_x: f64,
    pub nominal_y: f64,
    /// Frame after heading and pitch, before stacking
    pub frame: Rect,
    /// Vertical displacement chosen by the stacker
    pub stack_offset: f64,
    /// Seam twin of `frame`, only meaningful during stacking
    pub alternate_frame: Option<Rect>,
    /// Number of markers this one was stacked on top of
    pub vertical_level: usize,
    /// Hidden by the fade stacking policy
    pub hidden: bool,
    /// Currently attached to the render surface
    pub attached: bool,
}

impl MarkerView {
    pub fn new(width: f64, height: f64) -> Self {
        MarkerView {
            width,
            height,
            center_anchor: (0.5, 0.5),
            nominal_x: 0.0,
            nominal_y: 0.0,
            frame: Rect::new(0.0, 0.0, width, height),
            stack_offset: 0.0,
            alternate_frame: None,
            vertical_level: 0,
            hidden: false,
            attached: false,
        }
    }

    pub fn with_anchor(mut self, x: f64, y: f64) -> Self {
        self.center_anchor = (x, y);
        self
    }

    /// Frame that is actually drawn: `frame` moved by the stack offset
    pub fn display_frame(&self) -> Rect {
        self.frame.offset(0.0, self.stack_offset)
    }
}

/// Supplies marker views for targets
pub trait ViewFactory {
    /// Create a view for a newly visible target. `None` leaves the target
    /// without a view until the next full reload.
    fn make_view(&mut self, target: &Target) -> Option<MarkerView>;

    /// Take back the view of a target that is no longer visible
    fn recycle_view(&mut self, _id: &TargetId, _view: MarkerView) {}

    /// Distances or azimuths changed; update labels bound to the view
    fn refresh_content(&mut self, _target: &Target, _view: &MarkerView) {}
}

/// Receives final placements every frame
pub trait RenderSurface {
    /// Marker entered the horizontal field of view
    fn attach(&mut self, id: &TargetId);

    /// Marker left the field of view or lost its view
    fn detach(&mut self, id: &TargetId);

    /// Final frame for an attached marker
    fn place(&mut self, id: &TargetId, frame: Rect, hidden: bool);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_intersection() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(a.intersects(&Rect::new(5.0, 5.0, 10.0, 10.0)));
        assert!(!a.intersects(&Rect::new(10.0, 0.0, 10.0, 10.0)));
        assert!(!a.intersects(&Rect::new(0.0, -10.0, 10.0, 10.0)));
        assert!(a.intersects(&Rect::new(-5.0, -5.0, 30.0, 30.0)));
    }

    #[test]
    fn test_display_frame_applies_stack_offset() {
        let mut view = MarkerView::new(100.0, 40.0);
        view.frame = Rect::new(10.0, 200.0, 100.0, 40.0);
        view.stack_offset = -45.0;
        assert_eq!(view.display_frame(), Rect::new(10.0, 155.0, 100.0, 40.0));
    }
}
