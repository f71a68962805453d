//! Overlap Resolution
//!
//! Markers at similar azimuths and distances land on top of each other.
//! A [`StackingStrategy`] resolves that after every full reload, working on
//! the frames the projector computed for the current heading and pitch.
//!
//! Two strategies ship with the crate:
//!
//! | Policy                        | Strategy           | Effect |
//! |-------------------------------|--------------------|--------|
//! | [`StackingPolicy::Displace`]  | [`DisplaceStacker`]| moves overlapping markers up above the ones below |
//! | [`StackingPolicy::Fade`]      | [`FadeStacker`]    | hides the later (farther) of two overlapping markers |
//!
//! # The seam
//!
//! Frames are laid out relative to the current heading, so the full circle
//! spans `360 × pixels-per-degree` pixels centered on the screen. A marker
//! at +179° and one at -179° are neighbours behind the user but sit a full
//! span apart in x. Markers within one width of either border therefore get
//! an alternate frame shifted by the span, and collisions are tested against
//! both.

mod displace;
mod fade;

pub use displace::DisplaceStacker;
pub use fade::FadeStacker;

use serde::{Deserialize, Serialize};

use crate::device::DeviceStatus;
use crate::marker::{MarkerView, Rect};

/// Which stacking strategy the engine uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StackingPolicy {
    Displace,
    Fade,
}

impl Default for StackingPolicy {
    fn default() -> Self {
        StackingPolicy::Displace
    }
}

impl StackingPolicy {
    pub fn strategy(&self) -> Box<dyn StackingStrategy> {
        match self {
            StackingPolicy::Displace => Box::new(DisplaceStacker),
            StackingPolicy::Fade => Box::new(FadeStacker),
        }
    }
}

/// Horizontal geometry of the full circle around the user
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StackingContext {
    /// Pixel width of 360°
    pub span: f64,
    /// x of the seam on the left (heading - 180°)
    pub left_border: f64,
    /// x of the seam on the right (heading + 180°)
    pub right_border: f64,
    /// Vertical gap between stacked markers
    pub gap: f64,
}

impl StackingContext {
    pub fn new(status: &DeviceStatus, gap: f64) -> Self {
        let ppd = status.horizontal_ppd();
        let center = status.viewport().center_x();
        StackingContext {
            span: 360.0 * ppd,
            left_border: center - 180.0 * ppd,
            right_border: center + 180.0 * ppd,
            gap,
        }
    }

    /// Copy of `frame` on the other side of the seam, if it is close enough
    /// to a border to collide across it
    pub fn seam_twin(&self, frame: &Rect) -> Option<Rect> {
        if frame.max_x() > self.right_border - frame.width {
            Some(frame.offset(-self.span, 0.0))
        } else if frame.x < self.left_border + frame.width {
            Some(frame.offset(self.span, 0.0))
        } else {
            None
        }
    }
}

/// Overlap resolution policy
pub trait StackingStrategy {
    fn name(&self) -> &'static str;

    /// Resolve overlaps among `markers`. Implementations may reorder the
    /// slice. An empty slice is a no-op.
    fn resolve(&self, markers: &mut [&mut MarkerView], context: &StackingContext);
}

/// Reset per-pass state, sort lowest-on-screen first and attach seam twins
pub(crate) fn prepare(markers: &mut [&mut MarkerView], context: &StackingContext) {
    for marker in markers.iter_mut() {
        marker.stack_offset = 0.0;
        marker.vertical_level = 0;
        marker.hidden = false;
        marker.alternate_frame = context.seam_twin(&marker.frame);
    }
    markers.sort_by(|a, b| b.frame.y.total_cmp(&a.frame.y));
}

/// Does `frame` (or its twin) overlap the placed marker `other`?
pub(crate) fn collides(frame: &Rect, alternate: Option<&Rect>, other: &MarkerView) -> bool {
    let other_frame = other.display_frame();
    if frame.intersects(&other_frame) {
        return true;
    }
    if let Some(alternate) = alternate {
        if alternate.intersects(&other_frame) {
            return true;
        }
    }
    match other.alternate_frame {
        Some(other_alternate) => frame.intersects(&other_alternate.offset(0.0, other.stack_offset)),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> StackingContext {
        // 1 px per degree, screen center at x = 0
        StackingContext {
            span: 360.0,
            left_border: -180.0,
            right_border: 180.0,
            gap: 5.0,
        }
    }

    #[test]
    fn test_seam_twin() {
        let ctx = context();
        let near_right = Rect::new(172.0, 0.0, 10.0, 10.0);
        assert_eq!(ctx.seam_twin(&near_right), Some(Rect::new(-188.0, 0.0, 10.0, 10.0)));

        let near_left = Rect::new(-184.0, 0.0, 10.0, 10.0);
        assert_eq!(ctx.seam_twin(&near_left), Some(Rect::new(176.0, 0.0, 10.0, 10.0)));

        assert_eq!(ctx.seam_twin(&Rect::new(0.0, 0.0, 10.0, 10.0)), None);
    }

    #[test]
    fn test_prepare_sorts_and_resets() {
        let ctx = context();
        let mut a = MarkerView::new(10.0, 10.0);
        a.frame = Rect::new(0.0, 50.0, 10.0, 10.0);
        a.stack_offset = -12.0;
        a.hidden = true;
        let mut b = MarkerView::new(10.0, 10.0);
        b.frame = Rect::new(0.0, 80.0, 10.0, 10.0);

        let mut markers = vec![&mut a, &mut b];
        prepare(&mut markers, &ctx);
        assert_eq!(markers[0].frame.y, 80.0);
        assert_eq!(markers[1].frame.y, 50.0);
        assert_eq!(markers[1].stack_offset, 0.0);
        assert!(!markers[1].hidden);
    }

    #[test]
    fn test_policy_selects_strategy() {
        assert_eq!(StackingPolicy::Displace.strategy().name(), "displace");
        assert_eq!(StackingPolicy::Fade.strategy().name(), "fade");
    }
}
