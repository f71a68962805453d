//! Fade-out-on-overlap stacking

use super::{collides, prepare, StackingContext, StackingStrategy};
use crate::marker::MarkerView;

/// Hides every marker that overlaps a visible marker placed before it.
///
/// Uses the same ordering and seam twins as [`super::DisplaceStacker`], but
/// never moves anything: the later (higher on screen, usually farther)
/// marker of an overlapping pair is hidden.
#[derive(Debug, Clone, Copy, Default)]
pub struct FadeStacker;

impl StackingStrategy for FadeStacker {
    fn name(&self) -> &'static str {
        "fade"
    }

    fn resolve(&self, markers: &mut [&mut MarkerView], context: &StackingContext) {
        if markers.is_empty() {
            return;
        }
        prepare(markers, context);

        let mut hidden = 0usize;
        for i in 0..markers.len() {
            let (fixed, rest) = markers.split_at_mut(i);
            let marker = &mut rest[0];
            let overlaps = fixed
                .iter()
                .filter(|other| !other.hidden)
                .any(|other| collides(&marker.frame, marker.alternate_frame.as_ref(), other));
            marker.hidden = overlaps;
            if overlaps {
                hidden += 1;
            }
        }
        log::trace!("Faded {} of {} markers", hidden, markers.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::Rect;

    fn context() -> StackingContext {
        StackingContext {
            span: 360.0,
            left_border: -180.0,
            right_border: 180.0,
            gap: 5.0,
        }
    }

    fn marker(x: f64, y: f64) -> MarkerView {
        let mut view = MarkerView::new(50.0, 30.0);
        view.frame = Rect::new(x, y, 50.0, 30.0);
        view
    }

    #[test]
    fn test_upper_overlapping_marker_hidden() {
        let mut near = marker(0.0, 110.0);
        let mut far = marker(10.0, 100.0);
        FadeStacker.resolve(&mut [&mut far, &mut near], &context());
        assert!(!near.hidden);
        assert!(far.hidden);
        assert_eq!(far.stack_offset, 0.0);
    }

    #[test]
    fn test_hidden_marker_does_not_hide_others() {
        // b overlaps a and is hidden; c only overlaps b and stays visible
        let mut a = marker(0.0, 120.0);
        let mut b = marker(40.0, 110.0);
        let mut c = marker(80.0, 100.0);
        FadeStacker.resolve(&mut [&mut a, &mut b, &mut c], &context());
        assert!(!a.hidden);
        assert!(b.hidden);
        assert!(!c.hidden);
    }

    #[test]
    fn test_fade_across_seam() {
        let mut right = MarkerView::new(10.0, 20.0);
        right.frame = Rect::new(174.0, 200.0, 10.0, 20.0);
        let mut left = MarkerView::new(10.0, 20.0);
        left.frame = Rect::new(-184.0, 195.0, 10.0, 20.0);
        FadeStacker.resolve(&mut [&mut right, &mut left], &context());
        assert!(!right.hidden);
        assert!(left.hidden);
    }
}
