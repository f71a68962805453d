//! Displace-to-avoid-overlap stacking

use super::{collides, prepare, StackingContext, StackingStrategy};
use crate::marker::MarkerView;

/// Moves each marker up until it clears every marker placed before it.
///
/// Markers are processed lowest on screen first, so a marker only ever moves
/// upward past markers that are already fixed. After each move the scan
/// restarts from the first fixed marker, since the new position may overlap
/// one that was already checked. Worst case is cubic in the marker count,
/// which the visible-marker ceiling keeps bounded.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisplaceStacker;

impl StackingStrategy for DisplaceStacker {
    fn name(&self) -> &'static str {
        "displace"
    }

    fn resolve(&self, markers: &mut [&mut MarkerView], context: &StackingContext) {
        if markers.is_empty() {
            return;
        }
        prepare(markers, context);

        let mut displacements = 0usize;
        for i in 0..markers.len() {
            let (fixed, rest) = markers.split_at_mut(i);
            let marker = &mut rest[0];

            let original_y = marker.frame.y;
            let mut frame = marker.frame;
            let mut alternate = marker.alternate_frame;
            let mut level = 0;

            let mut j = 0;
            while j < fixed.len() {
                let other = &fixed[j];
                if !collides(&frame, alternate.as_ref(), other) {
                    j += 1;
                    continue;
                }

                let y = other.display_frame().y - frame.height - context.gap;
                frame.y = y;
                if let Some(alternate) = alternate.as_mut() {
                    alternate.y = y;
                }
                level = other.vertical_level + 1;
                displacements += 1;
                j = 0;
            }

            let offset = frame.y - original_y;
            marker.stack_offset = offset;
            marker.alternate_frame = alternate.map(|alt| alt.offset(0.0, -offset));
            marker.vertical_level = level;
        }
        log::trace!("Stacked {} markers with {} displacements", markers.len(), displacements);
    }
}
