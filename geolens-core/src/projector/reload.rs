//! Reload Requests
//!
//! A reload asks the projector to bring marker positions up to date. Kinds
//! are ranked by how much has to be recomputed, and a pending request
//! absorbs any lower-ranked one, so a burst of sensor events collapses into
//! the single most expensive reload it needs.

use serde::{Deserialize, Serialize};

/// Reload kinds, cheapest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReloadKind {
    /// Only the heading moved; positions are shifted at render time
    HeadingChanged,
    /// User moved within the reload distance
    UserLocationChanged,
    /// User moved past the reload distance
    ReloadLocationChanged,
    /// The target list was replaced
    AnnotationsChanged,
}

impl ReloadKind {
    /// Distances, azimuths, ordering and visibility must be recomputed
    pub fn is_full_recompute(&self) -> bool {
        *self != ReloadKind::HeadingChanged
    }
}

/// Coalescing slot for the next reload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReloadQueue {
    pending: Option<ReloadKind>,
}

impl ReloadQueue {
    pub fn new() -> Self {
        ReloadQueue::default()
    }

    /// Request a reload; keeps whichever of the pending and new kinds ranks higher
    pub fn request(&mut self, kind: ReloadKind) {
        self.pending = Some(match self.pending {
            Some(pending) => pending.max(kind),
            None => kind,
        });
    }

    pub fn pending(&self) -> Option<ReloadKind> {
        self.pending
    }

    /// Take the pending reload for servicing
    pub fn take(&mut self) -> Option<ReloadKind> {
        self.pending.take()
    }
}
