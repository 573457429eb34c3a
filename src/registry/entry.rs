//! Room entry and snapshot types
//!
//! This module defines the per-room state stored in the registry.

use std::collections::HashSet;
use std::time::{Duration, Instant};

/// Entry for a single room in the registry
pub(super) struct RoomEntry {
    /// Broadcaster that created the room
    pub broadcaster_id: String,

    /// Attached viewers; set semantics make repeated joins no-ops
    pub viewers: HashSet<String>,

    /// When the room was created
    pub created_at: Instant,

    /// Highest viewer count seen
    pub peak_viewers: usize,

    /// Viewer joins that changed the set
    pub total_joins: u64,
}

impl RoomEntry {
    /// Create a new room entry
    pub(super) fn new(broadcaster_id: String) -> Self {
        Self {
            broadcaster_id,
            viewers: HashSet::new(),
            created_at: Instant::now(),
            peak_viewers: 0,
            total_joins: 0,
        }
    }

    /// Add a viewer, returning the new count
    pub(super) fn add_viewer(&mut self, viewer_id: &str) -> usize {
        if self.viewers.insert(viewer_id.to_string()) {
            self.total_joins += 1;
            self.peak_viewers = self.peak_viewers.max(self.viewers.len());
        }
        self.viewers.len()
    }

    /// Remove a viewer, returning the new count
    pub(super) fn remove_viewer(&mut self, viewer_id: &str) -> usize {
        self.viewers.remove(viewer_id);
        self.viewers.len()
    }

    /// Copy the entry out for a caller
    pub(super) fn snapshot(&self, stream_id: &str) -> StreamRoom {
        StreamRoom {
            stream_id: stream_id.to_string(),
            broadcaster_id: self.broadcaster_id.clone(),
            viewers: self.viewers.clone(),
            created_at: self.created_at,
        }
    }

    pub(super) fn stats(&self) -> RoomStats {
        RoomStats {
            viewer_count: self.viewers.len(),
            peak_viewers: self.peak_viewers,
            total_joins: self.total_joins,
            uptime: self.created_at.elapsed(),
        }
    }
}

/// Point-in-time copy of a live broadcast room
///
/// The registry keeps the authoritative state; this copy does not follow
/// later changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRoom {
    /// Unique broadcast identifier
    pub stream_id: String,
    /// Broadcasting user
    pub broadcaster_id: String,
    /// Viewers attached when the snapshot was taken
    pub viewers: HashSet<String>,
    /// When the room was created
    pub created_at: Instant,
}

impl StreamRoom {
    /// Number of viewers in this snapshot
    pub fn viewer_count(&self) -> usize {
        self.viewers.len()
    }
}

/// Statistics for a room
#[derive(Debug, Clone)]
pub struct RoomStats {
    /// Current viewers
    pub viewer_count: usize,
    /// Highest concurrent viewers
    pub peak_viewers: usize,
    /// Distinct joins over the room's lifetime
    pub total_joins: u64,
    /// Time since creation
    pub uptime: Duration,
}
