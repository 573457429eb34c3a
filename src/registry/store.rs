//! Room registry implementation
//!
//! The central table of live broadcast rooms and their viewers.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::entry::{RoomEntry, RoomStats, StreamRoom};

/// Registry of all live broadcast rooms
///
/// The outer map lock is only taken for writing when a room is created or
/// closed. Viewer changes hold it for reading and serialize on the room's
/// own lock, so different rooms never wait on each other.
///
/// Unknown stream IDs are not errors: viewer operations on them return 0
/// and never create a room.
pub struct RoomRegistry {
    /// Map of stream ID to room entry
    rooms: RwLock<HashMap<String, Arc<RwLock<RoomEntry>>>>,
}

impl RoomRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Create a room for a starting broadcast
    ///
    /// If the room already exists it is returned unchanged, keeping its
    /// broadcaster and viewers.
    pub async fn create_room(&self, stream_id: &str, broadcaster_id: &str) -> StreamRoom {
        let mut rooms = self.rooms.write().await;

        if let Some(entry_arc) = rooms.get(stream_id) {
            let entry = entry_arc.read().await;
            tracing::debug!(
                stream = stream_id,
                broadcaster = %entry.broadcaster_id,
                viewers = entry.viewers.len(),
                "Room already exists"
            );
            return entry.snapshot(stream_id);
        }

        let entry = RoomEntry::new(broadcaster_id.to_string());
        let room = entry.snapshot(stream_id);
        rooms.insert(stream_id.to_string(), Arc::new(RwLock::new(entry)));

        tracing::info!(
            stream = stream_id,
            broadcaster = broadcaster_id,
            "Room created"
        );

        room
    }

    /// Attach a viewer, returning the room's viewer count
    pub async fn add_viewer(&self, stream_id: &str, viewer_id: &str) -> usize {
        let rooms = self.rooms.read().await;

        let Some(entry_arc) = rooms.get(stream_id) else {
            tracing::debug!(stream = stream_id, viewer = viewer_id, "Join for unknown room");
            return 0;
        };

        let mut entry = entry_arc.write().await;
        let count = entry.add_viewer(viewer_id);

        tracing::debug!(stream = stream_id, viewer = viewer_id, viewers = count, "Viewer added");
        count
    }

    /// Detach a viewer, returning the room's viewer count
    pub async fn remove_viewer(&self, stream_id: &str, viewer_id: &str) -> usize {
        let rooms = self.rooms.read().await;

        let Some(entry_arc) = rooms.get(stream_id) else {
            return 0;
        };

        let mut entry = entry_arc.write().await;
        let count = entry.remove_viewer(viewer_id);

        tracing::debug!(stream = stream_id, viewer = viewer_id, viewers = count, "Viewer removed");
        count
    }

    /// Current viewer count; 0 for an unknown room
    pub async fn viewer_count(&self, stream_id: &str) -> usize {
        let rooms = self.rooms.read().await;

        let count = match rooms.get(stream_id) {
            Some(entry_arc) => entry_arc.read().await.viewers.len(),
            None => 0,
        };
        count
    }

    /// Remove a room; no-op if it does not exist
    pub async fn close_room(&self, stream_id: &str) {
        let removed = self.rooms.write().await.remove(stream_id);

        if let Some(entry_arc) = removed {
            let entry = entry_arc.read().await;
            tracing::info!(
                stream = stream_id,
                viewers = entry.viewers.len(),
                peak = entry.peak_viewers,
                "Room closed"
            );
        }
    }

    /// Check if a room exists
    pub async fn has_room(&self, stream_id: &str) -> bool {
        self.rooms.read().await.contains_key(stream_id)
    }

    /// Snapshot of a room
    pub async fn room(&self, stream_id: &str) -> Option<StreamRoom> {
        let rooms = self.rooms.read().await;
        let entry_arc = rooms.get(stream_id)?;
        let entry = entry_arc.read().await;
        Some(entry.snapshot(stream_id))
    }

    /// Viewer IDs currently attached, sorted
    pub async fn viewers(&self, stream_id: &str) -> Vec<String> {
        let rooms = self.rooms.read().await;

        let Some(entry_arc) = rooms.get(stream_id) else {
            return Vec::new();
        };

        let mut viewers: Vec<String> = entry_arc.read().await.viewers.iter().cloned().collect();
        viewers.sort();
        viewers
    }

    /// Get room statistics
    pub async fn room_stats(&self, stream_id: &str) -> Option<RoomStats> {
        let rooms = self.rooms.read().await;
        let entry_arc = rooms.get(stream_id)?;
        let stats = entry_arc.read().await.stats();
        Some(stats)
    }

    /// Get total number of rooms
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}
