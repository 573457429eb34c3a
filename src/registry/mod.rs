//! Live broadcast room registry
//!
//! The registry is the authoritative record of which viewers are attached
//! to which broadcast. It is constructed explicitly and shared through an
//! `Arc`; the broadcast lifecycle component creates and closes rooms, while
//! viewer connections join and leave.
//!
//! # Architecture
//!
//! ```text
//!                         Arc<RoomRegistry>
//!                   ┌───────────────────────────┐
//!                   │ rooms: RwLock<HashMap<    │
//!                   │   stream_id,              │
//!                   │   Arc<RwLock<RoomEntry {  │
//!                   │     broadcaster_id,       │
//!                   │     viewers: HashSet,     │
//!                   │   }>>                     │
//!                   │ >>                        │
//!                   └─────────────┬─────────────┘
//!                                 │
//!       ┌─────────────────────────┼─────────────────────────┐
//!       ▼                         ▼                         ▼
//!  [Broadcast start/stop]    [Viewer join]            [Viewer leave]
//!  create_room/close_room    add_viewer()             remove_viewer()
//!  (map write lock)          (map read + room lock)   (map read + room lock)
//! ```
//!
//! Viewer counts and call participants are unrelated: a call never touches
//! the registry.

pub mod entry;
pub mod store;

pub use entry::{RoomStats, StreamRoom};
pub use store::RoomRegistry;
