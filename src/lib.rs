//! Peer call signaling and live-broadcast room registry
//!
//! Two independent subsystems share one crate:
//!
//! - [`call`]: a per-call coordinator that negotiates a 1:1 audio or video
//!   session over a [`signaling`] channel (auth, join, offer/answer, ICE).
//! - [`registry`]: a shared table of live broadcast rooms and the viewers
//!   attached to each one.
//!
//! The media transport itself is not part of this crate. The coordinator
//! drives it through the [`call::MediaEngine`] capability trait, and
//! [`call::SimulatedMedia`] stands in where no engine is available.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use callroom::RoomRegistry;
//!
//! # async fn example() {
//! let registry = Arc::new(RoomRegistry::new());
//!
//! registry.create_room("stream-1", "broadcaster").await;
//! let viewers = registry.add_viewer("stream-1", "viewer-7").await;
//! assert_eq!(viewers, 1);
//!
//! registry.close_room("stream-1").await;
//! # }
//! ```

pub mod call;
pub mod error;
pub mod registry;
pub mod signaling;

pub use call::{CallConfig, CallCoordinator, CallHandle, CallOutcome, CallStatus, EndReason};
pub use error::{Error, Result};
pub use registry::{RoomRegistry, StreamRoom};
pub use signaling::{Credentials, SignalingChannel, SignalingMessage, WebSocketConnector};
