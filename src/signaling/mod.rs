//! Signaling channel to the relay
//!
//! A single full-duplex connection per client carries every message of a
//! call context. Messages are JSON objects keyed by `type`.
//!
//! ```text
//!   SignalingChannel::open()
//!        │  auth{token}, join{userId, contextId}
//!        ▼
//!   ┌───────────┐  String frames   ┌────────────┐
//!   │ Transport │ ───────────────► │   Relay    │
//!   │ (ws/mem)  │ ◄─────────────── │            │
//!   └─────┬─────┘  TransportEvent  └────────────┘
//!         ▼
//!     dispatch task (decode, drop malformed)
//!         ▼
//!     Subscription::next() ──► ChannelEvent
//! ```

pub mod channel;
pub mod message;
pub mod transport;
pub mod websocket;

pub use channel::{
    ChannelConfig, ChannelEvent, ChannelState, Credentials, SignalingChannel, Subscription,
};
pub use message::{IceCandidate, Route, RouteRef, SignalingMessage};
pub use transport::{memory_pair, Connector, MemoryConnector, MemoryRelay, Transport, TransportEvent};
pub use websocket::WebSocketConnector;
