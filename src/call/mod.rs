//! 1:1 audio/video calls
//!
//! One [`CallCoordinator`] per call attempt. It owns its signaling channel
//! and media engine, runs as a single task, and tears both down when the
//! call ends. A new call is always a fresh coordinator; nothing reconnects.
//!
//! ```text
//!   caller                         relay                         callee
//!     │ auth, join                   │                   auth, join │
//!     │ offer ──────────────────────►│──────────────────────► offer │  idle → ringing
//!     │  idle → calling              │◄──────────────── answer      │
//!     │                              │                   accept()   │
//!     │◄──────────────────────────── │◄──────────── call-accepted   │
//!     │  calling → ringing           │                              │
//!     │ ice-candidate ◄────────────► │ ◄──────────► ice-candidate   │
//!     │  remote track → connected    │        remote track → connected
//!     │ hang_up()                    │                              │
//!     │ call-rejected ──────────────►│──────────────► call-rejected │  → ended
//! ```
//!
//! `call-rejected` is the only end signal on the wire: a callee declining,
//! and either side hanging up once the peer knows about the call, both
//! send it.

pub mod config;
pub mod coordinator;
pub mod media;
pub mod state;

pub use config::CallConfig;
pub use coordinator::{CallCommand, CallCoordinator, CallHandle, CallOutcome};
pub use media::{MediaEngine, MediaEvent, SdpType, SessionDescription, SimulatedMedia, TrackKind};
pub use state::{Call, CallKind, CallRole, CallStatus, EndReason};
