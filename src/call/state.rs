//! Call state machine
//!
//! `idle → calling → ringing → connected → ended`. `ended` is reachable from
//! every state and is terminal; every transition below is a no-op once there.

use std::fmt;
use std::time::{Duration, Instant};

use crate::error::TransportError;

/// Call lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    /// Set up, nothing sent yet
    Idle,
    /// Offer sent, waiting for the callee to pick up
    Calling,
    /// Accepted (caller) or incoming offer received (callee)
    Ringing,
    /// Remote media available
    Connected,
    /// Terminated
    Ended,
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallStatus::Idle => "idle",
            CallStatus::Calling => "calling",
            CallStatus::Ringing => "ringing",
            CallStatus::Connected => "connected",
            CallStatus::Ended => "ended",
        };
        f.write_str(name)
    }
}

/// Audio-only or audio+video
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Audio,
    Video,
}

impl CallKind {
    /// Whether a camera track is part of the call
    pub fn has_video(&self) -> bool {
        *self == CallKind::Video
    }
}

/// Which side initiated the call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallRole {
    Caller,
    Callee,
}

/// Why a call ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// Local user hung up
    LocalHangup,
    /// Local user declined an incoming call
    Declined,
    /// Remote side sent `call-rejected`
    Rejected,
    /// Signaling transport could not open or failed
    Transport(TransportError),
    /// Relay closed the signaling connection
    ChannelClosed,
    /// Offer/answer/ICE or media acquisition failed
    Negotiation(String),
    /// Nobody picked up within the ring timeout
    Timeout,
}

impl EndReason {
    /// Whether this side decided to end the call
    ///
    /// The peer only learns about these ends if it is told.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            EndReason::LocalHangup
                | EndReason::Declined
                | EndReason::Negotiation(_)
                | EndReason::Timeout
        )
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::LocalHangup => write!(f, "hung up"),
            EndReason::Declined => write!(f, "declined"),
            EndReason::Rejected => write!(f, "rejected by peer"),
            EndReason::Transport(e) => write!(f, "signaling failed: {}", e),
            EndReason::ChannelClosed => write!(f, "signaling closed by relay"),
            EndReason::Negotiation(msg) => write!(f, "negotiation failed: {}", msg),
            EndReason::Timeout => write!(f, "no answer"),
        }
    }
}

/// State of one call attempt
#[derive(Debug, Clone)]
pub struct Call {
    /// Audio or video
    pub kind: CallKind,

    /// Caller or callee
    pub role: CallRole,

    /// Current status
    pub status: CallStatus,

    /// Both sides agreed to talk
    pub accepted: bool,

    /// Microphone disabled locally
    pub local_muted: bool,

    /// Camera disabled locally
    pub local_video_off: bool,

    /// Remote user (learned from the offer on the callee side)
    pub peer_user_id: Option<String>,

    /// Resource the call is scoped to
    pub context_id: String,

    /// Set once, when the call ends
    pub end_reason: Option<EndReason>,

    /// When the call was set up
    pub created_at: Instant,

    /// When remote media became available
    pub connected_at: Option<Instant>,
}

impl Call {
    /// Create a call in `idle`
    pub fn new(
        kind: CallKind,
        role: CallRole,
        context_id: impl Into<String>,
        peer_user_id: Option<String>,
    ) -> Self {
        Self {
            kind,
            role,
            status: CallStatus::Idle,
            accepted: false,
            local_muted: false,
            local_video_off: false,
            peer_user_id,
            context_id: context_id.into(),
            end_reason: None,
            created_at: Instant::now(),
            connected_at: None,
        }
    }

    /// Caller sent its offer
    pub fn start_calling(&mut self) -> bool {
        if self.status == CallStatus::Idle && self.role == CallRole::Caller {
            self.status = CallStatus::Calling;
            return true;
        }
        false
    }

    /// Callee received an offer from `from`
    pub fn on_incoming_offer(&mut self, from: &str) -> bool {
        if self.status == CallStatus::Idle && self.role == CallRole::Callee {
            self.peer_user_id = Some(from.to_string());
            self.status = CallStatus::Ringing;
            return true;
        }
        false
    }

    /// Remote side picked up
    pub fn on_accepted(&mut self) -> bool {
        if self.status == CallStatus::Calling {
            self.status = CallStatus::Ringing;
            self.accepted = true;
            return true;
        }
        false
    }

    /// Callee picked up a ringing call
    pub fn accept(&mut self) -> bool {
        if self.role == CallRole::Callee && self.status == CallStatus::Ringing && !self.accepted {
            self.accepted = true;
            return true;
        }
        false
    }

    /// First remote track available
    pub fn on_remote_track(&mut self) -> bool {
        match self.status {
            CallStatus::Calling | CallStatus::Ringing => {
                self.status = CallStatus::Connected;
                self.connected_at = Some(Instant::now());
                true
            }
            _ => false,
        }
    }

    /// Terminate the call; only the first reason sticks
    pub fn end(&mut self, reason: EndReason) -> bool {
        if self.status == CallStatus::Ended {
            return false;
        }
        self.status = CallStatus::Ended;
        self.end_reason = Some(reason);
        true
    }

    /// Flip the local mute flag, returning the new value
    pub fn toggle_mute(&mut self) -> bool {
        if !self.is_ended() {
            self.local_muted = !self.local_muted;
        }
        self.local_muted
    }

    /// Flip the local camera flag, returning the new value
    pub fn toggle_video(&mut self) -> bool {
        if !self.is_ended() {
            self.local_video_off = !self.local_video_off;
        }
        self.local_video_off
    }

    /// Check if the call has ended
    pub fn is_ended(&self) -> bool {
        self.status == CallStatus::Ended
    }

    /// Time spent connected so far
    pub fn talk_time(&self) -> Option<Duration> {
        self.connected_at.map(|t| t.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller() -> Call {
        Call::new(CallKind::Video, CallRole::Caller, "post-9", Some("u2".into()))
    }

    #[test]
    fn test_caller_lifecycle() {
        let mut call = caller();
        assert_eq!(call.status, CallStatus::Idle);

        assert!(call.start_calling());
        assert_eq!(call.status, CallStatus::Calling);

        assert!(call.on_accepted());
        assert_eq!(call.status, CallStatus::Ringing);

        assert!(call.on_remote_track());
        assert_eq!(call.status, CallStatus::Connected);
        assert!(call.connected_at.is_some());

        assert!(call.end(EndReason::LocalHangup));
        assert_eq!(call.status, CallStatus::Ended);
        assert_eq!(call.end_reason, Some(EndReason::LocalHangup));
    }

    #[test]
    fn test_connect_straight_from_calling() {
        let mut call = caller();
        call.start_calling();

        assert!(call.on_remote_track());
        assert_eq!(call.status, CallStatus::Connected);
    }

    #[test]
    fn test_ended_is_terminal() {
        let mut call = caller();
        call.start_calling();
        call.end(EndReason::Rejected);

        assert!(!call.on_accepted());
        assert!(!call.on_remote_track());
        assert!(!call.start_calling());
        assert!(!call.end(EndReason::Timeout));

        assert_eq!(call.status, CallStatus::Ended);
        assert_eq!(call.end_reason, Some(EndReason::Rejected));
    }

    #[test]
    fn test_end_from_idle() {
        let mut call = caller();
        assert!(call.end(EndReason::Transport(TransportError::Connect("refused".into()))));
        assert!(call.is_ended());
    }

    #[test]
    fn test_accept_requires_calling() {
        let mut call = caller();
        assert!(!call.on_accepted());
        assert_eq!(call.status, CallStatus::Idle);
    }

    #[test]
    fn test_callee_offer() {
        let mut call = Call::new(CallKind::Audio, CallRole::Callee, "post-9", None);

        assert!(!call.start_calling());
        assert!(call.on_incoming_offer("u1"));
        assert_eq!(call.status, CallStatus::Ringing);
        assert_eq!(call.peer_user_id.as_deref(), Some("u1"));

        // Second offer does not restart the call
        assert!(!call.on_incoming_offer("u3"));
        assert_eq!(call.peer_user_id.as_deref(), Some("u1"));
    }

    #[test]
    fn test_callee_accept() {
        let mut call = Call::new(CallKind::Audio, CallRole::Callee, "post-9", None);
        assert!(!call.accept());

        call.on_incoming_offer("u1");
        assert!(call.accept());
        assert!(call.accepted);
        assert!(!call.accept());
        assert_eq!(call.status, CallStatus::Ringing);

        // The caller never accepts locally
        let mut call = caller();
        call.start_calling();
        assert!(!call.accept());
        assert!(call.on_accepted());
        assert!(call.accepted);
    }

    #[test]
    fn test_local_end_reasons() {
        assert!(EndReason::LocalHangup.is_local());
        assert!(EndReason::Declined.is_local());
        assert!(EndReason::Timeout.is_local());
        assert!(EndReason::Negotiation("bad sdp".into()).is_local());
        assert!(!EndReason::Rejected.is_local());
        assert!(!EndReason::ChannelClosed.is_local());
        assert!(!EndReason::Transport(TransportError::Io("reset".into())).is_local());
    }

    #[test]
    fn test_toggles_leave_status_alone() {
        let mut call = caller();
        call.start_calling();

        assert!(call.toggle_mute());
        assert!(call.toggle_video());
        assert_eq!(call.status, CallStatus::Calling);

        assert!(!call.toggle_mute());
        assert!(!call.toggle_video());
        assert_eq!(call.status, CallStatus::Calling);
    }

    #[test]
    fn test_toggles_after_end_are_ignored() {
        let mut call = caller();
        call.end(EndReason::LocalHangup);

        assert!(!call.toggle_mute());
        assert!(!call.local_muted);
    }

    #[test]
    fn test_display() {
        assert_eq!(CallStatus::Ringing.to_string(), "ringing");
        assert_eq!(EndReason::Timeout.to_string(), "no answer");
    }
}
