//! Media engine capability
//!
//! The coordinator never touches codecs or sockets; it asks a
//! [`MediaEngine`] for local descriptions and hands it whatever the peer
//! sends. Two variants exist, picked when the coordinator is built: a real
//! engine supplied by the application, or [`SimulatedMedia`], which reports
//! remote media as soon as the call is accepted.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::MediaError;
use crate::signaling::IceCandidate;

use super::state::CallKind;

/// Local media track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

/// Offer or answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpType {
    Offer,
    Answer,
}

/// Session description exchanged during negotiation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Notification raised by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEvent {
    /// Locally gathered candidate to send to the peer
    LocalCandidate(IceCandidate),
    /// A remote track became available
    RemoteTrack(TrackKind),
}

/// Capability interface over the media transport
pub trait MediaEngine: Send {
    /// Acquire microphone (and camera for video calls)
    fn acquire(&mut self, kind: CallKind) -> impl Future<Output = Result<(), MediaError>> + Send;

    /// Create an offer and install it as the local description
    ///
    /// Resolves with the SDP once the local description is ready.
    fn create_offer(&mut self) -> impl Future<Output = Result<String, MediaError>> + Send;

    /// Create an answer to the applied remote offer and install it locally
    fn create_answer(&mut self) -> impl Future<Output = Result<String, MediaError>> + Send;

    /// Apply the peer's description
    fn set_remote_description(
        &mut self,
        description: SessionDescription,
    ) -> impl Future<Output = Result<(), MediaError>> + Send;

    /// Apply a candidate received from the peer
    fn add_ice_candidate(
        &mut self,
        candidate: IceCandidate,
    ) -> impl Future<Output = Result<(), MediaError>> + Send;

    /// Enable or disable a local track
    fn set_track_enabled(&mut self, track: TrackKind, enabled: bool);

    /// Both sides agreed to talk
    ///
    /// Engines that learn about remote media on their own ignore this.
    fn on_call_accepted(&mut self) {}

    /// Take the event receiver; `None` after the first call
    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<MediaEvent>>;

    /// Stop all local tracks
    fn stop_tracks(&mut self) -> Result<(), MediaError>;

    /// Close the peer session
    fn close(&mut self) -> Result<(), MediaError>;
}

/// Placeholder engine for builds without a media transport
///
/// Produces syntactically plausible SDP, accepts any candidate and reports
/// the remote audio (and video) track once the call is accepted, optionally
/// after a delay.
pub struct SimulatedMedia {
    connect_delay: Duration,
    events_tx: mpsc::UnboundedSender<MediaEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<MediaEvent>>,
    kind: Option<CallKind>,
    audio_enabled: bool,
    video_enabled: bool,
    remote: Option<SessionDescription>,
    session_id: u64,
    pending_connect: Option<JoinHandle<()>>,
    closed: bool,
}

impl SimulatedMedia {
    /// Report remote media immediately on acceptance
    pub fn new() -> Self {
        Self::with_connect_delay(Duration::ZERO)
    }

    /// Report remote media `delay` after acceptance
    pub fn with_connect_delay(delay: Duration) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let session_id = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        Self {
            connect_delay: delay,
            events_tx,
            events_rx: Some(events_rx),
            kind: None,
            audio_enabled: false,
            video_enabled: false,
            remote: None,
            session_id,
            pending_connect: None,
            closed: false,
        }
    }

    /// Whether a local track is currently enabled
    pub fn is_track_enabled(&self, track: TrackKind) -> bool {
        match track {
            TrackKind::Audio => self.audio_enabled,
            TrackKind::Video => self.video_enabled,
        }
    }

    /// Remote description applied so far
    pub fn remote_description(&self) -> Option<&SessionDescription> {
        self.remote.as_ref()
    }

    fn local_sdp(&self, kind: CallKind) -> String {
        let mut sdp = format!(
            "v=0\r\no=- {} 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n\
             m=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=rtpmap:111 opus/48000/2\r\n",
            self.session_id
        );
        if kind.has_video() {
            sdp.push_str("m=video 9 UDP/TLS/RTP/SAVPF 96\r\na=rtpmap:96 VP8/90000\r\n");
        }
        sdp
    }

    fn acquired_kind(&self) -> Result<CallKind, MediaError> {
        if self.closed {
            return Err(MediaError::InvalidState("session closed"));
        }
        self.kind
            .ok_or(MediaError::InvalidState("local media not acquired"))
    }
}

impl Default for SimulatedMedia {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaEngine for SimulatedMedia {
    async fn acquire(&mut self, kind: CallKind) -> Result<(), MediaError> {
        if self.closed {
            return Err(MediaError::InvalidState("session closed"));
        }
        self.kind = Some(kind);
        self.audio_enabled = true;
        self.video_enabled = kind.has_video();
        Ok(())
    }

    async fn create_offer(&mut self) -> Result<String, MediaError> {
        let kind = self.acquired_kind()?;
        Ok(self.local_sdp(kind))
    }

    async fn create_answer(&mut self) -> Result<String, MediaError> {
        let kind = self.acquired_kind()?;
        match self.remote {
            Some(SessionDescription {
                sdp_type: SdpType::Offer,
                ..
            }) => Ok(self.local_sdp(kind)),
            _ => Err(MediaError::InvalidState("no remote offer")),
        }
    }

    async fn set_remote_description(
        &mut self,
        description: SessionDescription,
    ) -> Result<(), MediaError> {
        if self.closed {
            return Err(MediaError::InvalidState("session closed"));
        }
        if !description.sdp.starts_with("v=0") {
            return Err(MediaError::InvalidDescription(
                "missing protocol version line".into(),
            ));
        }
        self.remote = Some(description);
        Ok(())
    }

    async fn add_ice_candidate(&mut self, candidate: IceCandidate) -> Result<(), MediaError> {
        if self.closed {
            return Err(MediaError::InvalidState("session closed"));
        }
        if self.remote.is_none() {
            return Err(MediaError::Candidate("no remote description".into()));
        }
        tracing::trace!(candidate = %candidate.candidate, "Simulated candidate applied");
        Ok(())
    }

    fn set_track_enabled(&mut self, track: TrackKind, enabled: bool) {
        match track {
            TrackKind::Audio => self.audio_enabled = enabled,
            TrackKind::Video => self.video_enabled = enabled && self.kind == Some(CallKind::Video),
        }
    }

    fn on_call_accepted(&mut self) {
        let Some(kind) = self.kind else {
            return;
        };
        if self.closed || self.pending_connect.is_some() {
            return;
        }

        let mut tracks = vec![TrackKind::Audio];
        if kind.has_video() {
            tracks.push(TrackKind::Video);
        }

        if self.connect_delay.is_zero() {
            for track in tracks {
                let _ = self.events_tx.send(MediaEvent::RemoteTrack(track));
            }
            return;
        }

        let tx = self.events_tx.clone();
        let delay = self.connect_delay;
        self.pending_connect = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            for track in tracks {
                let _ = tx.send(MediaEvent::RemoteTrack(track));
            }
        }));
    }

    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<MediaEvent>> {
        self.events_rx.take()
    }

    fn stop_tracks(&mut self) -> Result<(), MediaError> {
        self.audio_enabled = false;
        self.video_enabled = false;
        Ok(())
    }

    fn close(&mut self) -> Result<(), MediaError> {
        if let Some(pending) = self.pending_connect.take() {
            pending.abort();
        }
        self.closed = true;
        Ok(())
    }
}
