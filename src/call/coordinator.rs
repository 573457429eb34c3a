//! Call coordinator
//!
//! Drives one 1:1 call through the signaling channel. The coordinator runs
//! as a single task; the application talks to it through a [`CallHandle`]
//! and observes it through `watch` snapshots of [`Call`].
//!
//! Every await on the signaling connector or the media engine is raced
//! against hang-up, signaling failure and the ring deadline, so ending a
//! call drops whatever negotiation step was in flight. Other traffic that
//! shows up during a step is queued and handled, in order, once it is done.
//!
//! # Example
//! ```no_run
//! use callroom::call::{CallConfig, CallCoordinator, SimulatedMedia};
//! use callroom::signaling::{Credentials, WebSocketConnector};
//!
//! # async fn example() {
//! let connector = WebSocketConnector::new("wss://relay.example.com/signal");
//! let credentials = Credentials::new("bearer-token", "u1");
//!
//! let (coordinator, mut handle) = CallCoordinator::outgoing(
//!     CallConfig::audio(),
//!     connector,
//!     SimulatedMedia::new(),
//!     credentials,
//!     "u2",
//!     "post-9",
//! );
//! let task = tokio::spawn(coordinator.run());
//!
//! let call = handle.wait_for(|c| c.is_ended()).await;
//! println!("call ended: {:?}", call.end_reason);
//! # let _ = task.await;
//! # }
//! ```

use std::collections::VecDeque;
use std::future::Future;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::error::Error;
use crate::signaling::{
    ChannelConfig, ChannelEvent, Connector, Credentials, Route, SignalingChannel,
    SignalingMessage, Subscription,
};

use super::config::CallConfig;
use super::media::{MediaEngine, MediaEvent, SessionDescription, TrackKind};
use super::state::{Call, CallRole, CallStatus, EndReason};

/// Control request from the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallCommand {
    /// Pick up an incoming call
    Accept,
    /// Flip local microphone enablement
    ToggleMute,
    /// Flip local camera enablement
    ToggleVideo,
    /// End the call
    HangUp,
    /// Decline an incoming call
    Reject,
}

/// How the call finished
#[derive(Debug, Clone)]
pub struct CallOutcome {
    pub reason: EndReason,
    /// Final snapshot, status `ended`
    pub call: Call,
}

/// Application side of a running call
#[derive(Debug, Clone)]
pub struct CallHandle {
    commands: mpsc::UnboundedSender<CallCommand>,
    state: watch::Receiver<Call>,
}

impl CallHandle {
    /// Pick up an incoming call once it is ringing
    pub fn accept(&self) -> bool {
        self.commands.send(CallCommand::Accept).is_ok()
    }

    /// Flip local mute; never affects call status or signaling
    pub fn toggle_mute(&self) -> bool {
        self.commands.send(CallCommand::ToggleMute).is_ok()
    }

    /// Flip local camera; never affects call status or signaling
    pub fn toggle_video(&self) -> bool {
        self.commands.send(CallCommand::ToggleVideo).is_ok()
    }

    /// Hang up
    pub fn hang_up(&self) -> bool {
        self.commands.send(CallCommand::HangUp).is_ok()
    }

    /// Decline an incoming call (hang up once accepted, or for the caller)
    pub fn reject(&self) -> bool {
        self.commands.send(CallCommand::Reject).is_ok()
    }

    /// Latest snapshot
    pub fn snapshot(&self) -> Call {
        self.state.borrow().clone()
    }

    /// Current status
    pub fn status(&self) -> CallStatus {
        self.state.borrow().status
    }

    /// Receiver notified on every published change
    pub fn subscribe(&self) -> watch::Receiver<Call> {
        self.state.clone()
    }

    /// Wait until a snapshot satisfies `predicate`
    ///
    /// Returns the last snapshot if the coordinator goes away first.
    pub async fn wait_for<F>(&mut self, mut predicate: F) -> Call
    where
        F: FnMut(&Call) -> bool,
    {
        if let Ok(call) = self.state.wait_for(|call| predicate(call)).await {
            return call.clone();
        }
        self.state.borrow().clone()
    }
}

/// Something the coordinator reacts to
#[derive(Debug)]
enum Input {
    Command(CallCommand),
    Channel(ChannelEvent),
    Media(MediaEvent),
    RingTimeout,
}

/// Every source a call listens to, merged into one stream
struct Inputs {
    subscription: Option<Subscription>,
    media_events: Option<mpsc::UnboundedReceiver<MediaEvent>>,
    commands: mpsc::UnboundedReceiver<CallCommand>,
    commands_open: bool,
    ring_deadline: Option<Instant>,
    /// Received while a negotiation step was running
    backlog: VecDeque<Input>,
}

impl Inputs {
    fn new(commands: mpsc::UnboundedReceiver<CallCommand>) -> Self {
        Self {
            subscription: None,
            media_events: None,
            commands,
            commands_open: true,
            ring_deadline: None,
            backlog: VecDeque::new(),
        }
    }

    /// Next input to handle
    ///
    /// Commands already sent go first, so a hang-up never waits behind
    /// queued signaling traffic.
    async fn next(&mut self) -> Input {
        if self.commands_open {
            match self.commands.try_recv() {
                Ok(command) => return Input::Command(command),
                Err(TryRecvError::Disconnected) => self.commands_open = false,
                Err(TryRecvError::Empty) => {}
            }
        }
        if let Some(input) = self.backlog.pop_front() {
            return input;
        }
        self.wait().await
    }

    /// Wait for a fresh input from any source
    async fn wait(&mut self) -> Input {
        loop {
            tokio::select! {
                biased;
                command = self.commands.recv(), if self.commands_open => match command {
                    Some(command) => return Input::Command(command),
                    // Handles dropped; the call continues until a remote or timeout end
                    None => self.commands_open = false,
                },
                event = next_channel_event(&mut self.subscription) => return Input::Channel(event),
                event = next_media_event(&mut self.media_events) => match event {
                    Some(event) => return Input::Media(event),
                    None => self.media_events = None,
                },
                _ = sleep_until_deadline(self.ring_deadline) => {
                    self.ring_deadline = None;
                    return Input::RingTimeout;
                }
            }
        }
    }
}

/// State machine for one call
pub struct CallCoordinator<C, M> {
    config: CallConfig,
    connector: C,
    media: M,
    credentials: Credentials,
    call: Call,
    channel: SignalingChannel,
    inputs: Inputs,
    state_tx: watch::Sender<Call>,
}

impl<C: Connector, M: MediaEngine> CallCoordinator<C, M> {
    /// Set up an outgoing call to `peer_user_id`
    pub fn outgoing(
        config: CallConfig,
        connector: C,
        media: M,
        credentials: Credentials,
        peer_user_id: impl Into<String>,
        context_id: impl Into<String>,
    ) -> (Self, CallHandle) {
        let call = Call::new(
            config.kind,
            CallRole::Caller,
            context_id,
            Some(peer_user_id.into()),
        );
        Self::build(config, connector, media, credentials, call)
    }

    /// Set up the callee side, waiting for an offer in `context_id`
    ///
    /// With `expected_peer` set, offers from anyone else are ignored. The
    /// call rings until the application accepts or rejects it.
    pub fn incoming(
        config: CallConfig,
        connector: C,
        media: M,
        credentials: Credentials,
        context_id: impl Into<String>,
        expected_peer: Option<String>,
    ) -> (Self, CallHandle) {
        let call = Call::new(config.kind, CallRole::Callee, context_id, expected_peer);
        Self::build(config, connector, media, credentials, call)
    }

    fn build(
        config: CallConfig,
        connector: C,
        media: M,
        credentials: Credentials,
        call: Call,
    ) -> (Self, CallHandle) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(call.clone());
        let channel = SignalingChannel::with_config(
            ChannelConfig::default().event_capacity(config.event_capacity),
        );

        let coordinator = Self {
            config,
            connector,
            media,
            credentials,
            call,
            channel,
            inputs: Inputs::new(command_rx),
            state_tx,
        };
        let handle = CallHandle {
            commands: command_tx,
            state: state_rx,
        };

        (coordinator, handle)
    }

    /// Run the call to completion
    ///
    /// Publishes `ended` as soon as a terminal condition is seen, then
    /// releases media and signaling.
    pub async fn run(mut self) -> CallOutcome {
        let reason = self.drive().await;

        if reason.is_local() {
            self.send_end_to_peer();
        }
        if self.call.end(reason.clone()) {
            self.publish();
        }
        tracing::info!(
            context = %self.call.context_id,
            peer = ?self.call.peer_user_id,
            reason = %reason,
            "Call ended"
        );

        self.teardown();

        CallOutcome {
            reason,
            call: self.call.clone(),
        }
    }

    async fn drive(&mut self) -> EndReason {
        self.inputs.media_events = self.media.take_events();
        if self.call.role == CallRole::Caller {
            self.inputs.ring_deadline = Some(Instant::now() + self.config.ring_timeout);
        }

        if let Err(reason) = self.setup().await {
            return reason;
        }

        loop {
            let input = self.inputs.next().await;
            if let Some(reason) = self.on_input(input).await {
                return reason;
            }
        }
    }

    /// Open signaling, acquire local media and, for the caller, send the offer
    async fn setup(&mut self) -> Result<(), EndReason> {
        let opened = race(
            &mut self.inputs,
            &self.call,
            &self.credentials.user_id,
            self.channel
                .open(&self.connector, &self.credentials, &self.call.context_id),
        )
        .await;
        let subscription = match opened {
            Ok(Ok(subscription)) => subscription,
            Ok(Err(Error::Transport(e))) => return Err(EndReason::Transport(e)),
            Ok(Err(e)) => return Err(EndReason::Negotiation(e.to_string())),
            Err(input) => return Err(self.interrupted(input)),
        };
        self.inputs.subscription = Some(subscription);

        let kind = self.config.kind;
        let acquired = race(
            &mut self.inputs,
            &self.call,
            &self.credentials.user_id,
            self.media.acquire(kind),
        )
        .await;
        match acquired {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(context = %self.call.context_id, error = %e, "Media acquisition failed");
                return Err(EndReason::Negotiation(e.to_string()));
            }
            Err(input) => return Err(self.interrupted(input)),
        }

        if self.call.role == CallRole::Caller {
            self.send_offer().await?;
        }
        Ok(())
    }

    async fn send_offer(&mut self) -> Result<(), EndReason> {
        let Some(route) = self.route_to_peer() else {
            return Err(EndReason::Negotiation("no peer to call".into()));
        };

        let offer = race(
            &mut self.inputs,
            &self.call,
            &self.credentials.user_id,
            self.media.create_offer(),
        )
        .await;
        let sdp = match offer {
            Ok(Ok(sdp)) => sdp,
            Ok(Err(e)) => {
                tracing::warn!(context = %self.call.context_id, error = %e, "Cannot create offer");
                return Err(EndReason::Negotiation(e.to_string()));
            }
            Err(input) => return Err(self.interrupted(input)),
        };
        self.channel.send(&SignalingMessage::offer(sdp, route));

        if self.call.start_calling() {
            self.publish();
        }
        tracing::info!(
            context = %self.call.context_id,
            peer = ?self.call.peer_user_id,
            "Offer sent"
        );
        Ok(())
    }

    async fn on_input(&mut self, input: Input) -> Option<EndReason> {
        match input {
            Input::Channel(ChannelEvent::Message(message)) => self.on_message(message).await,
            other => self.on_event(other),
        }
    }

    /// Inputs handled without waiting on the media engine
    fn on_event(&mut self, input: Input) -> Option<EndReason> {
        match input {
            Input::Command(command) => self.on_command(command),
            Input::Media(event) => self.on_media_event(event),
            Input::Channel(ChannelEvent::Message(message)) => {
                let rejected = matches!(message, SignalingMessage::CallRejected { .. });
                if rejected && self.is_for_this_call(&message) {
                    self.on_rejected()
                } else {
                    None
                }
            }
            Input::Channel(ChannelEvent::Error(e)) => {
                tracing::error!(context = %self.call.context_id, error = %e, "Signaling failed");
                Some(EndReason::Transport(e))
            }
            Input::Channel(ChannelEvent::Closed) => Some(EndReason::ChannelClosed),
            Input::RingTimeout => {
                tracing::info!(context = %self.call.context_id, "No answer before ring timeout");
                Some(EndReason::Timeout)
            }
        }
    }

    /// End reason for an input that cut a negotiation step short
    fn interrupted(&mut self, input: Input) -> EndReason {
        tracing::debug!(context = %self.call.context_id, input = ?input, "Negotiation step cancelled");
        self.on_event(input)
            .unwrap_or_else(|| EndReason::Negotiation("negotiation step cancelled".into()))
    }

    async fn on_message(&mut self, message: SignalingMessage) -> Option<EndReason> {
        if !self.is_for_this_call(&message) {
            tracing::debug!(kind = message.kind(), "Ignoring message for another call");
            return None;
        }

        match message {
            SignalingMessage::Offer { sdp, from, .. } => self.on_offer(sdp, from).await,
            SignalingMessage::Answer { sdp, .. } => {
                if self.call.role != CallRole::Caller {
                    tracing::debug!("Ignoring answer on callee side");
                    return None;
                }
                let applied = race(
                    &mut self.inputs,
                    &self.call,
                    &self.credentials.user_id,
                    self.media
                        .set_remote_description(SessionDescription::answer(sdp)),
                )
                .await;
                match applied {
                    Ok(Ok(())) => {
                        tracing::debug!(context = %self.call.context_id, "Remote answer applied");
                        None
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(context = %self.call.context_id, error = %e, "Bad answer");
                        Some(EndReason::Negotiation(e.to_string()))
                    }
                    Err(input) => Some(self.interrupted(input)),
                }
            }
            SignalingMessage::IceCandidate { candidate, .. } => {
                let applied = race(
                    &mut self.inputs,
                    &self.call,
                    &self.credentials.user_id,
                    self.media.add_ice_candidate(candidate),
                )
                .await;
                match applied {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => {
                        tracing::warn!(context = %self.call.context_id, error = %e, "Cannot apply remote candidate");
                        Some(EndReason::Negotiation(e.to_string()))
                    }
                    Err(input) => Some(self.interrupted(input)),
                }
            }
            SignalingMessage::CallAccepted { .. } => {
                if self.call.on_accepted() {
                    tracing::info!(context = %self.call.context_id, "Call accepted");
                    self.inputs.ring_deadline = None;
                    self.publish();
                    self.media.on_call_accepted();
                }
                None
            }
            SignalingMessage::CallRejected { .. } => self.on_rejected(),
            SignalingMessage::Auth { .. } | SignalingMessage::Join { .. } => {
                tracing::debug!("Ignoring relay control message");
                None
            }
        }
    }

    /// Callee side: ring, apply the offer and answer it
    async fn on_offer(&mut self, sdp: String, from: String) -> Option<EndReason> {
        if !self.call.on_incoming_offer(&from) {
            tracing::debug!(from = %from, status = %self.call.status, "Ignoring unexpected offer");
            return None;
        }
        tracing::info!(context = %self.call.context_id, from = %from, "Incoming call");
        self.publish();

        let applied = race(
            &mut self.inputs,
            &self.call,
            &self.credentials.user_id,
            self.media
                .set_remote_description(SessionDescription::offer(sdp)),
        )
        .await;
        match applied {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(context = %self.call.context_id, error = %e, "Bad offer");
                return Some(EndReason::Negotiation(e.to_string()));
            }
            Err(input) => return Some(self.interrupted(input)),
        }

        let answer = race(
            &mut self.inputs,
            &self.call,
            &self.credentials.user_id,
            self.media.create_answer(),
        )
        .await;
        let answer = match answer {
            Ok(Ok(answer)) => answer,
            Ok(Err(e)) => {
                tracing::warn!(context = %self.call.context_id, error = %e, "Cannot create answer");
                return Some(EndReason::Negotiation(e.to_string()));
            }
            Err(input) => return Some(self.interrupted(input)),
        };

        let route = self.route_to_peer()?;
        self.channel.send(&SignalingMessage::answer(answer, route));
        None
    }

    fn on_rejected(&self) -> Option<EndReason> {
        tracing::info!(context = %self.call.context_id, "Call rejected by peer");
        Some(EndReason::Rejected)
    }

    fn on_media_event(&mut self, event: MediaEvent) -> Option<EndReason> {
        match event {
            MediaEvent::LocalCandidate(candidate) => match self.route_to_peer() {
                Some(route) => {
                    self.channel
                        .send(&SignalingMessage::ice_candidate(candidate, route));
                }
                None => tracing::debug!("Local candidate before peer is known, dropped"),
            },
            MediaEvent::RemoteTrack(track) => {
                if self.call.on_remote_track() {
                    tracing::info!(context = %self.call.context_id, track = ?track, "Call connected");
                    self.inputs.ring_deadline = None;
                    self.publish();
                }
            }
        }
        None
    }

    fn on_command(&mut self, command: CallCommand) -> Option<EndReason> {
        match command {
            CallCommand::Accept => {
                if !self.call.accept() {
                    tracing::debug!(status = %self.call.status, "Nothing to accept");
                    return None;
                }
                if let Some(route) = self.route_to_peer() {
                    self.channel.send(&SignalingMessage::call_accepted(route));
                }
                tracing::info!(context = %self.call.context_id, "Call picked up");
                self.publish();
                self.media.on_call_accepted();
                None
            }
            CallCommand::ToggleMute => {
                let muted = self.call.toggle_mute();
                self.media.set_track_enabled(TrackKind::Audio, !muted);
                self.publish();
                None
            }
            CallCommand::ToggleVideo => {
                let off = self.call.toggle_video();
                self.media.set_track_enabled(TrackKind::Video, !off);
                self.publish();
                None
            }
            CallCommand::HangUp => Some(EndReason::LocalHangup),
            CallCommand::Reject => {
                if self.call.role == CallRole::Callee && !self.call.accepted {
                    Some(EndReason::Declined)
                } else {
                    Some(EndReason::LocalHangup)
                }
            }
        }
    }

    /// Tell the peer the call is over
    ///
    /// `call-rejected` is the only end signal on the wire. Nothing is sent
    /// while the call is still `idle`, since the peer has not heard of it.
    fn send_end_to_peer(&self) {
        if self.call.status == CallStatus::Idle {
            return;
        }
        if let Some(route) = self.route_to_peer() {
            self.channel.send(&SignalingMessage::call_rejected(route));
        }
    }

    /// Release media and signaling; every step runs even if an earlier one fails
    fn teardown(&mut self) {
        if let Err(e) = self.media.stop_tracks() {
            tracing::warn!(context = %self.call.context_id, error = %e, "Failed to stop local tracks");
        }
        if let Err(e) = self.media.close() {
            tracing::warn!(context = %self.call.context_id, error = %e, "Failed to close media session");
        }
        self.channel.close();
    }

    fn is_for_this_call(&self, message: &SignalingMessage) -> bool {
        routed_to_call(&self.call, &self.credentials.user_id, message)
    }

    fn route_to_peer(&self) -> Option<Route> {
        let peer = self.call.peer_user_id.as_ref()?;
        Some(Route::new(
            peer.as_str(),
            self.credentials.user_id.as_str(),
            self.call.context_id.as_str(),
        ))
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.call.clone());
    }
}

impl<C, M> CallCoordinator<C, M>
where
    C: Connector + 'static,
    M: MediaEngine + 'static,
{
    /// Run the call on its own task
    pub fn spawn(self) -> tokio::task::JoinHandle<CallOutcome> {
        tokio::spawn(self.run())
    }
}

/// Run one negotiation step while still listening
///
/// An input that ends the call is handed back and the step future is
/// dropped, cancelling it. Anything else is queued for after the step.
async fn race<F: Future>(
    inputs: &mut Inputs,
    call: &Call,
    user_id: &str,
    step: F,
) -> Result<F::Output, Input> {
    tokio::pin!(step);
    loop {
        tokio::select! {
            biased;
            input = inputs.wait() => {
                if ends_call(&input, call, user_id) {
                    return Err(input);
                }
                inputs.backlog.push_back(input);
            }
            output = &mut step => return Ok(output),
        }
    }
}

fn ends_call(input: &Input, call: &Call, user_id: &str) -> bool {
    match input {
        Input::Command(command) => matches!(command, CallCommand::HangUp | CallCommand::Reject),
        Input::Channel(ChannelEvent::Message(message)) => {
            matches!(message, SignalingMessage::CallRejected { .. })
                && routed_to_call(call, user_id, message)
        }
        Input::Channel(_) | Input::RingTimeout => true,
        Input::Media(_) => false,
    }
}

/// Check a message's routing against this call
///
/// Fields the message leaves out match anything; a sender only has to
/// match once the peer is known.
fn routed_to_call(call: &Call, user_id: &str, message: &SignalingMessage) -> bool {
    let Some(route) = message.route() else {
        return true;
    };

    if route.to.is_some_and(|to| to != user_id) {
        return false;
    }
    if route.context_id.is_some_and(|ctx| ctx != call.context_id) {
        return false;
    }
    match (&call.peer_user_id, route.from) {
        (Some(peer), Some(from)) => peer == from,
        _ => true,
    }
}

async fn next_channel_event(subscription: &mut Option<Subscription>) -> ChannelEvent {
    match subscription {
        Some(subscription) => subscription.next().await.unwrap_or(ChannelEvent::Closed),
        None => std::future::pending().await,
    }
}

async fn next_media_event(
    events: &mut Option<mpsc::UnboundedReceiver<MediaEvent>>,
) -> Option<MediaEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
