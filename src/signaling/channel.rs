//! Signaling channel
//!
//! One logical connection to the relay. Opening it sends `auth` and `join`
//! before anything else; incoming frames are decoded by a dispatch task and
//! delivered in arrival order through a [`Subscription`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Error, Result, TransportError};

use super::message::SignalingMessage;
use super::transport::{Connector, TransportEvent};

/// Identity supplied by the session component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Opaque bearer token
    pub token: String,
    /// Local user identifier
    pub user_id: String,
}

impl Credentials {
    pub fn new(token: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            user_id: user_id.into(),
        }
    }
}

/// Channel configuration
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Capacity of the decoded event queue
    pub event_capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            event_capacity: 256,
        }
    }
}

impl ChannelConfig {
    /// Set the decoded event queue capacity
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}

/// Channel lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Not opened yet
    Idle,
    /// Transport established, `auth` and `join` sent
    Open,
    /// Closed locally; terminal
    Closed,
}

/// Event delivered to the subscriber
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Decoded message from the relay
    Message(SignalingMessage),
    /// Transport failed; no further events follow
    Error(TransportError),
    /// Relay closed the connection; no further events follow
    Closed,
}

/// Ordered stream of incoming events
///
/// Finite: ends after a terminal event or once the channel is closed.
pub struct Subscription {
    rx: mpsc::Receiver<ChannelEvent>,
    closed: Arc<AtomicBool>,
}

impl Subscription {
    /// Wait for the next event
    ///
    /// Returns `None` once the channel was closed locally, even if events
    /// were still queued.
    pub async fn next(&mut self) -> Option<ChannelEvent> {
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        let event = self.rx.recv().await?;
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        Some(event)
    }
}

/// Connection to the signaling relay
pub struct SignalingChannel {
    config: ChannelConfig,
    state: ChannelState,
    outbound: Option<mpsc::UnboundedSender<String>>,
    dispatch: Option<JoinHandle<()>>,
    pump: Option<JoinHandle<()>>,
    closed: Arc<AtomicBool>,
}

impl SignalingChannel {
    /// Create an unopened channel
    pub fn new() -> Self {
        Self::with_config(ChannelConfig::default())
    }

    /// Create an unopened channel with custom configuration
    pub fn with_config(config: ChannelConfig) -> Self {
        Self {
            config,
            state: ChannelState::Idle,
            outbound: None,
            dispatch: None,
            pump: None,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Check if the channel is open
    pub fn is_open(&self) -> bool {
        self.state == ChannelState::Open
    }

    /// Connect and announce ourselves
    ///
    /// `auth{token}` and `join{userId, contextId}` are queued as the first two
    /// outbound frames before this returns. Frames the relay delivers before
    /// that point wait in the subscription.
    pub async fn open<C: Connector>(
        &mut self,
        connector: &C,
        credentials: &Credentials,
        context_id: &str,
    ) -> Result<Subscription> {
        if self.state != ChannelState::Idle {
            return Err(TransportError::AlreadyConnected.into());
        }

        let transport = connector.connect().await.map_err(|e| {
            tracing::error!(context = context_id, error = %e, "Signaling connect failed");
            e
        })?;
        let (outbound, inbound, pump) = transport.into_parts();

        self.outbound = Some(outbound);
        self.pump = pump;
        self.state = ChannelState::Open;

        self.send(&SignalingMessage::auth(credentials.token.as_str()));
        self.send(&SignalingMessage::join(
            credentials.user_id.as_str(),
            context_id,
        ));

        let (tx, rx) = mpsc::channel(self.config.event_capacity);
        self.dispatch = Some(tokio::spawn(dispatch(inbound, tx)));

        tracing::info!(
            context = context_id,
            user = %credentials.user_id,
            "Signaling channel open"
        );

        Ok(Subscription {
            rx,
            closed: Arc::clone(&self.closed),
        })
    }

    /// Queue a message for the relay
    ///
    /// Never fails loudly: when the channel is not open the message is
    /// dropped. Returns whether it was queued.
    pub fn send(&self, message: &SignalingMessage) -> bool {
        match self.try_send(message) {
            Ok(()) => {
                tracing::trace!(kind = message.kind(), "Message queued");
                true
            }
            Err(Error::Message(e)) => {
                tracing::warn!(kind = message.kind(), error = %e, "Cannot encode message");
                false
            }
            Err(e) => {
                tracing::debug!(kind = message.kind(), error = %e, "Message dropped");
                false
            }
        }
    }

    /// Queue a message, reporting why it could not be
    pub fn try_send(&self, message: &SignalingMessage) -> Result<()> {
        let outbound = match self.outbound.as_ref() {
            Some(outbound) if self.is_open() => outbound,
            _ => return Err(TransportError::NotOpen.into()),
        };

        let frame = message.encode()?;
        outbound
            .send(frame)
            .map_err(|_| TransportError::Io("transport gone".into()))?;
        Ok(())
    }

    /// Release the transport and stop delivering events
    ///
    /// Safe to call any number of times.
    pub fn close(&mut self) {
        if self.state == ChannelState::Closed {
            return;
        }
        let was_open = self.state == ChannelState::Open;

        self.state = ChannelState::Closed;
        self.closed.store(true, Ordering::Release);

        // Dropping the sender lets the pump flush queued frames and close the socket
        self.outbound.take();
        // Detached, not aborted: the pump exits on its own once flushed
        self.pump.take();
        if let Some(dispatch) = self.dispatch.take() {
            dispatch.abort();
        }

        if was_open {
            tracing::info!("Signaling channel closed");
        }
    }
}

impl Default for SignalingChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SignalingChannel {
    fn drop(&mut self) {
        self.close();
    }
}

/// Decode transport frames into channel events
async fn dispatch(mut inbound: mpsc::Receiver<TransportEvent>, events: mpsc::Sender<ChannelEvent>) {
    while let Some(event) = inbound.recv().await {
        let event = match event {
            TransportEvent::Frame(frame) => match SignalingMessage::decode(&frame) {
                Ok(message) => {
                    tracing::trace!(kind = message.kind(), "Message received");
                    ChannelEvent::Message(message)
                }
                Err(e) => {
                    tracing::warn!(error = %e, len = frame.len(), "Dropping malformed signaling frame");
                    continue;
                }
            },
            TransportEvent::Error(e) => {
                let _ = events.send(ChannelEvent::Error(e)).await;
                return;
            }
            TransportEvent::Closed => {
                let _ = events.send(ChannelEvent::Closed).await;
                return;
            }
        };

        if events.send(event).await.is_err() {
            return;
        }
    }

    // Transport dropped its side without saying goodbye
    let _ = events.send(ChannelEvent::Closed).await;
}
