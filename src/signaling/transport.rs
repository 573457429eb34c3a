//! Frame transports
//!
//! A [`Connector`] establishes one full-duplex connection to the relay and
//! hands back a [`Transport`]: an unbounded sender for outgoing text frames
//! and a bounded receiver of [`TransportEvent`]s. Whatever task pumps the
//! underlying socket lives behind those two channels, so the signaling
//! channel never sees the concrete socket type.

use std::future::Future;
use std::sync::Mutex;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{MessageError, TransportError};

use super::message::SignalingMessage;

/// Event produced by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A complete text frame
    Frame(String),
    /// Terminal transport failure
    Error(TransportError),
    /// Remote side closed the connection
    Closed,
}

/// Connected transport
pub struct Transport {
    outbound: mpsc::UnboundedSender<String>,
    inbound: mpsc::Receiver<TransportEvent>,
    pump: Option<JoinHandle<()>>,
}

impl Transport {
    /// Create a transport from its frame channels
    pub fn new(
        outbound: mpsc::UnboundedSender<String>,
        inbound: mpsc::Receiver<TransportEvent>,
    ) -> Self {
        Self {
            outbound,
            inbound,
            pump: None,
        }
    }

    /// Attach the task driving the underlying socket
    pub fn with_pump(mut self, pump: JoinHandle<()>) -> Self {
        self.pump = Some(pump);
        self
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        mpsc::UnboundedSender<String>,
        mpsc::Receiver<TransportEvent>,
        Option<JoinHandle<()>>,
    ) {
        (self.outbound, self.inbound, self.pump)
    }
}

/// Establishes connections to the relay
pub trait Connector: Send + Sync {
    /// Open a new connection
    fn connect(&self) -> impl Future<Output = Result<Transport, TransportError>> + Send;
}

/// Create an in-process connector and the relay end it talks to
///
/// The connector is single-use: a second `connect` fails with
/// [`TransportError::AlreadyConnected`].
pub fn memory_pair(capacity: usize) -> (MemoryConnector, MemoryRelay) {
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (in_tx, in_rx) = mpsc::channel(capacity.max(1));

    let connector = MemoryConnector {
        transport: Mutex::new(Some(Transport::new(out_tx, in_rx))),
    };
    let relay = MemoryRelay {
        frames: out_rx,
        events: in_tx,
    };

    (connector, relay)
}

/// Connector backed by in-process channels
pub struct MemoryConnector {
    transport: Mutex<Option<Transport>>,
}

impl Connector for MemoryConnector {
    async fn connect(&self) -> Result<Transport, TransportError> {
        let taken = match self.transport.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        taken.ok_or(TransportError::AlreadyConnected)
    }
}

/// Relay side of an in-process connection
///
/// Frames the client sends can be read here, and frames or transport
/// failures can be injected towards the client.
pub struct MemoryRelay {
    frames: mpsc::UnboundedReceiver<String>,
    events: mpsc::Sender<TransportEvent>,
}

impl MemoryRelay {
    /// Next raw frame sent by the client, `None` once the client released the transport
    pub async fn recv_frame(&mut self) -> Option<String> {
        self.frames.recv().await
    }

    /// Next frame sent by the client, decoded
    pub async fn recv_message(&mut self) -> Option<Result<SignalingMessage, MessageError>> {
        let frame = self.frames.recv().await?;
        Some(SignalingMessage::decode(&frame))
    }

    /// Frame already queued by the client, without waiting
    pub fn try_recv_frame(&mut self) -> Option<String> {
        self.frames.try_recv().ok()
    }

    /// Deliver a raw frame to the client
    ///
    /// Returns `false` if the client side is gone.
    pub async fn send_frame(&self, frame: impl Into<String>) -> bool {
        self.events
            .send(TransportEvent::Frame(frame.into()))
            .await
            .is_ok()
    }

    /// Deliver a message to the client
    pub async fn send(&self, message: &SignalingMessage) -> bool {
        match message.encode() {
            Ok(frame) => self.send_frame(frame).await,
            Err(_) => false,
        }
    }

    /// Report a transport failure to the client
    pub async fn fail(&self, error: TransportError) -> bool {
        self.events.send(TransportEvent::Error(error)).await.is_ok()
    }

    /// Close the connection from the relay side
    pub async fn close(&self) -> bool {
        self.events.send(TransportEvent::Closed).await.is_ok()
    }
}
