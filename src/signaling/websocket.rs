//! WebSocket transport
//!
//! Each connection is driven by one pump task that multiplexes the
//! outgoing frame queue and the socket's incoming stream.

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::error::TransportError;

use super::transport::{Connector, Transport, TransportEvent};

/// Default capacity of the incoming event queue
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Connects to a relay over `ws://` or `wss://`
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
    event_capacity: usize,
}

impl WebSocketConnector {
    /// Create a connector for the given relay URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    /// Set the incoming event queue capacity
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Relay URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Connector for WebSocketConnector {
    async fn connect(&self) -> Result<Transport, TransportError> {
        let (ws, _response) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        tracing::debug!(url = %self.url, "Signaling socket connected");

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::channel(self.event_capacity);
        let pump = tokio::spawn(pump(ws, out_rx, in_tx));

        Ok(Transport::new(out_tx, in_rx).with_pump(pump))
    }
}

/// Drive a WebSocket until either side goes away
///
/// Dropping the outbound sender closes the socket gracefully after the
/// frames already queued have been written.
pub(crate) async fn pump<S>(
    ws: WebSocketStream<S>,
    mut outbound: mpsc::UnboundedReceiver<String>,
    inbound: mpsc::Sender<TransportEvent>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut sink, mut stream) = ws.split();

    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(text) => {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        tracing::error!(error = %e, "Signaling send failed");
                        let _ = inbound.send(TransportEvent::Error(e.into())).await;
                        break;
                    }
                }
                None => {
                    let _ = sink.close().await;
                    break;
                }
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if inbound.send(TransportEvent::Frame(text)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                    Ok(text) => {
                        if inbound.send(TransportEvent::Frame(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(_) => tracing::warn!("Dropping non UTF-8 binary frame"),
                },
                Some(Ok(Message::Close(_))) | None => {
                    let _ = inbound.send(TransportEvent::Closed).await;
                    break;
                }
                // ping/pong are answered by tungstenite
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::error!(error = %e, "Signaling socket failed");
                    let _ = inbound.send(TransportEvent::Error(e.into())).await;
                    break;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    use crate::signaling::message::SignalingMessage;

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let connector = WebSocketConnector::new(format!("ws://{}", addr));
        assert!(matches!(
            connector.connect().await,
            Err(TransportError::Connect(_))
        ));
    }

    #[tokio::test]
    async fn test_frames_round_trip_through_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Relay that echoes the first text frame back, then closes
        let relay = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            while let Some(Ok(msg)) = ws.next().await {
                if let Message::Text(text) = msg {
                    ws.send(Message::Text(text)).await.unwrap();
                    ws.close(None).await.unwrap();
                    break;
                }
            }
        });

        let connector = WebSocketConnector::new(format!("ws://{}", addr)).event_capacity(4);
        let (outbound, mut inbound, pump) = connector.connect().await.unwrap().into_parts();
        assert!(pump.is_some());

        let frame = SignalingMessage::auth("token-1").encode().unwrap();
        outbound.send(frame.clone()).unwrap();

        assert_eq!(inbound.recv().await, Some(TransportEvent::Frame(frame)));
        assert_eq!(inbound.recv().await, Some(TransportEvent::Closed));

        relay.await.unwrap();
    }
}
