//! WebSocket Transport Adapter
//!
//! Production implementation of the quote transport port on top of
//! `tokio-tungstenite`. Control frames are absorbed here so the
//! synchronizer only ever sees application payloads.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::application::ports::{QuoteSocket, QuoteSyncError, QuoteTransport};

/// Quote transport connecting to a WebSocket endpoint.
#[derive(Debug, Clone)]
pub struct WebSocketQuoteTransport {
    url: String,
}

impl WebSocketQuoteTransport {
    /// Create a transport for the given `ws://` or `wss://` URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl QuoteTransport for WebSocketQuoteTransport {
    async fn connect(&self) -> Result<Box<dyn QuoteSocket>, QuoteSyncError> {
        let (stream, _) =
            connect_async(self.url.as_str())
                .await
                .map_err(|e| QuoteSyncError::ConnectionFailed {
                    message: e.to_string(),
                })?;

        Ok(Box::new(WebSocketQuoteSocket { inner: stream }))
    }
}

/// One live WebSocket connection.
struct WebSocketQuoteSocket {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl QuoteSocket for WebSocketQuoteSocket {
    async fn next_message(&mut self) -> Option<Result<String, QuoteSyncError>> {
        loop {
            match self.inner.next().await {
                Some(Ok(Message::Text(text))) => return Some(Ok(text.to_string())),
                Some(Ok(Message::Ping(data))) => {
                    let _ = self.inner.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) => return None,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    return Some(Err(QuoteSyncError::ConnectionClosed {
                        reason: e.to_string(),
                    }));
                }
                None => return None,
            }
        }
    }

    async fn send(&mut self, payload: String) -> Result<(), QuoteSyncError> {
        self.inner
            .send(Message::Text(payload.into()))
            .await
            .map_err(|e| QuoteSyncError::SendFailed {
                message: e.to_string(),
            })
    }

    async fn close(&mut self) {
        let _ = self.inner.close(None).await;
    }
}
