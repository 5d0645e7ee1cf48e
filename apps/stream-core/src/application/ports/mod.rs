//! Port Interfaces
//!
//! Contracts between the streaming components and their transports,
//! following the Hexagonal Architecture pattern. The production adapters
//! live under `infrastructure`; tests substitute scripted implementations.

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by the live quote link.
#[derive(Debug, Error)]
pub enum QuoteSyncError {
    /// Connection attempt failed.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        /// Error details.
        message: String,
    },

    /// Connection dropped after being established.
    #[error("connection closed: {reason}")]
    ConnectionClosed {
        /// Close reason.
        reason: String,
    },

    /// Outbound message could not be sent.
    #[error("failed to send message: {message}")]
    SendFailed {
        /// Error details.
        message: String,
    },

    /// Inbound snapshot payload could not be parsed.
    #[error("failed to parse snapshot: {message}")]
    ParseError {
        /// Error details.
        message: String,
    },
}

/// One established duplex connection to the price feed.
///
/// Implementations own the underlying socket; dropping the value releases
/// it. Control frames (ping/pong) are handled internally — `next_message`
/// only ever yields application payloads.
#[async_trait]
pub trait QuoteSocket: Send {
    /// Await the next inbound text payload.
    ///
    /// Returns `None` once the server closed the stream, `Some(Err(_))` on a
    /// transport failure.
    async fn next_message(&mut self) -> Option<Result<String, QuoteSyncError>>;

    /// Send a text payload to the server.
    async fn send(&mut self, payload: String) -> Result<(), QuoteSyncError>;

    /// Close the connection, best effort.
    async fn close(&mut self);
}

/// Factory for quote-feed connections.
///
/// The synchronizer calls `connect` on every attempt, including reconnects;
/// implementations must not cache a live socket.
#[async_trait]
pub trait QuoteTransport: Send + Sync {
    /// Open a new connection to the price feed.
    async fn connect(&self) -> Result<Box<dyn QuoteSocket>, QuoteSyncError>;
}
