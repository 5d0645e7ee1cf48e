//! Live Quote Types
//!
//! Domain types for the price-feed subscription: the connection state
//! machine and the per-identifier price snapshot.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// A symbol string identifying one analysis target.
pub type Symbol = String;

// =============================================================================
// Connection State
// =============================================================================

/// Current state of the live quote link.
///
/// Transitions: `Disconnected -> Connecting -> Connected`, then on drop
/// `Connected -> Reconnecting -> Connecting -> ...`. A reconnect never jumps
/// straight back to `Connected`; `Connected -> Disconnected` only happens on
/// deliberate shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not connected and not trying to be.
    #[default]
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// Connected and receiving snapshots.
    Connected,
    /// Connection dropped; waiting out the backoff before the next attempt.
    Reconnecting,
}

impl ConnectionState {
    /// Check if the link is live.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if the link is between attempts (connecting or backing off).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Connecting | Self::Reconnecting)
    }
}

// =============================================================================
// Price Snapshot
// =============================================================================

/// Point-in-time price record for one identifier.
///
/// Snapshots are merged into the shared mapping latest-write-wins; they are
/// never removed by the streaming core itself.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSnapshot {
    /// Last traded price.
    pub price: Decimal,
    /// Absolute change since the previous session close.
    pub change: Decimal,
    /// Percentage change since the previous session close.
    pub change_percent: Decimal,
    /// Local time this snapshot was received.
    pub updated_at: DateTime<Utc>,
}

impl PriceSnapshot {
    /// Create a snapshot stamped with the current time.
    #[must_use]
    pub fn new(price: Decimal, change: Decimal, change_percent: Decimal) -> Self {
        Self {
            price,
            change,
            change_percent,
            updated_at: Utc::now(),
        }
    }

    /// Check if the snapshot is older than the given threshold.
    #[must_use]
    pub fn is_stale(&self, max_age: Duration) -> bool {
        let age = Utc::now().signed_duration_since(self.updated_at);
        age > chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX)
    }
}
