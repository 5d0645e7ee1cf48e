// Allow unwrap/expect in tests - tests should panic on unexpected errors
// Allow test-specific patterns and pedantic lints in test code
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Stream Core - Real-Time Streaming Client
//!
//! The streaming client core of the advisor dashboard: everything that
//! talks to the analysis backend over long-lived connections and keeps the
//! in-process view of "what is the current run doing" and "what is the
//! latest price for X" current.
//!
//! # Layers (inside -> outside)
//!
//! - **Domain**: Pure types and state machines
//!   - `pipeline`: Analysis stages, per-run progress, outcomes
//!   - `quotes`: Price snapshots, connection state
//!
//! - **Application**: Shared state and port definitions
//!   - `state`: The single dependency-injected progress/price container
//!   - `ports`: Transport contracts the infrastructure implements
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `progress`: Streamed-HTTP progress consumer and event-line framing
//!   - `quotes`: WebSocket quote synchronizer, backoff, snapshot parsing
//!   - `config`: Environment-driven settings
//!
//! # Data Flow
//!
//! ```text
//! analysis endpoint ──► ProgressStreamClient ──► SharedState ◄── views
//!                                                    ▲
//! price feed WS ──────► QuoteSynchronizer ───────────┘
//!                              │
//!                              └──► broadcast fan-out (per-identifier)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core types with no I/O dependencies.
pub mod domain;

/// Application layer - Shared state and port definitions.
pub mod application;

/// Infrastructure layer - Transport adapters and configuration.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::pipeline::{
    AnalysisOutcome, BatchPosition, Recommendation, RunProgress, STAGE_NAMES, StageStatus,
    stage_count, stage_index,
};
pub use domain::quotes::{ConnectionState, PriceSnapshot, Symbol};

// Application surface
pub use application::ports::{QuoteSocket, QuoteSyncError, QuoteTransport};
pub use application::state::{RunUpdate, SharedState};

// Infrastructure adapters
pub use infrastructure::config::{CoreSettings, ProgressStreamSettings, QuoteSyncSettings};
pub use infrastructure::progress::codec::{EVENT_PREFIX, LineDecoder, StreamEvent};
pub use infrastructure::progress::{ProgressStreamClient, ProgressStreamError};
pub use infrastructure::quotes::reconnect::{BackoffConfig, BackoffPolicy};
pub use infrastructure::quotes::transport::WebSocketQuoteTransport;
pub use infrastructure::quotes::{QuoteSynchronizer, QuoteUpdate};
