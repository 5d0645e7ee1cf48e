//! Application layer - Shared state and port definitions.

/// Port interfaces implemented by infrastructure adapters.
pub mod ports;

/// Process-wide progress/price state container.
pub mod state;
