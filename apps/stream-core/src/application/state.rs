//! Shared Progress/Price State
//!
//! The single source of truth for "what is the current run doing" and "what
//! is the latest price for X". Created once at process start and handed to
//! both streaming components; everything downstream reads through the
//! accessors.
//!
//! # Ownership
//!
//! The state has exactly two writers with disjoint slots:
//! - the progress stream consumer mutates the run slot through
//!   [`SharedState::apply_run_update`]
//! - the quote synchronizer mutates the price mapping through
//!   [`SharedState::merge_quotes`]
//!
//! Each slot is guarded by its own lock, so the two writers never contend
//! with each other. No business logic lives here beyond merge semantics.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::domain::pipeline::{AnalysisOutcome, BatchPosition, RunProgress};
use crate::domain::quotes::{PriceSnapshot, Symbol};

// =============================================================================
// Run Mutations
// =============================================================================

/// Every mutation the progress stream consumer may apply to the run slot.
///
/// Enumerating the mutations keeps the consumer's write surface narrow and
/// reviewable; nothing else constructs these.
#[derive(Debug, Clone)]
pub enum RunUpdate {
    /// A new run started; replaces any previous run wholesale.
    Started {
        /// Primary target identifier (first of the batch).
        ticker: String,
        /// Total number of targets queued.
        total: usize,
    },
    /// The backend reported a stage transition.
    Progress {
        /// Target the stage transition applies to.
        ticker: String,
        /// Fixed index of the reported stage.
        stage_index: usize,
        /// Position within the batch, when reported.
        batch: Option<BatchPosition>,
    },
    /// The run completed normally.
    Completed {
        /// Structured result payload.
        outcome: AnalysisOutcome,
    },
    /// The backend rejected the batch before analysis (data quality).
    Rejected {
        /// Human-readable rejection message.
        message: String,
    },
    /// The stream failed at the current stage.
    Failed {
        /// Human-readable failure message.
        message: String,
    },
    /// The caller cancelled; the run slot resets to idle.
    Cleared,
}

// =============================================================================
// Shared State
// =============================================================================

#[derive(Debug, Default)]
struct StateInner {
    run: RwLock<Option<RunProgress>>,
    quotes: RwLock<HashMap<Symbol, PriceSnapshot>>,
}

/// Cheaply clonable handle to the process-wide progress/price state.
#[derive(Debug, Clone, Default)]
pub struct SharedState {
    inner: Arc<StateInner>,
}

impl SharedState {
    /// Create an empty state container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Run slot (written by the progress stream consumer only)
    // -------------------------------------------------------------------------

    /// Apply one run mutation. The single write entry point for the
    /// progress stream consumer.
    pub fn apply_run_update(&self, update: RunUpdate) {
        let mut run = self.inner.run.write();
        match update {
            RunUpdate::Started { ticker, total } => {
                let mut progress = RunProgress::new(ticker);
                if total > 1 {
                    progress.batch = Some(BatchPosition { index: 0, total });
                }
                *run = Some(progress);
            }
            RunUpdate::Progress {
                ticker,
                stage_index,
                batch,
            } => {
                if let Some(progress) = run.as_mut() {
                    progress.ticker = ticker;
                    progress.advance_to(stage_index);
                    if batch.is_some() {
                        progress.batch = batch;
                    }
                }
            }
            RunUpdate::Completed { outcome } => {
                if let Some(progress) = run.as_mut() {
                    progress.complete(outcome);
                }
            }
            RunUpdate::Rejected { message } => {
                if let Some(progress) = run.as_mut() {
                    progress.reject(message);
                }
            }
            RunUpdate::Failed { message } => {
                if let Some(progress) = run.as_mut() {
                    progress.fail_current(message);
                }
            }
            RunUpdate::Cleared => {
                *run = None;
            }
        }
    }

    /// Snapshot of the current run, if any.
    #[must_use]
    pub fn current_run(&self) -> Option<RunProgress> {
        self.inner.run.read().clone()
    }

    // -------------------------------------------------------------------------
    // Price mapping (written by the quote synchronizer only)
    // -------------------------------------------------------------------------

    /// Merge a snapshot batch into the price mapping, latest write wins per
    /// key. The single write entry point for the quote synchronizer. The
    /// mapping is never replaced wholesale.
    pub fn merge_quotes(&self, batch: &[(Symbol, PriceSnapshot)]) {
        if batch.is_empty() {
            return;
        }
        let mut quotes = self.inner.quotes.write();
        for (symbol, snapshot) in batch {
            quotes.insert(symbol.clone(), snapshot.clone());
        }
    }

    /// Latest snapshot for one identifier.
    #[must_use]
    pub fn quote(&self, symbol: &str) -> Option<PriceSnapshot> {
        self.inner.quotes.read().get(symbol).cloned()
    }

    /// Cloned view of the whole price mapping.
    #[must_use]
    pub fn quotes(&self) -> HashMap<Symbol, PriceSnapshot> {
        self.inner.quotes.read().clone()
    }
}
