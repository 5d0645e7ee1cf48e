//! Analysis Pipeline Progress
//!
//! Domain types for tracking a batch analysis run through the backend
//! pipeline. The stage sequence is fixed for the lifetime of a run; the
//! backend reports transitions by stage name and this module maps them onto
//! per-stage statuses.
//!
//! # Design
//!
//! A `RunProgress` is a small state machine:
//! - created with stage 0 active and everything else pending
//! - advanced by `progress` records (prior stages done, named stage active)
//! - finalized by a `result` record (all done + outcome attached) or stopped
//!   at an error stage
//!
//! Exactly one stage is active or in error at any time unless the run has
//! fully completed.

// =============================================================================
// Stage Table
// =============================================================================

/// Ordered stage names of the backend analysis pipeline.
///
/// The order is total and fixed; a stage's index never changes while a run
/// is in flight.
pub const STAGE_NAMES: [&str; 9] = [
    "Fundamentals",
    "Competence",
    "Agents",
    "Debate",
    "Adversarial",
    "Verdict",
    "Gating",
    "Persisting",
    "Complete",
];

/// Number of stages in the pipeline.
#[must_use]
pub const fn stage_count() -> usize {
    STAGE_NAMES.len()
}

/// Resolve a stage name to its fixed index.
///
/// Unknown stage names resolve to index 0 rather than erroring, so a newer
/// backend reporting a stage this client does not know about degrades the
/// display instead of aborting the run.
#[must_use]
pub fn stage_index(name: &str) -> usize {
    STAGE_NAMES.iter().position(|s| *s == name).unwrap_or(0)
}

// =============================================================================
// Per-Stage Status
// =============================================================================

/// Status of a single pipeline stage within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    /// Stage has not been reached yet.
    Pending,
    /// Stage is currently executing.
    Active,
    /// Stage completed.
    Done,
    /// Stage failed; the run stopped here.
    Error,
}

/// Position of the current target within a multi-target batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPosition {
    /// Zero-based index of the target being processed.
    pub index: usize,
    /// Total number of targets in the batch.
    pub total: usize,
}

// =============================================================================
// Terminal Outcome
// =============================================================================

/// Recommendation label attached to a completed analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recommendation {
    /// Buy recommendation.
    Buy,
    /// Hold recommendation.
    Hold,
    /// Sell recommendation.
    Sell,
}

impl Recommendation {
    /// Parse a recommendation from its wire label.
    ///
    /// Unrecognized labels resolve to `Hold`, the neutral outcome.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label.to_lowercase().as_str() {
            "buy" => Self::Buy,
            "sell" => Self::Sell,
            _ => Self::Hold,
        }
    }

    /// Wire label for this recommendation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Hold => "hold",
            Self::Sell => "sell",
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured result attached to a run once every stage has completed.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    /// Recommendation label.
    pub recommendation: Recommendation,
    /// Confidence score reported by the backend (0.0 - 1.0).
    pub confidence: f64,
    /// Supporting signals backing the recommendation.
    pub signals: Vec<String>,
}

// =============================================================================
// Run Progress
// =============================================================================

/// Progress of one batch analysis run through the pipeline.
///
/// There is at most one of these per process; Shared State replaces it
/// wholesale when a new run starts.
#[derive(Debug, Clone, PartialEq)]
pub struct RunProgress {
    /// Identifier of the target currently being analyzed.
    pub ticker: String,
    /// Per-stage status, one entry per stage in [`STAGE_NAMES`].
    pub steps: Vec<StageStatus>,
    /// Index of the current stage.
    pub current: usize,
    /// Position within a multi-target batch, when reported.
    pub batch: Option<BatchPosition>,
    /// Terminal result, present once the run completed normally.
    pub outcome: Option<AnalysisOutcome>,
    /// Failure message, present once the run stopped at an error stage.
    pub error: Option<String>,
}

impl RunProgress {
    /// Create progress for a freshly started run: stage 0 active, the rest
    /// pending.
    #[must_use]
    pub fn new(ticker: impl Into<String>) -> Self {
        let mut steps = vec![StageStatus::Pending; stage_count()];
        steps[0] = StageStatus::Active;
        Self {
            ticker: ticker.into(),
            steps,
            current: 0,
            batch: None,
            outcome: None,
            error: None,
        }
    }

    /// Advance to the given stage index: every prior stage is done, the
    /// named stage is active, later stages are pending.
    ///
    /// Indices past the end of the table are clamped to the final stage.
    pub fn advance_to(&mut self, index: usize) {
        let index = index.min(stage_count() - 1);
        for (i, step) in self.steps.iter_mut().enumerate() {
            *step = match i.cmp(&index) {
                std::cmp::Ordering::Less => StageStatus::Done,
                std::cmp::Ordering::Equal => StageStatus::Active,
                std::cmp::Ordering::Greater => StageStatus::Pending,
            };
        }
        self.current = index;
    }

    /// Finalize the run: every stage done, outcome attached.
    pub fn complete(&mut self, outcome: AnalysisOutcome) {
        for step in &mut self.steps {
            *step = StageStatus::Done;
        }
        self.current = stage_count() - 1;
        self.outcome = Some(outcome);
        self.error = None;
    }

    /// Stop the run at its current stage with a failure message.
    pub fn fail_current(&mut self, message: impl Into<String>) {
        self.steps[self.current] = StageStatus::Error;
        self.error = Some(message.into());
    }

    /// Reject the run before any stage completed: stage 0 is marked failed
    /// and the rest of the sequence is short-circuited back to pending.
    pub fn reject(&mut self, message: impl Into<String>) {
        for step in &mut self.steps {
            *step = StageStatus::Pending;
        }
        self.steps[0] = StageStatus::Error;
        self.current = 0;
        self.outcome = None;
        self.error = Some(message.into());
    }

    /// Whether the run reached a terminal state (completed or failed).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.outcome.is_some() || self.error.is_some()
    }

    /// Index of the active stage, if the run is still in flight.
    #[must_use]
    pub fn active_stage(&self) -> Option<usize> {
        self.steps.iter().position(|s| *s == StageStatus::Active)
    }
}
