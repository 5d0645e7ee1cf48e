//! Progress Stream Consumer
//!
//! Runs one cancellable streamed request per invocation against the
//! analysis endpoint and translates decoded event records into run-state
//! mutations. At most one run is ever in flight: starting a new run cancels
//! the previous one before the request is issued.
//!
//! Unlike the quote synchronizer, a failed progress stream is never retried
//! automatically — a half-completed multi-target analysis should not
//! silently restart from zero, so retry stays a caller decision.

pub mod codec;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use parking_lot::Mutex;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use self::codec::{LineDecoder, StreamEvent, decode_event_line};
use crate::application::state::{RunUpdate, SharedState};
use crate::domain::pipeline::{
    AnalysisOutcome, BatchPosition, Recommendation, stage_index,
};
use crate::infrastructure::config::ProgressStreamSettings;

/// Progress stream errors.
#[derive(Debug, Error)]
pub enum ProgressStreamError {
    /// `start` was called with no targets.
    #[error("no targets supplied for analysis run")]
    EmptyBatch,

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {message}")]
    ClientBuild {
        /// Error details.
        message: String,
    },

    /// The streamed request could not be issued or was refused.
    #[error("progress request failed: {message}")]
    RequestFailed {
        /// Error details.
        message: String,
    },

    /// The stream dropped mid-run.
    #[error("progress stream failed: {message}")]
    StreamFailed {
        /// Error details.
        message: String,
    },
}

/// Streaming client for batch analysis progress.
///
/// Holds the at-most-one-active-run slot; the run itself executes inside the
/// caller's task and suspends awaiting response chunks.
pub struct ProgressStreamClient {
    http: reqwest::Client,
    settings: ProgressStreamSettings,
    state: SharedState,
    active: Mutex<Option<CancellationToken>>,
}

impl ProgressStreamClient {
    /// Create a new client against the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(
        settings: ProgressStreamSettings,
        state: SharedState,
    ) -> Result<Self, ProgressStreamError> {
        let http = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|e| ProgressStreamError::ClientBuild {
                message: e.to_string(),
            })?;

        Ok(Self {
            http,
            settings,
            state,
            active: Mutex::new(None),
        })
    }

    /// Start a progress run for the given batch of targets.
    ///
    /// Supersedes any run already in flight. Returns once the stream has
    /// fully drained (`Ok`), the caller cancelled (`Ok` — cancellation is
    /// not an error), or the transport failed (`Err`, after the failure has
    /// been recorded in shared state).
    ///
    /// # Errors
    ///
    /// Returns an error for an empty batch or a transport failure.
    pub async fn start(&self, tickers: &[String]) -> Result<(), ProgressStreamError> {
        if tickers.is_empty() {
            return Err(ProgressStreamError::EmptyBatch);
        }

        let token = CancellationToken::new();
        {
            let mut active = self.active.lock();
            if let Some(previous) = active.take() {
                tracing::debug!("Superseding in-flight progress run");
                previous.cancel();
            }
            *active = Some(token.clone());
        }

        self.state.apply_run_update(RunUpdate::Started {
            ticker: tickers[0].clone(),
            total: tickers.len(),
        });

        tracing::info!(targets = tickers.len(), "Starting progress stream");
        self.run_stream(tickers, &token).await
    }

    /// Cancel the in-flight run, if any, and reset the run slot to idle.
    ///
    /// Idempotent: safe to call before any run has started, during a run,
    /// and after one has finished.
    pub fn cancel(&self) {
        let token = self.active.lock().take();
        if let Some(token) = token {
            tracing::debug!("Cancelling progress stream");
            token.cancel();
        }
        self.state.apply_run_update(RunUpdate::Cleared);
    }

    /// Issue the streamed request and drain it.
    async fn run_stream(
        &self,
        tickers: &[String],
        token: &CancellationToken,
    ) -> Result<(), ProgressStreamError> {
        let body = serde_json::json!({ "tickers": tickers });
        let request = self.http.post(&self.settings.endpoint).json(&body).send();

        let response = tokio::select! {
            () = token.cancelled() => return Ok(()),
            result = request => result,
        };

        let response = match response {
            Ok(response) => response,
            Err(e) => return self.fail(token, e.to_string(), RequestPhase::Send),
        };

        if !response.status().is_success() {
            let message = format!("progress endpoint returned {}", response.status());
            return self.fail(token, message, RequestPhase::Send);
        }

        let stream = response.bytes_stream();
        self.drain_events(stream, token).await
    }

    /// Decode and apply event records until the stream ends, fails, or the
    /// run is cancelled.
    async fn drain_events<S, E>(
        &self,
        mut stream: S,
        token: &CancellationToken,
    ) -> Result<(), ProgressStreamError>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: std::fmt::Display,
    {
        let mut decoder = LineDecoder::new();

        loop {
            let chunk = tokio::select! {
                () = token.cancelled() => {
                    tracing::debug!("Progress stream cancelled");
                    return Ok(());
                }
                chunk = stream.next() => chunk,
            };

            match chunk {
                Some(Ok(bytes)) => {
                    for line in decoder.push(&bytes) {
                        // A superseding run may own the state by now.
                        if token.is_cancelled() {
                            return Ok(());
                        }
                        self.handle_line(&line);
                    }
                }
                Some(Err(e)) => {
                    return self.fail(token, e.to_string(), RequestPhase::Read);
                }
                None => {
                    tracing::info!("Progress stream drained");
                    return Ok(());
                }
            }
        }
    }

    /// Apply one complete line to the run state.
    fn handle_line(&self, line: &str) {
        let Some(event) = decode_event_line(line) else {
            return;
        };

        let update = match event {
            StreamEvent::Progress {
                ticker,
                stage,
                ticker_index,
                ticker_total,
            } => {
                let batch = match (ticker_index, ticker_total) {
                    (Some(index), Some(total)) => Some(BatchPosition { index, total }),
                    _ => None,
                };
                RunUpdate::Progress {
                    ticker,
                    stage_index: stage_index(&stage),
                    batch,
                }
            }
            StreamEvent::Result {
                data_quality_error: Some(message),
                ..
            } => {
                tracing::warn!(%message, "Analysis rejected on data quality");
                RunUpdate::Rejected { message }
            }
            StreamEvent::Result {
                recommendation,
                confidence,
                signals,
                ..
            } => RunUpdate::Completed {
                outcome: AnalysisOutcome {
                    recommendation: Recommendation::from_label(
                        recommendation.as_deref().unwrap_or("hold"),
                    ),
                    confidence: confidence.unwrap_or(0.0),
                    signals,
                },
            },
            StreamEvent::Error { message } => {
                tracing::warn!(%message, "Analysis pipeline reported an error");
                RunUpdate::Failed { message }
            }
        };

        self.state.apply_run_update(update);
    }

    /// Record a transport failure, unless the caller cancelled first.
    fn fail(
        &self,
        token: &CancellationToken,
        message: String,
        phase: RequestPhase,
    ) -> Result<(), ProgressStreamError> {
        if token.is_cancelled() {
            return Ok(());
        }

        tracing::warn!(%message, "Progress stream failed");
        self.state.apply_run_update(RunUpdate::Failed {
            message: message.clone(),
        });

        Err(match phase {
            RequestPhase::Send => ProgressStreamError::RequestFailed { message },
            RequestPhase::Read => ProgressStreamError::StreamFailed { message },
        })
    }
}

/// Where in the request lifecycle a transport failure occurred.
#[derive(Debug, Clone, Copy)]
enum RequestPhase {
    /// Issuing the request or validating the response status.
    Send,
    /// Reading the streamed body.
    Read,
}
