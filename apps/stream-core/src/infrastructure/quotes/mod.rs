//! Live Quote Synchronizer
//!
//! Maintains a best-effort, always-on subscription to periodic price
//! snapshots. The connection loop runs in a background task for as long as
//! the component is enabled: it reconnects automatically on drop with
//! capped exponential backoff, merges every inbound batch into shared
//! state, and fans each merged entry out on a broadcast channel so
//! independent consumers can react without owning the mapping.
//!
//! Contrast with the progress stream consumer, which never retries: a
//! momentary gap in quotes is expected and invisible beyond the connection
//! status, while a silently restarted analysis run would not be.

pub mod codec;
pub mod reconnect;
pub mod transport;

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use self::codec::parse_snapshot_batch;
use self::reconnect::{BackoffConfig, BackoffPolicy};
use crate::application::ports::{QuoteSocket, QuoteSyncError, QuoteTransport};
use crate::application::state::SharedState;
use crate::domain::quotes::{ConnectionState, PriceSnapshot, Symbol};
use crate::infrastructure::config::QuoteSyncSettings;

/// Channel capacity for fan-out updates.
const UPDATE_CHANNEL_CAPACITY: usize = 1024;

/// One merged snapshot, fanned out per identifier in arrival order.
#[derive(Debug, Clone)]
pub struct QuoteUpdate {
    /// Identifier the snapshot applies to.
    pub symbol: Symbol,
    /// The merged snapshot.
    pub snapshot: PriceSnapshot,
}

/// Subscription change sent to the server while connected.
#[derive(Debug, Clone)]
enum SubscriptionAction {
    Subscribe(Vec<Symbol>),
    Unsubscribe(Vec<Symbol>),
}

impl SubscriptionAction {
    /// Wire payload for this action.
    fn payload(&self) -> String {
        let (action, tickers) = match self {
            Self::Subscribe(tickers) => ("subscribe", tickers),
            Self::Unsubscribe(tickers) => ("unsubscribe", tickers),
        };
        serde_json::json!({ "action": action, "tickers": tickers }).to_string()
    }
}

/// Handle to the running connection loop.
struct ActiveLoop {
    generation: u64,
    token: CancellationToken,
    commands: mpsc::UnboundedSender<SubscriptionAction>,
}

/// Synchronizer for the live price feed.
pub struct QuoteSynchronizer {
    transport: Arc<dyn QuoteTransport>,
    settings: QuoteSyncSettings,
    state: SharedState,
    status: Arc<RwLock<ConnectionState>>,
    subscriptions: Arc<RwLock<HashSet<Symbol>>>,
    update_tx: broadcast::Sender<QuoteUpdate>,
    active: Arc<Mutex<Option<ActiveLoop>>>,
    generation: AtomicU64,
}

impl QuoteSynchronizer {
    /// Create a synchronizer over the given transport.
    #[must_use]
    pub fn new(
        transport: Arc<dyn QuoteTransport>,
        settings: QuoteSyncSettings,
        state: SharedState,
    ) -> Self {
        let (update_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);

        Self {
            transport,
            settings,
            state,
            status: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            subscriptions: Arc::new(RwLock::new(HashSet::new())),
            update_tx,
            active: Arc::new(Mutex::new(None)),
            generation: AtomicU64::new(0),
        }
    }

    /// Start the connection loop in a background task.
    ///
    /// Exactly one loop (and thus one live connection) exists at a time;
    /// calling this while already enabled is a no-op.
    pub fn enable(&self) {
        if !self.settings.enabled {
            tracing::info!("Quote synchronizer disabled by configuration");
            return;
        }

        let mut active = self.active.lock();
        if active.is_some() {
            tracing::debug!("Quote synchronizer already enabled");
            return;
        }

        let token = CancellationToken::new();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;

        *active = Some(ActiveLoop {
            generation,
            token: token.clone(),
            commands: command_tx.clone(),
        });

        let worker = SyncWorker {
            transport: Arc::clone(&self.transport),
            settings: self.settings.clone(),
            state: self.state.clone(),
            status: Arc::clone(&self.status),
            subscriptions: Arc::clone(&self.subscriptions),
            update_tx: self.update_tx.clone(),
            commands: command_rx,
            _command_tx: command_tx,
            token,
        };
        let slot = Arc::clone(&self.active);

        tracing::info!("Enabling quote synchronizer");
        tokio::spawn(async move {
            worker.run(slot, generation).await;
        });
    }

    /// Stop the connection loop and force the status to disconnected.
    ///
    /// Cancels any pending reconnect timer, suppresses the reconnect path,
    /// and closes the live socket; no further connection attempts fire
    /// afterward. Idempotent.
    pub fn disable(&self) {
        let entry = self.active.lock().take();
        if let Some(entry) = entry {
            tracing::info!("Disabling quote synchronizer");
            entry.token.cancel();
        }
        *self.status.write() = ConnectionState::Disconnected;
    }

    /// Add identifiers to the desired subscription set.
    ///
    /// Sent to the server immediately while connected; replayed on every
    /// (re)connect either way.
    pub fn subscribe(&self, symbols: &[Symbol]) {
        {
            let mut subs = self.subscriptions.write();
            for symbol in symbols {
                subs.insert(symbol.clone());
            }
        }
        tracing::debug!(symbols = ?symbols, "Added quote subscriptions");
        self.send_command(SubscriptionAction::Subscribe(symbols.to_vec()));
    }

    /// Remove identifiers from the desired subscription set.
    pub fn unsubscribe(&self, symbols: &[Symbol]) {
        {
            let mut subs = self.subscriptions.write();
            for symbol in symbols {
                subs.remove(symbol);
            }
        }
        tracing::debug!(symbols = ?symbols, "Removed quote subscriptions");
        self.send_command(SubscriptionAction::Unsubscribe(symbols.to_vec()));
    }

    /// Current state of the quote link.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        *self.status.read()
    }

    /// Get a receiver for per-identifier snapshot updates.
    #[must_use]
    pub fn updates(&self) -> broadcast::Receiver<QuoteUpdate> {
        self.update_tx.subscribe()
    }

    /// Current desired subscriptions.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<Symbol> {
        self.subscriptions.read().iter().cloned().collect()
    }

    fn send_command(&self, action: SubscriptionAction) {
        if let Some(entry) = self.active.lock().as_ref() {
            let _ = entry.commands.send(action);
        }
    }
}

// =============================================================================
// Connection Loop
// =============================================================================

/// Why the read phase ended.
#[derive(Debug, PartialEq, Eq)]
enum ReadOutcome {
    /// The component was disabled; do not reconnect.
    Shutdown,
    /// The connection dropped; reconnect with backoff.
    Dropped,
}

/// One wakeup of the read loop.
enum ReadEvent {
    Cancelled,
    Command(Option<SubscriptionAction>),
    Inbound(Option<Result<String, QuoteSyncError>>),
}

/// State owned by the background connection task.
struct SyncWorker {
    transport: Arc<dyn QuoteTransport>,
    settings: QuoteSyncSettings,
    state: SharedState,
    status: Arc<RwLock<ConnectionState>>,
    subscriptions: Arc<RwLock<HashSet<Symbol>>>,
    update_tx: broadcast::Sender<QuoteUpdate>,
    commands: mpsc::UnboundedReceiver<SubscriptionAction>,
    /// Keeps the command channel open so `recv` never yields `None`.
    _command_tx: mpsc::UnboundedSender<SubscriptionAction>,
    token: CancellationToken,
}

impl SyncWorker {
    /// Connection loop: connect, read until drop, back off, repeat.
    async fn run(mut self, slot: Arc<Mutex<Option<ActiveLoop>>>, generation: u64) {
        let mut backoff = BackoffPolicy::new(BackoffConfig::from_settings(&self.settings));

        loop {
            if self.token.is_cancelled() {
                break;
            }

            // A reconnect always passes back through Connecting.
            self.set_status(ConnectionState::Connecting);

            let connected = tokio::select! {
                () = self.token.cancelled() => break,
                result = self.transport.connect() => result,
            };

            match connected {
                Ok(socket) => {
                    self.set_status(ConnectionState::Connected);
                    backoff.reset();
                    tracing::info!("Quote feed connected");

                    if self.read_until_drop(socket).await == ReadOutcome::Shutdown {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Quote feed connection failed");
                }
            }

            if self.token.is_cancelled() {
                break;
            }

            self.set_status(ConnectionState::Reconnecting);
            match backoff.next_delay() {
                Some(delay) => {
                    tracing::info!(
                        backoff_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        attempt = backoff.attempt_count(),
                        "Reconnecting quote feed"
                    );
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = self.token.cancelled() => break,
                    }
                }
                None => {
                    tracing::error!("Quote feed reconnection attempts exhausted");
                    break;
                }
            }
        }

        self.set_status(ConnectionState::Disconnected);

        // Release the enable slot if it is still ours, so the component can
        // be enabled again after an exhausted attempt budget.
        let mut active = slot.lock();
        if active.as_ref().is_some_and(|e| e.generation == generation) {
            *active = None;
        }
    }

    /// Read one connection until it drops or the component is disabled.
    async fn read_until_drop(&mut self, mut socket: Box<dyn QuoteSocket>) -> ReadOutcome {
        // The replay below covers any change queued while disconnected.
        while self.commands.try_recv().is_ok() {}

        let mut desired: Vec<Symbol> = self.subscriptions.read().iter().cloned().collect();
        desired.sort_unstable();
        if !desired.is_empty() {
            let replay = SubscriptionAction::Subscribe(desired).payload();
            if let Err(e) = socket.send(replay).await {
                tracing::warn!(error = %e, "Failed to replay subscriptions");
                return ReadOutcome::Dropped;
            }
        }

        loop {
            let event = tokio::select! {
                () = self.token.cancelled() => ReadEvent::Cancelled,
                command = self.commands.recv() => ReadEvent::Command(command),
                message = socket.next_message() => ReadEvent::Inbound(message),
            };

            match event {
                ReadEvent::Cancelled => {
                    // Teardown order matters: this path never reaches the
                    // reconnect scheduling in `run`, the socket closes here,
                    // and `run` forces Disconnected on exit.
                    socket.close().await;
                    return ReadOutcome::Shutdown;
                }
                ReadEvent::Command(Some(action)) => {
                    if let Err(e) = socket.send(action.payload()).await {
                        tracing::warn!(error = %e, "Failed to send subscription change");
                    }
                }
                ReadEvent::Command(None) => {}
                ReadEvent::Inbound(Some(Ok(text))) => self.apply_snapshot(&text),
                ReadEvent::Inbound(Some(Err(e))) => {
                    tracing::warn!(error = %e, "Quote feed error");
                    return ReadOutcome::Dropped;
                }
                ReadEvent::Inbound(None) => {
                    tracing::warn!("Quote feed closed by server");
                    return ReadOutcome::Dropped;
                }
            }
        }
    }

    /// Merge one inbound batch and fan it out in arrival order.
    fn apply_snapshot(&self, payload: &str) {
        match parse_snapshot_batch(payload) {
            Ok(batch) => {
                if batch.is_empty() {
                    return;
                }
                self.state.merge_quotes(&batch);
                for (symbol, snapshot) in batch {
                    let _ = self.update_tx.send(QuoteUpdate { symbol, snapshot });
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "Dropping malformed snapshot message");
            }
        }
    }

    fn set_status(&self, status: ConnectionState) {
        *self.status.write() = status;
    }
}
