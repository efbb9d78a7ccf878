use std::sync::Arc;
use std::thread::{self, JoinHandle};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use crate::error::{S9Result, S9WebSocketError};
use super::options::ClientOptions;
use super::transport;
use super::types::{send_or_log, CloseCallback, ConnectionState, LogCallback, LogSeverity, MessageCallback, ServerAddress};
use super::watcher::{self, WatchContext};

// ============================================================================
// Shared - state and callbacks visible to the client and its watcher
// ============================================================================

pub(crate) struct Shared {
    state: Mutex<ConnectionState>,
    on_message: RwLock<Option<MessageCallback>>,
    on_log: RwLock<LogCallback>,
    on_close: RwLock<Option<CloseCallback>>,
}

fn tracing_log_callback() -> LogCallback {
    Arc::new(|severity: LogSeverity, message: &str| match severity {
        LogSeverity::Info => tracing::info!("{}", message),
        LogSeverity::Debug => tracing::debug!("{}", message),
        LogSeverity::Error => tracing::error!("{}", message),
    })
}

impl Shared {
    pub(crate) fn new() -> Self {
        Shared {
            state: Mutex::new(ConnectionState::Disconnected),
            on_message: RwLock::new(None),
            on_log: RwLock::new(tracing_log_callback()),
            on_close: RwLock::new(None),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
    }

    pub(crate) fn set_message_callback(&self, callback: MessageCallback) {
        *self.on_message.write() = Some(callback);
    }

    pub(crate) fn set_log_callback(&self, callback: LogCallback) {
        *self.on_log.write() = callback;
    }

    pub(crate) fn set_close_callback(&self, callback: CloseCallback) {
        *self.on_close.write() = Some(callback);
    }

    // Callbacks are cloned out so none of them runs while a lock is held.

    pub(crate) fn log(&self, severity: LogSeverity, message: &str) {
        let callback = self.on_log.read().clone();
        callback(severity, message);
    }

    #[inline]
    pub(crate) fn info(&self, message: &str) {
        self.log(LogSeverity::Info, message);
    }

    #[inline]
    pub(crate) fn debug(&self, message: &str) {
        self.log(LogSeverity::Debug, message);
    }

    #[inline]
    pub(crate) fn error(&self, message: &str) {
        self.log(LogSeverity::Error, message);
    }

    pub(crate) fn deliver(&self, message: String) {
        let callback = self.on_message.read().clone();
        match callback {
            Some(callback) => callback(message),
            None => {
                if tracing::enabled!(tracing::Level::DEBUG) {
                    tracing::debug!("Dropping message, no message callback installed");
                }
            }
        }
    }

    pub(crate) fn notify_closed(&self, reason: Option<String>) {
        let callback = self.on_close.read().clone();
        if let Some(callback) = callback {
            callback(reason);
        }
    }
}

// ============================================================================
// S9WebSocketClient - threaded client with callbacks
// ============================================================================

/// WebSocket client running each connection on a background watcher thread.
///
/// Messages passed to [`send`](Self::send) go through a single FIFO queue that the
/// watcher drains, so messages sent before the handshake completes are delivered first
/// and in order. Inbound frames are handed to the [`on_message`](Self::on_message)
/// callback on the watcher thread.
pub struct S9WebSocketClient {
    options: ClientOptions,
    shared: Arc<Shared>,
    outbound_tx: Sender<String>,
    outbound_rx: Receiver<String>,
    stop_tx: Option<Sender<()>>,
    watcher: Option<JoinHandle<()>>,
}

impl Default for S9WebSocketClient {
    fn default() -> Self {
        Self::new(ClientOptions::default())
    }
}

impl S9WebSocketClient {
    pub fn new(options: ClientOptions) -> S9WebSocketClient {
        let (outbound_tx, outbound_rx) = unbounded::<String>();

        S9WebSocketClient {
            options,
            shared: Arc::new(Shared::new()),
            outbound_tx,
            outbound_rx,
            stop_tx: None,
            watcher: None,
        }
    }

    /// Parses `ws://` or `wss://` and opens it, see [`open`](Self::open).
    pub fn open_url(&mut self, uri: &str) -> S9Result<()> {
        let address = ServerAddress::parse(uri)?;
        self.open(address)
    }

    /// Connects the transport and starts the watcher thread.
    ///
    /// Resolution, TCP connect and the TLS handshake happen before this returns and their
    /// failures are returned. The WebSocket handshake runs on the watcher; its outcome is
    /// only visible through the log and close callbacks and [`state`](Self::state).
    pub fn open(&mut self, address: ServerAddress) -> S9Result<()> {
        match self.shared.state() {
            ConnectionState::Connecting | ConnectionState::Connected => {
                self.shared.error("already connected!");
                return Err(S9WebSocketError::AlreadyConnected);
            },
            ConnectionState::Disconnected | ConnectionState::Closed => {}
        }

        self.reap_watcher();

        let transport = transport::connect(&address, &self.options).map_err(|e| {
            self.shared.error(&format!("error connecting to {}: {}", address, e));
            e
        })?;

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let ctx = WatchContext {
            address,
            outbound: self.outbound_rx.clone(),
            stop: stop_rx,
            shared: self.shared.clone(),
            handshake_buffer_size: self.options.handshake_buffer_size,
            max_frame_size: self.options.max_frame_size,
        };

        self.shared.set_state(ConnectionState::Connecting);

        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!("Starting watcher thread...");
        }

        let spawned = thread::Builder::new()
            .name("s9-miniws-watcher".to_string())
            .spawn(move || watcher::watch(transport, ctx));

        match spawned {
            Ok(handle) => {
                self.stop_tx = Some(stop_tx);
                self.watcher = Some(handle);
                Ok(())
            },
            Err(e) => {
                self.shared.set_state(ConnectionState::Closed);
                self.shared.error(&format!("unable to start watcher thread: {}", e));
                Err(S9WebSocketError::Io(e))
            }
        }
    }

    /// Queues `message` for sending. Never blocks and never fails.
    ///
    /// Until the handshake completes the message waits in the queue. Send failures are
    /// reported through the log callback.
    pub fn send(&self, message: impl Into<String>) {
        let message = message.into();
        if self.shared.state() == ConnectionState::Connected {
            if tracing::enabled!(tracing::Level::TRACE) {
                tracing::trace!("Queueing text message for watcher: {}", message);
            }
        } else {
            self.shared.info("adding to queue");
        }
        send_or_log!(self.outbound_tx, "outbound text message", message);
    }

    /// Asks the watcher to shut the transport down.
    ///
    /// Returns immediately; the watcher notices the request at its next read boundary.
    pub fn close(&mut self) {
        match self.stop_tx.take() {
            Some(stop_tx) => {
                if stop_tx.send(()).is_err() {
                    self.shared.debug("connection already closed");
                } else {
                    self.shared.info("closing connection");
                }
            },
            None => {
                if tracing::enabled!(tracing::Level::DEBUG) {
                    tracing::debug!("Close requested without an open connection");
                }
            }
        }
    }

    pub fn on_message<F>(&self, callback: F)
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.shared.set_message_callback(Arc::new(callback));
    }

    /// Replaces the default log callback, which forwards to `tracing`.
    pub fn on_log<F>(&self, callback: F)
    where
        F: Fn(LogSeverity, &str) + Send + Sync + 'static,
    {
        self.shared.set_log_callback(Arc::new(callback));
    }

    /// Called once per connection when its watcher stops. `None` means a requested close.
    pub fn on_close<F>(&self, callback: F)
    where
        F: Fn(Option<String>) + Send + Sync + 'static,
    {
        self.shared.set_close_callback(Arc::new(callback));
    }

    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Number of messages waiting for the watcher.
    #[inline]
    pub fn queued(&self) -> usize {
        self.outbound_tx.len()
    }

    fn reap_watcher(&mut self) {
        if let Some(handle) = self.watcher.take() {
            // Called from a callback on the watcher itself; it is already finishing.
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                tracing::error!("Watcher thread panicked");
            }
        }
    }
}

impl Drop for S9WebSocketClient {
    fn drop(&mut self) {
        self.close();
        self.reap_watcher();
    }
}
