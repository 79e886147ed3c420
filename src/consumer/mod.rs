//! Command consumer
//!
//! A background task owns the listening socket and serves one peer at a time,
//! parsing each received line into the shared latest-command slot. The
//! simulation reads that slot once per tick through
//! [`CommandConsumer::apply_tick`], clamps the values and writes them to the
//! vehicle. The network side never touches the vehicle.
//!
//! Disconnects and I/O errors send the task back to `accept`. On shutdown the
//! slot keeps its last value, so the vehicle holds the last command for as long
//! as the host keeps ticking.

mod listener;

use futures::Stream;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ConsumerConfig;
use crate::simulation::Vehicle;
use crate::types::{ConnectionState, ControlSnapshot, InboundCommand};
use crate::{BridgeError, Result};

use listener::AcceptLoop;

#[cfg(test)]
mod tests;

/// Point-in-time copy of the consumer counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConsumerStats {
    /// Lines parsed into a new latest command
    pub accepted: u64,
    /// Lines discarded as malformed
    pub rejected: u64,
    /// Connections served
    pub clients: u64,
    /// Connections refused because another client was active
    pub refused: u64,
}

/// State shared between the accept task and the tick side
#[derive(Debug, Default)]
pub(crate) struct CommandShared {
    latest: Mutex<InboundCommand>,
    accepted: AtomicU64,
    rejected: AtomicU64,
    clients: AtomicU64,
    refused: AtomicU64,
}

impl CommandShared {
    /// Parse a line and, if valid, make it the latest command
    pub(crate) fn ingest(&self, line: &str) -> Result<InboundCommand> {
        match InboundCommand::parse(line) {
            Ok(command) => {
                *self.latest.lock() = command;
                self.accepted.fetch_add(1, Ordering::Relaxed);
                Ok(command)
            }
            Err(e) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_client(&self) {
        self.clients.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_refused(&self) {
        self.refused.fetch_add(1, Ordering::Relaxed);
    }

    fn latest(&self) -> InboundCommand {
        *self.latest.lock()
    }
}

/// Receives control commands from the peer and applies them on the tick.
pub struct CommandConsumer {
    shared: Arc<CommandShared>,
    state: watch::Receiver<ConnectionState>,
    local_addr: SocketAddr,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl CommandConsumer {
    /// Bind the listen address and start the accept task.
    ///
    /// Binding happens once; failure to bind is returned as a connection error.
    /// Must be called from within a tokio runtime.
    pub async fn bind(config: &ConsumerConfig) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_address).await.map_err(|e| {
            BridgeError::connection_failed_with_source(
                format!("cannot listen on {}", config.listen_address),
                e,
            )
        })?;
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, "Command listener bound");

        let shared = Arc::new(CommandShared::default());
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let cancel = CancellationToken::new();

        let task = AcceptLoop {
            listener,
            shared: Arc::clone(&shared),
            state: state_tx,
            cancel: cancel.clone(),
            retry_backoff: config.retry_backoff(),
            max_line_length: config.max_line_length,
        }
        .spawn();

        Ok(Self { shared, state: state_rx, local_addr, cancel, task: Some(task) })
    }

    /// Parse one command line into the latest-command slot.
    ///
    /// Invalid lines are discarded and leave the previous command in place.
    pub fn parse_line(&self, line: &str) -> Result<InboundCommand> {
        self.shared.ingest(line)
    }

    /// Apply the latest command to the vehicle. Call once per simulation tick.
    ///
    /// Starts the engine if it is off and re-asserts external control every
    /// call, since other simulation code may have taken input back. Returns the
    /// clamped values that were written.
    pub fn apply_tick<V>(&self, vehicle: &mut V) -> ControlSnapshot
    where
        V: Vehicle + ?Sized,
    {
        let applied = self.shared.latest().clamped();

        if !vehicle.engine_running() {
            debug!("Engine not running, starting it");
            vehicle.start_engine();
        }
        vehicle.set_external_control(true);
        vehicle.set_handbrake(0.0);
        vehicle.set_steer(applied.steer);
        vehicle.set_throttle(applied.throttle);
        vehicle.set_brake(applied.brake);

        applied
    }

    /// The most recent valid command, unclamped
    pub fn latest(&self) -> InboundCommand {
        self.shared.latest()
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// `Connected` while a peer is being served, `Disconnected` otherwise
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Stream of inbound channel state, starting with the current state
    pub fn state_updates(&self) -> impl Stream<Item = ConnectionState> + 'static {
        WatchStream::new(self.state.clone())
    }

    pub fn stats(&self) -> ConsumerStats {
        ConsumerStats {
            accepted: self.shared.accepted.load(Ordering::Relaxed),
            rejected: self.shared.rejected.load(Ordering::Relaxed),
            clients: self.shared.clients.load(Ordering::Relaxed),
            refused: self.shared.refused.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting, close the listener and any active connection, and wait
    /// for the task to finish. The latest command stays available.
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Command listener task ended abnormally");
            }
        }
    }
}

impl Drop for CommandConsumer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
