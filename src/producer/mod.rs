//! Frame & telemetry producer
//!
//! Capture runs synchronously on the simulation tick: each viewpoint is
//! rendered, JPEG encoded and bundled with the current actuator state into a
//! [`Frame`]. The frame goes into a single-slot buffer and a background sender
//! task pushes it to the peer. The tick never waits on the network; if the
//! sender falls behind, unsent frames are replaced by newer ones.
//!
//! The outbound channel is never re-established. Once it faults, capture keeps
//! running in-process but nothing is transmitted until the producer is
//! recreated.

mod sender;

use futures::Stream;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::codec::JpegCodec;
use crate::config::{CaptureConfig, ConnectFailurePolicy, ProducerConfig};
use crate::simulation::{Cameras, Vehicle};
use crate::slot::LatestSlot;
use crate::types::{CaptureClock, ConnectionState, Frame, Viewpoint};
use crate::{BridgeError, Result};

use sender::SenderTask;


/// Counters shared between the tick side and the sender task
#[derive(Debug, Default)]
pub(crate) struct ProducerCounters {
    pub captured: AtomicU64,
    pub sent: AtomicU64,
    pub superseded: AtomicU64,
    pub skipped: AtomicU64,
}

/// Point-in-time copy of the producer counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProducerStats {
    /// Frames built and stored in the slot
    pub captured: u64,
    /// Frames fully written to the peer
    pub sent: u64,
    /// Frames replaced in the slot before the sender took them
    pub superseded: u64,
    /// Capture cycles abandoned because a viewpoint failed to render or encode
    pub skipped: u64,
}

/// Captures camera frames on the simulation tick and streams them to the peer.
pub struct FrameProducer {
    capture: CaptureConfig,
    codec: JpegCodec,
    clock: CaptureClock,
    slot: Arc<LatestSlot<Frame>>,
    counters: Arc<ProducerCounters>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    state: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
    sender: Option<JoinHandle<()>>,
    next_sequence: u64,
}

impl FrameProducer {
    /// Connect to the peer and start the sender task.
    ///
    /// When the peer is unreachable the outcome depends on
    /// [`ProducerConfig::on_connect_failure`]: with
    /// [`ConnectFailurePolicy::CaptureOnly`] a detached producer in the
    /// `Faulted` state is returned; with [`ConnectFailurePolicy::Disable`] the
    /// connection error is returned. A capture rate that cannot be turned into
    /// an interval is a configuration error under either policy.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn connect(capture: &CaptureConfig, producer: &ProducerConfig) -> Result<Self> {
        let mut this = Self::new(capture, ConnectionState::Connecting)?;
        info!(address = %producer.address, "Connecting frame stream to peer");

        let timeout = producer.connect_timeout();
        let connected = match tokio::time::timeout(timeout, TcpStream::connect(&producer.address))
            .await
        {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(BridgeError::connection_failed_with_source(
                format!("frame stream to {}", producer.address),
                e,
            )),
            Err(_) => Err(BridgeError::Timeout { duration: timeout }),
        };

        match connected {
            Ok(stream) => {
                if let Err(e) = stream.set_nodelay(true) {
                    warn!(error = %e, "Failed to disable Nagle on frame stream");
                }
                info!(address = %producer.address, "Frame stream connected");
                this.attach(stream);
                Ok(this)
            }
            Err(e) => match producer.on_connect_failure {
                ConnectFailurePolicy::CaptureOnly => {
                    error!(error = %e, "Frame stream unavailable, capturing without transmission");
                    this.state_tx.send_replace(ConnectionState::Faulted);
                    Ok(this)
                }
                ConnectFailurePolicy::Disable => {
                    error!(error = %e, "Frame stream unavailable, producer disabled");
                    Err(e)
                }
            },
        }
    }

    /// Start a producer that sends frames to an already connected writer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_writer<W>(capture: &CaptureConfig, writer: W) -> Result<Self>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let mut producer = Self::new(capture, ConnectionState::Connecting)?;
        producer.attach(writer);
        Ok(producer)
    }

    fn attach<W>(&mut self, writer: W)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        self.state_tx.send_replace(ConnectionState::Connected);
        let task = SenderTask {
            writer,
            slot: Arc::clone(&self.slot),
            state: Arc::clone(&self.state_tx),
            counters: Arc::clone(&self.counters),
            cancel: self.cancel.clone(),
        };
        self.sender = Some(task.spawn());
    }

    /// A producer that captures but never transmits
    pub fn detached(capture: &CaptureConfig) -> Result<Self> {
        Self::new(capture, ConnectionState::Faulted)
    }

    fn new(capture: &CaptureConfig, initial: ConnectionState) -> Result<Self> {
        let clock = CaptureClock::from_fps(capture.target_fps)?;
        let (state_tx, state_rx) = watch::channel(initial);
        Ok(Self {
            capture: capture.clone(),
            codec: JpegCodec::new(capture.jpeg_quality),
            clock,
            slot: Arc::new(LatestSlot::new()),
            counters: Arc::new(ProducerCounters::default()),
            state_tx: Arc::new(state_tx),
            state: state_rx,
            cancel: CancellationToken::new(),
            sender: None,
            next_sequence: 1,
        })
    }

    /// Advance the capture clock by one simulation tick.
    ///
    /// Runs a capture cycle when the capture interval has elapsed. Returns the
    /// sequence number of the stored frame, or `None` when no frame was stored
    /// (not due yet, or the cycle was skipped).
    pub fn tick<C, V>(&mut self, dt: Duration, cameras: &mut C, vehicle: &V) -> Option<u64>
    where
        C: Cameras + ?Sized,
        V: Vehicle + ?Sized,
    {
        if !self.clock.advance(dt) {
            return None;
        }

        match self.capture_cycle(cameras, vehicle) {
            Ok(sequence) => Some(sequence),
            Err(e) => {
                self.counters.skipped.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Capture cycle skipped");
                None
            }
        }
    }

    /// Render, encode and store one frame, replacing any unsent frame.
    ///
    /// Nothing is stored if any viewpoint fails, so a partial frame is never
    /// transmitted.
    pub fn capture_cycle<C, V>(&mut self, cameras: &mut C, vehicle: &V) -> Result<u64>
    where
        C: Cameras + ?Sized,
        V: Vehicle + ?Sized,
    {
        let (width, height) = (self.capture.width, self.capture.height);

        let mut images: [Vec<u8>; 3] = Default::default();
        for viewpoint in Viewpoint::ALL {
            let raw = cameras.render(viewpoint, width, height).map_err(|e| match e {
                BridgeError::Encoding { .. } => e,
                other => BridgeError::encoding(viewpoint, other.to_string()),
            })?;
            images[viewpoint.index()] = self.codec.encode(viewpoint, &raw)?;
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let frame = Frame::new(sequence, images, vehicle.controls());

        if let Some(stale) = self.slot.put(frame) {
            self.counters.superseded.fetch_add(1, Ordering::Relaxed);
            debug!(dropped = stale.sequence, replaced_by = sequence, "Unsent frame superseded");
        }
        self.counters.captured.fetch_add(1, Ordering::Relaxed);
        Ok(sequence)
    }

    /// Current state of the outbound channel
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Stream of outbound channel state, starting with the current state
    pub fn state_updates(&self) -> impl Stream<Item = ConnectionState> + 'static {
        WatchStream::new(self.state.clone())
    }

    /// Whether a captured frame is waiting to be sent
    pub fn frame_pending(&self) -> bool {
        self.slot.is_ready()
    }

    /// Snapshot of the capture and send counters
    pub fn stats(&self) -> ProducerStats {
        ProducerStats {
            captured: self.counters.captured.load(Ordering::Relaxed),
            sent: self.counters.sent.load(Ordering::Relaxed),
            superseded: self.counters.superseded.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
        }
    }

    /// Time between captures derived from the configured rate
    pub fn capture_interval(&self) -> Duration {
        self.clock.interval()
    }

    /// Stop the sender task and wait for it to finish.
    ///
    /// Capture keeps working afterwards; frames are simply no longer sent.
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.sender.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Frame sender task ended abnormally");
            }
        }
    }
}

impl Drop for FrameProducer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
