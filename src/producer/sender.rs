//! Sender task that drains the frame slot onto the outbound socket

use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use super::ProducerCounters;
use crate::slot::LatestSlot;
use crate::types::{ConnectionState, Frame};
use crate::wire;

/// Everything the sender task owns or shares with the producer handle
pub(crate) struct SenderTask<W> {
    pub writer: W,
    pub slot: Arc<LatestSlot<Frame>>,
    pub state: Arc<watch::Sender<ConnectionState>>,
    pub counters: Arc<ProducerCounters>,
    pub cancel: CancellationToken,
}

impl<W> SenderTask<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Spawn the sender loop on the current runtime
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Send frames until cancelled or the connection fails.
    ///
    /// Frames are taken out of the slot before any I/O starts, so the capture
    /// side can keep replacing the slot while a send is in flight. A write
    /// failure faults the channel permanently.
    async fn run(mut self) {
        info!("Frame sender started");

        loop {
            let frame = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("Frame sender cancelled while idle");
                    break;
                }
                frame = self.slot.wait() => frame,
            };

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!(sequence = frame.sequence, "Frame sender cancelled mid-send");
                    break;
                }
                result = wire::write_frame(&mut self.writer, &frame) => result,
            };

            match result {
                Ok(()) => {
                    let sent = self.counters.sent.fetch_add(1, Ordering::Relaxed) + 1;
                    trace!(
                        sequence = frame.sequence,
                        bytes = frame.wire_len(),
                        latency_us = frame.captured_at.elapsed().as_micros() as u64,
                        "Frame sent"
                    );
                    if sent % 300 == 0 {
                        debug!(sent, "Frame sender progress");
                    }
                }
                Err(e) => {
                    error!(
                        sequence = frame.sequence,
                        error = %e,
                        "Outbound connection failed, frame transmission stopped"
                    );
                    self.state.send_replace(ConnectionState::Faulted);
                    return;
                }
            }
        }

        if let Err(e) = self.writer.shutdown().await {
            debug!(error = %e, "Outbound socket shutdown failed");
        }
        self.state.send_replace(ConnectionState::Disconnected);
        info!(sent = self.counters.sent.load(Ordering::Relaxed), "Frame sender stopped");
    }
}
