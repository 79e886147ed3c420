//! Accept/read loop for the inbound command socket

use futures::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::CommandShared;
use crate::types::ConnectionState;
use crate::wire::{CommandLine, CommandLineCodec};

/// How a served connection ended
enum ClientOutcome {
    /// Peer closed the connection
    Closed,
    /// Read failed; back off before accepting again
    Failed(std::io::Error),
    Cancelled,
}

pub(super) struct AcceptLoop {
    pub listener: TcpListener,
    pub shared: Arc<CommandShared>,
    pub state: watch::Sender<ConnectionState>,
    pub cancel: CancellationToken,
    pub retry_backoff: Duration,
    pub max_line_length: usize,
}

impl AcceptLoop {
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Accept one client at a time until cancelled.
    ///
    /// The listener and any active stream are owned by this task, so returning
    /// closes both.
    async fn run(self) {
        info!("Command listener waiting for peer");

        loop {
            let accepted = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };

            let outcome = match accepted {
                Ok((stream, peer)) => {
                    info!(%peer, "Command peer connected");
                    self.shared.record_client();
                    self.state.send_replace(ConnectionState::Connected);
                    let outcome = self.serve(stream, peer).await;
                    self.state.send_replace(ConnectionState::Disconnected);
                    outcome
                }
                Err(e) => ClientOutcome::Failed(e),
            };

            match outcome {
                ClientOutcome::Closed => info!("Command peer disconnected, waiting for next peer"),
                ClientOutcome::Cancelled => break,
                ClientOutcome::Failed(e) => {
                    warn!(
                        error = %e,
                        retry_in_ms = self.retry_backoff.as_millis() as u64,
                        "Command connection error"
                    );
                    let cancelled = tokio::select! {
                        _ = self.cancel.cancelled() => true,
                        _ = tokio::time::sleep(self.retry_backoff) => false,
                    };
                    if cancelled {
                        break;
                    }
                }
            }
        }

        info!("Command listener stopped");
    }

    /// Read lines from one peer until it disconnects.
    ///
    /// Further connection attempts while this peer is active are accepted and
    /// closed straight away; only one peer controls the vehicle at a time.
    async fn serve(&self, stream: TcpStream, peer: SocketAddr) -> ClientOutcome {
        let mut lines = FramedRead::new(stream, CommandLineCodec::new(self.max_line_length));
        let mut gate = RejectGate::default();

        loop {
            let reopen_at = gate.reopen_at();
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return ClientOutcome::Cancelled,
                next = lines.next() => match next {
                    None => return ClientOutcome::Closed,
                    Some(Ok(CommandLine::Text(line))) => match self.shared.ingest(&line) {
                        Ok(command) => trace!(?command, "Command received"),
                        Err(e) => warn!(%peer, line = %line, error = %e, "Discarding invalid command"),
                    },
                    Some(Ok(CommandLine::Malformed(reason))) => {
                        self.shared.record_rejected();
                        warn!(%peer, reason = %reason, "Discarding malformed command line");
                    }
                    Some(Err(e)) => return ClientOutcome::Failed(e),
                },
                extra = self.listener.accept(), if gate.is_open() => match extra {
                    Ok((rejected, addr)) => {
                        self.shared.record_refused();
                        warn!(%addr, active = %peer, "Rejecting command peer, another peer is active");
                        drop(rejected);
                    }
                    Err(e) => {
                        warn!(
                            error = %e,
                            retry_in_ms = self.retry_backoff.as_millis() as u64,
                            "Accept failed while serving peer, pausing rejection"
                        );
                        gate.pause(Instant::now(), self.retry_backoff);
                    }
                },
                _ = sleep_until(reopen_at.unwrap_or_else(Instant::now)), if reopen_at.is_some() => {
                    debug!("Rejecting extra command peers again");
                    gate.reopen();
                }
            }
        }
    }
}

/// Whether extra connections are being accepted and refused while a peer is
/// served. A failing listener pauses it for one backoff period so the serve
/// loop cannot spin on accept errors.
#[derive(Debug, Default)]
struct RejectGate {
    paused_until: Option<Instant>,
}

impl RejectGate {
    fn is_open(&self) -> bool {
        self.paused_until.is_none()
    }

    fn pause(&mut self, now: Instant, backoff: Duration) {
        self.paused_until = Some(now + backoff);
    }

    fn reopen_at(&self) -> Option<Instant> {
        self.paused_until
    }

    fn reopen(&mut self) {
        self.paused_until = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_starts_open() {
        let gate = RejectGate::default();
        assert!(gate.is_open());
        assert_eq!(gate.reopen_at(), None);
    }

    #[test]
    fn failed_accept_pauses_for_one_backoff_then_rearms() {
        let mut gate = RejectGate::default();
        let now = Instant::now();

        gate.pause(now, Duration::from_millis(250));
        assert!(!gate.is_open());
        assert_eq!(gate.reopen_at(), Some(now + Duration::from_millis(250)));

        gate.reopen();
        assert!(gate.is_open());

        // A later failure pauses again rather than disabling rejection for good
        gate.pause(now + Duration::from_secs(1), Duration::from_millis(250));
        assert!(!gate.is_open());
    }

    #[tokio::test]
    async fn paused_gate_reopens_after_backoff_while_serving() {
        let mut gate = RejectGate::default();
        gate.pause(Instant::now(), Duration::from_millis(20));

        let reopen_at = gate.reopen_at();
        tokio::time::timeout(Duration::from_secs(1), async {
            tokio::select! {
                _ = sleep_until(reopen_at.unwrap_or_else(Instant::now)), if reopen_at.is_some() => {
                    gate.reopen();
                }
            }
        })
        .await
        .unwrap();

        assert!(gate.is_open());
    }
}
