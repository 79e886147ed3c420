//! One-shot reachability check against the peer process

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::config::HandshakeConfig;
use crate::{BridgeError, Result};

/// Largest response read back from the peer
pub const MAX_RESPONSE_BYTES: usize = 256;

/// Connect, send `greeting`, read one response and close.
///
/// The whole exchange is bounded by `timeout`. The response is decoded as
/// lossy UTF-8; an empty string means the peer closed without answering.
pub async fn handshake(address: &str, greeting: &str, timeout: Duration) -> Result<String> {
    let exchange = async {
        let mut stream = TcpStream::connect(address).await.map_err(|e| {
            BridgeError::connection_failed_with_source(format!("handshake with {}", address), e)
        })?;
        debug!(%address, "Handshake connected");

        stream.write_all(greeting.as_bytes()).await?;
        stream.flush().await?;

        let mut buf = [0u8; MAX_RESPONSE_BYTES];
        let n = stream.read(&mut buf).await?;
        Ok::<_, BridgeError>(String::from_utf8_lossy(&buf[..n]).into_owned())
    };

    tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| BridgeError::Timeout { duration: timeout })?
}

/// Run the configured startup handshake, logging the outcome.
///
/// Never fails: an unreachable peer is reported and `None` returned.
pub async fn startup_handshake(config: &HandshakeConfig) -> Option<String> {
    match handshake(&config.address, &config.greeting, config.timeout()).await {
        Ok(response) => {
            info!(address = %config.address, response = %response.trim_end(), "Peer handshake succeeded");
            Some(response)
        }
        Err(e) => {
            warn!(address = %config.address, error = %e, "Peer handshake failed");
            None
        }
    }
}
