//! Peer side of both sockets
//!
//! [`FrameReceiver`] decodes the outbound frame stream and [`CommandSender`]
//! writes command lines. A Rust peer process can use them directly; the
//! bridge's own tests use them to check what actually goes over the wire.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::trace;

use crate::types::{ControlSnapshot, InboundCommand, Viewpoint};
use crate::wire::{LENGTH_PREFIX_BYTES, MAX_CONTROL_LINE_BYTES, MAX_IMAGE_BYTES};
use crate::{BridgeError, Result};

/// A frame as decoded by the peer
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedFrame {
    /// Compressed images indexed by [`Viewpoint::index`]
    pub images: [Vec<u8>; 3],
    pub controls: ControlSnapshot,
}

impl ReceivedFrame {
    pub fn image(&self, viewpoint: Viewpoint) -> &[u8] {
        &self.images[viewpoint.index()]
    }
}

/// Decodes frames from the outbound stream
pub struct FrameReceiver<R> {
    reader: BufReader<R>,
    max_image_bytes: usize,
}

impl<R: AsyncRead + Unpin> FrameReceiver<R> {
    pub fn new(reader: R) -> Self {
        Self { reader: BufReader::new(reader), max_image_bytes: MAX_IMAGE_BYTES }
    }

    /// Lower the largest image accepted before the stream is declared corrupt
    pub fn with_max_image_bytes(mut self, max: usize) -> Self {
        self.max_image_bytes = max;
        self
    }

    /// Read the next frame.
    ///
    /// Returns `Ok(None)` when the stream ends cleanly between frames. A stream
    /// that ends inside a frame is a protocol error.
    pub async fn next_frame(&mut self) -> Result<Option<ReceivedFrame>> {
        if self.reader.fill_buf().await?.is_empty() {
            return Ok(None);
        }

        let mut images: [Vec<u8>; 3] = Default::default();
        for viewpoint in Viewpoint::ALL {
            let mut prefix = [0u8; LENGTH_PREFIX_BYTES];
            self.read_exact(&mut prefix, viewpoint.as_str()).await?;

            let len = u32::from_le_bytes(prefix) as usize;
            if len > self.max_image_bytes {
                return Err(BridgeError::protocol(
                    "frame stream",
                    format!(
                        "{} image of {} bytes exceeds limit of {}",
                        viewpoint, len, self.max_image_bytes
                    ),
                ));
            }

            let mut image = vec![0u8; len];
            self.read_exact(&mut image, viewpoint.as_str()).await?;
            images[viewpoint.index()] = image;
        }

        let mut line = Vec::with_capacity(32);
        (&mut self.reader).take(MAX_CONTROL_LINE_BYTES as u64).read_until(b'\n', &mut line).await?;
        if line.last() != Some(&b'\n') {
            return Err(BridgeError::protocol(
                "frame stream",
                "telemetry line truncated or too long",
            ));
        }
        let text = std::str::from_utf8(&line)
            .map_err(|e| BridgeError::protocol("frame stream", e.to_string()))?;
        let controls = ControlSnapshot::parse_line(text)?;

        trace!(
            center = images[0].len(),
            left = images[1].len(),
            right = images[2].len(),
            "Frame received"
        );
        Ok(Some(ReceivedFrame { images, controls }))
    }

    async fn read_exact(&mut self, buf: &mut [u8], part: &str) -> Result<()> {
        match self.reader.read_exact(buf).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(BridgeError::protocol(
                "frame stream",
                format!("stream ended inside {} image", part),
            )),
            Err(e) => Err(e.into()),
        }
    }
}

/// Writes command lines to the bridge's inbound socket
pub struct CommandSender<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> CommandSender<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Send one command and flush
    pub async fn send(&mut self, command: InboundCommand) -> Result<()> {
        self.send_line(&command.to_line()).await
    }

    /// Send raw text; a trailing newline is added when missing
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        if !line.ends_with('\n') {
            self.writer.write_all(b"\n").await?;
        }
        self.writer.flush().await?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
