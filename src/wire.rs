//! Wire formats for both sockets
//!
//! # Outbound (bridge → peer)
//!
//! One transmission per frame, viewpoints always in the order center, left,
//! right:
//!
//! ```text
//! ┌───────────────┬──────────────┐  × 3
//! │ u32 LE length │ JPEG bytes   │
//! └───────────────┴──────────────┘
//! "<steer>,<throttle>,<brake>\n"     four decimals each, ASCII
//! ```
//!
//! # Inbound (peer → bridge)
//!
//! Newline terminated ASCII lines `"<steer>,<throttle>,<brake>\n"` with no
//! fixed precision. Lines are decoded by [`CommandLineCodec`], which never
//! fails the connection on bad input: overlong or non-UTF-8 lines surface as
//! [`CommandLine::Malformed`] and the next line is read normally.

use bytes::BytesMut;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Decoder, LinesCodec, LinesCodecError};

use crate::types::Frame;

/// Width of the image length prefix in bytes
pub const LENGTH_PREFIX_BYTES: usize = 4;

/// Largest image a peer-side reader accepts
pub const MAX_IMAGE_BYTES: usize = 16 * 1024 * 1024;

/// Longest telemetry line a peer-side reader accepts, newline included
pub const MAX_CONTROL_LINE_BYTES: usize = 128;

/// Serialize a frame into `out` exactly as [`write_frame`] sends it.
pub fn encode_frame(frame: &Frame, out: &mut Vec<u8>) -> std::io::Result<()> {
    out.reserve(frame.wire_len());
    for image in &frame.images {
        out.extend_from_slice(&length_prefix(image)?);
        out.extend_from_slice(image);
    }
    out.extend_from_slice(frame.controls.to_line().as_bytes());
    Ok(())
}

/// Write one frame and flush.
///
/// Image bytes are written straight from the frame's buffers without an
/// intermediate copy.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    for image in &frame.images {
        writer.write_all(&length_prefix(image)?).await?;
        writer.write_all(image).await?;
    }
    writer.write_all(frame.controls.to_line().as_bytes()).await?;
    writer.flush().await
}

fn length_prefix(image: &[u8]) -> std::io::Result<[u8; LENGTH_PREFIX_BYTES]> {
    let len = u32::try_from(image.len()).map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("image of {} bytes exceeds the u32 length prefix", image.len()),
        )
    })?;
    Ok(len.to_le_bytes())
}

/// One decoded inbound line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    /// A complete line, newline and trailing `\r` stripped
    Text(String),
    /// A line that was too long or not valid UTF-8 and has been discarded
    Malformed(String),
}

/// Newline framing for the inbound command stream with a line length cap.
#[derive(Debug, Clone)]
pub struct CommandLineCodec {
    inner: LinesCodec,
}

impl CommandLineCodec {
    pub fn new(max_length: usize) -> Self {
        Self { inner: LinesCodec::new_with_max_length(max_length) }
    }

    fn map(result: Result<Option<String>, LinesCodecError>) -> std::io::Result<Option<CommandLine>> {
        match result {
            Ok(line) => Ok(line.map(CommandLine::Text)),
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                Ok(Some(CommandLine::Malformed("line exceeds maximum length".to_string())))
            }
            // The codec only reports I/O errors for lines that are not UTF-8;
            // the offending line has already been consumed from the buffer.
            Err(LinesCodecError::Io(e)) => Ok(Some(CommandLine::Malformed(e.to_string()))),
        }
    }
}

impl Decoder for CommandLineCodec {
    type Item = CommandLine;
    type Error = std::io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Self::map(self.inner.decode(buf))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Self::map(self.inner.decode_eof(buf))
    }
}
