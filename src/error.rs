//! Error types for the simulation bridge.
//!
//! Every failure in the bridge falls into one of a few classes, and each class
//! has a fixed recovery policy:
//!
//! - **Connection Errors**: refused, reset or unreachable peers. Fatal to the
//!   outbound producer, retried by the inbound consumer.
//! - **Protocol Errors**: malformed command lines, truncated or oversized
//!   frames. Always recoverable; the offending input is discarded.
//! - **Encoding Errors**: a viewpoint could not be rendered or compressed.
//!   The capture cycle is skipped.
//! - **Configuration Errors**: invalid or unreadable configuration.
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use simbridge::BridgeError;
//!
//! let error = BridgeError::connection_failed("peer not listening");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::time::Duration;
use thiserror::Error;

use crate::types::Viewpoint;

/// Result type alias for bridge operations.
pub type Result<T, E = BridgeError> = std::result::Result<T, E>;

/// Main error type for bridge operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BridgeError {
    #[error("Connection to peer failed: {reason}")]
    Connection {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Protocol error in {context}: {details}")]
    Protocol { context: String, details: String },

    #[error("Failed to encode {viewpoint} viewpoint: {details}")]
    Encoding { viewpoint: Viewpoint, details: String },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Invalid configuration: {details}")]
    Config { details: String },

    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("Runtime error: {details}")]
    Runtime { details: String },
}

impl BridgeError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            BridgeError::Connection { .. } => true,
            BridgeError::Timeout { .. } => true,
            BridgeError::Io(_) => true,
            BridgeError::Protocol { .. } => true,
            BridgeError::Encoding { .. } => true,
            BridgeError::Config { .. } => false,
            BridgeError::Runtime { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            BridgeError::Connection { .. } => vec![
                "Ensure the peer process is running",
                "Check the configured host and port",
                "Check that no other process holds the listen port",
            ],
            BridgeError::Protocol { .. } => vec![
                "Send commands as \"<steer>,<throttle>,<brake>\\n\"",
                "Use '.' as the decimal separator",
                "Verify peer and bridge agree on the frame layout",
            ],
            BridgeError::Encoding { .. } => vec![
                "Check the render target matches the configured resolution",
                "Verify the JPEG quality is between 1 and 100",
            ],
            BridgeError::Timeout { .. } => vec![
                "Increase the timeout duration",
                "Verify the peer is responding",
            ],
            BridgeError::Config { .. } => vec![
                "Check the configuration file syntax",
                "Compare values against the documented defaults",
            ],
            BridgeError::Io(_) => vec![
                "Check the underlying socket or file is still open",
                "Retry the operation",
            ],
            BridgeError::Runtime { .. } => vec![
                "Check system thread limits",
                "Restart the bridge",
            ],
        }
    }

    /// Helper constructor for connection errors.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        BridgeError::Connection { reason: reason.into(), source: None }
    }

    /// Helper constructor for connection errors with source.
    pub fn connection_failed_with_source(
        reason: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        BridgeError::Connection { reason: reason.into(), source: Some(Box::new(source)) }
    }

    /// Helper constructor for protocol errors.
    pub fn protocol(context: impl Into<String>, details: impl Into<String>) -> Self {
        BridgeError::Protocol { context: context.into(), details: details.into() }
    }

    /// Helper constructor for encoding errors.
    pub fn encoding(viewpoint: Viewpoint, details: impl Into<String>) -> Self {
        BridgeError::Encoding { viewpoint, details: details.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config(details: impl Into<String>) -> Self {
        BridgeError::Config { details: details.into() }
    }
}
