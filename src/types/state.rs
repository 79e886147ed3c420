//! Per-channel connection state

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one socket channel.
///
/// Each component owns the state of its own channel and publishes it through a
/// watch channel; nothing else writes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Unrecoverable for this channel until the component is restarted
    Faulted,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_faulted(self) -> bool {
        matches!(self, ConnectionState::Faulted)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Faulted => "faulted",
        };
        f.write_str(name)
    }
}
