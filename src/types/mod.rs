//! Core types shared by the producer, consumer and peer side.
//!
//! - [`Frame`] is one capture of three compressed viewpoints plus telemetry
//! - [`ControlSnapshot`] is the applied actuator state sent with each frame
//! - [`InboundCommand`] is a parsed, not yet clamped, command from the peer
//! - [`ConnectionState`] tracks the lifecycle of one socket channel
//! - [`CaptureClock`] turns simulation tick deltas into capture events
//!
//! ## Usage Example
//!
//! ```rust
//! use simbridge::types::{ControlSnapshot, InboundCommand};
//!
//! let command: InboundCommand = "2.0,0.5,-1\n".parse().unwrap();
//! let applied = command.clamped();
//! assert_eq!(applied, ControlSnapshot::new(1.0, 0.5, 0.0));
//! assert_eq!(applied.to_line(), "1.0000,0.5000,0.0000\n");
//! ```

mod capture_rate;
mod control;
mod frame;
mod state;

pub use capture_rate::{CaptureClock, MIN_CAPTURE_FPS};
pub use control::{ControlSnapshot, InboundCommand};
pub use frame::{Frame, RawImage, Viewpoint};
pub use state::ConnectionState;
