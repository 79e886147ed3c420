//! Streaming bridge between a vehicle simulation and an external control
//! process.
//!
//! simbridge connects a simulated vehicle to a peer process (typically a
//! learning agent) over two plain TCP channels:
//!
//! - **Frames out**: at a fixed capture rate, three camera viewpoints are
//!   JPEG-compressed and streamed to the peer together with the controls the
//!   vehicle is applying.
//! - **Commands in**: the peer sends `steer,throttle,brake` lines; every
//!   simulation tick the latest valid command is clamped and applied.
//!
//! Network I/O never runs on the simulation thread. Each direction hands data
//! across through a single slot, so a slow peer loses stale frames instead of
//! stalling the simulation, and a silent peer leaves the last command in force.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use simbridge::{
//!     Bridge, BridgeConfig, Cameras, ControlSnapshot, RawImage, Vehicle, Viewpoint,
//! };
//!
//! struct Car { controls: ControlSnapshot, engine: bool }
//!
//! impl Vehicle for Car {
//!     fn controls(&self) -> ControlSnapshot { self.controls }
//!     fn set_steer(&mut self, v: f32) { self.controls.steer = v; }
//!     fn set_throttle(&mut self, v: f32) { self.controls.throttle = v; }
//!     fn set_brake(&mut self, v: f32) { self.controls.brake = v; }
//!     fn set_handbrake(&mut self, _: f32) {}
//!     fn engine_running(&self) -> bool { self.engine }
//!     fn start_engine(&mut self) { self.engine = true; }
//!     fn set_external_control(&mut self, _: bool) {}
//! }
//!
//! struct Grey;
//!
//! impl Cameras for Grey {
//!     fn render(&mut self, _: Viewpoint, w: u32, h: u32) -> simbridge::Result<RawImage> {
//!         Ok(RawImage::solid(w, h, [128, 128, 128]))
//!     }
//! }
//!
//! fn main() -> simbridge::Result<()> {
//!     let config = BridgeConfig::from_file("bridge.yaml")?;
//!     simbridge::init_tracing(&config.log_filter);
//!
//!     let mut bridge = Bridge::start(&config)?;
//!     let mut car = Car { controls: ControlSnapshot::default(), engine: false };
//!     loop {
//!         let report = bridge.tick(Duration::from_millis(16), &mut Grey, &mut car);
//!         if let Some(sequence) = report.captured {
//!             println!("captured frame {sequence}");
//!         }
//!         std::thread::sleep(Duration::from_millis(16));
//!     }
//! }
//! ```

// Core types and error handling
mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod config;
pub mod simulation;
pub mod trace;
pub mod types;

// Wire format and compression
pub mod codec;
pub mod wire;

// Channels
pub mod bridge;
pub mod consumer;
pub mod handshake;
pub mod peer;
pub mod producer;
pub mod slot;

// Core exports
pub use error::*;
pub use types::*;

// Main API exports
pub use bridge::{Bridge, TickReport};
pub use config::{
    BridgeConfig, CaptureConfig, ConnectFailurePolicy, ConsumerConfig, HandshakeConfig,
    ProducerConfig,
};
pub use consumer::{CommandConsumer, ConsumerStats};
pub use handshake::handshake;
pub use peer::{CommandSender, FrameReceiver, ReceivedFrame};
pub use producer::{FrameProducer, ProducerStats};
pub use simulation::{Cameras, Vehicle};
pub use trace::init_tracing;
