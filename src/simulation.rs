//! Contracts the host simulation implements
//!
//! The bridge never renders or simulates anything itself. It reaches the
//! simulation only through these two traits, and only from the thread that
//! drives the simulation tick.

use crate::Result;
use crate::types::{ControlSnapshot, RawImage, Viewpoint};

/// Off-screen rendering of the three vehicle cameras
pub trait Cameras {
    /// Render the current frame of one viewpoint into an RGB8 buffer of the
    /// requested size.
    fn render(&mut self, viewpoint: Viewpoint, width: u32, height: u32) -> Result<RawImage>;
}

/// Actuator state and engine/control-mode switches of the simulated vehicle
pub trait Vehicle {
    /// Currently applied steer, throttle and brake
    fn controls(&self) -> ControlSnapshot;

    fn set_steer(&mut self, steer: f32);

    fn set_throttle(&mut self, throttle: f32);

    fn set_brake(&mut self, brake: f32);

    fn set_handbrake(&mut self, handbrake: f32);

    fn engine_running(&self) -> bool;

    fn start_engine(&mut self);

    /// Hand input ownership to (or take it back from) the external controller.
    ///
    /// Other simulation code may reset this at any time.
    fn set_external_control(&mut self, enabled: bool);
}
