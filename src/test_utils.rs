//! Test doubles for the simulation side of the bridge
//!
//! [`MockVehicle`] records every actuator write and [`SolidCameras`] renders a
//! flat colour per viewpoint, optionally failing for one viewpoint.

#![cfg(any(test, feature = "benchmark"))]

use crate::simulation::{Cameras, Vehicle};
use crate::types::{ControlSnapshot, RawImage, Viewpoint};
use crate::{BridgeError, Result};

/// Vehicle double that stores actuator values and mode switches
#[derive(Debug, Clone, Default)]
pub struct MockVehicle {
    pub controls: ControlSnapshot,
    pub handbrake: f32,
    pub engine_running: bool,
    pub external_control: bool,
    pub engine_starts: u32,
    pub external_control_asserts: u32,
}

impl MockVehicle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate unrelated code taking input ownership back
    pub fn reclaim_input(&mut self) {
        self.external_control = false;
    }
}

impl Vehicle for MockVehicle {
    fn controls(&self) -> ControlSnapshot {
        self.controls
    }

    fn set_steer(&mut self, steer: f32) {
        self.controls.steer = steer;
    }

    fn set_throttle(&mut self, throttle: f32) {
        self.controls.throttle = throttle;
    }

    fn set_brake(&mut self, brake: f32) {
        self.controls.brake = brake;
    }

    fn set_handbrake(&mut self, handbrake: f32) {
        self.handbrake = handbrake;
    }

    fn engine_running(&self) -> bool {
        self.engine_running
    }

    fn start_engine(&mut self) {
        self.engine_starts += 1;
        self.engine_running = true;
    }

    fn set_external_control(&mut self, enabled: bool) {
        if enabled {
            self.external_control_asserts += 1;
        }
        self.external_control = enabled;
    }
}

/// Cameras that render a solid colour per viewpoint
#[derive(Debug, Clone, Default)]
pub struct SolidCameras {
    /// Viewpoint whose render call fails
    pub fail_on: Option<Viewpoint>,
    pub renders: u32,
}

impl SolidCameras {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(viewpoint: Viewpoint) -> Self {
        Self { fail_on: Some(viewpoint), renders: 0 }
    }

    pub fn colour(viewpoint: Viewpoint) -> [u8; 3] {
        match viewpoint {
            Viewpoint::Center => [200, 40, 40],
            Viewpoint::Left => [40, 200, 40],
            Viewpoint::Right => [40, 40, 200],
        }
    }
}

impl Cameras for SolidCameras {
    fn render(&mut self, viewpoint: Viewpoint, width: u32, height: u32) -> Result<RawImage> {
        self.renders += 1;
        if self.fail_on == Some(viewpoint) {
            return Err(BridgeError::encoding(viewpoint, "render target lost"));
        }
        Ok(RawImage::solid(width, height, Self::colour(viewpoint)))
    }
}
