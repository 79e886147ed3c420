//! Actuator values exchanged with the peer process

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{BridgeError, Result};

/// Last applied actuator state, attached as telemetry to every outgoing frame.
///
/// Values read back from the vehicle are expected to be in range
/// (steer in `[-1, 1]`, throttle and brake in `[0, 1]`); the snapshot itself
/// does not enforce it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ControlSnapshot {
    pub steer: f32,
    pub throttle: f32,
    pub brake: f32,
}

impl ControlSnapshot {
    /// Create a snapshot from raw actuator values
    pub fn new(steer: f32, throttle: f32, brake: f32) -> Self {
        Self { steer, throttle, brake }
    }

    /// Render the telemetry line sent after the three images.
    ///
    /// Always four decimals with `.` as separator, newline terminated.
    pub fn to_line(&self) -> String {
        format!("{:.4},{:.4},{:.4}\n", self.steer, self.throttle, self.brake)
    }

    /// Parse a telemetry line produced by [`ControlSnapshot::to_line`].
    pub fn parse_line(line: &str) -> Result<Self> {
        let [steer, throttle, brake] = parse_triple(line, "telemetry line")?;
        Ok(Self { steer, throttle, brake })
    }
}

impl fmt::Display for ControlSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "steer={:.2} throttle={:.2} brake={:.2}", self.steer, self.throttle, self.brake)
    }
}

/// A command received from the peer, not yet clamped.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InboundCommand {
    pub steer: f32,
    pub throttle: f32,
    pub brake: f32,
}

impl InboundCommand {
    /// Create a command from raw values
    pub fn new(steer: f32, throttle: f32, brake: f32) -> Self {
        Self { steer, throttle, brake }
    }

    /// Parse one command line: `"<steer>,<throttle>,<brake>"`.
    ///
    /// Exactly three comma separated fields, each a finite float with `.` as
    /// decimal separator. Surrounding whitespace and a trailing `\r\n` are
    /// ignored.
    pub fn parse(line: &str) -> Result<Self> {
        let [steer, throttle, brake] = parse_triple(line, "command line")?;
        Ok(Self { steer, throttle, brake })
    }

    /// Clamp into actuator range: steer to `[-1, 1]`, throttle and brake to `[0, 1]`.
    pub fn clamped(self) -> ControlSnapshot {
        ControlSnapshot {
            steer: self.steer.clamp(-1.0, 1.0),
            throttle: self.throttle.clamp(0.0, 1.0),
            brake: self.brake.clamp(0.0, 1.0),
        }
    }

    /// Render as a command line, newline terminated.
    pub fn to_line(&self) -> String {
        format!("{},{},{}\n", self.steer, self.throttle, self.brake)
    }
}

impl FromStr for InboundCommand {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn parse_triple(line: &str, context: &str) -> Result<[f32; 3]> {
    let line = line.trim_end_matches(['\r', '\n']);
    let mut values = [0.0f32; 3];
    let mut fields = line.split(',');

    for (index, slot) in values.iter_mut().enumerate() {
        let field = fields.next().ok_or_else(|| {
            BridgeError::protocol(context, format!("expected 3 fields, found {}", index))
        })?;
        let value: f32 = field.trim().parse().map_err(|_| {
            BridgeError::protocol(context, format!("field {} is not a number: {:?}", index, field))
        })?;
        if !value.is_finite() {
            return Err(BridgeError::protocol(
                context,
                format!("field {} is not finite: {:?}", index, field),
            ));
        }
        *slot = value;
    }

    if fields.next().is_some() {
        let count = line.split(',').count();
        return Err(BridgeError::protocol(context, format!("expected 3 fields, found {}", count)));
    }

    Ok(values)
}
