//! Telemetry readings and their severity classification

use serde::Serialize;

use crate::value::Value;

/// Distance (cm) below which a collision is imminent
pub const DISTANCE_CRITICAL_CM: f64 = 10.0;
/// Distance (cm) below which the driver should be warned
pub const DISTANCE_WARNING_CM: f64 = 25.0;
/// Speed (m/s) above which the vehicle is too fast
pub const SPEED_CRITICAL: f64 = 30.0;
/// Speed (m/s) above which the driver should be warned
pub const SPEED_WARNING: f64 = 20.0;

/// How alarming a reading is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Normal,
    Warning,
    Critical,
}

/// One snapshot of the vehicle's reported readings.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Telemetry {
    pub distance: f64,
    pub speed: f64,
    pub line: bool,
}

impl Telemetry {
    /// Build from the reported values of `distance`, `speed` and `line`.
    pub fn from_values(distance: Value, speed: Value, line: Value) -> Self {
        Self {
            distance: distance.as_f64(),
            speed: speed.as_f64(),
            line: line.is_truthy(),
        }
    }

    /// A distance of zero means nothing has been reported yet, which the
    /// classification treats the same as an obstacle at zero range.
    pub fn distance_severity(&self) -> Severity {
        if self.distance < DISTANCE_CRITICAL_CM {
            Severity::Critical
        } else if self.distance < DISTANCE_WARNING_CM {
            Severity::Warning
        } else {
            Severity::Normal
        }
    }

    pub fn speed_severity(&self) -> Severity {
        if self.speed > SPEED_CRITICAL {
            Severity::Critical
        } else if self.speed > SPEED_WARNING {
            Severity::Warning
        } else {
            Severity::Normal
        }
    }
}
