//! Shared key vocabulary for the command and telemetry tables
//!
//! The wire protocol identifies every control and every telemetry reading by
//! a snake_case string. Both the channel and its front-ends refer to these
//! enums instead of repeating the literals.

use serde::{Deserialize, Serialize};

use crate::error::Error;

// ============================================================================
// CommandKey
// ============================================================================

/// A control the client can set on the vehicle.
///
/// The declaration order is the order keys appear in the transmitted
/// command table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKey {
    Forward,
    Backward,
    TurnLeft,
    TurnRight,
    RightIndicator,
    LeftIndicator,
    HazardWarning,
    Lights,
    Horn,
    Reverse,
    DistanceKeeping,
    LineFollowing,
    KeepContained,
    ChangeDirection,
}

impl CommandKey {
    /// Every command key, in wire order.
    pub const ALL: [CommandKey; 14] = [
        CommandKey::Forward,
        CommandKey::Backward,
        CommandKey::TurnLeft,
        CommandKey::TurnRight,
        CommandKey::RightIndicator,
        CommandKey::LeftIndicator,
        CommandKey::HazardWarning,
        CommandKey::Lights,
        CommandKey::Horn,
        CommandKey::Reverse,
        CommandKey::DistanceKeeping,
        CommandKey::LineFollowing,
        CommandKey::KeepContained,
        CommandKey::ChangeDirection,
    ];

    /// Autonomous driving modes, switched off before a session closes.
    pub const AUTONOMY: [CommandKey; 3] = [
        CommandKey::DistanceKeeping,
        CommandKey::LineFollowing,
        CommandKey::KeepContained,
    ];

    /// Wire name of this key
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKey::Forward => "forward",
            CommandKey::Backward => "backward",
            CommandKey::TurnLeft => "turn_left",
            CommandKey::TurnRight => "turn_right",
            CommandKey::RightIndicator => "right_indicator",
            CommandKey::LeftIndicator => "left_indicator",
            CommandKey::HazardWarning => "hazard_warning",
            CommandKey::Lights => "lights",
            CommandKey::Horn => "horn",
            CommandKey::Reverse => "reverse",
            CommandKey::DistanceKeeping => "distance_keeping",
            CommandKey::LineFollowing => "line_following",
            CommandKey::KeepContained => "keep_contained",
            CommandKey::ChangeDirection => "change_direction",
        }
    }

    /// Momentary controls are active only while held (movement and horn).
    ///
    /// Every other control latches: it flips on each activation.
    pub fn is_momentary(&self) -> bool {
        matches!(
            self,
            CommandKey::Forward
                | CommandKey::Backward
                | CommandKey::TurnLeft
                | CommandKey::TurnRight
                | CommandKey::Horn
        )
    }

    /// Whether this key switches an autonomous driving mode
    pub fn is_autonomy(&self) -> bool {
        Self::AUTONOMY.contains(self)
    }
}

impl std::fmt::Display for CommandKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for CommandKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::str::FromStr for CommandKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| Error::unknown_key(s))
    }
}

// ============================================================================
// TelemetryKey
// ============================================================================

/// A reading the vehicle reports back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryKey {
    /// Distance to the nearest obstacle, in centimetres
    Distance,
    /// Current speed, in metres per second
    Speed,
    /// Line sensor: `true` while a line is detected
    Line,
}

impl TelemetryKey {
    pub const ALL: [TelemetryKey; 3] = [
        TelemetryKey::Distance,
        TelemetryKey::Speed,
        TelemetryKey::Line,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TelemetryKey::Distance => "distance",
            TelemetryKey::Speed => "speed",
            TelemetryKey::Line => "line",
        }
    }
}

impl std::fmt::Display for TelemetryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for TelemetryKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::str::FromStr for TelemetryKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| Error::unknown_key(s))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_key_wire_names() {
        let names: Vec<&str> = CommandKey::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "forward",
                "backward",
                "turn_left",
                "turn_right",
                "right_indicator",
                "left_indicator",
                "hazard_warning",
                "lights",
                "horn",
                "reverse",
                "distance_keeping",
                "line_following",
                "keep_contained",
                "change_direction",
            ]
        );
    }

    #[test]
    fn test_serde_matches_as_str() {
        for key in CommandKey::ALL {
            let json = serde_json::to_string(&key).unwrap();
            assert_eq!(json, format!("\"{}\"", key.as_str()));
        }
        for key in TelemetryKey::ALL {
            let json = serde_json::to_string(&key).unwrap();
            assert_eq!(json, format!("\"{}\"", key.as_str()));
        }
    }

    #[test]
    fn test_from_str_roundtrip_and_unknown() {
        assert_eq!("turn_left".parse::<CommandKey>().unwrap(), CommandKey::TurnLeft);
        assert_eq!("speed".parse::<TelemetryKey>().unwrap(), TelemetryKey::Speed);

        let err = "warp_drive".parse::<CommandKey>().unwrap_err();
        assert!(matches!(err, Error::UnknownKey { ref key } if key == "warp_drive"));
        assert!("forward".parse::<TelemetryKey>().is_err());
    }

    #[test]
    fn test_momentary_controls() {
        let momentary: Vec<CommandKey> = CommandKey::ALL
            .into_iter()
            .filter(CommandKey::is_momentary)
            .collect();
        assert_eq!(
            momentary,
            vec![
                CommandKey::Forward,
                CommandKey::Backward,
                CommandKey::TurnLeft,
                CommandKey::TurnRight,
                CommandKey::Horn,
            ]
        );
        assert!(!CommandKey::Lights.is_momentary());
        assert!(!CommandKey::Reverse.is_momentary());
    }

    #[test]
    fn test_autonomy_keys() {
        assert!(CommandKey::LineFollowing.is_autonomy());
        assert!(CommandKey::KeepContained.is_autonomy());
        assert!(!CommandKey::ChangeDirection.is_autonomy());
        assert!(!CommandKey::Forward.is_autonomy());
    }
}
