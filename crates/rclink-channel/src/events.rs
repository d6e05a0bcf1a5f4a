//! Notifications published by a session

use crate::receiver::ReceiverExit;

/// Events broadcast to every subscriber of a session.
///
/// Delivery never blocks the receiver: a subscriber that falls behind the
/// channel capacity sees `RecvError::Lagged` and skips the oldest events.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A telemetry payload was merged into the reported state.
    DataReceived {
        /// 1-based count of merged payloads in this session
        sequence: u64,
        /// Keys present in the merged payload
        keys: Vec<String>,
    },

    /// The receiver stopped; no further `DataReceived` events will follow.
    ReceiverStopped { exit: ReceiverExit },
}
