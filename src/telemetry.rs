//! Vehicle telemetry decoding.
//!
//! Frames arrive from the bus in no guaranteed order. Each handler only
//! touches the telemetry fields tied to its identifier; derived fields are
//! recomputed from whatever is currently stored.

use crate::config::CanIds;
use crate::error::TransportError;
use crate::protocol::CanFrame;
use crate::sensors::ObstacleDetector;
use crate::state::{VehicleTelemetryState, DIRECTION_STOPPED, SENSOR_COUNT};

/// Which telemetry message a frame carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryKind {
    Ultrasound,
    Speed,
    Direction,
    Battery,
    Unrecognized,
}

pub struct TelemetryDecoder<D> {
    ids: CanIds,
    detector: D,
}

impl<D: ObstacleDetector> TelemetryDecoder<D> {
    pub fn new(ids: CanIds, detector: D) -> Self {
        Self { ids, detector }
    }

    pub fn classify(&self, id: u32) -> TelemetryKind {
        match id {
            id if id == self.ids.ultrasound => TelemetryKind::Ultrasound,
            id if id == self.ids.speed_data => TelemetryKind::Speed,
            id if id == self.ids.direction_data => TelemetryKind::Direction,
            id if id == self.ids.battery => TelemetryKind::Battery,
            _ => TelemetryKind::Unrecognized,
        }
    }

    /// Folds one frame into `state`.
    ///
    /// A recognised frame with a truncated payload is a transport error.
    /// Unknown identifiers are ignored.
    pub fn decode(&self, frame: &CanFrame, state: &mut VehicleTelemetryState) -> Result<TelemetryKind, TransportError> {
        let kind = self.classify(frame.id);

        match kind {
            TelemetryKind::Ultrasound => {
                let raw = frame.payload::<SENSOR_COUNT>()?;
                state.set_obstacles(self.detector.detect(&raw));
            }
            TelemetryKind::Speed => {
                let [speed] = frame.payload::<1>()?;
                state.speed_raw = speed / 10;
                if state.speed_raw == 0 {
                    state.direction = DIRECTION_STOPPED;
                }
            }
            TelemetryKind::Direction => {
                let [direction] = frame.payload::<1>()?;
                // Speed may be stale here; the latest stored value is the best we have.
                state.direction = if state.speed_raw == 0 {
                    DIRECTION_STOPPED
                } else {
                    direction
                };
            }
            TelemetryKind::Battery => {
                let [battery] = frame.payload::<1>()?;
                state.battery_level = battery;
            }
            TelemetryKind::Unrecognized => {}
        }

        Ok(kind)
    }
}
