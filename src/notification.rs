use crate::protocol::Notification;
use crate::state::{VehicleCommandState, VehicleTelemetryState};

/// Packs the current state into the two-byte operator notification.
///
/// ```text
/// byte0: 0 0 s s s d d m    speed(3) direction(2) mode(1)
/// byte1: 0 0 0 o o o b b    obstacle pairs(3) battery(2)
/// ```
pub fn encode(telemetry: &VehicleTelemetryState, command: &VehicleCommandState) -> Notification {
    let byte0 = ((telemetry.speed_raw & 0x07) << 3) | ((telemetry.direction & 0x03) << 1) | command.mode.bit();
    let byte1 = ((telemetry.obstacle_bitmask & 0x07) << 2) | (telemetry.battery_level & 0x03);
    Notification([byte0, byte1])
}
