//! Shared vehicle state.
//!
//! Two long-lived records tie the callbacks together: [`VehicleCommandState`]
//! (the "out" side, what we ask the vehicle to do) and
//! [`VehicleTelemetryState`] (the "in" side, what the vehicle reports).
//! Both are owned by the controller and handed out by reference; there is no
//! queue between producers and consumers.

use serde::{Deserialize, Serialize};
use static_assertions::const_assert_eq;

/// Number of ultrasound channels on the vehicle.
pub const SENSOR_COUNT: usize = 6;

// Sensors are grouped in pairs for the notification bitmask.
const_assert_eq!(SENSOR_COUNT % 2, 0);

/// Direction code reported/commanded when the vehicle is not moving.
pub const DIRECTION_STOPPED: u8 = 3;
/// Direction code forced on the bus while in autonomous mode.
pub const DIRECTION_AUTONOMOUS_FORWARD: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DriveMode {
    #[default]
    Manual,
    Autonomous,
}

impl DriveMode {
    /// Single-bit encoding used on the wireless link.
    pub fn bit(self) -> u8 {
        match self {
            DriveMode::Manual => 0,
            DriveMode::Autonomous => 1,
        }
    }

    pub fn from_bit(bit: u8) -> Self {
        if bit & 0x01 == 0 {
            DriveMode::Manual
        } else {
            DriveMode::Autonomous
        }
    }
}

/// Classification produced by the vision subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RoadHazard {
    #[default]
    Clear,
    LeftWarn,
    RightWarn,
    LeftCritical,
    RightCritical,
}

impl RoadHazard {
    pub fn is_critical(self) -> bool {
        matches!(self, RoadHazard::LeftCritical | RoadHazard::RightCritical)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Obstacle {
    pub detected: bool,
    pub distance_cm: u16,
}

impl Obstacle {
    pub const NONE: Obstacle = Obstacle {
        detected: false,
        distance_cm: 0,
    };

    pub fn at(distance_cm: u16) -> Self {
        Self {
            detected: true,
            distance_cm,
        }
    }
}

/// Operator-facing half of the vehicle state.
///
/// Every field except the interlock is written by the command decoder. The
/// interlock is private: only the safety governor may move it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct VehicleCommandState {
    pub mode: DriveMode,
    pub direction: u8,
    pub moving: bool,
    pub turbo: bool,
    pub idle: bool,
    autonomous_locked: bool,
}

impl VehicleCommandState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Safety interlock. When set, the commanded speed is forced to zero.
    pub fn autonomous_locked(&self) -> bool {
        self.autonomous_locked
    }

    pub(crate) fn set_autonomous_locked(&mut self, locked: bool) {
        self.autonomous_locked = locked;
    }
}

/// Vehicle-reported half of the state, fed from the bus and the camera.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VehicleTelemetryState {
    pub speed_raw: u8,
    pub direction: u8,
    pub battery_level: u8,
    pub obstacles: [Obstacle; SENSOR_COUNT],
    pub obstacle_bitmask: u8,
    pub road_hazard: RoadHazard,
}

impl VehicleTelemetryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a fresh set of obstacles and recomputes the pair bitmask.
    pub fn set_obstacles(&mut self, obstacles: [Obstacle; SENSOR_COUNT]) {
        self.obstacles = obstacles;
        self.obstacle_bitmask = obstacle_bitmask(&obstacles);
    }
}

/// Packs the obstacle array into three bits, one per sensor pair.
///
/// Pair {0,1} lands on bit 2, {2,3} on bit 1 and {4,5} on bit 0.
pub fn obstacle_bitmask(obstacles: &[Obstacle; SENSOR_COUNT]) -> u8 {
    obstacles
        .chunks_exact(2)
        .fold(0u8, |mask, pair| {
            (mask << 1) | u8::from(pair[0].detected || pair[1].detected)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitmask_pairs() {
        let mut obstacles = [Obstacle::NONE; SENSOR_COUNT];
        assert_eq!(obstacle_bitmask(&obstacles), 0b000);

        obstacles[1] = Obstacle::at(30);
        assert_eq!(obstacle_bitmask(&obstacles), 0b100);

        obstacles[2] = Obstacle::at(30);
        obstacles[3] = Obstacle::at(30);
        assert_eq!(obstacle_bitmask(&obstacles), 0b110);

        obstacles[5] = Obstacle::at(30);
        assert_eq!(obstacle_bitmask(&obstacles), 0b111);
    }

    #[test]
    fn test_interlock_starts_released() {
        let state = VehicleCommandState::new();
        assert!(!state.autonomous_locked());
        assert_eq!(state.mode, DriveMode::Manual);
    }

    #[test]
    fn test_mode_bit_roundtrip() {
        assert_eq!(DriveMode::Manual.bit(), 0);
        assert_eq!(DriveMode::Autonomous.bit(), 1);
        assert_eq!(DriveMode::from_bit(3), DriveMode::Autonomous);
    }
}
