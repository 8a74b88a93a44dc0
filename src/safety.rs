use heapless::Vec;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{default_sensor_params, SensorSafetyParams};
use crate::state::{RoadHazard, VehicleCommandState, VehicleTelemetryState, SENSOR_COUNT};

const MAX_INTERLOCK_EVENTS: usize = 16;

/// Converts the raw bus speed into the unit the thresholds are expressed in.
pub const SPEED_RAW_TO_DMPS: f32 = 0.36;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopTrigger {
    Obstacle { sensor: usize, distance_cm: u16 },
    RoadHazard(RoadHazard),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterlockEvent {
    pub locked: bool,
    pub trigger: Option<StopTrigger>,
    pub timestamp: u64,
}

/// Outcome of one governor cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GovernorReport {
    pub stop_vote: bool,
    pub trigger: Option<StopTrigger>,
    pub interlock_changed: bool,
}

#[derive(Debug)]
pub struct SafetyGovernor {
    params: [SensorSafetyParams; SENSOR_COUNT],
    stop_prev: bool,
    event_history: Vec<InterlockEvent, MAX_INTERLOCK_EVENTS>,
}

impl SafetyGovernor {
    pub fn new(params: [SensorSafetyParams; SENSOR_COUNT]) -> Self {
        Self {
            params,
            stop_prev: false,
            event_history: Vec::new(),
        }
    }

    /// Runs one evaluation and moves the interlock on a change of vote.
    ///
    /// Repeating the same vote never writes the interlock again.
    pub fn evaluate(
        &mut self,
        current_time: u64,
        telemetry: &VehicleTelemetryState,
        command: &mut VehicleCommandState,
    ) -> GovernorReport {
        let trigger = self
            .check_obstacles(telemetry)
            .or_else(|| Self::check_road(telemetry.road_hazard));
        let stop_vote = trigger.is_some();

        let interlock_changed = stop_vote != self.stop_prev;
        if interlock_changed {
            command.set_autonomous_locked(stop_vote);
            self.record_event(stop_vote, trigger, current_time);

            if stop_vote {
                warn!("Interlock engaged: {:?}", trigger);
            } else {
                info!("Interlock released");
            }
        }
        self.stop_prev = stop_vote;

        GovernorReport {
            stop_vote,
            trigger,
            interlock_changed,
        }
    }

    fn check_obstacles(&self, telemetry: &VehicleTelemetryState) -> Option<StopTrigger> {
        let speed = effective_speed_dmps(telemetry.speed_raw);

        telemetry
            .obstacles
            .iter()
            .zip(&self.params)
            .position(|(obstacle, params)| obstacle.detected && within_envelope(obstacle.distance_cm, speed, *params))
            .map(|sensor| StopTrigger::Obstacle {
                sensor,
                distance_cm: telemetry.obstacles[sensor].distance_cm,
            })
    }

    fn check_road(hazard: RoadHazard) -> Option<StopTrigger> {
        hazard.is_critical().then_some(StopTrigger::RoadHazard(hazard))
    }

    fn record_event(&mut self, locked: bool, trigger: Option<StopTrigger>, timestamp: u64) {
        if self.event_history.is_full() {
            self.event_history.remove(0);
        }

        let _ = self.event_history.push(InterlockEvent {
            locked,
            trigger,
            timestamp,
        });
    }

    /// The vote from the most recent cycle.
    pub fn last_vote(&self) -> bool {
        self.stop_prev
    }

    pub fn get_event_history(&self) -> &[InterlockEvent] {
        &self.event_history
    }

    pub fn params(&self) -> &[SensorSafetyParams; SENSOR_COUNT] {
        &self.params
    }
}

impl Default for SafetyGovernor {
    fn default() -> Self {
        Self::new(default_sensor_params())
    }
}

pub fn effective_speed_dmps(speed_raw: u8) -> f32 {
    f32::from(speed_raw) * SPEED_RAW_TO_DMPS
}

/// True when an obstacle at `distance_cm` is inside the stopping envelope for `speed`.
pub fn within_envelope(distance_cm: u16, speed: f32, params: SensorSafetyParams) -> bool {
    let threshold = params.speed_threshold_normal_turbo_dmps;
    (distance_cm <= params.detection_distance_normal_cm && speed <= threshold)
        || (distance_cm <= params.detection_distance_turbo_cm && speed > threshold)
}
