use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, trace, warn};

use crate::command::{self, OperatorCommand};
use crate::config::{CanIds, GatewayConfig, SensorSafetyParams};
use crate::error::{DecodeError, TransportError};
use crate::mux::CommandMultiplexer;
use crate::notification;
use crate::protocol::{CanFrame, Notification};
use crate::safety::{GovernorReport, SafetyGovernor};
use crate::sensors::{ObstacleDetector, RangeObstacleDetector, RoadDetector, StaticRoadDetector};
use crate::state::{RoadHazard, VehicleCommandState, VehicleTelemetryState, SENSOR_COUNT};
use crate::telemetry::{TelemetryDecoder, TelemetryKind};

pub type BoxedObstacleDetector = Box<dyn ObstacleDetector + Send>;
pub type BoxedRoadDetector = Box<dyn RoadDetector + Send>;

/// Duration of the most recent run of each callback, in microseconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct CallbackTimings {
    pub command_write: u32,
    pub bus_frame: u32,
    pub governor: u32,
    pub bus_send: u32,
    pub camera: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct ControllerStats {
    pub commands_applied: u32,
    pub commands_rejected: u32,
    pub frames_received: u32,
    pub frames_unrecognized: u32,
    pub frames_sent: u32,
    pub governor_cycles: u32,
    pub interlock_transitions: u32,
    pub camera_samples: u32,
    pub last_callback: CallbackTimings,
}

/// Owner of the vehicle state and of every component that reads or writes it.
///
/// Each `on_*` method is one reactor callback. They run to completion and
/// never overlap, which is what lets the two state records go unlocked.
pub struct VehicleController {
    command: VehicleCommandState,
    telemetry: VehicleTelemetryState,
    decoder: TelemetryDecoder<BoxedObstacleDetector>,
    governor: SafetyGovernor,
    mux: CommandMultiplexer,
    road_detector: BoxedRoadDetector,
    stats: ControllerStats,
    start_time: Instant,
}

impl VehicleController {
    pub fn new(
        ids: CanIds,
        params: [SensorSafetyParams; SENSOR_COUNT],
        obstacle_detector: BoxedObstacleDetector,
        road_detector: BoxedRoadDetector,
    ) -> Self {
        Self {
            command: VehicleCommandState::new(),
            telemetry: VehicleTelemetryState::new(),
            decoder: TelemetryDecoder::new(ids, obstacle_detector),
            governor: SafetyGovernor::new(params),
            mux: CommandMultiplexer::new(ids),
            road_detector,
            stats: ControllerStats::default(),
            start_time: Instant::now(),
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(
            config.bus.ids,
            config.sensor_params(),
            Box::new(RangeObstacleDetector::new(config.proximity.max_range_cm)),
            Box::new(StaticRoadDetector::new(config.vision.fixed_hazard)),
        )
    }

    /// Operator wrote the command characteristic.
    pub fn on_command_write(&mut self, value: &[u8]) -> Result<OperatorCommand, DecodeError> {
        let started = Instant::now();

        let result = command::apply_write(&mut self.command, value);
        match &result {
            Ok(decoded) => {
                self.stats.commands_applied = self.stats.commands_applied.wrapping_add(1);
                debug!("Operator command: {:?}", decoded);
            }
            Err(e) => {
                self.stats.commands_rejected = self.stats.commands_rejected.wrapping_add(1);
                warn!("Ignoring operator write {:02x?}: {}", value, e);
            }
        }

        self.stats.last_callback.command_write = elapsed_us(started);
        trace!("on_command_write: {}us", self.stats.last_callback.command_write);
        result
    }

    /// A frame arrived from the vehicle bus. Returns the notification to push.
    pub fn on_bus_frame(&mut self, frame: &CanFrame) -> Result<Notification, TransportError> {
        let started = Instant::now();

        let kind = self.decoder.decode(frame, &mut self.telemetry)?;
        self.stats.frames_received = self.stats.frames_received.wrapping_add(1);
        if kind == TelemetryKind::Unrecognized {
            self.stats.frames_unrecognized = self.stats.frames_unrecognized.wrapping_add(1);
            trace!("Ignoring bus frame {:#05x}", frame.id);
        }

        let notification = notification::encode(&self.telemetry, &self.command);

        self.stats.last_callback.bus_frame = elapsed_us(started);
        trace!("on_bus_frame({:?}): {}us", kind, self.stats.last_callback.bus_frame);
        Ok(notification)
    }

    /// Governor timer fired.
    pub fn on_governor_tick(&mut self) -> GovernorReport {
        let started = Instant::now();
        let now_ms = self.uptime_ms();

        let report = self.governor.evaluate(now_ms, &self.telemetry, &mut self.command);
        self.stats.governor_cycles = self.stats.governor_cycles.wrapping_add(1);
        if report.interlock_changed {
            self.stats.interlock_transitions = self.stats.interlock_transitions.wrapping_add(1);
        }

        self.stats.last_callback.governor = elapsed_us(started);
        trace!("on_governor_tick: {}us", self.stats.last_callback.governor);
        report
    }

    /// Bus send timer fired. Returns the single frame to transmit.
    pub fn on_bus_send_tick(&mut self) -> CanFrame {
        let started = Instant::now();

        let frame = self.mux.tick(&self.command);
        self.stats.frames_sent = self.stats.frames_sent.wrapping_add(1);

        self.stats.last_callback.bus_send = elapsed_us(started);
        trace!("on_bus_send_tick: {}us", self.stats.last_callback.bus_send);
        frame
    }

    /// Camera timer fired. Samples the latest road classification.
    pub fn on_camera_tick(&mut self) -> RoadHazard {
        let started = Instant::now();

        let hazard = self.road_detector.detect();
        if hazard != self.telemetry.road_hazard {
            debug!("Road hazard {:?} -> {:?}", self.telemetry.road_hazard, hazard);
        }
        self.telemetry.road_hazard = hazard;
        self.stats.camera_samples = self.stats.camera_samples.wrapping_add(1);

        self.stats.last_callback.camera = elapsed_us(started);
        trace!("on_camera_tick: {}us", self.stats.last_callback.camera);
        hazard
    }

    pub fn command_state(&self) -> &VehicleCommandState {
        &self.command
    }

    pub fn telemetry_state(&self) -> &VehicleTelemetryState {
        &self.telemetry
    }

    pub fn governor(&self) -> &SafetyGovernor {
        &self.governor
    }

    pub fn stats(&self) -> &ControllerStats {
        &self.stats
    }

    fn uptime_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }
}

fn elapsed_us(started: Instant) -> u32 {
    u32::try_from(started.elapsed().as_micros()).unwrap_or(u32::MAX)
}
