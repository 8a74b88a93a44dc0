//! Outgoing drive commands.
//!
//! A single timer feeds two command frames: direction on one tick, speed on
//! the next. Each command therefore refreshes at half the timer rate.

use serde::{Deserialize, Serialize};

use crate::config::CanIds;
use crate::protocol::CanFrame;
use crate::state::{DriveMode, VehicleCommandState, DIRECTION_AUTONOMOUS_FORWARD};

pub const SPEED_STOP: u16 = 0;
pub const SPEED_NORMAL: u16 = 1;
pub const SPEED_TURBO: u16 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MuxPhase {
    #[default]
    Direction,
    Speed,
}

impl MuxPhase {
    fn next(self) -> Self {
        match self {
            MuxPhase::Direction => MuxPhase::Speed,
            MuxPhase::Speed => MuxPhase::Direction,
        }
    }
}

#[derive(Debug)]
pub struct CommandMultiplexer {
    ids: CanIds,
    phase: MuxPhase,
}

impl CommandMultiplexer {
    pub fn new(ids: CanIds) -> Self {
        Self {
            ids,
            phase: MuxPhase::default(),
        }
    }

    /// Phase that the next tick will emit.
    pub fn phase(&self) -> MuxPhase {
        self.phase
    }

    /// Produces exactly one frame and flips the phase.
    pub fn tick(&mut self, state: &VehicleCommandState) -> CanFrame {
        let frame = match self.phase {
            MuxPhase::Direction => CanFrame::command(self.ids.direction_cmd, u16::from(outgoing_direction(state))),
            MuxPhase::Speed => CanFrame::command(self.ids.speed_cmd, outgoing_speed(state)),
        };
        self.phase = self.phase.next();
        frame
    }
}

pub fn outgoing_direction(state: &VehicleCommandState) -> u8 {
    match state.mode {
        DriveMode::Autonomous => DIRECTION_AUTONOMOUS_FORWARD,
        DriveMode::Manual => state.direction,
    }
}

pub fn outgoing_speed(state: &VehicleCommandState) -> u16 {
    let locked = state.autonomous_locked();
    match state.mode {
        DriveMode::Manual if state.moving && !locked => {
            if state.turbo {
                SPEED_TURBO
            } else {
                SPEED_NORMAL
            }
        }
        DriveMode::Autonomous if !locked => SPEED_NORMAL,
        _ => SPEED_STOP,
    }
}
