//! Operator command decoding.
//!
//! One byte per write: the top three bits select an operator state, the
//! bottom three bits carry the direction code.

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::state::{DriveMode, VehicleCommandState};

/// Decoded operator intent for a single write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorCommand {
    pub idle: bool,
    pub mode: DriveMode,
    pub moving: bool,
    pub turbo: bool,
    pub direction: u8,
}

// (idle, mode, moving, turbo) indexed by state code.
const STATE_TABLE: [(bool, DriveMode, bool, bool); 7] = [
    (false, DriveMode::Manual, false, false),
    (true, DriveMode::Manual, false, false),
    (true, DriveMode::Manual, true, false),
    (true, DriveMode::Manual, false, true),
    (true, DriveMode::Manual, true, true),
    (false, DriveMode::Autonomous, false, false),
    (true, DriveMode::Autonomous, false, false),
];

pub fn decode(byte: u8) -> Result<OperatorCommand, DecodeError> {
    let code = byte >> 5;
    let direction = byte & 0x07;

    let &(idle, mode, moving, turbo) = STATE_TABLE
        .get(usize::from(code))
        .ok_or(DecodeError::UndefinedStateCode { code, byte })?;

    Ok(OperatorCommand {
        idle,
        mode,
        moving,
        turbo,
        direction,
    })
}

impl VehicleCommandState {
    /// Applies a decoded operator command. Leaves the interlock untouched.
    pub fn apply(&mut self, command: OperatorCommand) {
        self.idle = command.idle;
        self.mode = command.mode;
        self.moving = command.moving;
        self.turbo = command.turbo;
        self.direction = command.direction;
    }
}

/// Decodes a characteristic write and applies it to `state`.
///
/// Only the first byte of the write is meaningful. On error the state is
/// left exactly as it was.
pub fn apply_write(state: &mut VehicleCommandState, value: &[u8]) -> Result<OperatorCommand, DecodeError> {
    let byte = *value.first().ok_or(DecodeError::EmptyWrite)?;
    let command = decode(byte)?;
    state.apply(command);
    Ok(command)
}
