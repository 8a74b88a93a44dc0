use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};
use static_assertions::const_assert_eq;

use crate::error::TransportError;
use crate::state::DriveMode;

pub const MAX_CAN_PAYLOAD: usize = 8;
/// Size of a classic `SocketCAN` `struct can_frame` on the wire.
pub const WIRE_FRAME_LEN: usize = 16;
pub const NOTIFICATION_LEN: usize = 2;

const CAN_HEADER_LEN: usize = 8;
const_assert_eq!(CAN_HEADER_LEN + MAX_CAN_PAYLOAD, WIRE_FRAME_LEN);

/// Drops the `SocketCAN` EFF/RTR/ERR flag bits from a raw identifier.
const CAN_ID_MASK: u32 = 0x1FFF_FFFF;

pub type CanPayload = ArrayVec<u8, MAX_CAN_PAYLOAD>;

/// One classic CAN frame as seen by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanFrame {
    pub id: u32,
    pub data: CanPayload,
}

impl CanFrame {
    pub fn new(id: u32, data: &[u8]) -> Result<Self, TransportError> {
        let mut payload = CanPayload::new();
        payload
            .try_extend_from_slice(data)
            .map_err(|_| TransportError::Malformed {
                id,
                reason: "payload longer than 8 bytes",
            })?;
        Ok(Self { id, data: payload })
    }

    /// Two-byte little-endian command frame, as the drive controller expects.
    pub fn command(id: u32, value: u16) -> Self {
        let mut data = CanPayload::new();
        data.extend(value.to_le_bytes());
        Self { id, data }
    }

    pub fn dlc(&self) -> usize {
        self.data.len()
    }

    /// First `N` payload bytes, or a malformed-frame error if the frame is shorter.
    pub fn payload<const N: usize>(&self) -> Result<[u8; N], TransportError> {
        self.data
            .get(..N)
            .and_then(|bytes| <[u8; N]>::try_from(bytes).ok())
            .ok_or(TransportError::Malformed {
                id: self.id,
                reason: "payload shorter than required",
            })
    }

    /// Value of a two-byte little-endian command frame.
    pub fn command_value(&self) -> Result<u16, TransportError> {
        self.payload::<2>().map(u16::from_le_bytes)
    }

    /// Encodes in the `SocketCAN` `can_frame` layout: id (LE u32), dlc, 3 pad bytes, 8 data bytes.
    pub fn to_wire(&self) -> [u8; WIRE_FRAME_LEN] {
        let mut wire = [0u8; WIRE_FRAME_LEN];
        wire[..4].copy_from_slice(&self.id.to_le_bytes());
        wire[4] = self.data.len() as u8;
        wire[CAN_HEADER_LEN..CAN_HEADER_LEN + self.data.len()].copy_from_slice(&self.data);
        wire
    }

    /// Decodes a received datagram. Anything but a complete frame is fatal.
    pub fn from_wire(bytes: &[u8]) -> Result<Self, TransportError> {
        if bytes.len() != WIRE_FRAME_LEN {
            return Err(TransportError::FrameLength {
                got: bytes.len(),
                expected: WIRE_FRAME_LEN,
            });
        }

        let id = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) & CAN_ID_MASK;
        let dlc = usize::from(bytes[4]);
        if dlc > MAX_CAN_PAYLOAD {
            return Err(TransportError::Malformed {
                id,
                reason: "dlc greater than 8",
            });
        }

        Self::new(id, &bytes[CAN_HEADER_LEN..CAN_HEADER_LEN + dlc])
    }
}

/// Two-byte status pushed to the operator after each telemetry update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification(pub [u8; NOTIFICATION_LEN]);

impl Notification {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Unpacks the fields the encoder squeezed into the two bytes.
    pub fn decode(self) -> NotificationFields {
        let [byte0, byte1] = self.0;
        NotificationFields {
            speed: (byte0 >> 3) & 0x07,
            direction: (byte0 >> 1) & 0x03,
            mode: DriveMode::from_bit(byte0),
            obstacle_bitmask: (byte1 >> 2) & 0x07,
            battery_level: byte1 & 0x03,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationFields {
    pub speed: u8,
    pub direction: u8,
    pub mode: DriveMode,
    pub obstacle_bitmask: u8,
    pub battery_level: u8,
}

/// Builds an operator command byte: state code in the top three bits,
/// direction in the bottom three.
pub fn command_byte(state_code: u8, direction: u8) -> u8 {
    ((state_code & 0x07) << 5) | (direction & 0x07)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_layout() {
        let frame = CanFrame::new(0x011, &[0x05]).unwrap();
        let wire = frame.to_wire();
        assert_eq!(&wire[..5], &[0x11, 0x00, 0x00, 0x00, 0x01]);
        assert_eq!(wire[8], 0x05);
        assert_eq!(CanFrame::from_wire(&wire).unwrap(), frame);
    }

    #[test]
    fn test_short_datagram_is_fatal() {
        let result = CanFrame::from_wire(&[0u8; 12]);
        assert!(matches!(result, Err(TransportError::FrameLength { got: 12, expected: 16 })));
    }

    #[test]
    fn test_oversized_dlc_is_fatal() {
        let mut wire = [0u8; WIRE_FRAME_LEN];
        wire[4] = 9;
        assert!(matches!(CanFrame::from_wire(&wire), Err(TransportError::Malformed { .. })));
    }

    #[test]
    fn test_command_frame_little_endian() {
        let frame = CanFrame::command(0x003, 2);
        assert_eq!(frame.data.as_slice(), &[0x02, 0x00]);
        assert_eq!(frame.command_value().unwrap(), 2);
    }

    #[test]
    fn test_payload_too_short() {
        let frame = CanFrame::new(0x000, &[1, 2, 3]).unwrap();
        assert!(frame.payload::<6>().is_err());
        assert_eq!(frame.payload::<1>().unwrap(), [1]);
    }

    #[test]
    fn test_command_byte_layout() {
        assert_eq!(command_byte(2, 1), 0b010_00_001);
        assert_eq!(command_byte(7, 7), 0xE7);
    }
}
