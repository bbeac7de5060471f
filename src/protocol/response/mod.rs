mod monitor;
mod profile;
mod statistics;

use thiserror::Error;

use crate::prelude::*;

pub use monitor::*;
pub use profile::*;
pub use statistics::*;

use super::{MessageId, RawFrame};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("frame too short: needed {needed} payload bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
    #[error("payload of {0} bytes is not a whole number of records")]
    Misaligned(usize),
    #[error("unexpected parameter mask {0:#04x}")]
    UnexpectedMask(u8),
    #[error("invalid UTF-16 name")]
    InvalidName,
}

/// Implements decoding of a value from the front of a byte slice.
pub trait PartialDecode<T> {
    /// Partially decodes this type from a buffer, advancing the input slice to the next item.
    fn partial_decode(input: &mut &[u8]) -> Option<T>;
}

impl PartialDecode<u8> for u8 {
    fn partial_decode(input: &mut &[u8]) -> Option<u8> {
        let (head, tail) = input.split_first()?;
        *input = tail;
        Some(*head)
    }
}

impl PartialDecode<u16> for u16 {
    fn partial_decode(input: &mut &[u8]) -> Option<u16> {
        let a = <u8>::partial_decode(input)? as u16;
        let b = <u8>::partial_decode(input)? as u16;
        Some((a << 8) | b)
    }
}

impl PartialDecode<u32> for u32 {
    fn partial_decode(input: &mut &[u8]) -> Option<u32> {
        let a = <u16>::partial_decode(input)? as u32;
        let b = <u16>::partial_decode(input)? as u32;
        Some((a << 16) | b)
    }
}

/// A decoded message sent from the device to the host.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Response {
    MonitorStatus(MonitorStatus),
    ProfileTable(ProfileTable),
    ProfileChangeAck(ProfileChangeAck),
    Statistics(Statistics),
    /// Anything we don't understand, or couldn't decode. The payload is kept as-is.
    Unknown(Vec<u8>),
}

/// A frame that has been parsed once and only once, keeping the original bytes for traceability.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParsedMessage {
    pub response: Response,
    pub frame: RawFrame,
}

impl ParsedMessage {
    /// Decodes a complete frame. This never fails: malformed or unrecognized frames become [`Response::Unknown`].
    pub fn decode(frame: RawFrame) -> ParsedMessage {
        let response = match decode_response(&frame) {
            Ok(response) => response,
            Err(e) => {
                warning!("Failed to decode {:?}: {}", frame, e);
                Response::Unknown(frame.payload().to_vec())
            }
        };
        ParsedMessage { response, frame }
    }

    /// The type identifier byte of the underlying frame.
    pub fn message_type(&self) -> u8 {
        self.frame.message_type().unwrap_or_default()
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.response, Response::Unknown(..))
    }
}

fn decode_response(frame: &RawFrame) -> Result<Response, DecodeError> {
    let Some(id) = frame.message_type() else {
        return Err(DecodeError::TooShort {
            needed: 1,
            actual: 0,
        });
    };
    let payload = frame.payload();
    Ok(match MessageId::try_from(id) {
        Ok(MessageId::MonitorV2) => Response::MonitorStatus(MonitorStatus::decode_v2(payload)?),
        Ok(MessageId::MonitorV1) => Response::MonitorStatus(MonitorStatus::decode_v1(payload)?),
        Ok(MessageId::ProfileNameRead) => Response::ProfileTable(ProfileTable::decode(payload)?),
        Ok(MessageId::ProfileSelection) => {
            Response::ProfileChangeAck(ProfileChangeAck::decode(payload)?)
        }
        Ok(MessageId::StatisticsRead) => {
            Response::Statistics(Statistics::decode(frame.sub_type(), payload)?)
        }
        _ => {
            trace_packet!("Unrecognized message type {:#04x}", id);
            Response::Unknown(payload.to_vec())
        }
    })
}

/// Checks that `payload` holds at least `needed` bytes.
pub(crate) fn require(payload: &[u8], needed: usize) -> Result<(), DecodeError> {
    if payload.len() < needed {
        Err(DecodeError::TooShort {
            needed,
            actual: payload.len(),
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::protocol::{MachineEnum, MachineState, NozzleState};
    use rstest::*;

    #[rstest]
    #[case(&crate::protocol::test::RESPONSE_BREW_RECEIVED)]
    #[case(&crate::protocol::test::RESPONSE_STATUS_DEVICE_READY)]
    #[case(&crate::protocol::test::RESPONSE_STATUS_TANK_DETACHED)]
    #[case(&crate::protocol::test::RESPONSE_STATUS_DEVICE_OFF)]
    #[case(&crate::protocol::test::RESPONSE_STATUS_DISPENSING)]
    #[case(&crate::protocol::test::RESPONSE_STATUS_WATER_SHORTAGE)]
    fn real_packets_decode_as_expected(#[case] bytes: &[u8]) {
        let frame = RawFrame::from_slice(bytes);
        assert!(frame.is_valid());
        let message = ParsedMessage::decode(frame.clone());
        assert_eq!(message.frame, frame);
        // Not actually testing the decoding of these packets, but at least we can print it
        println!("{:?}", message.response);
    }

    #[test]
    fn decode_monitor_v2() {
        let message = ParsedMessage::decode(RawFrame::from_slice(
            &crate::protocol::test::RESPONSE_STATUS_DEVICE_READY,
        ));
        let Response::MonitorStatus(status) = message.response else {
            panic!("Expected a monitor status, got {:?}", message.response);
        };
        assert!(status.powered);
        assert_eq!(status.state, MachineEnum::Value(MachineState::ReadyOrDispensing));
        assert_eq!(status.nozzle, Some(MachineEnum::Value(NozzleState::Steam)));
        assert_eq!(status.switches, 0x05);
        assert_eq!(status.alarms, 0);
    }

    #[test]
    fn unknown_type_is_not_an_error() {
        let message = ParsedMessage::decode(RawFrame::inbound(0x83, 0xf0, &[1, 0]).expect("Frame too long"));
        assert_eq!(message.response, Response::Unknown(vec![1, 0]));
        assert_eq!(message.message_type(), 0x83);
    }

    #[test]
    fn malformed_payload_is_unknown() {
        // A statistics page that doesn't end on a record boundary
        let message = ParsedMessage::decode(RawFrame::inbound(0xa2, 0x0f, &[0, 100, 0, 0, 0, 1, 0]).expect("Frame too long"));
        assert!(message.is_unknown());
        // A monitor frame with no payload
        let message = ParsedMessage::decode(RawFrame::inbound(0x75, 0x0f, &[]).expect("Frame too long"));
        assert!(message.is_unknown());
    }

    #[test]
    fn decode_profile_change_ack() {
        let message = ParsedMessage::decode(RawFrame::inbound(0xa9, 0xf0, &[3, 0]).expect("Frame too long"));
        assert_eq!(
            message.response,
            Response::ProfileChangeAck(ProfileChangeAck {
                profile_id: 3,
                status: 0
            })
        );
    }

    #[test]
    fn decode_primitives() {
        let buf = [0x12_u8, 0x34, 0x56, 0x78, 0x9a];
        let mut input = buf.as_slice();
        assert_eq!(<u32>::partial_decode(&mut input), Some(0x12345678));
        assert_eq!(<u16>::partial_decode(&mut input), None);
    }
}
