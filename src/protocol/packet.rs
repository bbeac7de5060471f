use std::fmt::Debug;

use crc::Crc;

/// Start marker for frames sent from the machine to the host.
pub const INBOUND_MARKER: u8 = 0xd0;
/// Start marker for commands sent from the host to the machine.
pub const OUTBOUND_MARKER: u8 = 0x0d;
/// Largest payload that still fits the single length byte of a frame.
pub const MAX_PAYLOAD: usize = u8::MAX as usize - 5;

pub const CRC_ALGO: Crc<u16> = Crc::<u16>::new(&crc::CRC_16_SPI_FUJITSU);

/// A complete, length-delimited frame: `[marker, length, type, ..payload.., crc_hi, crc_lo]`.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct RawFrame {
    pub(crate) bytes: Vec<u8>,
}

impl Debug for RawFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hexdump(&self.bytes))
    }
}

impl RawFrame {
    pub fn from_slice(bytes: &[u8]) -> Self {
        RawFrame {
            bytes: bytes.into(),
        }
    }

    pub fn from_vec(bytes: Vec<u8>) -> Self {
        RawFrame { bytes }
    }

    /// Builds a signed machine-to-host frame around `payload`, or `None` if the payload is longer
    /// than [`MAX_PAYLOAD`].
    pub fn inbound(message_type: u8, sub_type: u8, payload: &[u8]) -> Option<Self> {
        let len = u8::try_from(payload.len() + 5).ok()?;
        let mut bytes = Vec::with_capacity(payload.len() + 6);
        bytes.extend_from_slice(&[INBOUND_MARKER, len, message_type, sub_type]);
        bytes.extend_from_slice(payload);
        bytes.extend_from_slice(&[0, 0]);
        sign(&mut bytes);
        Some(RawFrame { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// The message type identifier, if the frame is long enough to carry one.
    pub fn message_type(&self) -> Option<u8> {
        self.bytes.get(2).copied()
    }

    /// The sub-type byte following the type identifier (`0xf0` when an answer is expected, `0x0f` otherwise).
    pub fn sub_type(&self) -> Option<u8> {
        self.bytes.get(3).copied()
    }

    /// The bytes between the sub-type and the checksum trailer.
    pub fn payload(&self) -> &[u8] {
        if self.bytes.len() < 6 {
            return &[];
        }
        &self.bytes[4..self.bytes.len() - 2]
    }

    /// Checks the framing invariant (`len == frame[1] + 1`) and the checksum trailer.
    pub fn is_valid(&self) -> bool {
        self.bytes.len() >= 5 && self.bytes[1] as usize + 1 == self.bytes.len() && verify(&self.bytes)
    }

    pub fn stringify(&self) -> String {
        stringify(&self.bytes)
    }
}

/// Computes the two-byte checksum trailer over a partial frame. The machine uses CCITT
/// (polynomial 0x1021) seeded with `0x1d0f`, which is the `CRC_16_SPI_FUJITSU` definition. The
/// result is big-endian.
pub fn checksum(buffer: &[u8]) -> [u8; 2] {
    CRC_ALGO.checksum(buffer).to_be_bytes()
}

/// Overwrites the last two bytes of `buffer` with the checksum of everything preceding them.
pub fn sign(buffer: &mut [u8]) {
    if buffer.len() < 2 {
        return;
    }
    let split = buffer.len() - 2;
    let trailer = checksum(&buffer[..split]);
    buffer[split..].copy_from_slice(&trailer);
}

/// Returns true if the last two bytes of `buffer` are the checksum of everything preceding them.
pub fn verify(buffer: &[u8]) -> bool {
    if buffer.len() < 3 {
        return false;
    }
    let split = buffer.len() - 2;
    buffer[split..] == checksum(&buffer[..split])
}

pub fn stringify(buffer: &[u8]) -> String {
    buffer
        .iter()
        .map(|n| format!("{:02x}", n))
        .collect::<String>()
}

/// Dumps a frame to a readable hex form.
pub fn hexdump(buffer: &[u8]) -> String {
    let maybe_space = |i| if i > 0 && i % 8 == 0 { " " } else { "" };
    let s1: String = buffer
        .iter()
        .enumerate()
        .map(|(i, b)| format!("{}{:02x}", maybe_space(i), b))
        .collect::<String>();
    let s2: String = buffer
        .iter()
        .map(|b| {
            if *b >= 32 && *b < 127 {
                *b as char
            } else {
                '.'
            }
        })
        .collect::<String>();
    format!("|{}| |{}|", s1, s2)
}
