//! Wire protocol for PrimaDonna-class espresso machines: framing, checksums, outbound command
//! templates and inbound message decoding. Nothing in here touches a transport.

mod bit_table;
mod command;
mod hardware_enums;
mod machine_enum;
mod packet;
mod response;

pub use bit_table::*;
pub use command::*;
pub use hardware_enums::*;
pub use machine_enum::*;
pub use packet::*;
pub use response::*;

#[cfg(test)]
pub mod test {
    use const_decoder::Decoder;

    pub use super::packet::test::from_hex_str;

    /// Packet received when a brew response is sent
    pub const RESPONSE_BREW_RECEIVED: [u8; 8] = Decoder::Hex.decode(b"d00783f0010064d9");
    /// Idle and ready, steam nozzle attached
    pub const RESPONSE_STATUS_DEVICE_READY: [u8; 19] =
        Decoder::Hex.decode(b"d012750f010500000007000000000000009d61");
    /// Ready, but the water tank has been removed
    pub const RESPONSE_STATUS_TANK_DETACHED: [u8; 19] =
        Decoder::Hex.decode(b"d012750f01150000000700000000000000aa31");
    /// Dispensing a coffee
    pub const RESPONSE_STATUS_DISPENSING: [u8; 19] =
        Decoder::Hex.decode(b"d012750f010500000007040000000000005ca7");
    /// Standby after shutting down
    pub const RESPONSE_STATUS_DEVICE_OFF: [u8; 19] =
        Decoder::Hex.decode(b"d012750f01010000000003640000000000d696");
    /// Ready, but the water tank is empty
    pub const RESPONSE_STATUS_WATER_SHORTAGE: [u8; 19] =
        Decoder::Hex.decode(b"d012750f014500010007000000000000002f64");
}
