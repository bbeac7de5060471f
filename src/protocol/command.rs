//! Outbound commands. Every command starts from a fixed template, has its variable bytes patched in,
//! and is re-signed so that the last two bytes always carry a valid checksum.

use super::{hardware_enums::*, packet::*};

/// Settings registers written through a [`MessageId::ParameterWrite`] command.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SettingsRegister {
    WaterHardness = 0x32,
    WaterTemperature = 0x3d,
    AutoPowerOff = 0x3e,
    MachineSwitches = 0x3f,
}

/// The device will return at most this many statistics parameters per request.
pub const MAX_STATISTICS_PAGE: u8 = 10;

/// Toggles written together in a single settings command.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct MachineSwitches {
    pub energy_save: bool,
    pub cup_light: bool,
    pub sounds: bool,
}

/// One of the toggles in [`MachineSwitches`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum SwitchSetting {
    EnergySave,
    CupLight,
    Sounds,
}

impl MachineSwitches {
    pub fn set(&mut self, switch: SwitchSetting, on: bool) {
        match switch {
            SwitchSetting::EnergySave => self.energy_save = on,
            SwitchSetting::CupLight => self.cup_light = on,
            SwitchSetting::Sounds => self.sounds = on,
        }
    }

    pub fn encode(&self) -> u8 {
        0b1000_0001
            | (self.energy_save as u8) << 4
            | (self.cup_light as u8) << 3
            | (self.sounds as u8) << 2
    }
}

/// A typed request, prior to being rendered into bytes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Request {
    PowerOn,
    MonitorV2,
    BeverageStart(Beverage),
    BeverageStop(Beverage),
    SelectProfile(u8),
    Setting(SettingsRegister, u8),
    MachineSwitches(MachineSwitches),
    SetTime { hour: u8, minute: u8 },
    StatisticsRead { address: u16, count: u8 },
    ProfileNameRead { start: u8, end: u8 },
}

/// Implements the encode part of a request: write the unsigned template into `out`.
pub trait PartialEncode {
    fn partial_encode(&self, out: &mut Vec<u8>);

    fn encode(&self) -> Vec<u8> {
        let mut v = vec![];
        self.partial_encode(&mut v);
        v
    }
}

impl PartialEncode for u8 {
    fn partial_encode(&self, out: &mut Vec<u8>) {
        out.push(*self);
    }
}

impl PartialEncode for u16 {
    fn partial_encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_be_bytes());
    }
}

impl<T: PartialEncode> PartialEncode for [T] {
    fn partial_encode(&self, out: &mut Vec<u8>) {
        for t in self.iter() {
            t.partial_encode(out);
        }
    }
}

/// Body (everything after the marker and length) of the start/stop template for each beverage.
fn beverage_template(beverage: Beverage, start: bool) -> &'static [u8] {
    use Beverage::*;
    match (beverage, start) {
        (Espresso, true) => &[0x83, 0xf0, 0x01, 0x01, 0x01, 0x00, 0x28, 0x02, 0x03, 0x08, 0x00, 0x00, 0x00, 0x06],
        (Coffee, true) => &[0x83, 0xf0, 0x02, 0x01, 0x01, 0x00, 0x67, 0x02, 0x02, 0x00, 0x00, 0x06],
        (Long, true) => &[0x83, 0xf0, 0x03, 0x01, 0x01, 0x00, 0xa0, 0x02, 0x03, 0x00, 0x00, 0x06],
        (Espresso2, true) => &[0x83, 0xf0, 0x04, 0x01, 0x01, 0x00, 0x28, 0x02, 0x02, 0x00, 0x00, 0x06],
        (Doppio, true) => &[0x83, 0xf0, 0x05, 0x01, 0x01, 0x00, 0x78, 0x00, 0x00, 0x06],
        (Americano, true) => &[0x83, 0xf0, 0x06, 0x01, 0x01, 0x00, 0x28, 0x02, 0x03, 0x0f, 0x00, 0x6e, 0x00, 0x00, 0x06],
        (HotWater, true) => &[0x83, 0xf0, 0x10, 0x01, 0x0f, 0x00, 0xfa, 0x1c, 0x01, 0x06],
        (Steam, true) => &[0x83, 0xf0, 0x11, 0x01, 0x09, 0x03, 0x84, 0x1c, 0x01, 0x06],
        // Stop templates only differ in the beverage id
        (_, false) => match beverage {
            Espresso => &[0x83, 0xf0, 0x01, 0x02, 0x06],
            Coffee => &[0x83, 0xf0, 0x02, 0x02, 0x06],
            Long => &[0x83, 0xf0, 0x03, 0x02, 0x06],
            Espresso2 => &[0x83, 0xf0, 0x04, 0x02, 0x06],
            Doppio => &[0x83, 0xf0, 0x05, 0x02, 0x06],
            Americano => &[0x83, 0xf0, 0x06, 0x02, 0x06],
            HotWater => &[0x83, 0xf0, 0x10, 0x02, 0x06],
            Steam => &[0x83, 0xf0, 0x11, 0x02, 0x06],
        },
    }
}

impl PartialEncode for Request {
    fn partial_encode(&self, out: &mut Vec<u8>) {
        match self {
            Request::PowerOn => {
                [MessageId::AppControl as u8, 0x0f, 0x02, 0x01].partial_encode(out)
            }
            Request::MonitorV2 => [MessageId::MonitorV2 as u8, 0x0f].partial_encode(out),
            Request::BeverageStart(beverage) => out.extend_from_slice(beverage_template(*beverage, true)),
            Request::BeverageStop(beverage) => out.extend_from_slice(beverage_template(*beverage, false)),
            Request::SelectProfile(id) => {
                [MessageId::ProfileSelection as u8, 0xf0, *id].partial_encode(out)
            }
            Request::Setting(register, value) => {
                [MessageId::ParameterWrite as u8, 0x0f, 0x00, *register as u8, 0, 0, 0, *value]
                    .partial_encode(out)
            }
            Request::MachineSwitches(switches) => {
                Request::Setting(SettingsRegister::MachineSwitches, switches.encode())
                    .partial_encode(out)
            }
            Request::SetTime { hour, minute } => {
                [MessageId::SetTime as u8, 0x0f, *hour, *minute].partial_encode(out)
            }
            Request::StatisticsRead { address, count } => {
                [MessageId::StatisticsRead as u8, 0x0f].partial_encode(out);
                address.partial_encode(out);
                (*count).min(MAX_STATISTICS_PAGE).partial_encode(out);
            }
            Request::ProfileNameRead { start, end } => {
                [MessageId::ProfileNameRead as u8, 0xf0, *start, *end].partial_encode(out)
            }
        }
    }
}

impl Request {
    /// The response type that completes this request. Power and beverage commands are answered by
    /// the next status report rather than an echo of their own type.
    pub fn expected_response(&self) -> u8 {
        match self {
            Request::PowerOn
            | Request::MonitorV2
            | Request::BeverageStart(..)
            | Request::BeverageStop(..) => MessageId::MonitorV2.into(),
            Request::SelectProfile(..) => MessageId::ProfileSelection.into(),
            Request::Setting(..) | Request::MachineSwitches(..) => MessageId::ParameterWrite.into(),
            Request::SetTime { .. } => MessageId::SetTime.into(),
            Request::StatisticsRead { .. } => MessageId::StatisticsRead.into(),
            Request::ProfileNameRead { .. } => MessageId::ProfileNameRead.into(),
        }
    }
}

/// A signed, ready-to-write command and the response type it waits for.
#[derive(Clone, Eq, PartialEq)]
pub struct Command {
    pub bytes: Vec<u8>,
    /// `None` for fire-and-forget commands.
    pub expected_response: Option<u8>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("bytes", &hexdump(&self.bytes))
            .field("expected_response", &self.expected_response)
            .finish()
    }
}

impl Command {
    /// Wraps a template body (type byte onwards) with the marker, length and checksum trailer.
    fn build(body: &[u8], expected_response: Option<u8>) -> Command {
        let mut bytes = Vec::with_capacity(body.len() + 4);
        bytes.push(OUTBOUND_MARKER);
        bytes.push(0);
        bytes.extend_from_slice(body);
        bytes.extend_from_slice(&[0, 0]);
        // Every template is far shorter than a frame can be
        let fits = CommandBuilder::finish(&mut bytes);
        debug_assert!(fits);
        Command {
            bytes,
            expected_response,
        }
    }

    /// A user-provided template. The length byte and checksum are recomputed, and the expected
    /// response type is the command's own type byte. Returns `None` if the template is shorter
    /// than a frame header and trailer, or too long for the length byte.
    pub fn raw(mut bytes: Vec<u8>) -> Option<Command> {
        if bytes.len() < 5 || !CommandBuilder::finish(&mut bytes) {
            return None;
        }
        let expected_response = Some(bytes[2]);
        Some(Command {
            bytes,
            expected_response,
        })
    }

    pub fn without_response(mut self) -> Command {
        self.expected_response = None;
        self
    }

    pub fn message_type(&self) -> u8 {
        self.bytes[2]
    }
}

impl From<Request> for Command {
    fn from(request: Request) -> Self {
        Command::build(&request.encode(), Some(request.expected_response()))
    }
}

/// Convenience constructors for every command the driver knows how to send.
pub struct CommandBuilder;

impl CommandBuilder {
    /// Fixes up the length byte and overwrites the final two bytes with the checksum. Returns
    /// false, leaving `bytes` untouched, if the length doesn't fit in a byte.
    pub fn finish(bytes: &mut [u8]) -> bool {
        if bytes.len() < 2 {
            return false;
        }
        let Ok(len) = u8::try_from(bytes.len() - 1) else {
            return false;
        };
        bytes[1] = len;
        sign(bytes);
        true
    }

    pub fn power_on() -> Command {
        Request::PowerOn.into()
    }

    pub fn monitor() -> Command {
        Request::MonitorV2.into()
    }

    pub fn beverage_start(beverage: Beverage) -> Command {
        Request::BeverageStart(beverage).into()
    }

    pub fn beverage_stop(beverage: Beverage) -> Command {
        Request::BeverageStop(beverage).into()
    }

    pub fn select_profile(profile: u8) -> Command {
        Request::SelectProfile(profile).into()
    }

    pub fn auto_power_off(level: u8) -> Command {
        Request::Setting(SettingsRegister::AutoPowerOff, level).into()
    }

    pub fn water_hardness(level: u8) -> Command {
        Request::Setting(SettingsRegister::WaterHardness, level).into()
    }

    pub fn water_temperature(level: u8) -> Command {
        Request::Setting(SettingsRegister::WaterTemperature, level).into()
    }

    pub fn machine_switches(switches: MachineSwitches) -> Command {
        Request::MachineSwitches(switches).into()
    }

    pub fn set_clock(hour: u8, minute: u8) -> Command {
        Request::SetTime { hour, minute }.into()
    }

    /// Requests one page of statistics. `count` is capped at [`MAX_STATISTICS_PAGE`].
    pub fn statistics(address: u16, count: u8) -> Command {
        Request::StatisticsRead { address, count }.into()
    }

    pub fn load_profiles(count: u8) -> Command {
        Request::ProfileNameRead {
            start: 1,
            end: count,
        }
        .into()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::protocol::test::from_hex_str;
    use rstest::*;

    #[rstest]
    #[case(Beverage::Coffee, true, "0d 0f 83 f0 02 01 01 00 67 02 02 00 00 06 77 ff")]
    #[case(Beverage::Coffee, false, "0d 08 83 f0 02 02 06 c4 b1")]
    #[case(Beverage::Doppio, true, "0d 0d 83 f0 05 01 01 00 78 00 00 06 c4 7e")]
    #[case(Beverage::Doppio, false, "0d 08 83 f0 05 02 06 41 21")]
    #[case(Beverage::Steam, true, "0d 0d 83 f0 11 01 09 03 84 1c 01 06 c0 7b")]
    #[case(Beverage::Steam, false, "0d 08 83 f0 11 02 06 de 82")]
    #[case(Beverage::HotWater, true, "0d 0d 83 f0 10 01 0f 00 fa 1c 01 06 04 b4")]
    #[case(Beverage::HotWater, false, "0d 08 83 f0 10 02 06 e9 b2")]
    #[case(Beverage::Espresso2, true, "0d 0f 83 f0 04 01 01 00 28 02 02 00 00 06 ab 53")]
    #[case(Beverage::Espresso2, false, "0d 08 83 f0 04 02 06 76 11")]
    #[case(Beverage::Americano, true, "0d 12 83 f0 06 01 01 00 28 02 03 0f 00 6e 00 00 06 47 8b")]
    #[case(Beverage::Americano, false, "0d 08 83 f0 06 02 06 18 71")]
    #[case(Beverage::Long, true, "0d 0f 83 f0 03 01 01 00 a0 02 03 00 00 06 18 7f")]
    #[case(Beverage::Long, false, "0d 08 83 f0 03 02 06 f3 81")]
    #[case(Beverage::Espresso, true, "0d 11 83 f0 01 01 01 00 28 02 03 08 00 00 00 06 8f fc")]
    #[case(Beverage::Espresso, false, "0d 08 83 f0 01 02 06 9d e1")]
    fn beverage_commands_match_captures(
        #[case] beverage: Beverage,
        #[case] start: bool,
        #[case] expected: &str,
    ) {
        let command = if start {
            CommandBuilder::beverage_start(beverage)
        } else {
            CommandBuilder::beverage_stop(beverage)
        };
        assert_eq!(command.bytes, from_hex_str(expected));
        assert_eq!(command.expected_response, Some(0x75));
    }

    #[rstest]
    #[case(CommandBuilder::power_on(), "0d 07 84 0f 02 01 55 12", 0x75)]
    #[case(CommandBuilder::monitor(), "0d 05 75 0f da 25", 0x75)]
    #[case(CommandBuilder::select_profile(1), "0d 06 a9 f0 01 d7 c0", 0xa9)]
    #[case(CommandBuilder::select_profile(2), "0d 06 a9 f0 02 e7 a3", 0xa9)]
    #[case(CommandBuilder::auto_power_off(3), "0d 0b 90 0f 00 3e 00 00 00 03 b1 80", 0x90)]
    #[case(CommandBuilder::set_clock(8, 30), "0d 07 e2 0f 08 1e 27 4c", 0xe2)]
    #[case(CommandBuilder::statistics(100, 10), "0d 08 a2 0f 00 64 0a 23 97", 0xa2)]
    #[case(CommandBuilder::load_profiles(4), "0d 07 a4 f0 01 04 a8 c9", 0xa4)]
    fn commands_are_signed(#[case] command: Command, #[case] expected: &str, #[case] response: u8) {
        assert_eq!(command.bytes, from_hex_str(expected));
        assert_eq!(command.expected_response, Some(response));
    }

    #[test]
    fn statistics_page_is_capped() {
        let command = CommandBuilder::statistics(0x0102, 25);
        assert_eq!(&command.bytes[4..7], &[0x01, 0x02, MAX_STATISTICS_PAGE]);
        assert!(verify(&command.bytes));
    }

    #[rstest]
    #[case(SettingsRegister::WaterHardness, CommandBuilder::water_hardness(2))]
    #[case(SettingsRegister::WaterTemperature, CommandBuilder::water_temperature(2))]
    #[case(SettingsRegister::AutoPowerOff, CommandBuilder::auto_power_off(2))]
    fn settings_patch_register_and_value(#[case] register: SettingsRegister, #[case] command: Command) {
        assert_eq!(command.bytes[5], register as u8);
        assert_eq!(command.bytes[9], 2);
        assert!(verify(&command.bytes));
    }

    #[test]
    fn machine_switch_bits() {
        let switches = MachineSwitches {
            energy_save: true,
            cup_light: true,
            sounds: true,
        };
        assert_eq!(switches.encode(), 0b1001_1101);
        assert_eq!(MachineSwitches::default().encode(), 0b1000_0001);
        let command = CommandBuilder::machine_switches(switches);
        assert_eq!(command.bytes, from_hex_str("0d 0b 90 0f 00 3f 00 00 00 9d 79 a6"));
    }

    #[test]
    fn raw_commands_are_resigned() {
        let command = Command::raw(from_hex_str("0d 00 75 0f 00 00")).expect("Expected a command");
        assert_eq!(command.bytes, from_hex_str("0d 05 75 0f da 25"));
        assert_eq!(command.expected_response, Some(0x75));
        assert!(Command::raw(vec![0x0d, 0x04, 0x75, 0x00]).is_none());
        assert_eq!(command.without_response().expected_response, None);
    }

    #[test]
    fn raw_commands_must_fit_the_length_byte() {
        let mut bytes = vec![0x0d, 0x00, 0x75, 0x0f];
        bytes.resize(256, 0);
        let command = Command::raw(bytes.clone()).expect("Expected a command");
        assert_eq!(command.bytes[1], 0xff);
        assert!(verify(&command.bytes));
        bytes.push(0);
        assert!(Command::raw(bytes).is_none());
    }
}
