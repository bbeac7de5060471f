use super::{require, DecodeError, PartialDecode};
use crate::protocol::*;

/// Which on-wire monitor layout a [`MonitorStatus`] was decoded from.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MonitorVersion {
    V1,
    V2,
}

/// Live power/switch/alarm telemetry, normalized across both monitor layouts.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MonitorStatus {
    pub version: MonitorVersion,
    pub powered: bool,
    /// `None` for layouts that don't report the nozzle.
    pub nozzle: Option<MachineEnum<NozzleState>>,
    pub switches: u16,
    pub alarms: u32,
    pub state: MachineEnum<MachineState>,
    /// The raw sub-status byte, which tracks progress through the current operation.
    pub progress: u8,
    pub percentage: u8,
}

/// Fields shared by both layouts, in wire order after the optional nozzle byte.
struct MonitorFields {
    switches: u16,
    alarms: u32,
    state: MachineEnum<MachineState>,
    progress: u8,
    percentage: u8,
}

impl PartialDecode<MonitorFields> for MonitorFields {
    fn partial_decode(input: &mut &[u8]) -> Option<MonitorFields> {
        // Switches are little-endian, while the alarm bytes are split around the state bytes
        let switch0 = <u8>::partial_decode(input)?;
        let switch1 = <u8>::partial_decode(input)?;
        let alarm0 = <u8>::partial_decode(input)?;
        let alarm1 = <u8>::partial_decode(input)?;
        let state = MachineEnum::decode(<u8>::partial_decode(input)?);
        let progress = <u8>::partial_decode(input)?;
        let percentage = <u8>::partial_decode(input)?;
        let alarm2 = <u8>::partial_decode(input)?;
        let alarm3 = <u8>::partial_decode(input)?;
        Some(MonitorFields {
            switches: u16::from_le_bytes([switch0, switch1]),
            alarms: u32::from_le_bytes([alarm0, alarm1, alarm2, alarm3]),
            state,
            progress,
            percentage,
        })
    }
}

const V1_LEN: usize = 9;
const V2_LEN: usize = V1_LEN + 1;

impl MonitorStatus {
    /// Decodes the payload of a monitor-v2 (0x75) frame.
    pub fn decode_v2(payload: &[u8]) -> Result<MonitorStatus, DecodeError> {
        require(payload, V2_LEN)?;
        let mut input = payload;
        let nozzle = <u8>::partial_decode(&mut input).map(MachineEnum::decode);
        Self::from_fields(MonitorVersion::V2, nozzle, &mut input, payload.len())
    }

    /// Decodes the payload of a monitor-v1 (0x70) frame, which has no nozzle byte.
    pub fn decode_v1(payload: &[u8]) -> Result<MonitorStatus, DecodeError> {
        require(payload, V1_LEN)?;
        let mut input = payload;
        Self::from_fields(MonitorVersion::V1, None, &mut input, payload.len())
    }

    fn from_fields(
        version: MonitorVersion,
        nozzle: Option<MachineEnum<NozzleState>>,
        input: &mut &[u8],
        actual: usize,
    ) -> Result<MonitorStatus, DecodeError> {
        let fields = MonitorFields::partial_decode(input).ok_or(DecodeError::TooShort {
            needed: match version {
                MonitorVersion::V1 => V1_LEN,
                MonitorVersion::V2 => V2_LEN,
            },
            actual,
        })?;
        Ok(MonitorStatus {
            version,
            powered: u8::from(fields.state) > 0,
            nozzle,
            switches: fields.switches,
            alarms: fields.alarms,
            state: fields.state,
            progress: fields.progress,
            percentage: fields.percentage,
        })
    }

    /// Encodes this status as a monitor-v2 payload, padded to the length real machines send.
    pub fn encode_v2(&self) -> Vec<u8> {
        let switches = self.switches.to_le_bytes();
        let alarms = self.alarms.to_le_bytes();
        let nozzle = self.nozzle.map(u8::from).unwrap_or_default();
        vec![
            nozzle,
            switches[0],
            switches[1],
            alarms[0],
            alarms[1],
            self.state.into(),
            self.progress,
            self.percentage,
            alarms[2],
            alarms[3],
            0,
            0,
            0,
        ]
    }

    /// Every switch reported by this status, with ignored bits removed and aliases collapsed.
    pub fn active_switches(&self, table: &BitTable<MachineSwitch>) -> Vec<MachineEnum<MachineSwitch>> {
        table.active(self.switches as u32)
    }

    pub fn active_alarms(&self, table: &BitTable<MachineAlarm>) -> Vec<MachineEnum<MachineAlarm>> {
        table.active(self.alarms)
    }

    /// The single alarm to display: the lowest active alarm bit wins.
    pub fn current_alarm(&self, table: &BitTable<MachineAlarm>) -> Option<MachineEnum<MachineAlarm>> {
        table.first(self.alarms)
    }
}

/// A condensed, display-oriented view of a [`MonitorStatus`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MachineStatus {
    StandBy,
    TurningOn(usize),
    ShuttingDown(usize),
    Ready,
    Busy(usize),
    Cleaning(usize),
    Descaling,
    Alarm(MachineEnum<MachineAlarm>),
}

impl MachineStatus {
    pub fn extract(status: &MonitorStatus, alarms: &BitTable<MachineAlarm>) -> MachineStatus {
        if status.state == MachineState::TurningOn {
            return MachineStatus::TurningOn(status.percentage as usize);
        }
        if status.state == MachineState::ShuttingDown {
            if status.percentage < 100 {
                return MachineStatus::ShuttingDown(status.percentage as usize);
            }
            // Emulate status % using progress
            return MachineStatus::ShuttingDown((status.progress as usize * 10).clamp(0, 100));
        }
        if status.state == MachineState::MilkCleaning || status.state == MachineState::Rinsing {
            return MachineStatus::Cleaning(status.percentage as usize);
        }
        if status.state == MachineState::MilkPreparation
            || status.state == MachineState::HotWaterDelivery
            || (status.state == MachineState::ReadyOrDispensing && status.progress != 0)
        {
            return MachineStatus::Busy(status.percentage as usize);
        }
        if status.state == MachineState::Descaling {
            return MachineStatus::Descaling;
        }
        if let Some(alarm) = status
            .active_alarms(alarms)
            .into_iter()
            .find(|alarm| *alarm != MachineAlarm::CleanKnob)
        {
            return MachineStatus::Alarm(alarm);
        }
        if status.state == MachineState::StandBy {
            return MachineStatus::StandBy;
        }
        MachineStatus::Ready
    }
}
