//! This file contains validated hardware enumerations and associated values.

use enum_iterator::Sequence;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Type identifiers for frames sent to/from the machine.
#[repr(u8)]
#[derive(
    Copy, Clone, Debug, PartialEq, PartialOrd, IntoPrimitive, TryFromPrimitive, Eq, Hash, Sequence,
)]
pub enum MessageId {
    MonitorV1 = 0x70,
    MonitorV2 = 0x75,
    BeverageDispensingMode = 0x83,
    /// (2, 1) for turn on.
    AppControl = 0x84,
    ParameterWrite = 0x90,
    StatisticsRead = 0xa2,
    ProfileNameRead = 0xa4,
    ProfileSelection = 0xa9,
    SetTime = 0xe2,
}

#[repr(u8)]
#[derive(
    Copy, Clone, Debug, PartialEq, PartialOrd, IntoPrimitive, TryFromPrimitive, Eq, Hash, Sequence,
)]
pub enum MachineState {
    StandBy = 0,
    TurningOn = 1,
    ShuttingDown = 2,
    Descaling = 4,
    SteamPreparation = 5,
    Recovery = 6,
    ReadyOrDispensing = 7,
    Rinsing = 8,
    MilkPreparation = 10,
    HotWaterDelivery = 11,
    MilkCleaning = 12,
    ChocolatePreparation = 16,
}

/// What is attached to the steam/water nozzle.
#[repr(u8)]
#[derive(
    Copy, Clone, Debug, PartialEq, PartialOrd, IntoPrimitive, TryFromPrimitive, Eq, Hash, Sequence,
)]
pub enum NozzleState {
    Detached = 0,
    Steam = 1,
    /// Also reported while detached, since nothing flows out of the nozzle directly.
    MilkFrother = 2,
    Chocolate = 3,
    MilkFrotherCleaning = 4,
}

/// Physical switches reported in the monitor switch bitmask.
#[repr(u8)]
#[derive(
    Copy, Clone, Debug, PartialEq, PartialOrd, IntoPrimitive, TryFromPrimitive, Eq, Hash, Sequence,
)]
pub enum MachineSwitch {
    WaterSpout = 0,
    MotorUp = 1,
    MotorDown = 2,
    CoffeeWasteContainer = 3,
    WaterTankAbsent = 4,
    Knob = 5,
    WaterLevelLow = 6,
    CoffeeJug = 7,
    IfdCaraffe = 8,
    CioccoTank = 9,
    CleanKnob = 10,
    DoorOpened = 13,
    PregroundDoorOpened = 14,
}

/// Alarms reported in the monitor alarm bitmask.
#[repr(u8)]
#[derive(
    Copy, Clone, Debug, PartialEq, PartialOrd, IntoPrimitive, TryFromPrimitive, Eq, Hash, Sequence,
)]
pub enum MachineAlarm {
    EmptyWaterTank = 0,
    CoffeeWasteContainerFull = 1,
    DescaleAlarm = 2,
    ReplaceWaterFilter = 3,
    CoffeeGroundTooFine = 4,
    CoffeeBeansEmpty = 5,
    MachineToService = 6,
    CoffeeHeaterProbeFailure = 7,
    TooMuchCoffee = 8,
    CoffeeInfuserMotorNotWorking = 9,
    EmptyDripTray = 10,
    SteamerProbeFailure = 11,
    HydraulicCircuitProblem = 13,
    CoffeeBeansEmptyTwo = 14,
    CleanKnob = 15,
    BeanHopperAbsent = 17,
    InfuserSense = 19,
}

/// Beverages with a known start/stop command template. The value is the machine's beverage id.
#[repr(u8)]
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    PartialOrd,
    IntoPrimitive,
    TryFromPrimitive,
    Eq,
    Hash,
    Sequence,
    clap::ValueEnum,
)]
pub enum Beverage {
    Espresso = 1,
    Coffee = 2,
    Long = 3,
    Espresso2 = 4,
    Doppio = 5,
    Americano = 6,
    HotWater = 16,
    Steam = 17,
}
