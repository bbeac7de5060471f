//! Bit-to-meaning tables for the monitor switch and alarm bitmasks.
//!
//! The meaning of individual bits comes from observing real machines, so the tables are plain data
//! that a caller can replace per device rather than something baked into the decoder.

use std::collections::BTreeMap;

use super::{MachineAlarm, MachineEnum, MachineSwitch};

/// What a single bit in a bitmask means.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BitMeaning<T> {
    /// The bit reports `T`. Several bits may report the same `T`.
    Reports(T),
    /// Noise: never surfaced.
    Ignore,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitTable<T> {
    bits: BTreeMap<u8, BitMeaning<T>>,
}

impl<T> BitTable<T>
where
    T: TryFrom<u8> + Copy + PartialEq,
    u8: From<T>,
{
    pub fn new(entries: impl IntoIterator<Item = (u8, BitMeaning<T>)>) -> Self {
        BitTable {
            bits: entries.into_iter().collect(),
        }
    }

    /// Replaces the meaning of one bit.
    pub fn set(&mut self, bit: u8, meaning: BitMeaning<T>) {
        self.bits.insert(bit, meaning);
    }

    /// Looks up a single bit. Bits missing from the table surface as [`MachineEnum::Unknown`] with the bit index.
    pub fn lookup(&self, bit: u8) -> Option<MachineEnum<T>> {
        match self.bits.get(&bit) {
            Some(BitMeaning::Reports(t)) => Some(MachineEnum::Value(*t)),
            Some(BitMeaning::Ignore) => None,
            None => Some(MachineEnum::Unknown(bit)),
        }
    }

    /// Every meaning reported by `mask`, ordered by lowest bit, with aliased bits collapsed.
    pub fn active(&self, mask: u32) -> Vec<MachineEnum<T>> {
        let mut out: Vec<MachineEnum<T>> = vec![];
        for bit in 0..32_u8 {
            if mask & (1 << bit) == 0 {
                continue;
            }
            if let Some(meaning) = self.lookup(bit) {
                if !out.contains(&meaning) {
                    out.push(meaning);
                }
            }
        }
        out
    }

    /// The meaning of the lowest active, non-ignored bit.
    pub fn first(&self, mask: u32) -> Option<MachineEnum<T>> {
        (0..32_u8)
            .filter(|bit| mask & (1 << bit) != 0)
            .find_map(|bit| self.lookup(bit))
    }
}

impl Default for BitTable<MachineSwitch> {
    fn default() -> Self {
        use BitMeaning::*;
        use MachineSwitch::*;
        BitTable::new([
            (0, Reports(WaterSpout)),
            (1, Ignore),
            // Some machines raise bit 2 instead of bit 3 when the grounds container is full or missing
            (2, Reports(CoffeeWasteContainer)),
            (3, Reports(CoffeeWasteContainer)),
            (4, Reports(WaterTankAbsent)),
            (5, Reports(Knob)),
            (6, Ignore),
            (7, Ignore),
            (8, Reports(IfdCaraffe)),
            (9, Reports(CioccoTank)),
            (10, Reports(CleanKnob)),
            (11, Ignore),
            (12, Ignore),
            (13, Reports(DoorOpened)),
            (14, Reports(PregroundDoorOpened)),
        ])
    }
}

impl Default for BitTable<MachineAlarm> {
    fn default() -> Self {
        let mut table = BitTable::new(
            enum_iterator::all::<MachineAlarm>()
                .map(|alarm| (u8::from(alarm), BitMeaning::Reports(alarm))),
        );
        // PrimaDonna machines raise bit 3 for an empty bean hopper
        table.set(3, BitMeaning::Reports(MachineAlarm::CoffeeBeansEmpty));
        table
    }
}
