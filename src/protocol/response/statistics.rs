use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{DecodeError, PartialDecode};

/// The parameter mask every statistics response is expected to carry.
pub const STATISTICS_MASK: u8 = 0x0f;
const RECORD_SIZE: usize = 6;

/// One page of statistics: parameter address to accumulated value.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Statistics {
    pub values: BTreeMap<u16, u32>,
}

impl Statistics {
    /// Decodes a page of `[address: u16][value: u32]` records. The first record's address is the
    /// starting address of the requested block.
    pub fn decode(mask: Option<u8>, payload: &[u8]) -> Result<Statistics, DecodeError> {
        match mask {
            Some(STATISTICS_MASK) => {}
            Some(mask) => return Err(DecodeError::UnexpectedMask(mask)),
            None => {
                return Err(DecodeError::TooShort {
                    needed: 1,
                    actual: 0,
                })
            }
        }
        if payload.is_empty() || payload.len() % RECORD_SIZE != 0 {
            return Err(DecodeError::Misaligned(payload.len()));
        }
        let misaligned = || DecodeError::Misaligned(payload.len());
        let mut values = BTreeMap::new();
        for mut record in payload.chunks_exact(RECORD_SIZE) {
            let address = <u16>::partial_decode(&mut record).ok_or_else(misaligned)?;
            let value = <u32>::partial_decode(&mut record).ok_or_else(misaligned)?;
            values.insert(address, value);
        }
        Ok(Statistics { values })
    }

    /// The address this page starts at, if it holds anything.
    pub fn start(&self) -> Option<u16> {
        self.values.keys().next().copied()
    }

    /// Merges a newer page over this table.
    pub fn merge(&mut self, other: &Statistics) {
        self.values.extend(other.values.iter().map(|(k, v)| (*k, *v)));
    }

    pub fn get(&self, address: u16) -> Option<u32> {
        self.values.get(&address).copied()
    }

    /// Computes a derived value, or `None` if an input address hasn't been read yet.
    pub fn derive(&self, stat: &DerivedStatistic) -> Option<u64> {
        match stat {
            DerivedStatistic::Sum { a, b, .. } => {
                Some(self.get(*a)? as u64 + self.get(*b)? as u64)
            }
            DerivedStatistic::Volume {
                address, factor, ..
            } => Some(self.get(*address)? as u64 * *factor as u64),
        }
    }
}

/// A statistic that isn't read from the machine directly but computed from other addresses.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DerivedStatistic {
    /// The sum of two related counters.
    Sum { name: String, a: u16, b: u16 },
    /// A unit conversion of a raw counter (e.g. liters to milliliters).
    Volume {
        name: String,
        address: u16,
        factor: u32,
    },
}

impl DerivedStatistic {
    pub fn name(&self) -> &str {
        match self {
            DerivedStatistic::Sum { name, .. } | DerivedStatistic::Volume { name, .. } => name,
        }
    }
}
