use std::collections::BTreeMap;

use super::{require, DecodeError, PartialDecode};

/// Width of a single UTF-16BE name, in bytes.
const NAME_WIDTH: usize = 20;

/// Represents a profile name with an associated icon tucked into the separator byte.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProfileName {
    pub name: String,
    pub icon: Option<u8>,
}

impl ProfileName {
    fn partial_decode(input: &mut &[u8]) -> Result<Option<ProfileName>, DecodeError> {
        if input.len() < NAME_WIDTH {
            return Ok(None);
        }
        let (raw, rest) = input.split_at(NAME_WIDTH);
        *input = rest;
        let wide: Vec<u16> = raw
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        let name = String::from_utf16(&wide).map_err(|_| DecodeError::InvalidName)?;
        let name = name.trim_end_matches(|c: char| c == '\0' || c.is_whitespace());
        Ok(Some(ProfileName {
            name: name.to_owned(),
            icon: <u8>::partial_decode(input),
        }))
    }
}

/// The profile table: profile index (starting at 1) to display name.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ProfileTable {
    pub names: BTreeMap<u8, String>,
    pub icons: BTreeMap<u8, u8>,
}

impl ProfileTable {
    /// Decodes consecutive fixed-width name records, stopping when a full record no longer fits.
    /// Blank names still consume an index.
    pub fn decode(payload: &[u8]) -> Result<ProfileTable, DecodeError> {
        let mut table = ProfileTable::default();
        let mut input = payload;
        let mut index = 1_u8;
        while let Some(profile) = ProfileName::partial_decode(&mut input)? {
            if !profile.name.is_empty() {
                table.names.insert(index, profile.name);
                if let Some(icon) = profile.icon {
                    table.icons.insert(index, icon);
                }
            }
            index = index.wrapping_add(1);
        }
        Ok(table)
    }

    pub fn name(&self, index: u8) -> Option<&str> {
        self.names.get(&index).map(String::as_str)
    }
}

/// Acknowledgement of a profile selection.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ProfileChangeAck {
    pub profile_id: u8,
    pub status: u8,
}

impl ProfileChangeAck {
    pub fn decode(payload: &[u8]) -> Result<ProfileChangeAck, DecodeError> {
        require(payload, 2)?;
        Ok(ProfileChangeAck {
            profile_id: payload[0],
            status: payload[1],
        })
    }
}
