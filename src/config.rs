//! Per-device configuration, loadable from JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::device::DeviceError;
use crate::prelude::*;
use crate::protocol::DerivedStatistic;

/// Timeouts, retry and pacing policy. All durations are in milliseconds.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    pub response_timeout: u64,
    pub connect_timeout: u64,
    pub disconnect_timeout: u64,
    pub retries: usize,
    pub backoff: u64,
    pub statistics_interval: u64,
    pub statistics_pacing: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            response_timeout: 10_000,
            connect_timeout: 10_000,
            disconnect_timeout: 5_000,
            retries: 3,
            backoff: 2_000,
            statistics_interval: 60_000,
            statistics_pacing: 300,
        }
    }
}

impl Timing {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout)
    }

    pub fn disconnect_timeout(&self) -> Duration {
        Duration::from_millis(self.disconnect_timeout)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff)
    }

    pub fn statistics_interval(&self) -> Duration {
        Duration::from_millis(self.statistics_interval)
    }

    pub fn statistics_pacing(&self) -> Duration {
        Duration::from_millis(self.statistics_pacing)
    }

    /// At least one attempt is always made.
    pub fn attempts(&self) -> usize {
        self.retries.max(1)
    }
}

/// One page of statistics: a starting address and the number of parameters to read.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct StatisticsBlock {
    pub address: u16,
    pub count: u8,
}

/// The statistics pages known to exist on PrimaDonna machines.
pub fn default_statistics_blocks() -> Vec<StatisticsBlock> {
    [
        (160, 10),
        (170, 10),
        (180, 10),
        (150, 10),
        (190, 4),
        (110, 10),
        (120, 10),
        (130, 10),
        (140, 10),
        (100, 10),
        (50, 10),
        (60, 7),
        (200, 10),
        (250, 9),
    ]
    .into_iter()
    .map(|(address, count)| StatisticsBlock { address, count })
    .collect()
}

fn default_profile_count() -> u8 {
    4
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// The transport address (for BLE, the peripheral address or id).
    pub address: String,
    /// Display name, used in logs and status output.
    pub name: String,
    /// Model code, e.g. `ECAM650.85`.
    pub model: String,
    #[serde(default = "default_profile_count")]
    pub profile_count: u8,
    #[serde(default)]
    pub timing: Timing,
    #[serde(default = "default_statistics_blocks")]
    pub statistics_blocks: Vec<StatisticsBlock>,
    #[serde(default)]
    pub derived_statistics: Vec<DerivedStatistic>,
}

impl DeviceConfig {
    pub fn new(address: impl Into<String>, name: impl Into<String>, model: impl Into<String>) -> Self {
        DeviceConfig {
            address: address.into(),
            name: name.into(),
            model: model.into(),
            profile_count: default_profile_count(),
            timing: Timing::default(),
            statistics_blocks: default_statistics_blocks(),
            derived_statistics: vec![],
        }
    }

    pub fn from_json(json: &str) -> Result<Self, DeviceError> {
        let config: DeviceConfig = serde_json::from_str(json)?;
        if config.profile_count == 0 {
            return Err(DeviceError::InvalidArgument(
                "profile_count must be at least 1".to_owned(),
            ));
        }
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DeviceError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = DeviceConfig::from_json(
            r#"{"address": "00:A0:50:12:34:56", "name": "Kitchen", "model": "ECAM650.85"}"#,
        )
        .expect("Failed to parse");
        assert_eq!(
            config,
            DeviceConfig::new("00:A0:50:12:34:56", "Kitchen", "ECAM650.85")
        );
        assert_eq!(config.timing.response_timeout(), Duration::from_secs(10));
        assert_eq!(config.timing.backoff(), Duration::from_secs(2));
        assert_eq!(config.statistics_blocks.len(), 14);
    }

    #[test]
    fn partial_timing_override() {
        let config = DeviceConfig::from_json(
            r#"{
                "address": "sim",
                "name": "Kitchen",
                "model": "ECAM650.85",
                "profile_count": 3,
                "timing": { "retries": 5, "backoff": 100 },
                "derived_statistics": [
                    { "kind": "sum", "name": "total", "a": 100, "b": 101 }
                ]
            }"#,
        )
        .expect("Failed to parse");
        assert_eq!(config.profile_count, 3);
        assert_eq!(config.timing.retries, 5);
        assert_eq!(config.timing.backoff(), Duration::from_millis(100));
        assert_eq!(config.timing.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.derived_statistics[0].name(), "total");
    }

    #[test]
    fn invalid_config_is_an_error() {
        assert!(matches!(
            DeviceConfig::from_json("{}"),
            Err(DeviceError::Config(..))
        ));
        assert!(matches!(
            DeviceConfig::from_json(r#"{"address": "a", "profile_count": 0, "name": "n", "model": "m"}"#),
            Err(DeviceError::InvalidArgument(..))
        ));
    }

    #[rstest::rstest]
    #[case(r#"{"address": "00:11"}"#)]
    #[case(r#"{"address": "00:11", "name": "Kitchen"}"#)]
    #[case(r#"{"address": "00:11", "model": "ECAM650.85"}"#)]
    #[case(r#"{"name": "Kitchen", "model": "ECAM650.85"}"#)]
    fn identity_fields_are_required(#[case] json: &str) {
        assert!(matches!(
            DeviceConfig::from_json(json),
            Err(DeviceError::Config(..))
        ));
    }
}
