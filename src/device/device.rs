use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{
    ConnectionManager, ConnectionState, Correlator, DeviceError, DeviceSnapshot, ProfileState,
    StateAggregator, Transport,
};
use crate::config::DeviceConfig;
use crate::prelude::*;
use crate::protocol::*;

/// Highest auto power off level: 15 minutes, 30 minutes, 1 hour, 2 hours, 3 hours.
pub const MAX_AUTO_POWER_OFF: u8 = 4;

struct DeviceInner {
    connection: ConnectionManager,
    last_beverage: Option<Beverage>,
    last_statistics_refresh: Option<Instant>,
    /// The switches as last written. The machine never reports them back.
    switches: MachineSwitches,
}

/// Handle that gives a user access to a single machine.
///
/// Every operation goes through one lock, so at most one command is in flight at a time. Clones
/// share the same connection and state.
#[derive(Clone)]
pub struct Device {
    inner: Arc<Mutex<DeviceInner>>,
    correlator: Correlator,
    state: Arc<StateAggregator>,
    config: Arc<DeviceConfig>,
    switches: Arc<BitTable<MachineSwitch>>,
    alarms: Arc<BitTable<MachineAlarm>>,
}

impl Device {
    pub fn new(config: DeviceConfig, transport: Arc<dyn Transport>) -> Self {
        let correlator = Correlator::new();
        let state = Arc::new(StateAggregator::new(config.profile_count));
        let connection =
            ConnectionManager::new(transport, &config, correlator.clone(), state.clone());
        Device {
            inner: Arc::new(Mutex::new(DeviceInner {
                connection,
                last_beverage: None,
                last_statistics_refresh: None,
                switches: MachineSwitches::default(),
            })),
            correlator,
            state,
            config: Arc::new(config),
            switches: Arc::new(BitTable::default()),
            alarms: Arc::new(BitTable::default()),
        }
    }

    /// Replaces the default switch and alarm bit tables.
    pub fn with_bit_tables(
        mut self,
        switches: BitTable<MachineSwitch>,
        alarms: BitTable<MachineAlarm>,
    ) -> Self {
        self.switches = Arc::new(switches);
        self.alarms = Arc::new(alarms);
        self
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub async fn connect(&self) -> Result<(), DeviceError> {
        self.inner.lock().await.connection.connect().await
    }

    pub async fn disconnect(&self) {
        self.inner.lock().await.connection.disconnect().await
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.inner.lock().await.connection.state()
    }

    /// Sends a command and waits for its response.
    ///
    /// Returns `Ok(None)` if the machine doesn't answer in time, or if the command doesn't expect
    /// an answer. Transport failures retry the whole connect/send/wait cycle from a fresh connection.
    pub async fn send_command(&self, command: Command) -> Result<Option<ParsedMessage>, DeviceError> {
        let mut inner = self.inner.lock().await;
        self.send_locked(&mut inner, &command).await
    }

    async fn send_locked(
        &self,
        inner: &mut DeviceInner,
        command: &Command,
    ) -> Result<Option<ParsedMessage>, DeviceError> {
        let attempts = self.config.timing.attempts();
        let mut attempt = 1;
        loop {
            match self.attempt(inner, command).await {
                Ok(response) => return Ok(response),
                // Connecting already retried on its own
                Err(e @ DeviceError::Exhausted { .. }) => return Err(e),
                Err(e) if e.is_transport() => {
                    inner.connection.disconnect().await;
                    if attempt >= attempts {
                        return Err(DeviceError::Exhausted {
                            attempts,
                            last: Box::new(e),
                        });
                    }
                    warning!(
                        "Attempt {}/{} to send {:?} failed: {}",
                        attempt,
                        attempts,
                        command,
                        e
                    );
                    tokio::time::sleep(self.config.timing.backoff()).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn attempt(
        &self,
        inner: &mut DeviceInner,
        command: &Command,
    ) -> Result<Option<ParsedMessage>, DeviceError> {
        inner.connection.connect().await?;
        // Registered before writing so that a fast reply can't slip past
        let pending = command
            .expected_response
            .map(|response_type| self.correlator.register(response_type));
        inner.connection.write(&command.bytes).await?;
        match pending {
            Some(pending) => Ok(pending.wait(self.config.timing.response_timeout()).await),
            None => Ok(None),
        }
    }

    /// Sends a command that is answered by a status report.
    async fn send_for_status(&self, command: Command) -> Result<Option<MonitorStatus>, DeviceError> {
        Ok(self.send_command(command).await?.and_then(|message| match message.response {
            Response::MonitorStatus(status) => Some(status),
            _ => None,
        }))
    }

    pub async fn power_on(&self) -> Result<Option<MonitorStatus>, DeviceError> {
        self.send_for_status(CommandBuilder::power_on()).await
    }

    /// Polls the machine for a fresh status report.
    pub async fn request_status(&self) -> Result<Option<MonitorStatus>, DeviceError> {
        self.send_for_status(CommandBuilder::monitor()).await
    }

    pub async fn beverage_start(
        &self,
        beverage: Beverage,
    ) -> Result<Option<ParsedMessage>, DeviceError> {
        let mut inner = self.inner.lock().await;
        inner.last_beverage = Some(beverage);
        self.send_locked(&mut inner, &CommandBuilder::beverage_start(beverage))
            .await
    }

    pub async fn beverage_stop(
        &self,
        beverage: Beverage,
    ) -> Result<Option<ParsedMessage>, DeviceError> {
        let mut inner = self.inner.lock().await;
        if inner.last_beverage == Some(beverage) {
            inner.last_beverage = None;
        }
        self.send_locked(&mut inner, &CommandBuilder::beverage_stop(beverage))
            .await
    }

    /// Stops whichever beverage was started last.
    pub async fn beverage_cancel(&self) -> Result<Option<ParsedMessage>, DeviceError> {
        let mut inner = self.inner.lock().await;
        let beverage = inner.last_beverage.take().ok_or_else(|| {
            DeviceError::InvalidArgument("no beverage has been started".to_owned())
        })?;
        self.send_locked(&mut inner, &CommandBuilder::beverage_stop(beverage))
            .await
    }

    pub async fn select_profile(&self, profile: u8) -> Result<Option<ParsedMessage>, DeviceError> {
        if profile == 0 || profile > self.config.profile_count {
            return Err(DeviceError::InvalidArgument(format!(
                "profile {} is not in 1..={}",
                profile, self.config.profile_count
            )));
        }
        self.send_command(CommandBuilder::select_profile(profile))
            .await
    }

    pub async fn set_auto_power_off(&self, level: u8) -> Result<Option<ParsedMessage>, DeviceError> {
        if level > MAX_AUTO_POWER_OFF {
            return Err(DeviceError::InvalidArgument(format!(
                "auto power off level {} is not in 0..={}",
                level, MAX_AUTO_POWER_OFF
            )));
        }
        self.send_command(CommandBuilder::auto_power_off(level))
            .await
    }

    pub async fn set_water_hardness(&self, level: u8) -> Result<Option<ParsedMessage>, DeviceError> {
        self.send_command(CommandBuilder::water_hardness(level))
            .await
    }

    pub async fn set_water_temperature(
        &self,
        level: u8,
    ) -> Result<Option<ParsedMessage>, DeviceError> {
        self.send_command(CommandBuilder::water_temperature(level))
            .await
    }

    /// Writes all three switches at once.
    pub async fn set_machine_switches(
        &self,
        switches: MachineSwitches,
    ) -> Result<Option<ParsedMessage>, DeviceError> {
        let mut inner = self.inner.lock().await;
        let response = self
            .send_locked(&mut inner, &CommandBuilder::machine_switches(switches))
            .await?;
        inner.switches = switches;
        Ok(response)
    }

    /// Turns one switch on or off, leaving the others as they were last written.
    pub async fn set_switch(
        &self,
        switch: SwitchSetting,
        on: bool,
    ) -> Result<Option<ParsedMessage>, DeviceError> {
        let mut inner = self.inner.lock().await;
        let mut switches = inner.switches;
        switches.set(switch, on);
        let response = self
            .send_locked(&mut inner, &CommandBuilder::machine_switches(switches))
            .await?;
        inner.switches = switches;
        Ok(response)
    }

    /// The switches as last written by this device handle.
    pub async fn machine_switches(&self) -> MachineSwitches {
        self.inner.lock().await.switches
    }

    pub async fn set_clock(&self, hour: u8, minute: u8) -> Result<Option<ParsedMessage>, DeviceError> {
        if hour > 23 || minute > 59 {
            return Err(DeviceError::InvalidArgument(format!(
                "{:02}:{:02} is not a valid time",
                hour, minute
            )));
        }
        self.send_command(CommandBuilder::set_clock(hour, minute))
            .await
    }

    /// Reads one page of statistics, merging it into the snapshot.
    pub async fn request_statistics(
        &self,
        address: u16,
        count: u8,
    ) -> Result<Option<Statistics>, DeviceError> {
        Ok(self
            .send_command(CommandBuilder::statistics(address, count))
            .await?
            .and_then(|message| match message.response {
                Response::Statistics(statistics) => Some(statistics),
                _ => None,
            }))
    }

    /// Reads every configured statistics page, pacing the requests. Returns `false` without
    /// touching the machine if the last full cycle finished too recently.
    pub async fn refresh_statistics(&self) -> Result<bool, DeviceError> {
        let mut inner = self.inner.lock().await;
        let timing = &self.config.timing;
        if let Some(last) = inner.last_statistics_refresh {
            if last.elapsed() < timing.statistics_interval() {
                return Ok(false);
            }
        }
        for (i, block) in self.config.statistics_blocks.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(timing.statistics_pacing()).await;
            }
            let command = CommandBuilder::statistics(block.address, block.count);
            if self.send_locked(&mut inner, &command).await?.is_none() {
                warning!("No statistics received for block at {}", block.address);
            }
        }
        inner.last_statistics_refresh = Some(Instant::now());
        Ok(true)
    }

    /// Every configured derived statistic, computed from the statistics read so far.
    pub fn derived_statistics(&self) -> Vec<(String, Option<u64>)> {
        let statistics = self.state.snapshot().statistics;
        self.config
            .derived_statistics
            .iter()
            .map(|stat| (stat.name().to_owned(), statistics.derive(stat)))
            .collect()
    }

    /// Requests the profile name table. The response replaces the seeded default names.
    pub async fn load_profiles(&self) -> Result<ProfileState, DeviceError> {
        self.send_command(CommandBuilder::load_profiles(self.config.profile_count))
            .await?;
        Ok(self.state.snapshot().profiles)
    }

    /// Sends a hex-encoded template. The length byte and trailer are recomputed.
    pub async fn send_raw(&self, hex: &str) -> Result<Option<ParsedMessage>, DeviceError> {
        let bytes = hex::decode(hex.trim())
            .map_err(|e| DeviceError::InvalidArgument(format!("invalid hex: {}", e)))?;
        let command = Command::raw(bytes).ok_or_else(|| {
            DeviceError::InvalidArgument("a command needs between 5 and 256 bytes".to_owned())
        })?;
        self.send_command(command).await
    }

    pub fn on_status_change(&self, handler: impl Fn(&MonitorStatus) + Send + Sync + 'static) {
        self.state.on_status_change(handler)
    }

    pub fn on_profile_table_change(&self, handler: impl Fn(&ProfileState) + Send + Sync + 'static) {
        self.state.on_profile_table_change(handler)
    }

    pub fn on_statistics_change(&self, handler: impl Fn(&Statistics) + Send + Sync + 'static) {
        self.state.on_statistics_change(handler)
    }

    /// Every decoded message from the machine, as it arrives.
    pub fn packet_tap(&self) -> impl Stream<Item = ParsedMessage> {
        self.state.packet_tap()
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        self.state.snapshot()
    }

    /// The condensed state of the machine, if a status report has arrived.
    pub fn machine_status(&self) -> Option<MachineStatus> {
        self.state
            .snapshot()
            .status
            .map(|status| self.summarize(&status))
    }

    /// Condenses any status report with this device's alarm table.
    pub fn summarize(&self, status: &MonitorStatus) -> MachineStatus {
        MachineStatus::extract(status, &self.alarms)
    }

    pub fn active_switches(&self) -> Vec<MachineEnum<MachineSwitch>> {
        self.state
            .snapshot()
            .status
            .map(|status| status.active_switches(&self.switches))
            .unwrap_or_default()
    }

    pub fn active_alarms(&self) -> Vec<MachineEnum<MachineAlarm>> {
        self.state
            .snapshot()
            .status
            .map(|status| status.active_alarms(&self.alarms))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::StatisticsBlock;
    use crate::device::simulate::Simulator;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn device(simulator: &Simulator) -> Device {
        Device::new(config(), Arc::new(simulator.clone()))
    }

    fn config() -> DeviceConfig {
        DeviceConfig::new("simulator", "Simulator", "ECAM650.85")
    }

    #[tokio::test(start_paused = true)]
    async fn brew_espresso() {
        let simulator = Simulator::new().chunk_size(4);
        let device = device(&simulator);
        let start = Instant::now();
        let response = device
            .beverage_start(Beverage::Espresso)
            .await
            .expect("Failed to send")
            .expect("Expected a response");
        assert!(start.elapsed() < Duration::from_secs(10));
        assert_eq!(response.message_type(), 0x75);
        let Response::MonitorStatus(status) = response.response else {
            panic!("Expected a status");
        };
        assert_eq!(status.version, MonitorVersion::V2);
        assert_eq!(status.progress, 4);
        assert_eq!(device.machine_status(), Some(MachineStatus::Busy(0)));
        assert_eq!(
            simulator.writes(),
            vec![CommandBuilder::beverage_start(Beverage::Espresso).bytes]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn retries_failed_connects() {
        let simulator = Simulator::new().fail_opens(2);
        let device = device(&simulator);
        let start = Instant::now();
        let status = device.request_status().await.expect("Failed to send");
        assert!(status.is_some());
        // Exactly two backoff delays
        assert_eq!(start.elapsed(), Duration::from_secs(4));
        assert_eq!(simulator.opens(), 3);
        assert_eq!(device.connection_state().await, ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_connects_fail_then_recover() {
        let simulator = Simulator::new().fail_opens(3);
        let device = device(&simulator);
        assert!(matches!(
            device.power_on().await,
            Err(DeviceError::Exhausted { attempts: 3, .. })
        ));
        assert_eq!(device.connection_state().await, ConnectionState::Disconnected);
        // The next call starts from a clean slate
        assert!(device.power_on().await.expect("Failed to send").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_writes_retry_from_a_fresh_connection() {
        let simulator = Simulator::new().fail_writes(2);
        let device = device(&simulator);
        let start = Instant::now();
        let status = device.request_status().await.expect("Failed to send");
        assert!(status.is_some());
        assert_eq!(start.elapsed(), Duration::from_secs(4));
        // Each failed write tore down its link and connected again
        assert_eq!(simulator.opens(), 3);
        assert_eq!(simulator.closes(), 2);
        assert_eq!(simulator.writes(), vec![CommandBuilder::monitor().bytes]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_writes_are_exhausted() {
        let simulator = Simulator::new().fail_writes(3);
        let device = device(&simulator);
        assert!(matches!(
            device.request_status().await,
            Err(DeviceError::Exhausted { attempts: 3, .. })
        ));
        assert_eq!(device.connection_state().await, ConnectionState::Disconnected);
        assert!(device.request_status().await.expect("Failed to send").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn switches_change_one_at_a_time() {
        let simulator = Simulator::new();
        let device = device(&simulator);
        let register = SettingsRegister::MachineSwitches as u8;
        device
            .set_switch(SwitchSetting::EnergySave, true)
            .await
            .expect("Failed to send");
        assert_eq!(simulator.settings()[&register], 0b1001_0001);
        device
            .set_switch(SwitchSetting::CupLight, true)
            .await
            .expect("Failed to send");
        // Energy save is still on
        assert_eq!(simulator.settings()[&register], 0b1001_1001);
        device
            .set_switch(SwitchSetting::EnergySave, false)
            .await
            .expect("Failed to send");
        assert_eq!(simulator.settings()[&register], 0b1000_1001);
        assert_eq!(
            device.machine_switches().await,
            MachineSwitches {
                energy_save: false,
                cup_light: true,
                sounds: false,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_switch_write_is_not_remembered() {
        let simulator = Simulator::new().fail_opens(3);
        let device = device(&simulator);
        assert!(device.set_switch(SwitchSetting::Sounds, true).await.is_err());
        assert_eq!(device.machine_switches().await, MachineSwitches::default());
    }

    #[test]
    fn summaries_use_the_configured_alarm_table() {
        let simulator = Simulator::new();
        let status = MonitorStatus {
            version: MonitorVersion::V2,
            powered: true,
            nozzle: None,
            switches: 0,
            alarms: 1 << MachineAlarm::EmptyWaterTank as u8,
            state: MachineState::ReadyOrDispensing.into(),
            progress: 0,
            percentage: 0,
        };
        assert_eq!(
            device(&simulator).summarize(&status),
            MachineStatus::Alarm(MachineAlarm::EmptyWaterTank.into())
        );
        let mut alarms = BitTable::default();
        alarms.set(MachineAlarm::EmptyWaterTank as u8, BitMeaning::Ignore);
        let device = device(&simulator).with_bit_tables(BitTable::default(), alarms);
        assert_eq!(device.summarize(&status), MachineStatus::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_machine_times_out() {
        let simulator = Simulator::new().silent(true);
        let device = device(&simulator);
        let start = Instant::now();
        assert_eq!(device.send_command(CommandBuilder::monitor()).await.ok(), Some(None));
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        // The connection survives a timeout
        assert_eq!(device.connection_state().await, ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_link_is_reopened() {
        let simulator = Simulator::new();
        let device = device(&simulator);
        device.connect().await.expect("Failed to connect");
        simulator.drop_links();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(device.request_status().await.expect("Failed to send").is_some());
        assert_eq!(simulator.opens(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn fire_and_forget() {
        let simulator = Simulator::new().silent(true);
        let device = device(&simulator);
        let start = Instant::now();
        let response = device
            .send_command(CommandBuilder::power_on().without_response())
            .await
            .expect("Failed to send");
        assert_eq!(response, None);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn status_observers() {
        let simulator = Simulator::new();
        let device = device(&simulator);
        let count = Arc::new(AtomicUsize::new(0));
        let inner = count.clone();
        device.on_status_change(move |_| {
            inner.fetch_add(1, Ordering::SeqCst);
        });
        device.request_status().await.expect("Failed to send");
        device.request_status().await.expect("Failed to send");
        assert_eq!(count.load(Ordering::SeqCst), 1);
        device.power_on().await.expect("Failed to send");
        assert_eq!(count.load(Ordering::SeqCst), 2);
        simulator
            .report_status(MachineState::TurningOn, 0, 40)
            .await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(device.machine_status(), Some(MachineStatus::TurningOn(40)));
    }

    #[tokio::test(start_paused = true)]
    async fn settings_and_profiles() {
        let simulator = Simulator::new();
        let device = device(&simulator);
        device.select_profile(2).await.expect("Failed to send");
        assert_eq!(simulator.active_profile(), 2);
        assert_eq!(device.snapshot().profiles.active, Some(2));
        assert!(matches!(
            device.select_profile(5).await,
            Err(DeviceError::InvalidArgument(..))
        ));

        device.set_auto_power_off(3).await.expect("Failed to send");
        assert!(matches!(
            device.set_auto_power_off(5).await,
            Err(DeviceError::InvalidArgument(..))
        ));
        device.set_water_hardness(2).await.expect("Failed to send");
        device
            .set_machine_switches(MachineSwitches {
                energy_save: true,
                cup_light: false,
                sounds: true,
            })
            .await
            .expect("Failed to send");
        let settings = simulator.settings();
        assert_eq!(settings[&(SettingsRegister::AutoPowerOff as u8)], 3);
        assert_eq!(settings[&(SettingsRegister::WaterHardness as u8)], 2);
        assert_eq!(settings[&(SettingsRegister::MachineSwitches as u8)], 0b1001_0101);

        device.set_clock(8, 30).await.expect("Failed to send");
        assert_eq!(simulator.clock(), Some((8, 30)));
        assert!(device.set_clock(24, 0).await.is_err());

        let profiles = device.load_profiles().await.expect("Failed to send");
        assert_eq!(profiles.names[&1], "Matt");
        assert_eq!(profiles.names[&3], "Guest");
        assert_eq!(profiles.names[&4], "Profile 4");
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_last_beverage() {
        let simulator = Simulator::new();
        let device = device(&simulator);
        assert!(device.beverage_cancel().await.is_err());
        device
            .beverage_start(Beverage::Americano)
            .await
            .expect("Failed to send");
        device.beverage_cancel().await.expect("Failed to send");
        assert_eq!(
            simulator.writes().last(),
            Some(&CommandBuilder::beverage_stop(Beverage::Americano).bytes)
        );
        assert_eq!(device.machine_status(), Some(MachineStatus::Ready));
    }

    #[tokio::test(start_paused = true)]
    async fn raw_commands() {
        let simulator = Simulator::new();
        let device = device(&simulator);
        let response = device
            .send_raw("0d05750f0000")
            .await
            .expect("Failed to send");
        assert_eq!(response.map(|r| r.message_type()), Some(0x75));
        assert!(matches!(
            device.send_raw("zz").await,
            Err(DeviceError::InvalidArgument(..))
        ));
        assert!(matches!(
            device.send_raw("0d05").await,
            Err(DeviceError::InvalidArgument(..))
        ));
        assert!(matches!(
            device.send_raw(&"00".repeat(257)).await,
            Err(DeviceError::InvalidArgument(..))
        ));
        assert_eq!(simulator.writes().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn statistics_refresh_is_paced_and_limited() {
        let simulator = Simulator::new();
        let mut config = config();
        config.statistics_blocks = vec![
            StatisticsBlock {
                address: 100,
                count: 10,
            },
            StatisticsBlock {
                address: 110,
                count: 10,
            },
            StatisticsBlock {
                address: 120,
                count: 5,
            },
        ];
        config.derived_statistics = vec![DerivedStatistic::Sum {
            name: "total".to_owned(),
            a: 100,
            b: 101,
        }];
        let device = Device::new(config, Arc::new(simulator.clone()));
        let pages = Arc::new(AtomicUsize::new(0));
        let inner = pages.clone();
        device.on_statistics_change(move |_| {
            inner.fetch_add(1, Ordering::SeqCst);
        });

        let start = Instant::now();
        assert!(device.refresh_statistics().await.expect("Failed to refresh"));
        assert_eq!(start.elapsed(), Duration::from_millis(600));
        assert_eq!(pages.load(Ordering::SeqCst), 3);
        let statistics = device.snapshot().statistics;
        assert_eq!(statistics.values.len(), 25);
        assert_eq!(statistics.get(124), Some(372));
        assert_eq!(
            device.derived_statistics(),
            vec![("total".to_owned(), Some(603))]
        );

        assert!(!device.refresh_statistics().await.expect("Failed to refresh"));
        assert_eq!(simulator.writes().len(), 3);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(device.refresh_statistics().await.expect("Failed to refresh"));
        assert_eq!(simulator.writes().len(), 6);
    }
}
