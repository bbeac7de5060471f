use btleplug::api::{Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager};
use stream_cancel::{StreamExt as _, Tripwire};

use super::{ChunkStream, DeviceError, Link, Transport};
use crate::prelude::*;

const SERVICE_UUID: uuid::Uuid = uuid::Uuid::from_u128(0x00035b03_58e6_07dd_021a_08123a000300);
const CHARACTERISTIC_UUID: uuid::Uuid =
    uuid::Uuid::from_u128(0x00035b03_58e6_07dd_021a_08123a000301);

/// The concrete peripheral type to avoid going crazy here managing an unsized trait.
type Peripheral = <Adapter as Central>::Peripheral;

/// Bluetooth implementation of [`Transport`], running on top of [`btleplug`].
///
/// The address is matched against either the peripheral's MAC address or its platform id, so that
/// this works on platforms that hide MAC addresses.
#[derive(Clone, Debug)]
pub struct BluetoothTransport {
    scan_interval: Duration,
}

impl Default for BluetoothTransport {
    fn default() -> Self {
        BluetoothTransport {
            scan_interval: Duration::from_secs(1),
        }
    }
}

impl BluetoothTransport {
    pub fn new() -> Self {
        BluetoothTransport::default()
    }

    /// Scans every adapter until a peripheral matching `address` shows up. The caller bounds this
    /// with a timeout.
    async fn find(&self, address: &str) -> Result<Peripheral, DeviceError> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        if adapters.is_empty() {
            return Err(DeviceError::NotFound);
        }
        for adapter in &adapters {
            trace_packet!("Starting scan on {}...", adapter.adapter_info().await?);
            adapter
                .start_scan(ScanFilter {
                    services: vec![SERVICE_UUID],
                })
                .await?;
        }
        loop {
            for adapter in &adapters {
                for peripheral in adapter.peripherals().await? {
                    if Self::matches(&peripheral, address) {
                        trace_packet!("Got peripheral: {:?}", peripheral.id());
                        return Ok(peripheral);
                    }
                    trace_packet!("Found peripheral, not a match: {:?}", peripheral.id());
                }
            }
            tokio::time::sleep(self.scan_interval).await;
        }
    }

    fn matches(peripheral: &Peripheral, address: &str) -> bool {
        peripheral
            .address()
            .to_string()
            .eq_ignore_ascii_case(address)
            || format!("{:?}", peripheral.id()).contains(address)
    }

    async fn open_link(&self, address: &str) -> Result<Box<dyn Link>, DeviceError> {
        let peripheral = self.find(address).await?;
        if !peripheral.is_connected().await? {
            peripheral.connect().await?;
        }
        match Self::characteristic(&peripheral).await {
            Ok(characteristic) => Ok(Box::new(BluetoothLink {
                peripheral,
                characteristic,
            })),
            Err(e) => {
                // Don't leave a half-open connection behind
                let _ = peripheral.disconnect().await;
                Err(e)
            }
        }
    }

    async fn characteristic(peripheral: &Peripheral) -> Result<Characteristic, DeviceError> {
        peripheral.discover_services().await?;
        peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == CHARACTERISTIC_UUID)
            .ok_or(DeviceError::NotFound)
    }
}

impl Transport for BluetoothTransport {
    fn open<'a>(&'a self, address: &'a str) -> AsyncFuture<'a, Box<dyn Link>> {
        Box::pin(self.open_link(address))
    }
}

/// Holds the device BTLE communication functionality for a connected peripheral.
struct BluetoothLink {
    peripheral: Peripheral,
    characteristic: Characteristic,
}

impl BluetoothLink {
    async fn subscribe(&self) -> Result<ChunkStream, DeviceError> {
        self.peripheral.subscribe(&self.characteristic).await?;
        let peripheral = self.peripheral.clone();
        let (trigger, tripwire) = Tripwire::new();
        tokio::spawn(async move {
            while peripheral.is_connected().await.unwrap_or_default() {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            trace_shutdown!("peripheral.is_connected");
            drop(trigger);
        });

        // Raw stream of bytes from device, ending when the device disconnects
        let notifications = self
            .peripheral
            .notifications()
            .await?
            .filter(|n| n.uuid == CHARACTERISTIC_UUID)
            .map(|n| n.value)
            .take_until_if(tripwire);
        Ok(Box::pin(notifications))
    }

    async fn write_without_response(&self, data: Vec<u8>) -> Result<(), DeviceError> {
        Ok(self
            .peripheral
            .write(&self.characteristic, &data, WriteType::WithoutResponse)
            .await?)
    }
}

impl Link for BluetoothLink {
    fn notifications(&self) -> AsyncFuture<ChunkStream> {
        Box::pin(self.subscribe())
    }

    fn write(&self, data: Vec<u8>) -> AsyncFuture<()> {
        Box::pin(self.write_without_response(data))
    }

    fn close(&self) -> AsyncFuture<()> {
        Box::pin(async {
            trace_shutdown!("BluetoothLink::close");
            Ok(self.peripheral.disconnect().await?)
        })
    }

    fn is_connected(&self) -> AsyncFuture<bool> {
        Box::pin(async { Ok(self.peripheral.is_connected().await?) })
    }
}
