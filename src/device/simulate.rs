//! A simulated machine, for tests and the `--simulator` mode of the CLI.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::{ChunkStream, DeviceError, Link, Transport};
use crate::prelude::*;
use crate::protocol::*;

/// A UTF-16BE name padded to 20 bytes, followed by its index.
const PROFILE_RECORD: usize = 21;

/// The machine behind the simulated link.
struct Machine {
    status: MonitorStatus,
    profiles: Vec<String>,
    active_profile: u8,
    settings: BTreeMap<u8, u8>,
    clock: Option<(u8, u8)>,
}

impl Default for Machine {
    fn default() -> Self {
        Machine {
            status: MonitorStatus {
                version: MonitorVersion::V2,
                powered: false,
                nozzle: Some(NozzleState::Steam.into()),
                switches: 1 << MachineSwitch::WaterSpout as u8,
                alarms: 0,
                state: MachineState::StandBy.into(),
                progress: 0,
                percentage: 0,
            },
            profiles: vec!["Matt".to_owned(), "Mia".to_owned(), "Guest".to_owned()],
            active_profile: 1,
            settings: BTreeMap::new(),
            clock: None,
        }
    }
}

impl Machine {
    fn set_state(&mut self, state: MachineState, progress: u8, percentage: u8) {
        self.status.state = state.into();
        self.status.powered = state != MachineState::StandBy;
        self.status.progress = progress;
        self.status.percentage = percentage;
    }

    fn status_frame(&self) -> Option<RawFrame> {
        RawFrame::inbound(MessageId::MonitorV2.into(), 0x0f, &self.status.encode_v2())
    }

    /// Every statistic reads back as a value derived from its address.
    fn statistic(address: u16) -> u32 {
        address as u32 * 3
    }

    /// Applies one command and produces the frames the machine would answer with.
    fn respond(&mut self, command: &[u8]) -> Vec<RawFrame> {
        self.answer(command).into_iter().collect()
    }

    fn answer(&mut self, command: &[u8]) -> Option<RawFrame> {
        let id = MessageId::try_from(*command.get(2)?).ok()?;
        let payload = command.get(4..command.len() - 2).unwrap_or_default();
        let arg = |n: usize| payload.get(n).copied().unwrap_or_default();
        match id {
            MessageId::AppControl => {
                self.set_state(MachineState::ReadyOrDispensing, 0, 0);
                self.status_frame()
            }
            MessageId::MonitorV2 => self.status_frame(),
            MessageId::BeverageDispensingMode => {
                // 1 starts, 2 stops
                if arg(1) == 0x01 {
                    self.set_state(MachineState::ReadyOrDispensing, 4, 0);
                } else {
                    self.set_state(MachineState::ReadyOrDispensing, 0, 0);
                }
                self.status_frame()
            }
            MessageId::ProfileSelection => {
                self.active_profile = arg(0);
                RawFrame::inbound(id.into(), 0xf0, &[arg(0), 0])
            }
            MessageId::ParameterWrite => {
                self.settings.insert(arg(1), arg(5));
                RawFrame::inbound(id.into(), 0x0f, payload)
            }
            MessageId::SetTime => {
                self.clock = Some((arg(0), arg(1)));
                RawFrame::inbound(id.into(), 0x0f, payload)
            }
            MessageId::StatisticsRead => {
                let start = u16::from_be_bytes([arg(0), arg(1)]);
                let mut out = vec![];
                let count = (arg(2) as usize).min(MAX_PAYLOAD / 6) as u16;
                for address in start..start.saturating_add(count) {
                    out.extend_from_slice(&address.to_be_bytes());
                    out.extend_from_slice(&Self::statistic(address).to_be_bytes());
                }
                RawFrame::inbound(id.into(), STATISTICS_MASK, &out)
            }
            MessageId::ProfileNameRead => {
                // As many names as fit in one frame
                let mut out = vec![];
                for index in (arg(0)..=arg(1)).take(MAX_PAYLOAD / PROFILE_RECORD) {
                    let name = self
                        .profiles
                        .get(index.wrapping_sub(1) as usize)
                        .map(String::as_str)
                        .unwrap_or_default();
                    let mut record: Vec<u8> =
                        name.encode_utf16().flat_map(u16::to_be_bytes).collect();
                    record.resize(PROFILE_RECORD - 1, 0);
                    record.push(index);
                    out.extend(record);
                }
                RawFrame::inbound(id.into(), 0xf0, &out)
            }
            MessageId::MonitorV1 => None,
        }
    }
}

#[derive(Default)]
struct Shared {
    machine: Mutex<Machine>,
    fail_opens: AtomicUsize,
    hang_opens: AtomicBool,
    fail_subscribes: AtomicUsize,
    fail_writes: AtomicUsize,
    fail_closes: AtomicBool,
    hang_closes: AtomicBool,
    silent: AtomicBool,
    chunk_size: AtomicUsize,
    opens: AtomicUsize,
    closes: AtomicUsize,
    writes: Mutex<Vec<Vec<u8>>>,
    links: Mutex<Vec<Outbox>>,
}

/// The sending half of one link's notification channel. Taking it ends the notification stream.
type Outbox = Arc<Mutex<Option<mpsc::Sender<Vec<u8>>>>>;

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Decrements a failure budget, returning true if this call should fail.
fn consume(budget: &AtomicUsize) -> bool {
    budget
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// A [`Transport`] backed by an in-process machine model. Clones share the same machine.
#[derive(Clone, Default)]
pub struct Simulator {
    shared: Arc<Shared>,
}

impl Simulator {
    pub fn new() -> Self {
        Simulator::default()
    }

    /// Fail the next `n` opens.
    pub fn fail_opens(self, n: usize) -> Self {
        self.shared.fail_opens.store(n, Ordering::SeqCst);
        self
    }

    /// Opens never complete.
    pub fn hang_opens(self, hang: bool) -> Self {
        self.shared.hang_opens.store(hang, Ordering::SeqCst);
        self
    }

    /// Fail the next `n` notification subscriptions.
    pub fn fail_subscribes(self, n: usize) -> Self {
        self.shared.fail_subscribes.store(n, Ordering::SeqCst);
        self
    }

    /// Fail the next `n` writes.
    pub fn fail_writes(self, n: usize) -> Self {
        self.shared.fail_writes.store(n, Ordering::SeqCst);
        self
    }

    /// Closing a link reports an error. The link is torn down regardless.
    pub fn fail_closes(self, fail: bool) -> Self {
        self.shared.fail_closes.store(fail, Ordering::SeqCst);
        self
    }

    /// Closing a link never completes.
    pub fn hang_closes(self, hang: bool) -> Self {
        self.shared.hang_closes.store(hang, Ordering::SeqCst);
        self
    }

    /// Commands are accepted, but never answered.
    pub fn silent(self, silent: bool) -> Self {
        self.shared.silent.store(silent, Ordering::SeqCst);
        self
    }

    /// Deliver responses in chunks of at most `size` bytes, the way BLE notifications arrive.
    pub fn chunk_size(self, size: usize) -> Self {
        self.shared.chunk_size.store(size, Ordering::SeqCst);
        self
    }

    /// How many times a link has been opened (or attempted).
    pub fn opens(&self) -> usize {
        self.shared.opens.load(Ordering::SeqCst)
    }

    /// How many times a link close has been requested.
    pub fn closes(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }

    /// Every command written so far, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        lock(&self.shared.writes).clone()
    }

    pub fn settings(&self) -> BTreeMap<u8, u8> {
        lock(&self.shared.machine).settings.clone()
    }

    pub fn clock(&self) -> Option<(u8, u8)> {
        lock(&self.shared.machine).clock
    }

    pub fn active_profile(&self) -> u8 {
        lock(&self.shared.machine).active_profile
    }

    /// Pushes an unsolicited status report down every open link.
    pub async fn report_status(&self, state: MachineState, progress: u8, percentage: u8) {
        let frame = {
            let mut machine = lock(&self.shared.machine);
            machine.set_state(state, progress, percentage);
            machine.status_frame()
        };
        let Some(frame) = frame else {
            return;
        };
        let senders: Vec<_> = lock(&self.shared.links)
            .iter()
            .filter_map(|outbox| lock(outbox).clone())
            .collect();
        for tx in senders {
            let _ = tx.send(frame.as_bytes().to_vec()).await;
        }
    }

    /// Simulates the machine walking out of range: every open notification stream ends.
    pub fn drop_links(&self) {
        for outbox in lock(&self.shared.links).drain(..) {
            lock(&outbox).take();
        }
    }

    async fn open_link(&self) -> Result<Box<dyn Link>, DeviceError> {
        self.shared.opens.fetch_add(1, Ordering::SeqCst);
        if self.shared.hang_opens.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if consume(&self.shared.fail_opens) {
            return Err(DeviceError::NotFound);
        }
        let (tx, rx) = mpsc::channel(32);
        let outbox = Arc::new(Mutex::new(Some(tx)));
        lock(&self.shared.links).push(outbox.clone());
        Ok(Box::new(SimulatedLink {
            shared: self.shared.clone(),
            tx: outbox,
            rx: Mutex::new(Some(rx)),
        }))
    }
}

impl Transport for Simulator {
    fn open<'a>(&'a self, _address: &'a str) -> AsyncFuture<'a, Box<dyn Link>> {
        Box::pin(self.open_link())
    }
}

struct SimulatedLink {
    shared: Arc<Shared>,
    tx: Outbox,
    rx: Mutex<Option<mpsc::Receiver<Vec<u8>>>>,
}

impl SimulatedLink {
    async fn deliver(&self, data: Vec<u8>) -> Result<(), DeviceError> {
        let tx = lock(&self.tx).clone().ok_or(DeviceError::NotConnected)?;
        if consume(&self.shared.fail_writes) {
            return Err(DeviceError::Closed);
        }
        if data.len() < 5 || !verify(&data) {
            warning!("Simulator rejected {}", hexdump(&data));
            return Ok(());
        }
        lock(&self.shared.writes).push(data.clone());
        if self.shared.silent.load(Ordering::SeqCst) {
            return Ok(());
        }

        let frames = lock(&self.shared.machine).respond(&data);
        let chunk_size = match self.shared.chunk_size.load(Ordering::SeqCst) {
            0 => usize::MAX,
            n => n,
        };
        for frame in frames {
            for chunk in frame.as_bytes().chunks(chunk_size) {
                tx.send(chunk.to_vec())
                    .await
                    .map_err(|_| DeviceError::Closed)?;
            }
        }
        Ok(())
    }
}

impl Link for SimulatedLink {
    fn notifications(&self) -> AsyncFuture<ChunkStream> {
        Box::pin(async {
            if consume(&self.shared.fail_subscribes) {
                return Err(DeviceError::NotConnected);
            }
            let rx = lock(&self.rx).take().ok_or(DeviceError::Closed)?;
            let stream: ChunkStream = Box::pin(ReceiverStream::new(rx));
            Ok(stream)
        })
    }

    fn write(&self, data: Vec<u8>) -> AsyncFuture<()> {
        Box::pin(self.deliver(data))
    }

    fn close(&self) -> AsyncFuture<()> {
        Box::pin(async {
            trace_shutdown!("SimulatedLink::close");
            self.shared.closes.fetch_add(1, Ordering::SeqCst);
            if self.shared.hang_closes.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            lock(&self.tx).take();
            lock(&self.shared.links).retain(|outbox| !Arc::ptr_eq(outbox, &self.tx));
            if self.shared.fail_closes.load(Ordering::SeqCst) {
                return Err(DeviceError::Closed);
            }
            Ok(())
        })
    }

    fn is_connected(&self) -> AsyncFuture<bool> {
        Box::pin(async { Ok(lock(&self.tx).is_some()) })
    }
}
