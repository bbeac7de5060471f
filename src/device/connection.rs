use stream_cancel::{StreamExt as _, Trigger, Tripwire};
use tokio::time::Instant;

use super::{frame_stream, ChunkStream, Correlator, DeviceError, Link, StateAggregator, Transport};
use crate::config::{DeviceConfig, Timing};
use crate::prelude::*;
use crate::protocol::{hexdump, ParsedMessage};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Tracks whether the read loop of the current link is still running.
#[derive(Clone)]
struct Alive(Arc<std::sync::Mutex<bool>>);

impl Alive {
    fn new(alive: bool) -> Self {
        Self(Arc::new(std::sync::Mutex::new(alive)))
    }

    fn is_alive(&self) -> bool {
        if let Ok(alive) = self.0.lock() {
            *alive
        } else {
            false
        }
    }

    fn deaden(&self) {
        if let Ok(mut alive) = self.0.lock() {
            if *alive {
                trace_shutdown!("Alive::deaden");
            }
            *alive = false;
        }
    }
}

/// Owns the physical link to one machine.
///
/// Inbound notifications are reassembled, decoded once, applied to the [`StateAggregator`] and then
/// offered to the [`Correlator`], all on a spawned read loop that never blocks the transport.
pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    address: String,
    name: String,
    timing: Timing,
    link: Option<Box<dyn Link>>,
    state: ConnectionState,
    alive: Alive,
    trigger: Option<Trigger>,
    correlator: Correlator,
    aggregator: Arc<StateAggregator>,
}

impl ConnectionManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        config: &DeviceConfig,
        correlator: Correlator,
        aggregator: Arc<StateAggregator>,
    ) -> Self {
        ConnectionManager {
            transport,
            address: config.address.clone(),
            name: config.name.clone(),
            timing: config.timing.clone(),
            link: None,
            state: ConnectionState::Disconnected,
            alive: Alive::new(false),
            trigger: None,
            correlator,
            aggregator,
        }
    }

    /// The current state. A link whose notification stream has ended is reported as disconnected.
    pub fn state(&self) -> ConnectionState {
        if self.state == ConnectionState::Connected && !self.alive.is_alive() {
            ConnectionState::Disconnected
        } else {
            self.state
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Connects if there is no live link, retrying with a fixed backoff.
    pub async fn connect(&mut self) -> Result<(), DeviceError> {
        if self.is_connected() {
            return Ok(());
        }
        if self.link.is_some() {
            trace_shutdown!("ConnectionManager::connect (stale link)");
            self.disconnect().await;
        }

        let attempts = self.timing.attempts();
        let mut last = DeviceError::NotFound;
        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(self.timing.backoff()).await;
            }
            self.state = ConnectionState::Connecting;
            match self.open_once().await {
                Ok(()) => {
                    self.state = ConnectionState::Connected;
                    info!("Connected to {} ({})", self.name, self.address);
                    return Ok(());
                }
                Err(e) => {
                    warning!(
                        "Connection attempt {}/{} to {} failed: {}",
                        attempt,
                        attempts,
                        self.name,
                        e
                    );
                    self.state = ConnectionState::Disconnected;
                    last = e;
                }
            }
        }
        Err(DeviceError::Exhausted {
            attempts,
            last: Box::new(last),
        })
    }

    /// A single attempt: open the link and subscribe, both within one deadline.
    async fn open_once(&mut self) -> Result<(), DeviceError> {
        let deadline = Instant::now() + self.timing.connect_timeout();
        let transport = self.transport.clone();
        let link = tokio::time::timeout_at(deadline, transport.open(&self.address))
            .await
            .map_err(|_| DeviceError::Timeout)??;

        let chunks = match tokio::time::timeout_at(deadline, link.notifications()).await {
            Ok(Ok(chunks)) => chunks,
            Ok(Err(e)) => {
                self.close_link(link).await;
                return Err(e);
            }
            Err(_) => {
                self.close_link(link).await;
                return Err(DeviceError::Timeout);
            }
        };

        let alive = Alive::new(true);
        let (trigger, tripwire) = Tripwire::new();
        tokio::spawn(Self::read_loop(
            chunks,
            tripwire,
            alive.clone(),
            self.correlator.clone(),
            self.aggregator.clone(),
        ));
        self.link = Some(link);
        self.alive = alive;
        self.trigger = Some(trigger);
        Ok(())
    }

    async fn read_loop(
        chunks: ChunkStream,
        tripwire: Tripwire,
        alive: Alive,
        correlator: Correlator,
        aggregator: Arc<StateAggregator>,
    ) {
        let frames = frame_stream(chunks).take_until_if(tripwire);
        futures::pin_mut!(frames);
        while let Some(frame) = frames.next().await {
            let message = ParsedMessage::decode(frame);
            aggregator.apply(&message);
            correlator.offer(&message);
        }
        trace_shutdown!("ConnectionManager::read_loop");
        alive.deaden();
    }

    async fn close_link(&self, link: Box<dyn Link>) {
        match tokio::time::timeout(self.timing.disconnect_timeout(), link.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warning!("Error while closing link to {}: {}", self.name, e),
            Err(_) => warning!("Timed out closing link to {}", self.name),
        }
    }

    /// Best-effort close. Local state is always cleared, even if the close fails or times out.
    pub async fn disconnect(&mut self) {
        // Dropping the trigger stops the read loop
        drop(self.trigger.take());
        if let Some(link) = self.link.take() {
            self.close_link(link).await;
            info!("Disconnected from {}", self.name);
        }
        self.alive.deaden();
        self.state = ConnectionState::Disconnected;
    }

    /// Writes one signed command to the current link.
    pub async fn write(&self, bytes: &[u8]) -> Result<(), DeviceError> {
        let link = self.link.as_ref().ok_or(DeviceError::NotConnected)?;
        if !self.alive.is_alive() {
            return Err(DeviceError::Closed);
        }
        trace_packet!("{{host->device}} {}", hexdump(bytes));
        link.write(bytes.to_vec()).await
    }
}
