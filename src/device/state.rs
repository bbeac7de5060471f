use std::collections::BTreeMap;
use std::sync::Mutex;

use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::prelude::*;
use crate::protocol::*;

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// The profile names known for one machine, and the most recently acknowledged selection.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProfileState {
    pub names: BTreeMap<u8, String>,
    pub active: Option<u8>,
}

impl ProfileState {
    /// Seeds `"Profile N"` for every index until the machine reports real names.
    pub fn new(profile_count: u8) -> Self {
        ProfileState {
            names: (1..=profile_count)
                .map(|n| (n, format!("Profile {}", n)))
                .collect(),
            active: None,
        }
    }
}

/// Everything we currently know about the machine.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeviceSnapshot {
    pub status: Option<MonitorStatus>,
    pub profiles: ProfileState,
    pub statistics: Statistics,
}

#[derive(Default)]
struct Handlers {
    status: Vec<Handler<MonitorStatus>>,
    profiles: Vec<Handler<ProfileState>>,
    statistics: Vec<Handler<Statistics>>,
}

struct Inner {
    snapshot: DeviceSnapshot,
    last_status_payload: Option<Vec<u8>>,
}

/// Applies decoded messages to a per-device snapshot and fans out changes to registered handlers.
///
/// This is the only writer of the snapshot. Handlers run on the read loop, outside of any lock, and
/// must not block.
pub struct StateAggregator {
    inner: Mutex<Inner>,
    handlers: Mutex<Handlers>,
    packet_tap: broadcast::Sender<ParsedMessage>,
}

impl StateAggregator {
    pub fn new(profile_count: u8) -> Self {
        let (packet_tap, _) = broadcast::channel(100);
        StateAggregator {
            inner: Mutex::new(Inner {
                snapshot: DeviceSnapshot {
                    status: None,
                    profiles: ProfileState::new(profile_count),
                    statistics: Statistics::default(),
                },
                last_status_payload: None,
            }),
            handlers: Mutex::new(Handlers::default()),
            packet_tap,
        }
    }

    fn inner(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn handlers(&self) -> std::sync::MutexGuard<'_, Handlers> {
        self.handlers.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        self.inner().snapshot.clone()
    }

    pub fn on_status_change(&self, handler: impl Fn(&MonitorStatus) + Send + Sync + 'static) {
        self.handlers().status.push(Arc::new(handler));
    }

    pub fn on_profile_table_change(&self, handler: impl Fn(&ProfileState) + Send + Sync + 'static) {
        self.handlers().profiles.push(Arc::new(handler));
    }

    pub fn on_statistics_change(&self, handler: impl Fn(&Statistics) + Send + Sync + 'static) {
        self.handlers().statistics.push(Arc::new(handler));
    }

    /// Every decoded message, as it arrives. Slow subscribers skip what they missed.
    pub fn packet_tap(&self) -> impl Stream<Item = ParsedMessage> {
        BroadcastStream::new(self.packet_tap.subscribe()).filter_map(|m| m.ok())
    }

    /// Applies one decoded message.
    pub fn apply(&self, message: &ParsedMessage) {
        // Nobody listening is fine
        let _ = self.packet_tap.send(message.clone());

        match &message.response {
            Response::MonitorStatus(status) => {
                let payload = message.frame.payload();
                {
                    let mut inner = self.inner();
                    if inner.last_status_payload.as_deref() == Some(payload) {
                        return;
                    }
                    inner.last_status_payload = Some(payload.to_vec());
                    inner.snapshot.status = Some(status.clone());
                }
                let handlers = self.handlers().status.clone();
                for handler in handlers {
                    handler(status);
                }
            }
            Response::ProfileTable(table) => {
                let profiles = {
                    let mut inner = self.inner();
                    let names = &mut inner.snapshot.profiles.names;
                    for (index, name) in &table.names {
                        names.insert(*index, name.clone());
                    }
                    inner.snapshot.profiles.clone()
                };
                self.notify_profiles(&profiles);
            }
            Response::ProfileChangeAck(ack) => {
                let profiles = {
                    let mut inner = self.inner();
                    inner.snapshot.profiles.active = Some(ack.profile_id);
                    inner.snapshot.profiles.clone()
                };
                self.notify_profiles(&profiles);
            }
            Response::Statistics(page) => {
                let statistics = {
                    let mut inner = self.inner();
                    inner.snapshot.statistics.merge(page);
                    inner.snapshot.statistics.clone()
                };
                let handlers = self.handlers().statistics.clone();
                for handler in handlers {
                    handler(&statistics);
                }
            }
            Response::Unknown(..) => {}
        }
    }

    fn notify_profiles(&self, profiles: &ProfileState) {
        let handlers = self.handlers().profiles.clone();
        for handler in handlers {
            handler(profiles);
        }
    }
}
