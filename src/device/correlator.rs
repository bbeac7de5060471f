use std::sync::Mutex;

use tokio::sync::oneshot;

use crate::prelude::*;
use crate::protocol::ParsedMessage;

struct PendingRequest {
    id: u64,
    response_type: u8,
    tx: oneshot::Sender<ParsedMessage>,
}

#[derive(Default)]
struct Slot {
    next_id: u64,
    pending: Option<PendingRequest>,
}

/// Pairs an outstanding command with the next inbound message of the type it expects.
///
/// There is at most one outstanding request at a time: traffic is serialized above this layer, so
/// registering a new wait replaces any stale one.
#[derive(Clone, Default)]
pub struct Correlator {
    slot: Arc<Mutex<Slot>>,
}

impl Correlator {
    pub fn new() -> Self {
        Correlator::default()
    }

    fn with_slot<T>(&self, f: impl FnOnce(&mut Slot) -> T) -> T {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut slot)
    }

    /// Registers a wait for `response_type`. This must happen before the command is written, or a
    /// fast reply could slip past.
    pub fn register(&self, response_type: u8) -> PendingResponse {
        let (tx, rx) = oneshot::channel();
        let id = self.with_slot(|slot| {
            slot.next_id += 1;
            if let Some(stale) = slot.pending.take() {
                warning!(
                    "Replacing stale wait for {:#04x} with {:#04x}",
                    stale.response_type,
                    response_type
                );
            }
            slot.pending = Some(PendingRequest {
                id: slot.next_id,
                response_type,
                tx,
            });
            slot.next_id
        });
        PendingResponse {
            id,
            rx,
            correlator: self.clone(),
        }
    }

    /// Offers an inbound message to the outstanding wait. Returns true if it completed the wait.
    pub fn offer(&self, message: &ParsedMessage) -> bool {
        let pending = self.with_slot(|slot| {
            let expected = slot.pending.as_ref().map(|p| p.response_type);
            if expected == Some(message.message_type()) {
                slot.pending.take()
            } else {
                None
            }
        });
        match pending {
            Some(pending) => pending.tx.send(message.clone()).is_ok(),
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.with_slot(|slot| slot.pending.is_some())
    }

    fn release(&self, id: u64) {
        self.with_slot(|slot| {
            if slot.pending.as_ref().map(|p| p.id) == Some(id) {
                slot.pending = None;
            }
        });
    }
}

/// A registered wait. Dropping it (ie: when the caller gives up) clears the outstanding request.
pub struct PendingResponse {
    id: u64,
    rx: oneshot::Receiver<ParsedMessage>,
    correlator: Correlator,
}

impl PendingResponse {
    /// Waits for the response, or `None` if `timeout` elapses first.
    pub async fn wait(mut self, timeout: Duration) -> Option<ParsedMessage> {
        match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(message)) => Some(message),
            Ok(Err(_)) => {
                warning!("Wait was replaced before a response arrived");
                None
            }
            Err(_) => {
                warning!("Timed out after {:?} waiting for a response", timeout);
                None
            }
        }
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        self.correlator.release(self.id);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::protocol::{test::*, RawFrame};

    fn message(bytes: &[u8]) -> ParsedMessage {
        ParsedMessage::decode(RawFrame::from_slice(bytes))
    }

    #[tokio::test]
    async fn resolves_matching_type() {
        let correlator = Correlator::new();
        let pending = correlator.register(0x75);
        assert!(!correlator.offer(&message(&RESPONSE_BREW_RECEIVED)));
        assert!(correlator.offer(&message(&RESPONSE_STATUS_DEVICE_READY)));
        assert!(!correlator.is_pending());
        let response = pending.wait(Duration::from_secs(10)).await;
        assert_eq!(response, Some(message(&RESPONSE_STATUS_DEVICE_READY)));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out() {
        let correlator = Correlator::new();
        let pending = correlator.register(0xa9);
        let start = tokio::time::Instant::now();
        assert_eq!(pending.wait(Duration::from_secs(10)).await, None);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        assert!(!correlator.is_pending());
    }

    #[test]
    fn abandoned_wait_is_cleared() {
        let correlator = Correlator::new();
        let pending = correlator.register(0x75);
        assert!(correlator.is_pending());
        drop(pending);
        assert!(!correlator.is_pending());
        assert!(!correlator.offer(&message(&RESPONSE_STATUS_DEVICE_READY)));
    }

    #[test]
    fn stale_guard_does_not_clear_new_wait() {
        let correlator = Correlator::new();
        let first = correlator.register(0x75);
        let _second = correlator.register(0xa2);
        drop(first);
        assert!(correlator.is_pending());
    }
}
