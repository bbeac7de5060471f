//! The transport-facing half of the driver: reassembling notifications into frames, owning the
//! connection, correlating commands with their responses, and aggregating decoded state.

use thiserror::Error;

mod bt;
mod connection;
mod correlator;
#[allow(clippy::module_inception)]
mod device;
mod frame_stream;
pub mod simulate;
mod state;
mod transport;

pub use bt::BluetoothTransport;
pub use connection::{ConnectionManager, ConnectionState};
pub use correlator::{Correlator, PendingResponse};
pub use device::Device;
pub use frame_stream::{frame_stream, FrameAssembler};
pub use state::{DeviceSnapshot, ProfileState, StateAggregator};
pub use transport::{ChunkStream, Link, Transport};

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("not found")]
    NotFound,
    #[error("timed out")]
    Timeout,
    #[error(transparent)]
    BTError(#[from] btleplug::Error),
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    #[error("not connected")]
    NotConnected,
    #[error("connection closed")]
    Closed,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Config(#[from] serde_json::Error),
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: usize,
        last: Box<DeviceError>,
    },
}

impl DeviceError {
    /// Transport errors are worth retrying from a fresh connection. Everything else is the
    /// caller's problem.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            DeviceError::NotFound
                | DeviceError::Timeout
                | DeviceError::BTError(..)
                | DeviceError::IOError(..)
                | DeviceError::NotConnected
                | DeviceError::Closed
        )
    }
}
