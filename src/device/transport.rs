use crate::prelude::*;

/// Raw notification chunks as delivered by the link. Chunk boundaries carry no meaning.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>;

/// An open connection to a single machine.
///
/// Async-ish traits for read/write. See https://smallcultfollowing.com/babysteps/blog/2019/10/26/async-fn-in-traits-are-hard/
/// for some tips on making async trait functions.
pub trait Link: Send + Sync {
    /// Subscribes to the notification channel. May only be called once per link.
    fn notifications(&self) -> AsyncFuture<ChunkStream>;

    /// Write one command to the machine.
    fn write(&self, data: Vec<u8>) -> AsyncFuture<()>;

    fn close(&self) -> AsyncFuture<()>;

    fn is_connected(&self) -> AsyncFuture<bool>;
}

/// Opens links by address.
pub trait Transport: Send + Sync {
    fn open<'a>(&'a self, address: &'a str) -> AsyncFuture<'a, Box<dyn Link>>;
}
