use crate::prelude::*;

use async_stream::stream;

use crate::protocol::{hexdump, verify, RawFrame, INBOUND_MARKER};

/// Reassembles frames from arbitrarily-chunked notification bytes.
///
/// Bytes before a start marker are discarded, and a frame is only cut once the buffer holds as many
/// bytes as its length byte announces. Frames that fail the checksum are dropped.
#[derive(Default)]
pub struct FrameAssembler {
    buffer: Vec<u8>,
}

impl FrameAssembler {
    pub fn new() -> Self {
        FrameAssembler::default()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Accumulates a single chunk, returning every frame it completes (possibly none).
    pub fn accumulate(&mut self, chunk: &[u8]) -> Vec<RawFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = vec![];
        loop {
            match self.buffer.iter().position(|b| *b == INBOUND_MARKER) {
                None => {
                    if !self.buffer.is_empty() {
                        trace_packet!("Dropping unframed bytes {}", hexdump(&self.buffer));
                        self.buffer.clear();
                    }
                    break;
                }
                Some(0) => {}
                Some(n) => {
                    trace_packet!("Dropping unframed bytes {}", hexdump(&self.buffer[..n]));
                    self.buffer.drain(..n);
                }
            }

            if self.buffer.len() < 2 {
                break;
            }
            let frame_len = self.buffer[1] as usize + 1;
            if self.buffer.len() < frame_len {
                break;
            }

            let frame: Vec<u8> = self.buffer.drain(..frame_len).collect();
            if verify(&frame) {
                frames.push(RawFrame::from_vec(frame));
            } else {
                warning!("Checksum mismatch, dropping {}", hexdump(&frame));
            }
        }
        frames
    }
}

/// Converts a stream of raw notification chunks into a stream of checksum-verified frames.
pub fn frame_stream<T>(mut chunks: T) -> impl Stream<Item = RawFrame>
where
    T: Stream<Item = Vec<u8>> + Unpin,
{
    stream! {
        let mut assembler = FrameAssembler::new();
        while let Some(chunk) = chunks.next().await {
            trace_packet!("{{device->host}} {}", hexdump(&chunk));
            for frame in assembler.accumulate(&chunk) {
                yield frame;
            }
        }
        trace_shutdown!("frame_stream");
    }
}
