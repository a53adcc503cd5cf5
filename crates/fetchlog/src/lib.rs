//! Recorded syscall traces: what a host saw each context fetch, in order,
//! so fetch sequences can be replayed against the engine offline.

use std::io;
use std::io::{Read, Write};
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Frames larger than this are treated as corruption rather than allocated.
pub const MAX_FRAME_SIZE: u64 = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceEvent {
    Enter(EnterEvent),
    Fetch(FetchEvent),
    Exit(ExitEvent),
}

impl TraceEvent {
    pub fn context(&self) -> u64 {
        match self {
            TraceEvent::Enter(e) => e.context,
            TraceEvent::Fetch(e) => e.context,
            TraceEvent::Exit(e) => e.context,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnterEvent {
    pub context: u64,
    pub syscall: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchEvent {
    pub context: u64,
    pub address: u64,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitEvent {
    pub context: u64,
}

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("trace I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("could not encode trace event: {0}")]
    Encode(bincode::Error),

    #[error("could not decode trace event: {0}")]
    Decode(bincode::Error),

    #[error("frame of {0} bytes exceeds the {} byte limit", MAX_FRAME_SIZE)]
    FrameTooLarge(u64),
}

/// Writes events as a little-endian `u64` length followed by the bincode payload.
pub struct TraceWriter<W: Write> {
    inner: W,
}

impl<W: Write> TraceWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn write_event(&mut self, event: &TraceEvent) -> Result<(), TraceError> {
        let encoded = bincode::serialize(event).map_err(TraceError::Encode)?;
        let size = encoded.len() as u64;
        if size > MAX_FRAME_SIZE {
            return Err(TraceError::FrameTooLarge(size));
        }

        self.inner.write_all(&size.to_le_bytes())?;
        self.inner.write_all(&encoded)?;

        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), TraceError> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Iterates the frames written by [`TraceWriter`]. Ends cleanly when the
/// input runs out on a frame boundary.
pub struct TraceReader<R: Read> {
    inner: R,
    done: bool,
}

impl<R: Read> TraceReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, done: false }
    }

    fn read_event(&mut self) -> Result<Option<TraceEvent>, TraceError> {
        let mut size_buffer = [0u8; 8];
        match self.inner.read_exact(&mut size_buffer) {
            Ok(()) => {},
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let size = u64::from_le_bytes(size_buffer);
        if size > MAX_FRAME_SIZE {
            return Err(TraceError::FrameTooLarge(size));
        }

        let mut buffer = vec![0u8; size as usize];
        self.inner.read_exact(&mut buffer)?;

        bincode::deserialize(&buffer[..])
            .map(Some)
            .map_err(TraceError::Decode)
    }
}

impl<R: Read> Iterator for TraceReader<R> {
    type Item = Result<TraceEvent, TraceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.read_event() {
            Ok(Some(event)) => Some(Ok(event)),
            Ok(None) => {
                self.done = true;
                None
            },
            Err(e) => {
                self.done = true;
                Some(Err(e))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::*;

    fn sample() -> Vec<TraceEvent> {
        vec![
            TraceEvent::Enter(EnterEvent { context: 1, syscall: 7 }),
            TraceEvent::Fetch(FetchEvent { context: 1, address: 100, bytes: vec![1, 2, 3, 4] }),
            TraceEvent::Fetch(FetchEvent { context: 1, address: 100, bytes: vec![1, 2, 9, 9] }),
            TraceEvent::Exit(ExitEvent { context: 1 }),
        ]
    }

    #[test]
    fn written_traces_read_back_in_order() {
        let mut writer = TraceWriter::new(Vec::new());
        for event in sample().iter() {
            writer.write_event(event).unwrap();
        }

        let bytes = writer.into_inner();
        let events = TraceReader::new(bytes.as_slice())
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert_eq!(events, sample());
    }

    #[test]
    fn truncated_frames_are_an_error() {
        let mut writer = TraceWriter::new(Vec::new());
        writer.write_event(&sample()[1]).unwrap();

        let mut bytes = writer.into_inner();
        bytes.truncate(bytes.len() - 2);
        let mut reader = TraceReader::new(bytes.as_slice());

        assert!(matches!(reader.next(), Some(Err(TraceError::Io(_)))));
        assert!(reader.next().is_none());
    }

    #[test]
    fn oversized_frames_are_rejected_before_allocating() {
        let bytes = (MAX_FRAME_SIZE + 1).to_le_bytes();
        let mut reader = TraceReader::new(&bytes[..]);

        assert!(matches!(reader.next(), Some(Err(TraceError::FrameTooLarge(_)))));
    }

    #[test]
    fn events_know_their_context() {
        assert!(sample().iter().all(|e| e.context() == 1));
    }
}
