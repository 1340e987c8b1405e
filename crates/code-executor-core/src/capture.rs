//! Per-execution output capture
//!
//! Each worker writes stdout and stderr into one private pipe. A reader task
//! drains it into a [`CaptureBuffer`] owned by that execution alone. Bytes past
//! the cap are counted and dropped so the worker never stalls on a full pipe.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;

/// Appended when captured output exceeded the cap
pub const TRUNCATION_MARKER: &str = "\n... (output truncated)";

const READ_CHUNK: usize = 8 * 1024;

/// Bounded byte buffer that remembers how much it refused
#[derive(Debug)]
pub struct CaptureBuffer {
    data: Vec<u8>,
    limit: usize,
    total: u64,
}

impl CaptureBuffer {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            data: Vec::new(),
            limit,
            total: 0,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.total = self.total.saturating_add(chunk.len() as u64);
        let room = self.limit.saturating_sub(self.data.len());
        let take = room.min(chunk.len());
        self.data.extend_from_slice(&chunk[..take]);
    }

    /// Bytes written by the worker, kept or not
    #[must_use]
    pub const fn total_bytes(&self) -> u64 {
        self.total
    }

    #[must_use]
    pub fn overflowed(&self) -> bool {
        self.total > self.data.len() as u64
    }

    /// Text form: lossy UTF-8 of the kept bytes; when the cap was hit the cut
    /// backs off to a character boundary and the marker is appended
    #[must_use]
    pub fn render(&self) -> String {
        if !self.overflowed() {
            return String::from_utf8_lossy(&self.data).into_owned();
        }
        let mut text = String::from_utf8_lossy(trim_incomplete_tail(&self.data)).into_owned();
        text.push_str(TRUNCATION_MARKER);
        text
    }
}

/// Drop a multi-byte sequence left incomplete by the cap
fn trim_incomplete_tail(bytes: &[u8]) -> &[u8] {
    let len = bytes.len();
    let start = len.saturating_sub(4);
    for i in (start..len).rev() {
        let b = bytes[i];
        if b & 0xC0 == 0x80 {
            continue; // continuation byte
        }
        let width = match b {
            0x00..=0x7F => 1,
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => return bytes,
        };
        return if i + width > len { &bytes[..i] } else { bytes };
    }
    bytes
}

/// Capture buffer shared between one execution's reader task and its supervisor
#[derive(Debug, Clone)]
pub struct OutputCapture {
    buffer: Arc<Mutex<CaptureBuffer>>,
}

impl OutputCapture {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(CaptureBuffer::new(limit))),
        }
    }

    /// Drain `reader` until EOF in a background task
    pub fn spawn_reader<R>(&self, mut reader: R) -> JoinHandle<std::io::Result<()>>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::clone(&self.buffer);
        tokio::spawn(async move {
            let mut chunk = vec![0u8; READ_CHUNK];
            loop {
                let n = reader.read(&mut chunk).await?;
                if n == 0 {
                    return Ok(());
                }
                buffer.lock().push(&chunk[..n]);
            }
        })
    }

    /// Output captured so far, in its final text form
    #[must_use]
    pub fn snapshot(&self) -> String {
        self.buffer.lock().render()
    }

    /// Raw bytes kept so far
    #[must_use]
    pub fn contents(&self) -> Vec<u8> {
        self.buffer.lock().data.clone()
    }

    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.buffer.lock().total_bytes()
    }

    /// Whether bytes were dropped at the cap
    #[must_use]
    pub fn overflowed(&self) -> bool {
        self.buffer.lock().overflowed()
    }
}
