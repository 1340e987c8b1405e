//! Report protocol between a worker and its supervisor
//!
//! The worker bootstrap writes one JSON line to its report descriptor when the
//! submission finishes. A missing report means the worker died abruptly.

use serde::{Deserialize, Serialize};

/// Descriptor number the report pipe is installed at inside the worker
pub const REPORT_FD: i32 = 3;

/// Upper bound on report bytes read from a worker
pub const MAX_REPORT_BYTES: u64 = 4 * 1024 * 1024;

/// Longest text field the bootstrap puts in a report, in characters.
///
/// Escaped as JSON this stays well below [`MAX_REPORT_BYTES`].
pub const MAX_REPORT_TEXT_CHARS: usize = 64 * 1024;

/// How the submission finished, as seen from inside the worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkerReport {
    /// Ran to the end
    Completed,
    /// An import outside the allowlist escaped the submission
    ImportRejected { module: String, message: String },
    /// `MemoryError` escaped the submission
    MemoryExhausted,
    /// `SystemExit` escaped the submission
    Exited { code: Option<String> },
    /// Any other exception escaped the submission
    Fault { diagnostic: String },
}

/// What the supervisor found on the report descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportRead {
    /// Nothing was written
    Empty,
    /// A report line was decoded
    Received(WorkerReport),
    /// Bytes arrived but no complete report could be recovered
    Unreadable,
}

impl ReportRead {
    /// Interpret the captured report bytes; `overflowed` means bytes were dropped at the cap
    #[must_use]
    pub fn from_capture(data: &[u8], overflowed: bool) -> Self {
        if overflowed {
            return Self::Unreadable;
        }
        if data.iter().all(u8::is_ascii_whitespace) {
            return Self::Empty;
        }
        decode(data).map_or(Self::Unreadable, Self::Received)
    }
}

/// Decode the last report line; earlier lines and garbage are ignored
#[must_use]
pub fn decode(data: &[u8]) -> Option<WorkerReport> {
    let text = String::from_utf8_lossy(data);
    text.lines()
        .rev()
        .filter(|line| !line.trim().is_empty())
        .find_map(|line| serde_json::from_str(line).ok())
}
