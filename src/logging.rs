//! Logging setup and the bounded in-memory log buffer.
//!
//! Every formatted log line is mirrored into a [`LogBuffer`] so a run can be
//! exported afterwards for debugging. The buffer keeps the most recent lines
//! only.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Default number of retained lines
pub const DEFAULT_CAPACITY: usize = 2000;

#[derive(Debug, Clone)]
pub struct LogBuffer {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(1024)))),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<String>> {
        // A panic while holding the lock leaves the buffer usable
        self.lines.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push(&self, line: impl Into<String>) {
        let mut lines = self.lock();
        while lines.len() >= self.capacity {
            lines.pop_front();
        }
        lines.push_back(line.into());
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    /// Plain text report of the retained lines, suitable for attaching to a bug report
    pub fn report(&self, page: &str) -> String {
        let lines = self.snapshot();
        let mut out = vec![
            "=== COURSEDL LOGS ===".to_string(),
            format!("Generated: {}", chrono::Utc::now().to_rfc3339()),
            format!("Page URL: {page}"),
            format!("Total log entries: {}", lines.len()),
            String::new(),
            "=== DETAILED LOGS ===".to_string(),
        ];
        out.extend(lines);
        out.join("\n")
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBufferWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogBufferWriter {
            buffer: self.clone(),
            pending: Vec::new(),
        }
    }
}

/// Collects one formatted event and hands its lines to the buffer on drop
pub struct LogBufferWriter {
    buffer: LogBuffer,
    pending: Vec<u8>,
}

impl Write for LogBufferWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for LogBufferWriter {
    fn drop(&mut self) {
        let text = String::from_utf8_lossy(&self.pending);
        for line in text.lines().map(|l| l.trim_end_matches('\r')) {
            if !line.is_empty() {
                self.buffer.push(line);
            }
        }
    }
}

/// Install the global subscriber: stderr output plus a copy into the returned buffer.
///
/// The filter defaults to `info` and honours `RUST_LOG`.
pub fn init(capacity: usize) -> LogBuffer {
    let buffer = LogBuffer::new(capacity);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer().with_writer(io::stderr).with_target(false);

    let buffer_layer = fmt::layer()
        .with_ansi(false)
        .with_timer(ChronoUtc::rfc_3339())
        .with_writer(buffer.clone());

    if let Err(e) = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(buffer_layer)
        .try_init()
    {
        eprintln!("Failed to install log subscriber: {e}");
    }

    buffer
}
