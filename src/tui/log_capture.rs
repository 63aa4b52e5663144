//! Log capture for TUI mode
//!
//! A ring buffer that implements `MakeWriter`, so tracing output lands here
//! instead of on the alternate screen. The event loop drains it and shows
//! the latest warning in the status bar.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::MakeWriter;

/// Lines kept between drains. Older lines are dropped first.
const RING_BUFFER_CAPACITY: usize = 200;

/// A thread-safe ring buffer for formatted log lines.
#[derive(Clone)]
pub struct LogBuffer {
    inner: Arc<Mutex<VecDeque<String>>>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(RING_BUFFER_CAPACITY))),
        }
    }

    /// Push a line, evicting the oldest at capacity. A poisoned lock is
    /// recovered rather than propagated.
    pub fn push(&self, line: String) {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if guard.len() >= RING_BUFFER_CAPACITY {
            guard.pop_front();
        }
        guard.push_back(line);
    }

    /// Take all buffered lines, oldest first.
    pub fn drain(&self) -> Vec<String> {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard.drain(..).collect()
    }

    /// Drain and keep only warnings and errors, reduced to their message.
    pub fn drain_warnings(&self) -> Vec<String> {
        self.drain()
            .iter()
            .filter_map(|line| warning_text(line))
            .map(str::to_string)
            .collect()
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// The message part of a WARN or ERROR line from the plain (no ANSI)
/// formatter, e.g. `2024-05-01T10:00:00Z  WARN t2r_cli::push: lost`.
pub fn warning_text(line: &str) -> Option<&str> {
    let rest = [" WARN ", " ERROR "]
        .iter()
        .find_map(|level| line.find(level).map(|i| &line[i + level.len()..]))?;
    let message = match rest.find(": ") {
        Some(i) => &rest[i + 2..],
        None => rest,
    };
    Some(message.trim())
}

/// Buffers bytes and forwards complete lines to a `LogBuffer`.
pub struct BufferWriter {
    buffer: LogBuffer,
    pending: Vec<u8>,
}

impl BufferWriter {
    fn new(buffer: LogBuffer) -> Self {
        Self {
            buffer,
            pending: Vec::new(),
        }
    }

    fn flush_lines(&mut self) {
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let s = String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
            self.buffer.push(s);
        }
    }
}

impl Write for BufferWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.pending.extend_from_slice(buf);
        self.flush_lines();
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if !self.pending.is_empty() {
            let s = String::from_utf8_lossy(&self.pending).into_owned();
            self.buffer.push(s);
            self.pending.clear();
        }
        Ok(())
    }
}

impl Drop for BufferWriter {
    fn drop(&mut self) {
        let _ = Write::flush(self);
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = BufferWriter;

    fn make_writer(&'a self) -> Self::Writer {
        BufferWriter::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_drops_oldest() {
        let buf = LogBuffer::new();
        for i in 0..250 {
            buf.push(format!("line {}", i));
        }
        let lines = buf.drain();
        assert_eq!(lines.len(), RING_BUFFER_CAPACITY);
        assert_eq!(lines[0], "line 50");
        assert!(buf.drain().is_empty());
    }

    #[test]
    fn test_writer_splits_lines_and_flushes_partial_on_drop() {
        let buf = LogBuffer::new();
        {
            let mut writer = BufferWriter::new(buf.clone());
            write!(writer, "one\ntw").unwrap();
            assert_eq!(buf.drain(), vec!["one"]);
        }
        assert_eq!(buf.drain(), vec!["tw"]);
    }

    #[test]
    fn test_warning_text() {
        assert_eq!(
            warning_text("2024-05-01T10:00:00.000Z  WARN t2r_cli::push: Push channel disconnected"),
            Some("Push channel disconnected")
        );
        assert_eq!(
            warning_text("2024-05-01T10:00:00.000Z ERROR t2r_cli::tui::backend: Backend channel closed"),
            Some("Backend channel closed")
        );
        assert_eq!(
            warning_text("2024-05-01T10:00:00.000Z  INFO t2r_cli: started"),
            None
        );
    }

    #[test]
    fn test_drain_warnings_filters() {
        let buf = LogBuffer::new();
        buf.push("t DEBUG x: noise".to_string());
        buf.push("t  WARN x: careful".to_string());
        assert_eq!(buf.drain_warnings(), vec!["careful"]);
        assert!(buf.drain().is_empty());
    }
}
