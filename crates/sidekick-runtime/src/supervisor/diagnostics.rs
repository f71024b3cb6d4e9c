//! Trailing capture of the engine's stderr.
//!
//! The engine can emit non-UTF8 bytes, so lines are read as bytes and
//! decoded lossily.

use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::debug;

/// Bytes of stderr kept per process.
pub const DIAGNOSTIC_CAPACITY: usize = 5000;

/// Lines of diagnostics attached to startup failures.
pub const DIAGNOSTIC_LINES: usize = 5;

/// Shared, byte-bounded tail of diagnostic output.
#[derive(Debug, Clone)]
pub(crate) struct DiagnosticTail {
    buffer: Arc<Mutex<String>>,
    capacity: usize,
}

impl DiagnosticTail {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(String::new())),
            capacity,
        }
    }

    pub(crate) fn push_line(&self, line: &str) {
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.push_str(line);
            buffer.push('\n');
            trim_front(&mut buffer, self.capacity);
        }
    }

    /// The last `n` non-empty lines, oldest first.
    pub(crate) fn last_lines(&self, n: usize) -> String {
        let Ok(buffer) = self.buffer.lock() else {
            return String::new();
        };
        let mut lines: Vec<&str> = buffer
            .lines()
            .rev()
            .filter(|l| !l.trim().is_empty())
            .take(n)
            .collect();
        lines.reverse();
        lines.join("\n")
    }

    #[cfg(test)]
    fn contents(&self) -> String {
        self.buffer.lock().map(|b| b.clone()).unwrap_or_default()
    }
}

fn trim_front(buffer: &mut String, capacity: usize) {
    if buffer.len() <= capacity {
        return;
    }
    let mut cut = buffer.len() - capacity;
    while !buffer.is_char_boundary(cut) {
        cut += 1;
    }
    buffer.drain(..cut);
}

/// Copy `stream` into `tail` line by line until EOF.
pub(crate) fn spawn_stderr_reader(
    stream: impl AsyncRead + Unpin + Send + 'static,
    port: u16,
    tail: DiagnosticTail,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf: Vec<u8> = Vec::with_capacity(1024);

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    while matches!(buf.last(), Some(b'\n' | b'\r')) {
                        buf.pop();
                    }
                    let line = String::from_utf8_lossy(&buf);
                    debug!(port, "engine: {}", line);
                    tail.push_line(&line);
                }
                Err(e) => {
                    debug!(port, error = %e, "stderr reader exiting due to read error");
                    break;
                }
            }
        }

        debug!(port, "stderr reader task exiting");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_is_bounded() {
        let tail = DiagnosticTail::new(20);
        for i in 0..10 {
            tail.push_line(&format!("line {i}"));
        }
        let contents = tail.contents();
        assert!(contents.len() <= 20);
        assert!(contents.ends_with("line 9\n"));
    }

    #[test]
    fn test_trim_respects_char_boundaries() {
        let mut buffer = "ééééé".to_string();
        trim_front(&mut buffer, 5);
        assert_eq!(buffer, "éé");
    }

    #[test]
    fn test_last_lines_skips_blank_lines() {
        let tail = DiagnosticTail::new(DIAGNOSTIC_CAPACITY);
        for line in ["a", "", "b", "c", "  ", "d", "e", "f"] {
            tail.push_line(line);
        }
        assert_eq!(tail.last_lines(DIAGNOSTIC_LINES), "b\nc\nd\ne\nf");
    }

    #[tokio::test]
    async fn test_reader_decodes_lossily() {
        let tail = DiagnosticTail::new(DIAGNOSTIC_CAPACITY);
        let input: &[u8] = b"first\r\nbad \xff byte\nlast";
        spawn_stderr_reader(input, 8765, tail.clone()).await.unwrap();
        assert_eq!(tail.last_lines(5), "first\nbad \u{fffd} byte\nlast");
    }
}
