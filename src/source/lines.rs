//! Newline framing for the serial byte stream

use tracing::warn;

/// Longest line kept; anything longer is treated as noise and dropped
pub const MAX_LINE_LEN: usize = 1024;

/// Accumulates raw bytes and yields complete, trimmed, non-empty lines
///
/// A partial trailing line is kept until its newline arrives. A line that
/// grows past [`MAX_LINE_LEN`] is discarded up to its terminating newline.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
    discarding: bool,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, returning every line they complete
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();

        for chunk in bytes.split_inclusive(|&b| b == b'\n') {
            let (body, terminated) = match chunk.split_last() {
                Some((b'\n', body)) => (body, true),
                _ => (chunk, false),
            };

            if self.discarding {
                self.discarding = !terminated;
                continue;
            }

            if self.pending.len() + body.len() > MAX_LINE_LEN {
                warn!(
                    len = self.pending.len() + body.len(),
                    max = MAX_LINE_LEN,
                    "discarding overlong serial line"
                );
                self.pending.clear();
                self.discarding = !terminated;
                continue;
            }

            self.pending.extend_from_slice(body);
            if terminated {
                let text = String::from_utf8_lossy(&self.pending);
                let text = text.trim();
                if !text.is_empty() {
                    lines.push(text.to_string());
                }
                self.pending.clear();
            }
        }

        lines
    }

    /// Drop any partial line (after the device is reopened)
    pub fn clear(&mut self) {
        self.pending.clear();
        self.discarding = false;
    }

    /// Bytes waiting for a newline
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line() {
        let mut splitter = LineSplitter::new();
        assert_eq!(splitter.push(b"A\n"), vec!["A"]);
        assert_eq!(splitter.pending_len(), 0);
    }

    #[test]
    fn test_partial_reads() {
        let mut splitter = LineSplitter::new();
        assert!(splitter.push(b"SP").is_empty());
        assert!(splitter.push(b"AC").is_empty());
        assert_eq!(splitter.push(b"E\nB"), vec!["SPACE"]);
        assert_eq!(splitter.pending_len(), 1);
        assert_eq!(splitter.push(b"ACK\n"), vec!["BACK"]);
    }

    #[test]
    fn test_crlf_and_blank_lines() {
        let mut splitter = LineSplitter::new();
        let lines = splitter.push(b"H\r\n\r\n   \nPHRASE: thank you  \r\n\n");
        assert_eq!(lines, vec!["H", "PHRASE: thank you"]);
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let mut splitter = LineSplitter::new();
        let lines = splitter.push(b"\xffA\n");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with('A'));
    }

    #[test]
    fn test_clear() {
        let mut splitter = LineSplitter::new();
        splitter.push(b"HAL");
        splitter.clear();
        assert_eq!(splitter.push(b"F\n"), vec!["F"]);
    }

    #[test]
    fn test_overlong_line_is_discarded() {
        let mut splitter = LineSplitter::new();
        let noise = vec![b'x'; 4096];
        for _ in 0..64 {
            assert!(splitter.push(&noise).is_empty());
            assert!(splitter.pending_len() <= MAX_LINE_LEN);
        }

        // The rest of the noisy line goes too; the next line is intact
        assert_eq!(splitter.push(b"xxxx\nA\n"), vec!["A"]);
        assert_eq!(splitter.pending_len(), 0);
    }

    #[test]
    fn test_line_at_limit_is_kept() {
        let mut splitter = LineSplitter::new();
        let mut line = vec![b'B'; MAX_LINE_LEN];
        assert!(splitter.push(&line[..10]).is_empty());
        line.push(b'\n');
        let lines = splitter.push(&line[10..]);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].len(), MAX_LINE_LEN);
    }

    #[test]
    fn test_clear_ends_discarding() {
        let mut splitter = LineSplitter::new();
        splitter.push(&vec![b'x'; MAX_LINE_LEN + 1]);
        splitter.clear();
        assert_eq!(splitter.push(b"C\n"), vec!["C"]);
    }
}
