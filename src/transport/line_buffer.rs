//! Assembles newline-terminated lines from arbitrary byte chunks

/// Lines longer than this are flushed without a terminator
pub const DEFAULT_MAX_LINE_LEN: usize = 4096;

/// Accumulates bytes until a `\n` completes a line
#[derive(Debug, Clone)]
pub struct LineBuffer {
    pending: Vec<u8>,
    max_line_len: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_LEN)
    }
}

impl LineBuffer {
    pub fn new(max_line_len: usize) -> Self {
        Self {
            pending: Vec::with_capacity(256),
            max_line_len: max_line_len.max(1),
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Pop the next complete line, terminator included
    ///
    /// Invalid UTF-8 is replaced rather than rejected; the decoder will
    /// reject such a line anyway. A run of bytes longer than the maximum
    /// line length without a newline is returned as-is so the buffer
    /// cannot grow without bound on a noisy line.
    pub fn next_line(&mut self) -> Option<String> {
        let end = match self.pending.iter().position(|&b| b == b'\n') {
            Some(pos) => pos + 1,
            None if self.pending.len() >= self.max_line_len => {
                char_boundary(&self.pending, self.max_line_len)
            }
            None => return None,
        };
        let line: Vec<u8> = self.pending.drain(..end).collect();
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Bytes received after the last complete line
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Largest cut point `<= limit` that does not split a UTF-8 sequence
///
/// Falls back to `limit` when no boundary is found within one character.
fn char_boundary(bytes: &[u8], limit: usize) -> usize {
    let is_continuation = |i: usize| bytes.get(i).is_some_and(|b| b & 0xC0 == 0x80);
    let mut end = limit;
    while end > 0 && limit - end < 3 && is_continuation(end) {
        end -= 1;
    }
    if end == 0 || is_continuation(end) {
        limit
    } else {
        end
    }
}
