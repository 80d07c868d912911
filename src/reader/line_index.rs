use memchr::memchr2;

/// Line boundary index shared by the mmap and streaming sources.
///
/// `ends[i]` is the byte offset one past the terminator of line `i`, so
/// line `i` spans `start(i)..ends[i]` with `start(0) == 0` and
/// `start(i) == ends[i - 1]`. Terminators are `\n`, `\r\n` and a bare `\r`.
///
/// The index can be extended incrementally: `scanned()` is the offset where
/// the next call to [`LineIndex::extend`] must resume.
#[derive(Debug, Default)]
pub struct LineIndex {
    ends: Vec<u64>,
    scanned: u64,
}

impl LineIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of lines whose terminator has been seen
    pub fn terminated_lines(&self) -> usize {
        self.ends.len()
    }

    /// Offset up to which bytes have been consumed
    pub fn scanned(&self) -> u64 {
        self.scanned
    }

    /// Offset where the first unterminated byte (if any) starts
    pub fn tail_start(&self) -> u64 {
        self.ends.last().copied().unwrap_or(0)
    }

    /// Number of lines for a file of `total_len` bytes that will not grow.
    ///
    /// Counts a trailing line without a terminator.
    pub fn complete_line_count(&self, total_len: u64) -> usize {
        if total_len > self.tail_start() {
            self.ends.len() + 1
        } else {
            self.ends.len()
        }
    }

    /// Byte range of `line`, terminator included. Lines past the last
    /// terminator end at `total_len`.
    pub fn span(&self, line: usize, total_len: u64) -> Option<(u64, u64)> {
        let start = if line == 0 {
            0
        } else {
            *self.ends.get(line - 1)?
        };
        let end = self.ends.get(line).copied().unwrap_or(total_len);
        if start > end || (line >= self.ends.len() && start >= total_len) {
            return None;
        }
        Some((start, end))
    }

    /// Scan `chunk`, which must hold the file bytes starting at `scanned()`.
    ///
    /// When `complete` is false a `\r` that is the last byte of `chunk` is
    /// left unconsumed, since the next byte decides whether it is `\r\n`.
    /// Returns the number of bytes consumed.
    pub fn extend(&mut self, chunk: &[u8], complete: bool) -> usize {
        let base = self.scanned;
        let mut pos = 0usize;
        let consumed = loop {
            let Some(offset) = memchr2(b'\n', b'\r', &chunk[pos..]) else {
                break chunk.len();
            };
            let at = pos + offset;
            let next = if chunk[at] == b'\r' {
                if at + 1 < chunk.len() {
                    if chunk[at + 1] == b'\n' {
                        at + 2
                    } else {
                        at + 1
                    }
                } else if complete {
                    at + 1
                } else {
                    break at;
                }
            } else {
                at + 1
            };
            self.ends.push(base + next as u64);
            pos = next;
        };
        self.scanned = base + consumed as u64;
        consumed
    }

    /// Approximate heap usage in bytes
    pub fn memory_usage(&self) -> usize {
        self.ends.capacity() * std::mem::size_of::<u64>()
    }
}

/// Strip one trailing `\r\n`, `\n` or `\r`.
pub fn strip_terminator(bytes: &[u8]) -> &[u8] {
    match bytes {
        [rest @ .., b'\r', b'\n'] => rest,
        [rest @ .., b'\n'] | [rest @ .., b'\r'] => rest,
        _ => bytes,
    }
}
