//! Line-oriented reading helpers.
//!
//! Credential lists can be large, so [`open_lines`] switches to a memory map
//! above a size threshold. The same newline scanning backs
//! [`LineBuffer`], which reassembles engine output arriving in arbitrary
//! chunks.
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use memmap2::Mmap;

/// Files at or above this size are memory-mapped instead of streamed.
pub const DEFAULT_MMAP_THRESHOLD_BYTES: u64 = 16 * 1024 * 1024; // 16 MiB

pub type LineIter = Box<dyn Iterator<Item = io::Result<String>> + Send + 'static>;

/// Open `path` and iterate its lines, memory-mapping when the file is at
/// least `threshold_bytes` long. Line terminators (`\n` or `\r\n`) are
/// stripped and invalid UTF-8 is replaced rather than rejected.
pub fn open_lines<P: AsRef<Path>>(path: P, threshold_bytes: u64) -> io::Result<LineIter> {
    let file = File::open(path.as_ref())?;
    let meta = file.metadata()?;
    if meta.is_file() && meta.len() > 0 && meta.len() >= threshold_bytes {
        // SAFETY: the map is read-only and lives as long as the iterator; a
        // concurrent truncation by another process is outside our contract.
        let mmap = unsafe { Mmap::map(&file) }?;
        Ok(Box::new(MappedLines { mmap, pos: 0 }))
    } else {
        Ok(Box::new(BufferedLines {
            reader: BufReader::new(file),
            buf: Vec::new(),
        }))
    }
}

struct BufferedLines {
    reader: BufReader<File>,
    buf: Vec<u8>,
}

impl Iterator for BufferedLines {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => Some(Ok(decode_line(&self.buf))),
            Err(e) => Some(Err(e)),
        }
    }
}

struct MappedLines {
    mmap: Mmap,
    pos: usize,
}

impl Iterator for MappedLines {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let data: &[u8] = &self.mmap;
        if self.pos >= data.len() {
            return None;
        }
        let start = self.pos;
        let end = match memchr::memchr(b'\n', &data[start..]) {
            Some(off) => start + off + 1,
            None => data.len(),
        };
        self.pos = end;
        Some(Ok(decode_line(&data[start..end])))
    }
}

/// Strip one trailing `\n` and/or `\r` and decode lossily.
pub fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Accumulates raw output bytes and hands back complete lines.
///
/// Bytes after the last newline stay pending until more data arrives or the
/// buffer is drained with [`LineBuffer::drain`]. Popping a line only moves a
/// read offset; consumed bytes are dropped in bulk when more data arrives.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
    // Start of the first unconsumed byte.
    start: usize,
    // Bytes in `start..scanned` contain no newline.
    scanned: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, chunk: &[u8]) {
        if self.start > 0 && self.start * 2 >= self.pending.len() {
            self.pending.drain(..self.start);
            self.scanned -= self.start;
            self.start = 0;
        }
        self.pending.extend_from_slice(chunk);
    }

    /// Pop the next complete line, without its terminator.
    pub fn next_line(&mut self) -> Option<String> {
        let nl = match memchr::memchr(b'\n', &self.pending[self.scanned..]) {
            Some(off) => self.scanned + off,
            None => {
                self.scanned = self.pending.len();
                return None;
            }
        };
        let line = decode_line(&self.pending[self.start..=nl]);
        self.start = nl + 1;
        self.scanned = self.start;
        Some(line)
    }

    /// Take everything left, including an unterminated tail, split into lines.
    pub fn drain(&mut self) -> Vec<String> {
        let mut rest = std::mem::take(&mut self.pending);
        rest.drain(..self.start);
        self.start = 0;
        self.scanned = 0;
        if rest.is_empty() {
            return Vec::new();
        }
        let body = rest.strip_suffix(b"\n").unwrap_or(&rest);
        let mut lines = Vec::new();
        let mut start = 0;
        for nl in memchr::memchr_iter(b'\n', body) {
            lines.push(decode_line(&body[start..nl]));
            start = nl + 1;
        }
        lines.push(decode_line(&body[start..]));
        lines
    }
}
