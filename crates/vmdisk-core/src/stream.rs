//! Sparse byte stream abstractions and composition utilities.
//!
//! A virtual disk presents its logical contents as a [`SparseStream`]: a
//! random-access byte view that also reports which ranges are physically
//! stored. Extent streams are composed into one disk view with
//! [`ConcatStream`]; differencing chains end in a [`ZeroStream`].

use std::cell::RefCell;
use std::cmp;
use std::io::{self, Read, Seek, SeekFrom};
use std::rc::Rc;

/// A contiguous range of stored bytes within a sparse stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StreamExtent {
    /// Byte offset of the first stored byte.
    pub start: u64,
    /// Number of stored bytes.
    pub length: u64,
}

impl StreamExtent {
    /// Creates a new extent.
    pub fn new(start: u64, length: u64) -> Self {
        Self { start, length }
    }

    /// Byte offset one past the last stored byte.
    pub fn end(&self) -> u64 {
        self.start + self.length
    }
}

/// A random-access, sparse-aware byte view.
///
/// Reads past the logical length return 0 bytes. Ranges outside
/// [`extents`](SparseStream::extents) read as the parent's content (for
/// differencing streams) or zeros.
pub trait SparseStream: Read + Seek {
    /// Total length of the logical byte view.
    fn len(&self) -> u64;

    /// Whether the logical view is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ranges of bytes physically stored by this stream, sorted and
    /// non-overlapping.
    fn extents(&self) -> Vec<StreamExtent>;
}

/// A raw byte source a disk image can be opened from.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// A sparse stream shared between several readers.
///
/// Extent streams of one disk all read through the same parent; the parent
/// is released when the last holder drops its handle.
pub type SharedStream = Rc<RefCell<Box<dyn SparseStream>>>;

/// Wraps an owned stream for sharing.
pub fn share(stream: Box<dyn SparseStream>) -> SharedStream {
    Rc::new(RefCell::new(stream))
}

/// Reads up to `buf.len()` bytes from `stream` at absolute position `pos`.
///
/// A short read past the stream's end is padded with zeros so callers always
/// get a full buffer for in-range requests.
pub(crate) fn read_at(stream: &SharedStream, pos: u64, buf: &mut [u8]) -> io::Result<()> {
    let mut inner = stream.borrow_mut();
    inner.seek(SeekFrom::Start(pos))?;
    let mut total = 0;
    while total < buf.len() {
        let n = inner.read(&mut buf[total..])?;
        if n == 0 {
            break;
        }
        total += n;
    }
    for byte in &mut buf[total..] {
        *byte = 0;
    }
    Ok(())
}

/// Resolves a `SeekFrom` against the current position and stream length.
pub(crate) fn resolve_seek(pos: SeekFrom, current: u64, len: u64) -> io::Result<u64> {
    let target = match pos {
        SeekFrom::Start(p) => p as i128,
        SeekFrom::End(delta) => len as i128 + delta as i128,
        SeekFrom::Current(delta) => current as i128 + delta as i128,
    };
    if target < 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "seek before start of stream",
        ));
    }
    Ok(target as u64)
}

/// Sorts and coalesces overlapping or adjacent extents.
pub(crate) fn merge_extents(mut extents: Vec<StreamExtent>) -> Vec<StreamExtent> {
    extents.sort();
    let mut merged: Vec<StreamExtent> = Vec::with_capacity(extents.len());
    for extent in extents {
        if extent.length == 0 {
            continue;
        }
        match merged.last_mut() {
            Some(last) if extent.start <= last.end() => {
                last.length = cmp::max(last.end(), extent.end()) - last.start;
            }
            _ => merged.push(extent),
        }
    }
    merged
}

/// Clips `extents` to the window `[start, start + length)` and rebases them
/// so the window start becomes offset 0.
pub(crate) fn clip_extents(
    extents: &[StreamExtent],
    start: u64,
    length: u64,
) -> Vec<StreamExtent> {
    let end = start + length;
    let mut clipped = Vec::new();
    for extent in extents {
        let lo = cmp::max(extent.start, start);
        let hi = cmp::min(extent.end(), end);
        if lo < hi {
            clipped.push(StreamExtent::new(lo - start, hi - lo));
        }
    }
    clipped
}

/// A stream of all-zero bytes with no stored extents.
pub struct ZeroStream {
    length: u64,
    position: u64,
}

impl ZeroStream {
    /// Creates a zero stream of `length` bytes.
    pub fn new(length: u64) -> Self {
        Self {
            length,
            position: 0,
        }
    }
}

impl Read for ZeroStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.position >= self.length {
            return Ok(0);
        }
        let remaining = self.length - self.position;
        let count = cmp::min(buf.len() as u64, remaining) as usize;
        for byte in &mut buf[..count] {
            *byte = 0;
        }
        self.position += count as u64;
        Ok(count)
    }
}

impl Seek for ZeroStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.position = resolve_seek(pos, self.position, self.length)?;
        Ok(self.position)
    }
}

impl SparseStream for ZeroStream {
    fn len(&self) -> u64 {
        self.length
    }

    fn extents(&self) -> Vec<StreamExtent> {
        Vec::new()
    }
}

/// A linear concatenation of sparse streams.
pub struct ConcatStream {
    parts: Vec<Box<dyn SparseStream>>,
    // Byte offset of each part within the concatenated view.
    starts: Vec<u64>,
    length: u64,
    position: u64,
}

impl ConcatStream {
    /// Creates a concatenation over `parts`, in order.
    pub fn new(parts: Vec<Box<dyn SparseStream>>) -> Self {
        let mut starts = Vec::with_capacity(parts.len());
        let mut offset = 0;
        for part in &parts {
            starts.push(offset);
            offset += part.len();
        }
        Self {
            parts,
            starts,
            length: offset,
            position: 0,
        }
    }

    fn part_index(&self, pos: u64) -> usize {
        match self.starts.binary_search(&pos) {
            Ok(index) => index,
            Err(index) => index - 1,
        }
    }
}

impl Read for ConcatStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.position >= self.length || self.parts.is_empty() {
            return Ok(0);
        }
        let index = self.part_index(self.position);
        let local = self.position - self.starts[index];
        let part = &mut self.parts[index];
        let available = part.len() - local;
        let count = cmp::min(buf.len() as u64, available) as usize;
        part.seek(SeekFrom::Start(local))?;
        let n = part.read(&mut buf[..count])?;
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for ConcatStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.position = resolve_seek(pos, self.position, self.length)?;
        Ok(self.position)
    }
}

impl SparseStream for ConcatStream {
    fn len(&self) -> u64 {
        self.length
    }

    fn extents(&self) -> Vec<StreamExtent> {
        let mut all = Vec::new();
        for (part, start) in self.parts.iter().zip(&self.starts) {
            for extent in part.extents() {
                all.push(StreamExtent::new(start + extent.start, extent.length));
            }
        }
        merge_extents(all)
    }
}
