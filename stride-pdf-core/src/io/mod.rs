//! Byte sources and sinks
//!
//! Loading reads through the [`ByteSource`] trait so the same protocol
//! works over a file, an in-memory buffer, any seekable reader, or a
//! partially-downloaded byte range set ([`PartialSource`]). Saving writes
//! to any [`std::io::Write`] sink.
//!
//! A `PartialSource` is the asynchronous-download case: reads of ranges
//! that have not arrived yet fail with [`PdfError::DataNotReady`] after
//! notifying the borrowed [`RangeHint`] callback of the range required.
//! That error is a retry signal, not a failure — feed the bytes and call
//! the operation again.

use crate::error::{PdfError, Result};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Random-access byte source for document loading.
pub trait ByteSource {
    /// Total length in bytes. For a partially-available source this is the
    /// final length, known up front.
    fn len(&mut self) -> Result<u64>;

    /// Fill `buf` exactly from `offset`. Reading past the end is a
    /// [`PdfError::Format`] error; reading a range that has not arrived
    /// yet on a partial source is [`PdfError::DataNotReady`].
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Convenience wrapper allocating the output buffer.
    fn read_range(&mut self, offset: u64, length: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; length];
        self.read_at(offset, &mut buf)?;
        Ok(buf)
    }
}

/// An in-memory byte source.
pub struct MemorySource {
    data: Vec<u8>,
}

impl MemorySource {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl ByteSource for MemorySource {
    fn len(&mut self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let start = offset as usize;
        let end = start
            .checked_add(buf.len())
            .ok_or_else(|| PdfError::Param("Read range overflows".to_string()))?;
        if end > self.data.len() {
            return Err(PdfError::Format(format!(
                "Read past end of data: {} bytes at offset {}",
                buf.len(),
                offset
            )));
        }
        buf.copy_from_slice(&self.data[start..end]);
        Ok(())
    }
}

/// A byte source backed by an open file.
pub struct FileSource {
    file: File,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            file: File::open(path)?,
        })
    }
}

impl ByteSource for FileSource {
    fn len(&mut self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                PdfError::Format(format!(
                    "Read past end of file: {} bytes at offset {}",
                    buf.len(),
                    offset
                ))
            } else {
                PdfError::Io(e)
            }
        })
    }
}

/// A byte source over any seekable reader (the pull-based reader-callback
/// case: the reader is polled for ranges on demand).
pub struct StreamSource<R: Read + Seek> {
    reader: R,
}

impl<R: Read + Seek> StreamSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: Read + Seek> ByteSource for StreamSource<R> {
    fn len(&mut self) -> Result<u64> {
        let pos = self.reader.stream_position()?;
        let len = self.reader.seek(SeekFrom::End(0))?;
        self.reader.seek(SeekFrom::Start(pos))?;
        Ok(len)
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.reader.seek(SeekFrom::Start(offset))?;
        self.reader.read_exact(buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                PdfError::Format(format!(
                    "Read past end of stream: {} bytes at offset {}",
                    buf.len(),
                    offset
                ))
            } else {
                PdfError::Io(e)
            }
        })
    }
}

/// Sharing wrapper: a source behind `Rc<RefCell<_>>` is itself a source.
/// This is how a caller keeps feeding a [`PartialSource`] while a load
/// operation holds it.
impl<S: ByteSource + ?Sized> ByteSource for std::rc::Rc<std::cell::RefCell<S>> {
    fn len(&mut self) -> Result<u64> {
        self.borrow_mut().len()
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.borrow_mut().read_at(offset, buf)
    }
}

/// A growable in-memory sink that stays readable after a save operation
/// has consumed the writer half.
#[derive(Clone, Default)]
pub struct MemorySink {
    buffer: std::rc::Rc<std::cell::RefCell<Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.buffer.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.buffer.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.borrow().is_empty()
    }
}

impl std::io::Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Prefetch hint for a [`PartialSource`]: told which byte range loading
/// needs next, so the transport can prioritize it. Borrowed for the
/// lifetime of the source.
pub trait RangeHint {
    fn request(&self, offset: u64, length: u64);
}

/// A byte source whose content arrives incrementally.
///
/// The total length is fixed at construction; bytes are supplied in
/// arbitrary order with [`PartialSource::feed`]. Reads of missing ranges
/// report the gap to the range hint and fail with
/// [`PdfError::DataNotReady`].
pub struct PartialSource {
    buffer: Vec<u8>,
    /// Sorted, non-overlapping half-open intervals of available bytes.
    available: Vec<(u64, u64)>,
    hint: Option<std::rc::Rc<dyn RangeHint>>,
}

impl PartialSource {
    pub fn new(total_len: u64, hint: Option<std::rc::Rc<dyn RangeHint>>) -> Self {
        Self {
            buffer: vec![0u8; total_len as usize],
            available: Vec::new(),
            hint,
        }
    }

    /// Supply a chunk of the underlying bytes.
    pub fn feed(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        let start = offset as usize;
        let end = start
            .checked_add(bytes.len())
            .filter(|&e| e <= self.buffer.len())
            .ok_or_else(|| {
                PdfError::Param(format!(
                    "Fed range {}..{} exceeds declared length {}",
                    offset,
                    offset + bytes.len() as u64,
                    self.buffer.len()
                ))
            })?;
        self.buffer[start..end].copy_from_slice(bytes);
        self.mark_available(offset, end as u64);
        Ok(())
    }

    /// Whether `offset..offset+length` has fully arrived.
    pub fn is_available(&self, offset: u64, length: u64) -> bool {
        self.first_gap(offset, offset + length).is_none()
    }

    fn mark_available(&mut self, start: u64, end: u64) {
        self.available.push((start, end));
        self.available.sort_unstable();
        let mut merged: Vec<(u64, u64)> = Vec::with_capacity(self.available.len());
        for &(s, e) in &self.available {
            match merged.last_mut() {
                Some(last) if s <= last.1 => last.1 = last.1.max(e),
                _ => merged.push((s, e)),
            }
        }
        self.available = merged;
    }

    /// First missing sub-range of `start..end`, if any.
    fn first_gap(&self, start: u64, end: u64) -> Option<(u64, u64)> {
        if start >= end {
            return None;
        }
        let mut cursor = start;
        for &(s, e) in &self.available {
            if e <= cursor {
                continue;
            }
            if s > cursor {
                return Some((cursor, s.min(end)));
            }
            cursor = e;
            if cursor >= end {
                return None;
            }
        }
        Some((cursor, end))
    }
}

impl ByteSource for PartialSource {
    fn len(&mut self) -> Result<u64> {
        Ok(self.buffer.len() as u64)
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let end = offset + buf.len() as u64;
        if end > self.buffer.len() as u64 {
            return Err(PdfError::Format(format!(
                "Read past end of data: {} bytes at offset {}",
                buf.len(),
                offset
            )));
        }
        if let Some((gap_start, gap_end)) = self.first_gap(offset, end) {
            let length = gap_end - gap_start;
            if let Some(hint) = &self.hint {
                hint.request(gap_start, length);
            }
            return Err(PdfError::DataNotReady {
                offset: gap_start,
                length,
            });
        }
        let start = offset as usize;
        buf.copy_from_slice(&self.buffer[start..start + buf.len()]);
        Ok(())
    }
}
