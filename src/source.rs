//! Random-access byte sources for reading archives.
//!
//! The reader never assumes a file: anything that can serve bounded
//! `(offset, size)` reads concurrently can back an archive. The two stock
//! implementations are an in-memory buffer and a memory-mapped file.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::error::{PipepackError, Result};

/// A thread-safe random-access byte source.
///
/// Implementations must support concurrent reads; the reader never mutates
/// the source.
pub trait ArchiveSource: Send + Sync {
    /// Total size of the source in bytes.
    fn size(&self) -> u64;

    /// Fills `buf` from the bytes starting at `offset`.
    ///
    /// Fails with [`PipepackError::Format`] when the range is out of
    /// bounds.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Reads `size` bytes at `offset` into a fresh vector.
    fn read_vec(&self, offset: u64, size: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; size];
        self.read_at(offset, &mut buf)?;
        Ok(buf)
    }
}

fn slice_read_at(data: &[u8], offset: u64, buf: &mut [u8]) -> Result<()> {
    let start = usize::try_from(offset)
        .map_err(|_| PipepackError::Format("read offset exceeds addressable range".into()))?;
    let end = start
        .checked_add(buf.len())
        .filter(|&end| end <= data.len())
        .ok_or_else(|| {
            PipepackError::Format(format!(
                "read of {} bytes at offset {} exceeds source size {}",
                buf.len(),
                offset,
                data.len()
            ))
        })?;
    buf.copy_from_slice(&data[start..end]);
    Ok(())
}

impl ArchiveSource for Vec<u8> {
    fn size(&self) -> u64 {
        self.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        slice_read_at(self, offset, buf)
    }
}

impl ArchiveSource for &'static [u8] {
    fn size(&self) -> u64 {
        self.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        slice_read_at(self, offset, buf)
    }
}

/// A memory-mapped archive file.
#[derive(Debug)]
pub struct MappedArchive {
    map: Mmap,
}

impl MappedArchive {
    /// Opens and maps `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        // Safety: mapped files are unsafe to the extent that an external
        // process could modify the file. We assume exclusive access or
        // accept the risk for performance (standard practice).
        #[allow(unsafe_code)]
        let map = unsafe { Mmap::map(&file)? };
        Ok(Self { map })
    }
}

impl ArchiveSource for MappedArchive {
    fn size(&self) -> u64 {
        self.map.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        slice_read_at(&self.map, offset, buf)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn vec_source_bounds() {
        let data = vec![1u8, 2, 3, 4];
        let mut buf = [0u8; 2];
        data.read_at(1, &mut buf).unwrap();
        assert_eq!(buf, [2, 3]);
        assert!(data.read_at(3, &mut buf).is_err());
        assert_eq!(data.size(), 4);
    }
}
