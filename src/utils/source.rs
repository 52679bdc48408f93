use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use crate::utils::error::{ApngError, ApngResult};

/// Sequential, position-tracking access to the bytes of a PNG stream.
///
/// Reads never return short: either exactly the requested number of bytes
/// is produced or the call fails with [`ApngError::UnexpectedEnd`].
pub trait ByteSource {
    /// Fills `buf` completely from the current position.
    fn read_into(&mut self, buf: &mut [u8]) -> ApngResult<()>;

    /// Number of bytes not yet consumed.
    fn remaining(&self) -> u64;

    /// Number of bytes consumed so far.
    fn position(&self) -> u64;

    /// Reads exactly `n` bytes.
    fn read(&mut self, n: usize) -> ApngResult<Vec<u8>> {
        // Checked before allocating so a bogus length can't reserve gigabytes
        if n as u64 > self.remaining() {
            return Err(ApngError::UnexpectedEnd { needed: n, remaining: self.remaining() });
        }

        let mut bytes = vec![0; n];
        self.read_into(&mut bytes)?;

        Ok(bytes)
    }

    /// Reads a big-endian 32-bit value.
    fn read_u32(&mut self) -> ApngResult<u32> {
        let mut bytes = [0u8; 4];
        self.read_into(&mut bytes)?;

        Ok(u32::from_be_bytes(bytes))
    }
}

/// Bytes already in memory.
#[derive(Debug, Clone)]
pub struct MemorySource<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> MemorySource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }
}

impl ByteSource for MemorySource<'_> {
    fn read_into(&mut self, buf: &mut [u8]) -> ApngResult<()> {
        let end = self.position.checked_add(buf.len()).filter(|&end| end <= self.data.len());

        match end {
            Some(end) => {
                buf.copy_from_slice(&self.data[self.position..end]);
                self.position = end;
                Ok(())
            }
            None => Err(ApngError::UnexpectedEnd { needed: buf.len(), remaining: self.remaining() }),
        }
    }

    fn remaining(&self) -> u64 {
        (self.data.len() - self.position) as u64
    }

    fn position(&self) -> u64 {
        self.position as u64
    }
}

/// Any reader whose total length is known up front.
#[derive(Debug)]
pub struct StreamSource<R: Read> {
    reader: R,
    position: u64,
    len: u64,
}

/// Buffered file stream; the handle is released when the source is dropped.
pub type FileSource = StreamSource<BufReader<File>>;

impl<R: Read> StreamSource<R> {
    pub fn new(reader: R, len: u64) -> Self {
        Self { reader, position: 0, len }
    }
}

impl FileSource {
    pub fn open<P: AsRef<Path>>(path: P) -> ApngResult<FileSource> {
        let path = path.as_ref();

        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ApngError::NotFound(path.to_path_buf()),
            _ => ApngError::IoError(e),
        })?;
        let len = file.metadata()?.len();

        Ok(StreamSource::new(BufReader::new(file), len))
    }
}

impl<R: Read> ByteSource for StreamSource<R> {
    fn read_into(&mut self, buf: &mut [u8]) -> ApngResult<()> {
        if buf.len() as u64 > self.remaining() {
            return Err(ApngError::UnexpectedEnd { needed: buf.len(), remaining: self.remaining() });
        }

        match self.reader.read_exact(buf) {
            Ok(()) => {
                self.position += buf.len() as u64;
                Ok(())
            }
            // The file shrank underneath us
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                let remaining = self.remaining();
                self.len = self.position;
                Err(ApngError::UnexpectedEnd { needed: buf.len(), remaining })
            }
            Err(e) => Err(ApngError::IoError(e)),
        }
    }

    fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.position)
    }

    fn position(&self) -> u64 {
        self.position
    }
}
