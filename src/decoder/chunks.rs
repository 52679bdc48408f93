use std::fmt::{self, Display, Formatter};

use crc32fast::Hasher;
use log::debug;

use crate::utils::error::{ApngError, ApngResult};
use crate::utils::source::ByteSource;

pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    // Critical chunks
    Ihdr, // Image header
    Plte, // Palette
    Idat, // Image data
    Iend, // End of image

    // Ancillary chunks the loader needs
    Trns, // Transparency

    // Animation chunks
    Actl, // Animation control
    Fctl, // Frame control
    Fdat, // Frame data

    // Everything else is read, verified and dropped
    Ignored([u8; 4]),
}

impl ChunkKind {
    pub fn from_type(chunk_type: [u8; 4]) -> ChunkKind {
        match &chunk_type {
            b"IHDR" => ChunkKind::Ihdr,
            b"PLTE" => ChunkKind::Plte,
            b"IDAT" => ChunkKind::Idat,
            b"IEND" => ChunkKind::Iend,
            b"tRNS" => ChunkKind::Trns,
            b"acTL" => ChunkKind::Actl,
            b"fcTL" => ChunkKind::Fctl,
            b"fdAT" => ChunkKind::Fdat,
            _ => ChunkKind::Ignored(chunk_type),
        }
    }

    pub fn type_code(&self) -> [u8; 4] {
        match self {
            ChunkKind::Ihdr => *b"IHDR",
            ChunkKind::Plte => *b"PLTE",
            ChunkKind::Idat => *b"IDAT",
            ChunkKind::Iend => *b"IEND",
            ChunkKind::Trns => *b"tRNS",
            ChunkKind::Actl => *b"acTL",
            ChunkKind::Fctl => *b"fcTL",
            ChunkKind::Fdat => *b"fdAT",
            ChunkKind::Ignored(code) => *code,
        }
    }

    /// Critical chunks have an uppercase first letter.
    pub fn is_critical(&self) -> bool {
        self.type_code()[0] & 0x20 == 0
    }
}

impl Display for ChunkKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.type_code()))
    }
}

#[derive(Debug, Clone)]
pub struct Chunk {
    pub kind: ChunkKind,
    pub data: Vec<u8>,
}

pub fn chunk_crc(chunk_type: &[u8; 4], data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    hasher.finalize()
}

/// Walks the chunks of a PNG stream after checking its signature.
///
/// The sequence ends after `IEND`, at a clean end of input, or at the first
/// error; it cannot be restarted.
pub struct ChunkReader<S: ByteSource> {
    source: S,
    max_chunk_length: u32,
    finished: bool,
}

impl<S: ByteSource> ChunkReader<S> {
    pub fn new(mut source: S, max_chunk_length: u32) -> ApngResult<ChunkReader<S>> {
        let mut signature = [0u8; 8];

        match source.read_into(&mut signature) {
            Ok(()) => {}
            Err(ApngError::UnexpectedEnd { .. }) => return Err(ApngError::NotAPng),
            Err(e) => return Err(e),
        }

        if signature != PNG_SIGNATURE {
            return Err(ApngError::NotAPng);
        }

        Ok(ChunkReader {
            source,
            max_chunk_length,
            finished: false,
        })
    }

    pub fn position(&self) -> u64 {
        self.source.position()
    }

    pub fn next_chunk(&mut self) -> ApngResult<Option<Chunk>> {
        if self.finished {
            return Ok(None);
        }

        if self.source.remaining() == 0 {
            debug!("End of input at offset {} without IEND", self.source.position());
            self.finished = true;
            return Ok(None);
        }

        match self.read_chunk() {
            Ok(chunk) => {
                if chunk.kind == ChunkKind::Iend {
                    self.finished = true;
                }

                Ok(Some(chunk))
            }
            Err(e) => {
                self.finished = true;
                Err(e)
            }
        }
    }

    fn read_chunk(&mut self) -> ApngResult<Chunk> {
        let offset = self.source.position();

        let length = self.source.read_u32().map_err(|e| truncated(e, "chunk length"))?;

        if length > self.max_chunk_length {
            return Err(ApngError::MalformedStream(format!(
                "Chunk at offset {} declares {} bytes, limit is {}",
                offset, length, self.max_chunk_length
            )));
        }

        let mut chunk_type = [0u8; 4];
        self.source.read_into(&mut chunk_type).map_err(|e| truncated(e, "chunk type"))?;

        if !chunk_type.iter().all(|b| b.is_ascii_alphabetic()) {
            return Err(ApngError::MalformedStream(format!(
                "Invalid chunk type {:02x?} at offset {}",
                chunk_type, offset
            )));
        }

        let kind = ChunkKind::from_type(chunk_type);
        let data = self.source.read(length as usize).map_err(|e| truncated(e, "chunk data"))?;
        let crc = self.source.read_u32().map_err(|e| truncated(e, "chunk CRC"))?;

        let calculated = chunk_crc(&chunk_type, &data);
        if calculated != crc {
            return Err(ApngError::CorruptChunk {
                chunk: kind.to_string(),
                expected: crc,
                actual: calculated,
            });
        }

        debug!("Chunk {} ({} bytes) at offset {}", kind, length, offset);

        Ok(Chunk { kind, data })
    }
}

impl<S: ByteSource> Iterator for ChunkReader<S> {
    type Item = ApngResult<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_chunk().transpose()
    }
}

fn truncated(error: ApngError, what: &str) -> ApngError {
    match error {
        ApngError::UnexpectedEnd { needed, remaining } => ApngError::MalformedStream(format!(
            "Truncated {}: needed {} bytes, {} remaining",
            what, needed, remaining
        )),
        e => e,
    }
}
