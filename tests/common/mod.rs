#![allow(dead_code)]

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

pub const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'];

pub const DISPOSE_NONE: u8 = 0;
pub const DISPOSE_BACKGROUND: u8 = 1;
pub const DISPOSE_PREVIOUS: u8 = 2;

pub const BLEND_SOURCE: u8 = 0;
pub const BLEND_OVER: u8 = 1;

/// Assembles PNG/APNG streams chunk by chunk.
///
/// Sequence numbers for fcTL and fdAT are assigned automatically, starting at 0.
pub struct ApngBuilder {
    bytes: Vec<u8>,
    sequence: u32,
}

impl ApngBuilder {
    pub fn new(width: u32, height: u32, bit_depth: u8, color_type: u8) -> ApngBuilder {
        ApngBuilder::with_interlace(width, height, bit_depth, color_type, 0)
    }

    pub fn rgba(width: u32, height: u32) -> ApngBuilder {
        ApngBuilder::new(width, height, 8, 6)
    }

    pub fn with_interlace(width: u32, height: u32, bit_depth: u8, color_type: u8, interlace: u8) -> ApngBuilder {
        let mut ihdr = Vec::with_capacity(13);
        ihdr.extend_from_slice(&width.to_be_bytes());
        ihdr.extend_from_slice(&height.to_be_bytes());
        ihdr.extend_from_slice(&[bit_depth, color_type, 0, 0, interlace]);

        ApngBuilder {
            bytes: SIGNATURE.to_vec(),
            sequence: 0,
        }
        .chunk(b"IHDR", &ihdr)
    }

    pub fn chunk(mut self, chunk_type: &[u8; 4], data: &[u8]) -> ApngBuilder {
        self.bytes.extend_from_slice(&(data.len() as u32).to_be_bytes());
        self.bytes.extend_from_slice(chunk_type);
        self.bytes.extend_from_slice(data);
        self.bytes.extend_from_slice(&crc(chunk_type, data).to_be_bytes());
        self
    }

    pub fn plte(self, palette: &[[u8; 3]]) -> ApngBuilder {
        let data: Vec<u8> = palette.iter().flatten().copied().collect();
        self.chunk(b"PLTE", &data)
    }

    pub fn trns(self, data: &[u8]) -> ApngBuilder {
        self.chunk(b"tRNS", data)
    }

    pub fn actl(self, num_frames: u32, num_plays: u32) -> ApngBuilder {
        let mut data = Vec::with_capacity(8);
        data.extend_from_slice(&num_frames.to_be_bytes());
        data.extend_from_slice(&num_plays.to_be_bytes());
        self.chunk(b"acTL", &data)
    }

    /// fcTL for the region `(x, y, width, height)`.
    pub fn fctl(mut self, region: (u32, u32, u32, u32), delay: (u16, u16), dispose_op: u8, blend_op: u8) -> ApngBuilder {
        let sequence = self.next_sequence();
        let (x, y, width, height) = region;

        let mut data = Vec::with_capacity(26);
        data.extend_from_slice(&sequence.to_be_bytes());
        data.extend_from_slice(&width.to_be_bytes());
        data.extend_from_slice(&height.to_be_bytes());
        data.extend_from_slice(&x.to_be_bytes());
        data.extend_from_slice(&y.to_be_bytes());
        data.extend_from_slice(&delay.0.to_be_bytes());
        data.extend_from_slice(&delay.1.to_be_bytes());
        data.extend_from_slice(&[dispose_op, blend_op]);

        self.chunk(b"fcTL", &data)
    }

    /// IDAT carrying the compressed form of already-filtered `scanlines`.
    pub fn idat(self, scanlines: &[u8]) -> ApngBuilder {
        self.chunk(b"IDAT", &zlib(scanlines))
    }

    /// Compresses `scanlines` once and spreads the result over `parts` IDAT chunks.
    pub fn idat_split(mut self, scanlines: &[u8], parts: usize) -> ApngBuilder {
        let compressed = zlib(scanlines);
        let part_len = compressed.len().div_ceil(parts).max(1);

        for part in compressed.chunks(part_len) {
            self = self.chunk(b"IDAT", part);
        }

        self
    }

    pub fn fdat(mut self, scanlines: &[u8]) -> ApngBuilder {
        let sequence = self.next_sequence();

        let mut data = sequence.to_be_bytes().to_vec();
        data.extend_from_slice(&zlib(scanlines));

        self.chunk(b"fdAT", &data)
    }

    /// Overrides the next sequence number, to build out-of-order streams.
    pub fn set_sequence(mut self, sequence: u32) -> ApngBuilder {
        self.sequence = sequence;
        self
    }

    pub fn iend(self) -> ApngBuilder {
        self.chunk(b"IEND", &[])
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }

    fn next_sequence(&mut self) -> u32 {
        let sequence = self.sequence;
        self.sequence += 1;
        sequence
    }
}

pub fn crc(chunk_type: &[u8; 4], data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    hasher.finalize()
}

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("in-memory zlib write");
    encoder.finish().expect("in-memory zlib finish")
}

/// Unfiltered (filter type 0) RGBA8 scanlines for a `width`×`height` image.
pub fn rgba_scanlines(width: u32, height: u32, pixel: impl Fn(u32, u32) -> [u8; 4]) -> Vec<u8> {
    let mut data = Vec::with_capacity((width as usize * 4 + 1) * height as usize);

    for y in 0..height {
        data.push(0);
        for x in 0..width {
            data.extend_from_slice(&pixel(x, y));
        }
    }

    data
}

/// Unfiltered RGBA8 scanlines laid out as the seven Adam7 passes.
pub fn adam7_rgba_scanlines(width: u32, height: u32, pixel: impl Fn(u32, u32) -> [u8; 4]) -> Vec<u8> {
    const PASSES: [(u32, u32, usize, usize); 7] =
        [(0, 0, 8, 8), (4, 0, 8, 8), (0, 4, 4, 8), (2, 0, 4, 4), (0, 2, 2, 4), (1, 0, 2, 2), (0, 1, 1, 2)];

    let mut data = Vec::new();

    for (col_start, row_start, col_delta, row_delta) in PASSES {
        let columns: Vec<u32> = (col_start..width).step_by(col_delta).collect();
        if columns.is_empty() {
            continue;
        }

        for y in (row_start..height).step_by(row_delta) {
            data.push(0);
            for &x in &columns {
                data.extend_from_slice(&pixel(x, y));
            }
        }
    }

    data
}

pub fn solid_scanlines(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    rgba_scanlines(width, height, |_, _| rgba)
}

/// Position, type and payload length of every chunk in `bytes`.
pub fn chunk_layout(bytes: &[u8]) -> Vec<(usize, [u8; 4], usize)> {
    let mut layout = Vec::new();
    let mut offset = SIGNATURE.len();

    while offset + 12 <= bytes.len() {
        let length = u32::from_be_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]]) as usize;
        let chunk_type = [bytes[offset + 4], bytes[offset + 5], bytes[offset + 6], bytes[offset + 7]];

        layout.push((offset, chunk_type, length));
        offset += 12 + length;
    }

    layout
}

/// Reference canvas for checking composited output with plain per-pixel loops.
#[derive(Clone)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<[u8; 4]>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Canvas {
        Canvas {
            width,
            height,
            pixels: vec![[0; 4]; width as usize * height as usize],
        }
    }

    pub fn fill(&mut self, region: (u32, u32, u32, u32), rgba: [u8; 4]) {
        let (x0, y0, width, height) = region;
        for y in y0..y0 + height {
            for x in x0..x0 + width {
                self.pixels[(y * self.width + x) as usize] = rgba;
            }
        }
    }

    /// Source-over onto an opaque canvas.
    pub fn blend_onto_opaque(&mut self, region: (u32, u32, u32, u32), rgba: [u8; 4]) {
        let (x0, y0, width, height) = region;
        let alpha = rgba[3] as u32;

        for y in y0..y0 + height {
            for x in x0..x0 + width {
                let dst = &mut self.pixels[(y * self.width + x) as usize];
                assert_eq!(dst[3], 255, "reference blend expects an opaque canvas");

                for channel in 0..3 {
                    dst[channel] = ((rgba[channel] as u32 * alpha + dst[channel] as u32 * (255 - alpha)) / 255) as u8;
                }
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.pixels.iter().flatten().copied().collect()
    }
}
