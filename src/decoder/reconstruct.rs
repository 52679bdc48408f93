use std::io::Read;

use flate2::read::ZlibDecoder;
use log::{debug, warn};

use crate::decoder::header::{ColorType, ImageHeader, Transparency};
use crate::utils::error::{ApngError, ApngResult};
use crate::utils::image::FrameImage;
use crate::utils::traits::SafeAccess;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterType {
    None = 0,
    Sub = 1,
    Up = 2,
    Average = 3,
    Paeth = 4,
}

impl FilterType {
    fn from_u8(value: u8) -> Option<FilterType> {
        match value {
            0 => Some(FilterType::None),
            1 => Some(FilterType::Sub),
            2 => Some(FilterType::Up),
            3 => Some(FilterType::Average),
            4 => Some(FilterType::Paeth),
            _ => None,
        }
    }
}

/// Placement of one interlace pass: column start, row start, column step, row step.
#[derive(Debug, Clone, Copy)]
struct Pass {
    col_start: usize,
    row_start: usize,
    col_delta: usize,
    row_delta: usize,
}

const SINGLE_PASS: [Pass; 1] = [Pass { col_start: 0, row_start: 0, col_delta: 1, row_delta: 1 }];

const ADAM7_PASSES: [Pass; 7] = [
    Pass { col_start: 0, row_start: 0, col_delta: 8, row_delta: 8 },
    Pass { col_start: 4, row_start: 0, col_delta: 8, row_delta: 8 },
    Pass { col_start: 0, row_start: 4, col_delta: 4, row_delta: 8 },
    Pass { col_start: 2, row_start: 0, col_delta: 4, row_delta: 4 },
    Pass { col_start: 0, row_start: 2, col_delta: 2, row_delta: 4 },
    Pass { col_start: 1, row_start: 0, col_delta: 2, row_delta: 2 },
    Pass { col_start: 0, row_start: 1, col_delta: 1, row_delta: 2 },
];

impl Pass {
    fn dimensions(&self, width: usize, height: usize) -> (usize, usize) {
        let pass_width = (width + self.col_delta - 1 - self.col_start) / self.col_delta;
        let pass_height = (height + self.row_delta - 1 - self.row_start) / self.row_delta;

        (pass_width, pass_height)
    }
}

/// Turns the compressed image data of one frame into straight RGBA8 pixels.
pub struct Reconstructor<'a> {
    header: &'a ImageHeader,
    palette: Option<&'a [[u8; 3]]>,
    transparency: Option<&'a Transparency>,
}

impl<'a> Reconstructor<'a> {
    pub fn new(
        header: &'a ImageHeader,
        palette: Option<&'a [[u8; 3]]>,
        transparency: Option<&'a Transparency>,
    ) -> Self {
        Self { header, palette, transparency }
    }

    pub fn reconstruct(&self, compressed: &[u8], width: u32, height: u32) -> ApngResult<FrameImage> {
        if self.header.color_type == ColorType::Indexed && self.palette.is_none() {
            return Err(ApngError::MalformedStream("Indexed image without PLTE chunk".into()));
        }

        let passes: &[Pass] = if self.header.interlace { &ADAM7_PASSES } else { &SINGLE_PASS };
        let expected = self.scanline_data_len(passes, width as usize, height as usize);

        let mut data = inflate(compressed, expected)?;
        let mut image = FrameImage::new(width, height);
        let mut palette_overflow = false;
        let mut offset = 0;

        for (index, pass) in passes.iter().enumerate() {
            let (pass_width, pass_height) = pass.dimensions(width as usize, height as usize);

            if pass_width == 0 || pass_height == 0 {
                continue;
            }

            let stride = 1 + self.header.row_bytes(pass_width as u32);
            let pass_len = stride * pass_height;
            let pass_data = &mut data[offset..offset + pass_len];

            unfilter_scanlines(pass_data, stride, self.header.filter_stride())
                .map_err(|e| match e {
                    ApngError::FilterReconstructionError(msg) => {
                        ApngError::FilterReconstructionError(format!("pass {}: {}", index + 1, msg))
                    }
                    e => e,
                })?;

            let mut rgba_row = vec![0u8; pass_width * 4];

            for (row, scanline) in pass_data.chunks_exact(stride).enumerate() {
                palette_overflow |= self.expand_row(&scanline[1..], pass_width, &mut rgba_row);

                let y = row * pass.row_delta + pass.row_start;
                let row_start = y * image.row_bytes();
                let out = image.as_bytes_mut();

                for (col, rgba) in rgba_row.chunks_exact(4).enumerate() {
                    let x = col * pass.col_delta + pass.col_start;
                    let pixel = row_start + x * 4;
                    out[pixel..pixel + 4].copy_from_slice(rgba);
                }
            }

            offset += pass_len;
        }

        if palette_overflow {
            warn!("Palette index out of range, rendered as opaque black");
        }

        debug!("Reconstructed {}x{} region from {} compressed bytes", width, height, compressed.len());

        Ok(image)
    }

    /// Filtered bytes the frame needs: one filter byte plus the packed samples per row, per pass.
    fn scanline_data_len(&self, passes: &[Pass], width: usize, height: usize) -> usize {
        passes
            .iter()
            .map(|pass| pass.dimensions(width, height))
            .filter(|&(w, h)| w > 0 && h > 0)
            .map(|(w, h)| h * (1 + self.header.row_bytes(w as u32)))
            .sum()
    }

    /// Converts one unfiltered scanline to RGBA8. Returns true if a palette index was out of range.
    fn expand_row(&self, row: &[u8], width: usize, out: &mut [u8]) -> bool {
        let bit_depth = self.header.bit_depth;
        let max_value = ((1u32 << bit_depth) - 1) as u16;
        let channels = self.header.color_type.channels();
        let mut palette_overflow = false;

        for (x, rgba) in out.chunks_exact_mut(4).take(width).enumerate() {
            let base = x * channels;

            match self.header.color_type {
                ColorType::Grayscale => {
                    let gray = sample(row, bit_depth, base);
                    let value = scale_to_u8(gray, bit_depth);
                    let alpha = match self.transparency {
                        Some(Transparency::Grayscale(key)) if gray == key & max_value => 0,
                        _ => 255,
                    };

                    rgba.copy_from_slice(&[value, value, value, alpha]);
                }
                ColorType::RGB => {
                    let r = sample(row, bit_depth, base);
                    let g = sample(row, bit_depth, base + 1);
                    let b = sample(row, bit_depth, base + 2);
                    let alpha = match self.transparency {
                        Some(Transparency::RGB(kr, kg, kb)) if (r, g, b) == (*kr, *kg, *kb) => 0,
                        _ => 255,
                    };

                    rgba.copy_from_slice(&[
                        scale_to_u8(r, bit_depth),
                        scale_to_u8(g, bit_depth),
                        scale_to_u8(b, bit_depth),
                        alpha,
                    ]);
                }
                ColorType::Indexed => {
                    let index = sample(row, bit_depth, base) as usize;
                    let palette = self.palette.unwrap_or(&[]);

                    match palette.get_safe(index) {
                        Ok(color) => {
                            let alpha = match self.transparency {
                                Some(Transparency::Palette(alphas)) => alphas.get(index).copied().unwrap_or(255),
                                _ => 255,
                            };

                            rgba.copy_from_slice(&[color[0], color[1], color[2], alpha]);
                        }
                        Err(_) => {
                            palette_overflow = true;
                            rgba.copy_from_slice(&[0, 0, 0, 255]);
                        }
                    }
                }
                ColorType::GrayscaleAlpha => {
                    let value = scale_to_u8(sample(row, bit_depth, base), bit_depth);
                    let alpha = scale_to_u8(sample(row, bit_depth, base + 1), bit_depth);

                    rgba.copy_from_slice(&[value, value, value, alpha]);
                }
                ColorType::RGBA => {
                    for (channel, value) in rgba.iter_mut().enumerate() {
                        *value = scale_to_u8(sample(row, bit_depth, base + channel), bit_depth);
                    }
                }
            }
        }

        palette_overflow
    }
}

fn inflate(compressed: &[u8], expected: usize) -> ApngResult<Vec<u8>> {
    // One extra byte tells "exactly enough" apart from "too much"
    let mut decoder = ZlibDecoder::new(compressed).take(expected as u64 + 1);
    let mut decompressed = Vec::with_capacity(expected + 1);

    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| ApngError::DecompressionError(e.to_string()))?;

    if decompressed.len() < expected {
        return Err(ApngError::FilterReconstructionError(format!(
            "Expected {} bytes of scanline data, inflated {}",
            expected,
            decompressed.len()
        )));
    }

    if decompressed.len() > expected {
        warn!("Image data inflates past the {} bytes the frame needs, ignoring the rest", expected);
        decompressed.truncate(expected);
    }

    Ok(decompressed)
}

/// Reverses the per-row prediction in place. `stride` includes the filter byte.
fn unfilter_scanlines(data: &mut [u8], stride: usize, bytes_per_pixel: usize) -> ApngResult<()> {
    let zeros = vec![0u8; stride - 1];

    for row in 0..data.len() / stride {
        let (before, current) = data.split_at_mut(row * stride);
        let prior = if row == 0 {
            &zeros[..]
        } else {
            &before[(row - 1) * stride + 1..]
        };
        let scanline = &mut current[..stride];

        let filter_type = FilterType::from_u8(scanline[0]).ok_or_else(|| {
            ApngError::FilterReconstructionError(format!("Invalid filter type {} on row {}", scanline[0], row))
        })?;

        let filtered = &mut scanline[1..];

        match filter_type {
            FilterType::None => {}
            FilterType::Sub => decode_sub_filter(filtered, bytes_per_pixel),
            FilterType::Up => decode_up_filter(filtered, prior),
            FilterType::Average => decode_average_filter(filtered, prior, bytes_per_pixel),
            FilterType::Paeth => decode_paeth_filter(filtered, prior, bytes_per_pixel),
        }
    }

    Ok(())
}

fn decode_sub_filter(row: &mut [u8], bytes_per_pixel: usize) {
    for i in bytes_per_pixel..row.len() {
        row[i] = row[i].wrapping_add(row[i - bytes_per_pixel]);
    }
}

fn decode_up_filter(row: &mut [u8], prior: &[u8]) {
    for (value, above) in row.iter_mut().zip(prior) {
        *value = value.wrapping_add(*above);
    }
}

fn decode_average_filter(row: &mut [u8], prior: &[u8], bytes_per_pixel: usize) {
    for i in 0..row.len() {
        let left = if i >= bytes_per_pixel { row[i - bytes_per_pixel] as u16 } else { 0 };
        let above = prior[i] as u16;

        row[i] = row[i].wrapping_add(((left + above) >> 1) as u8);
    }
}

fn decode_paeth_filter(row: &mut [u8], prior: &[u8], bytes_per_pixel: usize) {
    for i in 0..row.len() {
        let (left, upper_left) = if i >= bytes_per_pixel {
            (row[i - bytes_per_pixel], prior[i - bytes_per_pixel])
        } else {
            (0, 0)
        };

        row[i] = row[i].wrapping_add(paeth_predictor(left, prior[i], upper_left));
    }
}

fn paeth_predictor(a: u8, b: u8, c: u8) -> u8 {
    // a = left, b = above, c = upper left
    let a = a as i16;
    let b = b as i16;
    let c = c as i16;

    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();

    if pa <= pb && pa <= pc {
        a as u8
    } else if pb <= pc {
        b as u8
    } else {
        c as u8
    }
}

/// Reads the `index`-th sample of a packed scanline.
fn sample(row: &[u8], bit_depth: u8, index: usize) -> u16 {
    match bit_depth {
        8 => row[index] as u16,
        16 => u16::from_be_bytes([row[index * 2], row[index * 2 + 1]]),
        _ => {
            let bits = bit_depth as usize;
            let per_byte = 8 / bits;
            let shift = (per_byte - 1 - index % per_byte) * bits;
            let mask = (1u8 << bits) - 1;

            ((row[index / per_byte] >> shift) & mask) as u16
        }
    }
}

fn scale_to_u8(value: u16, bit_depth: u8) -> u8 {
    match bit_depth {
        16 => (value >> 8) as u8,
        8 => value as u8,
        // 1, 2 and 4 bit samples replicate up to 0..=255 exactly
        _ => (value * (255 / ((1u16 << bit_depth) - 1))) as u8,
    }
}
