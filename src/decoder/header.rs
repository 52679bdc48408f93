use log::warn;

use crate::utils::error::{ApngError, ApngResult};
use crate::utils::options::LoaderOptions;
use crate::utils::traits::BigEndianFields;

const PNG_MAX_DIMENSION: u32 = (1 << 31) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorType {
    Grayscale = 0,
    RGB = 2,
    Indexed = 3,
    GrayscaleAlpha = 4,
    RGBA = 6,
}

impl ColorType {
    fn from_u8(value: u8) -> Option<ColorType> {
        match value {
            0 => Some(ColorType::Grayscale),
            2 => Some(ColorType::RGB),
            3 => Some(ColorType::Indexed),
            4 => Some(ColorType::GrayscaleAlpha),
            6 => Some(ColorType::RGBA),
            _ => None,
        }
    }

    pub fn channels(&self) -> usize {
        match self {
            ColorType::Grayscale | ColorType::Indexed => 1,
            ColorType::GrayscaleAlpha => 2,
            ColorType::RGB => 3,
            ColorType::RGBA => 4,
        }
    }

    fn allows_bit_depth(&self, bit_depth: u8) -> bool {
        match self {
            ColorType::Grayscale => matches!(bit_depth, 1 | 2 | 4 | 8 | 16),
            ColorType::Indexed => matches!(bit_depth, 1 | 2 | 4 | 8),
            ColorType::RGB | ColorType::GrayscaleAlpha | ColorType::RGBA => matches!(bit_depth, 8 | 16),
        }
    }
}

/// Contents of the `IHDR` chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHeader {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub color_type: ColorType,
    pub interlace: bool,
}

impl ImageHeader {
    pub fn parse(data: &[u8], options: &LoaderOptions) -> ApngResult<ImageHeader> {
        if data.len() != 13 {
            return Err(ApngError::MalformedStream(format!("IHDR must be 13 bytes, got {}", data.len())));
        }

        let width = data.u32_at(0)?;
        let height = data.u32_at(4)?;
        let bit_depth = data.u8_at(8)?;
        let color_type = data.u8_at(9)?;
        let compression_method = data.u8_at(10)?;
        let filter_method = data.u8_at(11)?;
        let interlace_method = data.u8_at(12)?;

        if width == 0 || height == 0 || width > PNG_MAX_DIMENSION || height > PNG_MAX_DIMENSION {
            return Err(ApngError::InvalidDimensions { width, height });
        }

        if width as u64 * height as u64 > options.max_pixels {
            warn!("{}x{} exceeds the configured limit of {} pixels", width, height, options.max_pixels);
            return Err(ApngError::InvalidDimensions { width, height });
        }

        let color_type = ColorType::from_u8(color_type)
            .ok_or_else(|| ApngError::MalformedStream(format!("Invalid color type: {}", color_type)))?;

        if !color_type.allows_bit_depth(bit_depth) {
            return Err(ApngError::MalformedStream(format!(
                "Invalid bit depth {} for color type {:?}",
                bit_depth, color_type
            )));
        }

        if compression_method != 0 {
            return Err(ApngError::MalformedStream(format!("Invalid compression method: {}", compression_method)));
        }

        if filter_method != 0 {
            return Err(ApngError::MalformedStream(format!("Invalid filter method: {}", filter_method)));
        }

        let interlace = match interlace_method {
            0 => false,
            1 => true,
            _ => return Err(ApngError::MalformedStream(format!("Invalid interlace method: {}", interlace_method))),
        };

        Ok(ImageHeader {
            width,
            height,
            bit_depth,
            color_type,
            interlace,
        })
    }

    pub fn bits_per_pixel(&self) -> usize {
        self.color_type.channels() * self.bit_depth as usize
    }

    /// Distance in bytes between a byte and the one the filters treat as "left" of it.
    pub fn filter_stride(&self) -> usize {
        (self.bits_per_pixel() + 7) / 8
    }

    /// Unfiltered bytes in one scanline of `width` pixels.
    pub fn row_bytes(&self, width: u32) -> usize {
        (width as usize * self.bits_per_pixel() + 7) / 8
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transparency {
    Grayscale(u16),
    RGB(u16, u16, u16),
    Palette(Vec<u8>),
}

pub fn parse_palette(data: &[u8]) -> ApngResult<Vec<[u8; 3]>> {
    if data.is_empty() || data.len() % 3 != 0 || data.len() > 256 * 3 {
        return Err(ApngError::MalformedStream(format!("Invalid PLTE length: {}", data.len())));
    }

    Ok(data.chunks_exact(3).map(|rgb| [rgb[0], rgb[1], rgb[2]]).collect())
}

/// Parses `tRNS`. Entries that are invalid for the color type are dropped with a warning.
pub fn parse_transparency(
    data: &[u8],
    color_type: ColorType,
    palette: Option<&[[u8; 3]]>,
) -> ApngResult<Option<Transparency>> {
    let transparency = match color_type {
        ColorType::Grayscale => {
            if data.len() != 2 {
                warn!("Invalid tRNS length for grayscale: {}", data.len());
                return Ok(None);
            }

            Transparency::Grayscale(data.u16_at(0)?)
        }
        ColorType::RGB => {
            if data.len() != 6 {
                warn!("Invalid tRNS length for RGB: {}", data.len());
                return Ok(None);
            }

            Transparency::RGB(data.u16_at(0)?, data.u16_at(2)?, data.u16_at(4)?)
        }
        ColorType::Indexed => {
            let palette = match palette {
                Some(palette) => palette,
                None => {
                    return Err(ApngError::MalformedStream("tRNS chunk before PLTE chunk".into()));
                }
            };

            if data.len() > palette.len() {
                warn!("tRNS has {} entries for a palette of {}, truncating", data.len(), palette.len());
            }

            Transparency::Palette(data[..data.len().min(palette.len())].to_vec())
        }
        ColorType::GrayscaleAlpha | ColorType::RGBA => {
            warn!("tRNS chunk not allowed for color type {:?}", color_type);
            return Ok(None);
        }
    };

    Ok(Some(transparency))
}

/// Contents of the `acTL` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationControl {
    pub num_frames: u32,
    /// 0 means loop forever.
    pub num_plays: u32,
}

impl AnimationControl {
    pub fn parse(data: &[u8]) -> ApngResult<AnimationControl> {
        if data.len() != 8 {
            return Err(ApngError::MalformedStream(format!("acTL must be 8 bytes, got {}", data.len())));
        }

        let num_frames = data.u32_at(0)?;
        let num_plays = data.u32_at(4)?;

        if num_frames == 0 {
            return Err(ApngError::MalformedStream("acTL chunk with zero frames".into()));
        }

        Ok(AnimationControl { num_frames, num_plays })
    }
}
