use crate::decoder::header::ColorType;

/// Summary of a stream, available as soon as it is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub color_type: ColorType,
    pub interlace: bool,
    /// True when an `acTL` chunk preceded the image data.
    pub animated: bool,
    pub num_frames: u32,
    pub num_plays: u32,
    pub palette_len: Option<usize>,
}
