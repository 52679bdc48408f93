use std::fmt;

/// A straight-alpha RGBA8 bitmap, rows top to bottom, no padding.
#[derive(Clone, PartialEq, Eq)]
pub struct FrameImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl FrameImage {
    /// Fully transparent image.
    pub fn new(width: u32, height: u32) -> FrameImage {
        FrameImage {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }

    /// Wraps an existing buffer; returns `None` when its length is not `width * height * 4`.
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<u8>) -> Option<FrameImage> {
        if pixels.len() != width as usize * height as usize * 4 {
            return None;
        }

        Some(FrameImage { width, height, pixels })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.pixels
    }

    /// The RGBA value at (x, y), or `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }

        let start = (y as usize * self.width as usize + x as usize) * 4;
        let mut rgba = [0u8; 4];
        rgba.copy_from_slice(&self.pixels[start..start + 4]);

        Some(rgba)
    }

    pub fn row_bytes(&self) -> usize {
        self.width as usize * 4
    }
}

// Pixel buffers are large; keep Debug output to the shape
impl fmt::Debug for FrameImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}
