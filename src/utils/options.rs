/// How a frame delay with a zero denominator is reported.
///
/// Only applies when the numerator is non-zero; a 0/0 delay always stays 0/0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroDenominator {
    /// Report the denominator as stored (0).
    Literal,
    /// Treat it as 100, i.e. the numerator counts hundredths of a second.
    Hundredths,
    /// Treat it as 1000, i.e. the numerator counts milliseconds.
    Thousandths,
}

impl ZeroDenominator {
    pub fn resolve(&self, delay_num: u16, delay_den: u16) -> u16 {
        if delay_den != 0 || delay_num == 0 {
            return delay_den;
        }

        match self {
            ZeroDenominator::Literal => 0,
            ZeroDenominator::Hundredths => 100,
            ZeroDenominator::Thousandths => 1000,
        }
    }
}

impl Default for ZeroDenominator {
    fn default() -> Self {
        ZeroDenominator::Thousandths
    }
}

pub const DEFAULT_MAX_PIXELS: u64 = 1 << 28;
pub const PNG_MAX_CHUNK_LENGTH: u32 = (1 << 31) - 1;

#[derive(Debug, Clone)]
pub struct LoaderOptions {
    pub zero_denominator: ZeroDenominator,
    /// Largest accepted canvas, in pixels.
    pub max_pixels: u64,
    /// Largest accepted chunk payload, in bytes.
    pub max_chunk_length: u32,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            zero_denominator: ZeroDenominator::default(),
            max_pixels: DEFAULT_MAX_PIXELS,
            max_chunk_length: PNG_MAX_CHUNK_LENGTH,
        }
    }
}

impl LoaderOptions {
    pub fn with_zero_denominator(mut self, zero_denominator: ZeroDenominator) -> Self {
        self.zero_denominator = zero_denominator;
        self
    }

    pub fn with_max_pixels(mut self, max_pixels: u64) -> Self {
        self.max_pixels = max_pixels;
        self
    }

    pub fn with_max_chunk_length(mut self, max_chunk_length: u32) -> Self {
        self.max_chunk_length = max_chunk_length.min(PNG_MAX_CHUNK_LENGTH);
        self
    }
}
