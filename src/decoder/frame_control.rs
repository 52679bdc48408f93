use crate::utils::error::{ApngError, ApngResult};
use crate::utils::traits::BigEndianFields;

/// What happens to a frame's region once the frame has been shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisposeOp {
    None = 0,
    Background = 1,
    Previous = 2,
}

/// How a frame's pixels are combined with the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendOp {
    Source = 0,
    Over = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn full(width: u32, height: u32) -> Region {
        Region { x: 0, y: 0, width, height }
    }

    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x as u64 + self.width as u64 <= width as u64
            && self.y as u64 + self.height as u64 <= height as u64
    }
}

/// Contents of an `fcTL` chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameControl {
    pub sequence_number: u32,
    pub region: Region,
    pub delay_num: u16,
    pub delay_den: u16,
    pub dispose_op: DisposeOp,
    pub blend_op: BlendOp,
}

impl FrameControl {
    /// Parses an `fcTL` payload and checks its region against the canvas.
    pub fn parse(data: &[u8], canvas_width: u32, canvas_height: u32) -> ApngResult<FrameControl> {
        if data.len() != 26 {
            return Err(ApngError::MalformedStream(format!("fcTL must be 26 bytes, got {}", data.len())));
        }

        let sequence_number = data.u32_at(0)?;
        let region = Region {
            width: data.u32_at(4)?,
            height: data.u32_at(8)?,
            x: data.u32_at(12)?,
            y: data.u32_at(16)?,
        };
        let delay_num = data.u16_at(20)?;
        let delay_den = data.u16_at(22)?;

        let dispose_op = match data.u8_at(24)? {
            0 => DisposeOp::None,
            1 => DisposeOp::Background,
            2 => DisposeOp::Previous,
            n => return Err(ApngError::MalformedStream(format!("Invalid fcTL dispose_op: {}", n))),
        };

        let blend_op = match data.u8_at(25)? {
            0 => BlendOp::Source,
            1 => BlendOp::Over,
            n => return Err(ApngError::MalformedStream(format!("Invalid fcTL blend_op: {}", n))),
        };

        if !region.fits_within(canvas_width, canvas_height) {
            return Err(ApngError::MalformedStream(format!(
                "fcTL region {}x{}+{}+{} does not fit the {}x{} canvas",
                region.width, region.height, region.x, region.y, canvas_width, canvas_height
            )));
        }

        Ok(FrameControl {
            sequence_number,
            region,
            delay_num,
            delay_den,
            dispose_op,
            blend_op,
        })
    }
}

/// Splits an `fdAT` payload into its sequence number and image data.
pub fn split_frame_data(data: &[u8]) -> ApngResult<(u32, &[u8])> {
    if data.len() < 4 {
        return Err(ApngError::MalformedStream(format!("fdAT must be at least 4 bytes, got {}", data.len())));
    }

    Ok((data.u32_at(0)?, &data[4..]))
}

/// Enforces the shared `fcTL`/`fdAT` numbering: 0, 1, 2, ... with no gaps or repeats.
#[derive(Debug, Default)]
pub struct Sequencer {
    next: u32,
}

impl Sequencer {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    pub fn expect(&mut self, found: u32) -> ApngResult<()> {
        if found != self.next {
            return Err(ApngError::SequenceOrderError { expected: self.next, found });
        }

        self.next = self.next.checked_add(1).ok_or_else(|| {
            ApngError::MalformedStream("Sequence number overflow".into())
        })?;

        Ok(())
    }
}
