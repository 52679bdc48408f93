use log::debug;

use crate::decoder::frame_control::{BlendOp, DisposeOp, FrameControl, Region};
use crate::utils::image::FrameImage;

/// How to undo the last drawn frame before the next one is drawn.
#[derive(Debug)]
struct PendingDisposal {
    region: Region,
    dispose_op: DisposeOp,
    // Canvas region as it was before the frame was drawn; only kept for DisposeOp::Previous
    saved: Option<Vec<u8>>,
}

/// Owns the full-size canvas and applies dispose/blend for each frame in order.
#[derive(Debug)]
pub struct Compositor {
    canvas: FrameImage,
    pending: Option<PendingDisposal>,
}

impl Compositor {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: FrameImage::new(width, height),
            pending: None,
        }
    }

    /// Draws `frame` (sized to `control.region`) and returns a snapshot of the whole canvas.
    pub fn compose(&mut self, control: &FrameControl, frame: &FrameImage) -> FrameImage {
        self.dispose_previous();

        let region = control.region;
        let saved = match control.dispose_op {
            DisposeOp::Previous => Some(self.copy_region(region)),
            DisposeOp::None | DisposeOp::Background => None,
        };

        self.draw(region, control.blend_op, frame);

        self.pending = Some(PendingDisposal {
            region,
            dispose_op: control.dispose_op,
            saved,
        });

        self.canvas.clone()
    }

    fn dispose_previous(&mut self) {
        let pending = match self.pending.take() {
            Some(pending) => pending,
            None => return,
        };

        debug!("Disposing {:?} with {:?}", pending.region, pending.dispose_op);

        match (pending.dispose_op, pending.saved) {
            (DisposeOp::None, _) => {}
            (DisposeOp::Background, _) => self.clear_region(pending.region),
            (DisposeOp::Previous, Some(saved)) => self.write_region(pending.region, &saved),
            (DisposeOp::Previous, None) => self.clear_region(pending.region),
        }
    }

    fn row_range(&self, region: Region, row: u32) -> std::ops::Range<usize> {
        let start = ((region.y + row) as usize * self.canvas.width() as usize + region.x as usize) * 4;
        start..start + region.width as usize * 4
    }

    fn copy_region(&self, region: Region) -> Vec<u8> {
        let mut pixels = Vec::with_capacity(region.width as usize * region.height as usize * 4);

        for row in 0..region.height {
            let range = self.row_range(region, row);
            pixels.extend_from_slice(&self.canvas.as_bytes()[range]);
        }

        pixels
    }

    fn write_region(&mut self, region: Region, pixels: &[u8]) {
        let row_len = region.width as usize * 4;

        for (row, source) in (0..region.height).zip(pixels.chunks_exact(row_len)) {
            let range = self.row_range(region, row);
            self.canvas.as_bytes_mut()[range].copy_from_slice(source);
        }
    }

    fn clear_region(&mut self, region: Region) {
        for row in 0..region.height {
            let range = self.row_range(region, row);
            self.canvas.as_bytes_mut()[range].fill(0);
        }
    }

    fn draw(&mut self, region: Region, blend_op: BlendOp, frame: &FrameImage) {
        match blend_op {
            BlendOp::Source => self.write_region(region, frame.as_bytes()),
            BlendOp::Over => {
                let row_len = region.width as usize * 4;

                for (row, source) in (0..region.height).zip(frame.as_bytes().chunks_exact(row_len)) {
                    let range = self.row_range(region, row);
                    let target = &mut self.canvas.as_bytes_mut()[range];

                    for (dst, src) in target.chunks_exact_mut(4).zip(source.chunks_exact(4)) {
                        blend_over(dst, src);
                    }
                }
            }
        }
    }
}

/// Straight-alpha source-over, in exact integer arithmetic.
fn blend_over(dst: &mut [u8], src: &[u8]) {
    let src_alpha = src[3] as u32;

    if src_alpha == 0 {
        return;
    }

    let dst_alpha = dst[3] as u32;

    if src_alpha == 255 || dst_alpha == 0 {
        dst.copy_from_slice(src);
        return;
    }

    let u = src_alpha * 255;
    let v = (255 - src_alpha) * dst_alpha;
    let out_alpha = u + v;

    for channel in 0..3 {
        dst[channel] = ((src[channel] as u32 * u + dst[channel] as u32 * v) / out_alpha) as u8;
    }

    dst[3] = (out_alpha / 255) as u8;
}
