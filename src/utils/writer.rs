use std::io;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use log::debug;

use crate::decoder::loader::Frame;
use crate::utils::error::{ApngError, ApngResult};
use crate::utils::image::FrameImage;

/// Dumps decoded frames as standalone PNG files.
pub struct FrameWriter {}

impl FrameWriter {
    pub fn write_png<P: AsRef<Path>>(output_path: P, image: &FrameImage) -> ApngResult<()> {
        let output_path = output_path.as_ref();

        let buffer = RgbaImage::from_raw(image.width(), image.height(), image.as_bytes().to_vec()).ok_or_else(|| {
            ApngError::IoError(io::Error::new(io::ErrorKind::InvalidInput, "Pixel buffer does not match dimensions"))
        })?;

        buffer
            .save(output_path)
            .map_err(|e| ApngError::IoError(io::Error::new(io::ErrorKind::Other, e.to_string())))?;

        debug!("Wrote {}x{} frame to {}", image.width(), image.height(), output_path.display());

        Ok(())
    }

    /// Path of the dump for `frame`: `<stem>_<index>.png` inside `output_dir`.
    pub fn frame_path(output_dir: &Path, stem: &str, frame: &Frame) -> PathBuf {
        output_dir.join(format!("{}_{:03}.png", stem, frame.index))
    }

    pub fn write_frame(output_dir: &Path, stem: &str, frame: &Frame) -> ApngResult<PathBuf> {
        let output_path = FrameWriter::frame_path(output_dir, stem, frame);
        FrameWriter::write_png(&output_path, &frame.image)?;

        Ok(output_path)
    }
}
